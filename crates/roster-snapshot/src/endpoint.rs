use std::fmt;

use serde::{Deserialize, Serialize};

use crate::download::DownloadId;
use crate::fetch::FetchError;

/// One provider endpoint at a specific API version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub version: String,
    /// Provider user on whose behalf the endpoint is fetched, if any.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Required endpoints must succeed for an epoch to be complete.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl Endpoint {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            user_id: None,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn for_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// Status of a tracked fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    /// Registered, not yet attempted.
    Pending,
    Succeeded,
    /// Last attempt failed; eligible for retry while under the ceiling.
    Failed,
    /// Hit the retry ceiling; reported, never retried automatically.
    Exhausted,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "exhausted" => Some(Self::Exhausted),
            _ => None,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `download_entries` row.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadEntry {
    pub id: i64,
    pub download_id: DownloadId,
    pub endpoint: String,
    pub version: String,
    pub user_id: Option<i64>,
    pub status: EntryStatus,
    pub fetched_date: String,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub required: bool,
}

impl DownloadEntry {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            name: self.endpoint.clone(),
            version: self.version.clone(),
            user_id: self.user_id,
            required: self.required,
        }
    }
}

/// Result of one fetch attempt, as recorded by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
}

impl AttemptOutcome {
    pub fn failed(cause: impl Into<String>) -> Self {
        Self::Failed(cause.into())
    }

    pub fn from_result<T>(result: &Result<T, FetchError>) -> Self {
        match result {
            Ok(_) => Self::Succeeded,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}
