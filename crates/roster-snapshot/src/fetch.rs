use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::entity::{Avatar, ReferenceBatch, SingletonRow};

/// Errors from fetching or parsing one endpoint.
///
/// These are recorded against the endpoint's entry; they never abort an epoch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Parsed rows returned by one endpoint call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointPayload {
    #[serde(default)]
    pub reference: Vec<ReferenceBatch>,
    #[serde(default)]
    pub singletons: Vec<SingletonRow>,
    #[serde(default)]
    pub avatars: Vec<Avatar>,
}

impl EndpointPayload {
    pub fn from_json(text: &str) -> Result<Self, FetchError> {
        serde_json::from_str(text).map_err(|e| FetchError::Parse(e.to_string()))
    }

    pub fn with_reference(mut self, batch: ReferenceBatch) -> Self {
        self.reference.push(batch);
        self
    }

    pub fn with_singleton(mut self, row: SingletonRow) -> Self {
        self.singletons.push(row);
        self
    }

    pub fn with_avatar(mut self, avatar: Avatar) -> Self {
        self.avatars.push(avatar);
        self
    }

    pub fn row_count(&self) -> usize {
        self.reference.iter().map(ReferenceBatch::len).sum::<usize>()
            + self.singletons.len()
            + self.avatars.len()
    }
}

/// Fetches and parses provider endpoints for a download.
///
/// Implementations own transport, authentication, and timeouts; the store
/// only sees the typed result of each call.
#[async_trait::async_trait]
pub trait EndpointFetcher: Send + Sync {
    /// Human-readable label identifying this provider.
    fn label(&self) -> &str;

    /// Endpoints a complete download must attempt.
    fn endpoints(&self) -> Vec<Endpoint>;

    /// Fetch and parse one endpoint.
    async fn fetch(&self, endpoint: &Endpoint) -> Result<EndpointPayload, FetchError>;
}
