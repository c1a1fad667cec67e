use std::fmt;

/// Identity of one synchronization run (an epoch).
///
/// Every epoch-scoped row carries this id; it is threaded through each write
/// and each join rather than held as a global "current version".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadId(i64);

impl DownloadId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an epoch.
///
/// `Open -> Complete | Partial -> Promoted | Retired`. Only `Retired` epochs
/// may be deleted, and only `Complete` (or tolerated `Partial`) epochs may be
/// promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpochState {
    /// Entries are still pending or retryable.
    Open,
    /// Every required entry succeeded.
    Complete,
    /// At least one required entry exhausted its retries.
    Partial,
    /// The epoch consumers read as current.
    Promoted,
    /// Superseded or discarded; eligible for deletion.
    Retired,
}

impl EpochState {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Promoted => "promoted",
            Self::Retired => "retired",
        }
    }

    /// Parse from the string stored in the database.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "complete" => Some(Self::Complete),
            "partial" => Some(Self::Partial),
            "promoted" => Some(Self::Promoted),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }

    /// Whether rows and entries may still be written under this epoch.
    pub fn accepts_writes(&self) -> bool {
        !matches!(self, Self::Promoted | Self::Retired)
    }
}

impl fmt::Display for EpochState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `downloads` row as seen by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub id: DownloadId,
    pub timestamp: String,
    pub state: EpochState,
}
