pub mod download;
pub mod endpoint;
pub mod entity;
pub mod fetch;
pub mod policy;

pub use download::{Download, DownloadId, EpochState};
pub use endpoint::{AttemptOutcome, DownloadEntry, Endpoint, EntryStatus};
pub use entity::{
    Avatar, Country, Cup, Currency, EntityKind, Language, League, Player, ReferenceBatch, Region,
    SingletonKind, SingletonRow, Team, User, flag_emoji,
};
pub use fetch::{EndpointFetcher, EndpointPayload, FetchError};
pub use policy::{PromotionPolicy, RetryPolicy};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
