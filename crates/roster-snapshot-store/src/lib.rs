mod entries;
mod epochs;
mod error;
mod promotion;
mod records;
pub mod schema;
mod store;
mod sync;
mod writer;

pub use entries::completeness_of;
pub use epochs::EpochClaim;
pub use error::StoreError;
pub use promotion::PromotionReport;
pub use records::{ReferenceRecord, SingletonRecord};
pub use store::SnapshotStore;
pub use sync::{DownloadReport, SyncOptions};
pub use writer::{AttachmentWrite, BatchReport};
