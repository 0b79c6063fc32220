//! Deferred media operations: the retry driver, entry image lifecycle, and
//! remote object naming.

mod driver;
mod lifecycle;
mod paths;

pub use driver::{
    AttemptOutcome, DrainReport, OperationKind, OperationReport, RetryDriver, ScheduledOperation,
};
pub use lifecycle::{plan_media_changes, BatchReport, MediaBatch, MediaLifecycle, MediaPlan};
pub use paths::build_remote_path;
