//! Value objects persisted by the lock manager and the status store.
//!
//! Every type here round-trips through JSON; the backing store only ever
//! sees the serialized form.

pub mod lock;
pub mod repo;
pub mod review;
pub mod status;

pub use lock::{CommandLock, CommandLockMetadata, CommandName, ResourceLock};
pub use repo::{Repository, Resource, VcsHost, VcsHostKind};
pub use review::{ReviewRequest, ReviewRequestId};
pub use status::{
    CommandOutcome, PlanStatus, PolicySetStatus, ProjectCommand, ProjectOutcome, ProjectResult,
    ReviewRequestStatus,
};
