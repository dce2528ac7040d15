//! Runlock-core - Locking and review status coordination
//!
//! This crate provides:
//! - Resource locks keyed by repository, path and workspace
//! - Global per-command locks
//! - Review request status records with commit-aware merging
//! - The `KvStore` abstraction every component persists through
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod codec;
pub mod domain;
pub mod error;
pub mod keys;
pub mod locks;
pub mod merge;
pub mod status;
pub mod store;

pub use domain::{
    CommandLock, CommandName, CommandOutcome, PlanStatus, PolicySetStatus, ProjectCommand,
    ProjectOutcome, ProjectResult, Repository, Resource, ResourceLock, ReviewRequest,
    ReviewRequestId, ReviewRequestStatus, VcsHost, VcsHostKind,
};
pub use error::{Error, PartialError, PartialResult, Result};
pub use keys::KeyError;
pub use locks::{LockAttempt, LockManager, LockOptions};
pub use status::StatusStore;
pub use store::{
    memory::MemoryStore, scan_keys, KeyPattern, KvStore, ScanCursor, ScanPage, SetIfAbsent,
    StoreError, StoreResult,
};
