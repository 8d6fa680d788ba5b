//! # pogs-assimilator
//!
//! Loads MAGPHYS fit reports returned by POGS volunteers into the result
//! store.
//!
//! - [`decoder`]: report text to [`FitResult`] trees, one per point
//! - [`reconciler`]: merge a tree with what is already stored for its point
//! - [`writer`]: apply a merge inside the caller's transaction
//! - [`orchestrator`]: one task, one artifact, one transaction
//! - [`task`]: the scheduler-side collaborator and task manifests

pub mod catalog;
pub mod db;
pub mod decoder;
pub mod error;
pub mod orchestrator;
pub mod reconciler;
pub mod task;
pub mod types;
pub mod writer;

pub use decoder::Decoder;
pub use error::{AssimilationError, DecodeError, FormatErrorKind};
pub use orchestrator::{AssimilationReport, Orchestrator, RejectedBlock, TaskOutcome};
pub use task::{OutputDescriptor, TaskManifest, TaskSource};
pub use types::{ContributorCredit, FitResult};
