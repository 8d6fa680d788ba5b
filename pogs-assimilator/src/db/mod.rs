//! Database access for pogs-assimilator
//!
//! Queries over the `work_unit_*` tables created by `pogs_common::db::init`.

pub mod results;

pub use results::{load_stored_result, StoredResult};
