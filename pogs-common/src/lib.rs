//! # POGS Common Library
//!
//! Shared code for the POGS server-side tools including:
//! - Database bootstrap and row models for assimilated fit results
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
