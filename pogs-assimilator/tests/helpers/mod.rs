//! Shared helpers for pogs-assimilator integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod report_builder;
