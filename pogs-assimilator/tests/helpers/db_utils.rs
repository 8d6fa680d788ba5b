//! Database test utilities

use pogs_assimilator::db::results::{self, StoredResult};
use pogs_assimilator::{Orchestrator, TaskManifest};
use pogs_common::db::open_in_memory;
use sqlx::SqlitePool;
use std::path::Path;
use tempfile::TempDir;

/// Row counts of all five result tables, parent first
pub type TableCounts = [i64; 5];

pub const RESULT_TABLES: [&str; 5] = [
    "work_unit_result",
    "work_unit_filter",
    "work_unit_parameter",
    "work_unit_histogram",
    "work_unit_user",
];

/// In-memory store plus an upload folder for report files
///
/// Keep the `TempDir` alive for the duration of the test.
pub async fn create_test_env() -> (TempDir, SqlitePool, Orchestrator) {
    let upload = TempDir::new().unwrap();
    let pool = open_in_memory().await.unwrap();
    let orchestrator = Orchestrator::new(pool.clone(), upload.path());
    (upload, pool, orchestrator)
}

/// Write a report into the upload folder
pub fn write_report(upload: &Path, file_name: &str, text: &str) {
    std::fs::write(upload.join(file_name), text).unwrap();
}

/// Manifest naming one output file and crediting `users`
pub fn manifest(task_id: &str, file_name: &str, users: &[i64]) -> TaskManifest {
    TaskManifest {
        task_id: task_id.to_string(),
        canonical_result_xml: None,
        output_files: vec![file_name.to_string()],
        replicas: users
            .iter()
            .map(|&user_id| pogs_assimilator::task::ReplicaCredit { user_id })
            .collect(),
    }
}

/// Load a stored result; the pooled connection is released before returning
pub async fn stored(pool: &SqlitePool, point_name: &str) -> Option<StoredResult> {
    let mut conn = pool.acquire().await.unwrap();
    results::load_stored_result(&mut *conn, point_name).await.unwrap()
}

pub async fn table_counts(pool: &SqlitePool) -> TableCounts {
    let mut conn = pool.acquire().await.unwrap();
    let mut counts = [0; 5];
    for (count, table) in counts.iter_mut().zip(RESULT_TABLES) {
        *count = results::count_rows(&mut *conn, table).await.unwrap();
    }
    counts
}

/// Contributor user ids of a stored point, in insertion order
pub async fn contributor_ids(pool: &SqlitePool, point_name: &str) -> Vec<i64> {
    stored(pool, point_name)
        .await
        .map(|s| s.contributors.iter().map(|c| c.userid).collect())
        .unwrap_or_default()
}

pub type FilterContent = (String, f64, f64, f64);
pub type ParameterContent = (String, [f64; 5], Vec<(f64, f64)>);

/// Child content of a stored result with row ids stripped
pub fn child_content(stored: &StoredResult) -> (Vec<FilterContent>, Vec<ParameterContent>) {
    let filters = stored
        .filters
        .iter()
        .map(|f| {
            (
                f.filter_name.clone(),
                f.observed_flux,
                f.observational_uncertainty,
                f.flux_bfm,
            )
        })
        .collect();
    let parameters = stored
        .parameters
        .iter()
        .map(|(p, histogram)| {
            (
                p.parameter_name.clone(),
                [
                    p.percentile2_5,
                    p.percentile16,
                    p.percentile50,
                    p.percentile84,
                    p.percentile97_5,
                ],
                histogram.iter().map(|h| (h.x_axis, h.hist_value)).collect(),
            )
        })
        .collect();
    (filters, parameters)
}
