//! Result writer
//!
//! Applies a [`MergedResult`] inside the caller's transaction. Stale children
//! go first (histograms, parameters, filters, so no foreign key is ever left
//! dangling), then the result row, then fresh children in report order.
//!
//! The writer never commits. Any error leaves the transaction for the caller
//! to roll back.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::db::results;
use crate::reconciler::MergedResult;

/// Row counts touched by one write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub result_id: i64,
    pub deleted: u64,
    pub filters: usize,
    pub parameters: usize,
    pub histogram_rows: usize,
    pub contributors: usize,
}

/// Persist one merged result and return what was written
pub async fn write(
    conn: &mut SqliteConnection,
    merged: &MergedResult,
) -> Result<WriteSummary, sqlx::Error> {
    let stale = &merged.stale;
    let mut deleted = 0;
    for (table, id_column, ids) in [
        ("work_unit_histogram", "wuhistogram_id", &stale.histogram_ids),
        ("work_unit_parameter", "wuparameter_id", &stale.parameter_ids),
        ("work_unit_filter", "wufilter_id", &stale.filter_ids),
    ] {
        deleted += results::delete_by_ids(conn, table, id_column, ids).await?;
    }

    let fit = &merged.fit;
    let result_id = match merged.result_id {
        Some(id) => {
            results::update_result(conn, id, fit).await?;
            id
        }
        None => results::insert_result(conn, fit).await?,
    };

    for filter in &fit.filters {
        results::insert_filter(conn, result_id, filter).await?;
    }

    for parameter in &fit.parameters {
        let parameter_id = results::insert_parameter(conn, result_id, parameter).await?;
        for bin in &parameter.histogram {
            results::insert_histogram_bin(conn, parameter_id, bin).await?;
        }
    }

    for credit in &merged.new_contributors {
        results::insert_contributor(conn, result_id, credit).await?;
    }

    let summary = WriteSummary {
        result_id,
        deleted,
        filters: fit.filters.len(),
        parameters: fit.parameters.len(),
        histogram_rows: fit.histogram_len(),
        contributors: merged.new_contributors.len(),
    };

    debug!(
        point_name = %fit.point_name,
        result_id,
        deleted,
        filters = summary.filters,
        parameters = summary.parameters,
        histogram_rows = summary.histogram_rows,
        contributors = summary.contributors,
        "Result written"
    );

    Ok(summary)
}
