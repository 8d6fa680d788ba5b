//! Result reconciliation
//!
//! Merges a decoded [`FitResult`] with whatever the store already holds for
//! the same point. The merge is computed, not applied: the returned
//! [`MergedResult`] names the child rows to delete and the contributor rows to
//! add, and [`crate::writer::write`] applies it inside the same transaction.
//!
//! Filters, parameters and histograms are replaced wholesale on every pass.
//! Contributors only ever grow.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::db::results;
use crate::types::{ContributorCredit, FitResult};

/// Child rows of the existing result that the new pass replaces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaleChildren {
    pub filter_ids: Vec<i64>,
    pub parameter_ids: Vec<i64>,
    pub histogram_ids: Vec<i64>,
}

impl StaleChildren {
    pub fn is_empty(&self) -> bool {
        self.filter_ids.is_empty() && self.parameter_ids.is_empty() && self.histogram_ids.is_empty()
    }
}

/// A decoded tree reconciled against the store, ready for the writer
#[derive(Debug, Clone, PartialEq)]
pub struct MergedResult {
    /// Existing row id, or `None` for a point seen for the first time
    pub result_id: Option<i64>,
    pub fit: FitResult,
    pub stale: StaleChildren,
    /// Credits not yet recorded for this point
    pub new_contributors: Vec<ContributorCredit>,
}

impl MergedResult {
    pub fn point_name(&self) -> &str {
        &self.fit.point_name
    }

    pub fn is_new(&self) -> bool {
        self.result_id.is_none()
    }
}

/// Reconcile one decoded tree against the store
///
/// `credits` may contain duplicates; each user is credited at most once per
/// point across all passes.
pub async fn reconcile(
    conn: &mut SqliteConnection,
    fit: FitResult,
    credits: &[ContributorCredit],
) -> Result<MergedResult, sqlx::Error> {
    let Some(result_id) = results::find_result_id(conn, &fit.point_name).await? else {
        let new_contributors = distinct_new(credits, &[]);
        debug!(point_name = %fit.point_name, contributors = new_contributors.len(), "New result");
        return Ok(MergedResult {
            result_id: None,
            fit,
            stale: StaleChildren::default(),
            new_contributors,
        });
    };

    let stale = StaleChildren {
        filter_ids: results::filter_ids(conn, result_id).await?,
        parameter_ids: results::parameter_ids(conn, result_id).await?,
        histogram_ids: results::histogram_ids(conn, result_id).await?,
    };
    let recorded = results::contributor_user_ids(conn, result_id).await?;
    let new_contributors = distinct_new(credits, &recorded);

    debug!(
        point_name = %fit.point_name,
        result_id,
        stale_filters = stale.filter_ids.len(),
        stale_parameters = stale.parameter_ids.len(),
        stale_histogram_rows = stale.histogram_ids.len(),
        contributors = new_contributors.len(),
        "Existing result reconciled"
    );

    Ok(MergedResult {
        result_id: Some(result_id),
        fit,
        stale,
        new_contributors,
    })
}

/// Credits whose user is neither already recorded nor repeated earlier in `credits`
fn distinct_new(credits: &[ContributorCredit], recorded: &[i64]) -> Vec<ContributorCredit> {
    let mut out: Vec<ContributorCredit> = Vec::new();
    for credit in credits {
        if recorded.contains(&credit.user_id) || out.iter().any(|c| c.user_id == credit.user_id) {
            continue;
        }
        out.push(*credit);
    }
    out
}
