//! Result table queries
//!
//! Every function takes a `&mut SqliteConnection` so callers can run it
//! inside the file-level transaction (`&mut *tx`) or on a pooled connection.

use pogs_common::db::{ContributorRow, FilterRow, HistogramRow, ParameterRow, ResultRow};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::types::{ContributorCredit, FilterRecord, FitResult, HistogramBin, ParameterRecord};

/// Ids per DELETE statement; stays well under SQLite's bound-variable limit
const DELETE_CHUNK: usize = 500;

/// A persisted result with all of its children, in stored order
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub result: ResultRow,
    pub filters: Vec<FilterRow>,
    pub parameters: Vec<(ParameterRow, Vec<HistogramRow>)>,
    pub contributors: Vec<ContributorRow>,
}

pub async fn find_result_id(
    conn: &mut SqliteConnection,
    point_name: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT wuresult_id FROM work_unit_result WHERE point_name = ?")
        .bind(point_name)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn filter_ids(conn: &mut SqliteConnection, result_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT wufilter_id FROM work_unit_filter WHERE wuresult_id = ? ORDER BY wufilter_id")
        .bind(result_id)
        .fetch_all(&mut *conn)
        .await
}

pub async fn parameter_ids(
    conn: &mut SqliteConnection,
    result_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT wuparameter_id FROM work_unit_parameter WHERE wuresult_id = ? ORDER BY wuparameter_id",
    )
    .bind(result_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn histogram_ids(
    conn: &mut SqliteConnection,
    result_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT h.wuhistogram_id
        FROM work_unit_histogram h
        JOIN work_unit_parameter p ON p.wuparameter_id = h.wuparameter_id
        WHERE p.wuresult_id = ?
        ORDER BY h.wuhistogram_id
        "#,
    )
    .bind(result_id)
    .fetch_all(&mut *conn)
    .await
}

/// User ids already credited for a result
pub async fn contributor_user_ids(
    conn: &mut SqliteConnection,
    result_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT userid FROM work_unit_user WHERE wuresult_id = ? ORDER BY wuuser_id")
        .bind(result_id)
        .fetch_all(&mut *conn)
        .await
}

/// Delete rows of `table` whose `id_column` is in `ids`
///
/// `table` and `id_column` are compile-time constants from the writer.
pub async fn delete_by_ids(
    conn: &mut SqliteConnection,
    table: &'static str,
    id_column: &'static str,
    ids: &[i64],
) -> Result<u64, sqlx::Error> {
    let mut deleted = 0;
    for chunk in ids.chunks(DELETE_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("DELETE FROM {} WHERE {} IN (", table, id_column));
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        deleted += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(deleted)
}

pub async fn insert_result(conn: &mut SqliteConnection, fit: &FitResult) -> Result<i64, sqlx::Error> {
    let h = &fit.header;
    let b = &fit.best_fit;
    let s = fit.skynet.as_ref();

    let result = sqlx::query(
        r#"
        INSERT INTO work_unit_result (
            point_name, i_sfh, i_ir, chi2, redshift,
            fmu_sfh, fmu_ir, mu, tauv, s_sfr, m, ldust, t_w_bc, t_c_ism,
            xi_c_tot, xi_pah_tot, xi_mir_tot, x_w_tot, tvism, mdust, sfr,
            i_opt, dmstar, dfmu_aux, dz
        )
        VALUES (
            ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?, ?, ?,
            ?, ?, ?, ?
        )
        "#,
    )
    .bind(&fit.point_name)
    .bind(h.i_sfh)
    .bind(h.i_ir)
    .bind(h.chi2)
    .bind(h.redshift)
    .bind(b.fmu_sfh)
    .bind(b.fmu_ir)
    .bind(b.mu)
    .bind(b.tauv)
    .bind(b.s_sfr)
    .bind(b.m)
    .bind(b.ldust)
    .bind(b.t_w_bc)
    .bind(b.t_c_ism)
    .bind(b.xi_c_tot)
    .bind(b.xi_pah_tot)
    .bind(b.xi_mir_tot)
    .bind(b.x_w_tot)
    .bind(b.tvism)
    .bind(b.mdust)
    .bind(b.sfr)
    .bind(s.map(|s| s.i_opt))
    .bind(s.map(|s| s.dmstar))
    .bind(s.map(|s| s.dfmu_aux))
    .bind(s.map(|s| s.dz))
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Overwrite every scalar of an existing result
pub async fn update_result(
    conn: &mut SqliteConnection,
    result_id: i64,
    fit: &FitResult,
) -> Result<(), sqlx::Error> {
    let h = &fit.header;
    let b = &fit.best_fit;
    let s = fit.skynet.as_ref();

    let result = sqlx::query(
        r#"
        UPDATE work_unit_result SET
            i_sfh = ?, i_ir = ?, chi2 = ?, redshift = ?,
            fmu_sfh = ?, fmu_ir = ?, mu = ?, tauv = ?, s_sfr = ?, m = ?, ldust = ?,
            t_w_bc = ?, t_c_ism = ?, xi_c_tot = ?, xi_pah_tot = ?, xi_mir_tot = ?,
            x_w_tot = ?, tvism = ?, mdust = ?, sfr = ?,
            i_opt = ?, dmstar = ?, dfmu_aux = ?, dz = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE wuresult_id = ?
        "#,
    )
    .bind(h.i_sfh)
    .bind(h.i_ir)
    .bind(h.chi2)
    .bind(h.redshift)
    .bind(b.fmu_sfh)
    .bind(b.fmu_ir)
    .bind(b.mu)
    .bind(b.tauv)
    .bind(b.s_sfr)
    .bind(b.m)
    .bind(b.ldust)
    .bind(b.t_w_bc)
    .bind(b.t_c_ism)
    .bind(b.xi_c_tot)
    .bind(b.xi_pah_tot)
    .bind(b.xi_mir_tot)
    .bind(b.x_w_tot)
    .bind(b.tvism)
    .bind(b.mdust)
    .bind(b.sfr)
    .bind(s.map(|s| s.i_opt))
    .bind(s.map(|s| s.dmstar))
    .bind(s.map(|s| s.dfmu_aux))
    .bind(s.map(|s| s.dz))
    .bind(result_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

pub async fn insert_filter(
    conn: &mut SqliteConnection,
    result_id: i64,
    filter: &FilterRecord,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO work_unit_filter (
            wuresult_id, filter_name, observed_flux, observational_uncertainty, flux_bfm
        )
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(result_id)
    .bind(&filter.name)
    .bind(filter.observed_flux)
    .bind(filter.observational_uncertainty)
    .bind(filter.flux_bfm)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn insert_parameter(
    conn: &mut SqliteConnection,
    result_id: i64,
    parameter: &ParameterRecord,
) -> Result<i64, sqlx::Error> {
    let p = &parameter.percentiles;
    let result = sqlx::query(
        r#"
        INSERT INTO work_unit_parameter (
            wuresult_id, parameter_name,
            percentile2_5, percentile16, percentile50, percentile84, percentile97_5
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(result_id)
    .bind(&parameter.name)
    .bind(p.p2_5)
    .bind(p.p16)
    .bind(p.p50)
    .bind(p.p84)
    .bind(p.p97_5)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn insert_histogram_bin(
    conn: &mut SqliteConnection,
    parameter_id: i64,
    bin: &HistogramBin,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO work_unit_histogram (wuparameter_id, x_axis, hist_value) VALUES (?, ?, ?)",
    )
    .bind(parameter_id)
    .bind(bin.x_axis)
    .bind(bin.hist_value)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn insert_contributor(
    conn: &mut SqliteConnection,
    result_id: i64,
    credit: &ContributorCredit,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO work_unit_user (wuresult_id, userid, create_time) VALUES (?, ?, ?)",
    )
    .bind(result_id)
    .bind(credit.user_id)
    .bind(credit.credited_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load a result and all of its children by point name
pub async fn load_stored_result(
    conn: &mut SqliteConnection,
    point_name: &str,
) -> Result<Option<StoredResult>, sqlx::Error> {
    let result: Option<ResultRow> = sqlx::query_as(
        r#"
        SELECT wuresult_id, point_name, i_sfh, i_ir, chi2, redshift,
               fmu_sfh, fmu_ir, mu, tauv, s_sfr, m, ldust, t_w_bc, t_c_ism,
               xi_c_tot, xi_pah_tot, xi_mir_tot, x_w_tot, tvism, mdust, sfr,
               i_opt, dmstar, dfmu_aux, dz
        FROM work_unit_result
        WHERE point_name = ?
        "#,
    )
    .bind(point_name)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(result) = result else {
        return Ok(None);
    };

    let filters: Vec<FilterRow> = sqlx::query_as(
        r#"
        SELECT wufilter_id, wuresult_id, filter_name, observed_flux,
               observational_uncertainty, flux_bfm
        FROM work_unit_filter
        WHERE wuresult_id = ?
        ORDER BY wufilter_id
        "#,
    )
    .bind(result.wuresult_id)
    .fetch_all(&mut *conn)
    .await?;

    let parameter_rows: Vec<ParameterRow> = sqlx::query_as(
        r#"
        SELECT wuparameter_id, wuresult_id, parameter_name,
               percentile2_5, percentile16, percentile50, percentile84, percentile97_5
        FROM work_unit_parameter
        WHERE wuresult_id = ?
        ORDER BY wuparameter_id
        "#,
    )
    .bind(result.wuresult_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut parameters = Vec::with_capacity(parameter_rows.len());
    for parameter in parameter_rows {
        let histogram: Vec<HistogramRow> = sqlx::query_as(
            r#"
            SELECT wuhistogram_id, wuparameter_id, x_axis, hist_value
            FROM work_unit_histogram
            WHERE wuparameter_id = ?
            ORDER BY wuhistogram_id
            "#,
        )
        .bind(parameter.wuparameter_id)
        .fetch_all(&mut *conn)
        .await?;
        parameters.push((parameter, histogram));
    }

    let contributors: Vec<ContributorRow> = sqlx::query_as(
        r#"
        SELECT wuuser_id, wuresult_id, userid, create_time
        FROM work_unit_user
        WHERE wuresult_id = ?
        ORDER BY wuuser_id
        "#,
    )
    .bind(result.wuresult_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(StoredResult {
        result,
        filters,
        parameters,
        contributors,
    }))
}

/// Count rows of one of the result tables
pub async fn count_rows(conn: &mut SqliteConnection, table: &'static str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(&mut *conn)
        .await
}
