//! Database initialization
//!
//! Opens (creating if needed) the SQLite database and ensures the five
//! result tables exist. Table creation is idempotent and safe to run on
//! every start; there is no migration machinery here.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Busy timeout applied to every connection (milliseconds)
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL lets concurrent assimilator invocations read while one writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query(&format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS))
        .execute(&pool)
        .await?;

    create_result_tables(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the result tables
///
/// The pool is pinned to a single connection: every `sqlite::memory:`
/// connection is its own database.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    create_result_tables(&pool).await?;

    Ok(pool)
}

/// Create all result tables (idempotent)
pub async fn create_result_tables(pool: &SqlitePool) -> Result<()> {
    create_work_unit_result_table(pool).await?;
    create_work_unit_filter_table(pool).await?;
    create_work_unit_parameter_table(pool).await?;
    create_work_unit_histogram_table(pool).await?;
    create_work_unit_user_table(pool).await?;
    Ok(())
}

/// One row per point; `point_name` is the upsert key
pub async fn create_work_unit_result_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_unit_result (
            wuresult_id INTEGER PRIMARY KEY AUTOINCREMENT,
            point_name TEXT NOT NULL UNIQUE,
            i_sfh REAL NOT NULL,
            i_ir REAL NOT NULL,
            chi2 REAL NOT NULL,
            redshift REAL NOT NULL,
            fmu_sfh REAL NOT NULL,
            fmu_ir REAL NOT NULL,
            mu REAL NOT NULL,
            tauv REAL NOT NULL,
            s_sfr REAL NOT NULL,
            m REAL NOT NULL,
            ldust REAL NOT NULL,
            t_w_bc REAL NOT NULL,
            t_c_ism REAL NOT NULL,
            xi_c_tot REAL NOT NULL,
            xi_pah_tot REAL NOT NULL,
            xi_mir_tot REAL NOT NULL,
            x_w_tot REAL NOT NULL,
            tvism REAL NOT NULL,
            mdust REAL NOT NULL,
            sfr REAL NOT NULL,
            i_opt REAL,
            dmstar REAL,
            dfmu_aux REAL,
            dz REAL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_work_unit_filter_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_unit_filter (
            wufilter_id INTEGER PRIMARY KEY AUTOINCREMENT,
            wuresult_id INTEGER NOT NULL REFERENCES work_unit_result(wuresult_id),
            filter_name TEXT NOT NULL,
            observed_flux REAL NOT NULL,
            observational_uncertainty REAL NOT NULL,
            flux_bfm REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_work_unit_filter_result ON work_unit_filter(wuresult_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_work_unit_parameter_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_unit_parameter (
            wuparameter_id INTEGER PRIMARY KEY AUTOINCREMENT,
            wuresult_id INTEGER NOT NULL REFERENCES work_unit_result(wuresult_id),
            parameter_name TEXT NOT NULL,
            percentile2_5 REAL NOT NULL,
            percentile16 REAL NOT NULL,
            percentile50 REAL NOT NULL,
            percentile84 REAL NOT NULL,
            percentile97_5 REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_work_unit_parameter_result ON work_unit_parameter(wuresult_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_work_unit_histogram_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_unit_histogram (
            wuhistogram_id INTEGER PRIMARY KEY AUTOINCREMENT,
            wuparameter_id INTEGER NOT NULL REFERENCES work_unit_parameter(wuparameter_id),
            x_axis REAL NOT NULL,
            hist_value REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_work_unit_histogram_parameter ON work_unit_histogram(wuparameter_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Contributor credits; one row per (point, user)
pub async fn create_work_unit_user_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_unit_user (
            wuuser_id INTEGER PRIMARY KEY AUTOINCREMENT,
            wuresult_id INTEGER NOT NULL REFERENCES work_unit_result(wuresult_id),
            userid INTEGER NOT NULL,
            create_time TIMESTAMP NOT NULL,
            UNIQUE (wuresult_id, userid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
