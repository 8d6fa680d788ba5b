//! Database row models for assimilated fit results
//!
//! Column names follow the `work_unit_*` tables. Child rows are ordered by
//! their autoincrement id, which is also their position in the source report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResultRow {
    pub wuresult_id: i64,
    pub point_name: String,
    pub i_sfh: f64,
    pub i_ir: f64,
    pub chi2: f64,
    pub redshift: f64,
    pub fmu_sfh: f64,
    pub fmu_ir: f64,
    pub mu: f64,
    pub tauv: f64,
    pub s_sfr: f64,
    pub m: f64,
    pub ldust: f64,
    pub t_w_bc: f64,
    pub t_c_ism: f64,
    pub xi_c_tot: f64,
    pub xi_pah_tot: f64,
    pub xi_mir_tot: f64,
    pub x_w_tot: f64,
    pub tvism: f64,
    pub mdust: f64,
    pub sfr: f64,
    pub i_opt: Option<f64>,
    pub dmstar: Option<f64>,
    pub dfmu_aux: Option<f64>,
    pub dz: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FilterRow {
    pub wufilter_id: i64,
    pub wuresult_id: i64,
    pub filter_name: String,
    pub observed_flux: f64,
    pub observational_uncertainty: f64,
    pub flux_bfm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParameterRow {
    pub wuparameter_id: i64,
    pub wuresult_id: i64,
    pub parameter_name: String,
    pub percentile2_5: f64,
    pub percentile16: f64,
    pub percentile50: f64,
    pub percentile84: f64,
    pub percentile97_5: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistogramRow {
    pub wuhistogram_id: i64,
    pub wuparameter_id: i64,
    pub x_axis: f64,
    pub hist_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContributorRow {
    pub wuuser_id: i64,
    pub wuresult_id: i64,
    pub userid: i64,
    pub create_time: DateTime<Utc>,
}
