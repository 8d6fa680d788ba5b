//! Decoded result trees
//!
//! One [`FitResult`] per report block. Children keep report order: filters in
//! filter-name-line order, parameters in the order their name lines appear,
//! histogram bins in row order.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of values on the best-fit parameter line
pub const BEST_FIT_VALUE_COUNT: usize = 16;

/// Number of values on the header scalar line
pub const HEADER_VALUE_COUNT: usize = 4;

/// Number of values on a percentile line (2.5, 16, 50, 84, 97.5)
pub const PERCENTILE_COUNT: usize = 5;

/// Number of values on a SkyNet extension line
pub const SKYNET_VALUE_COUNT: usize = 5;

/// Number of values on a histogram row
pub const HISTOGRAM_VALUE_COUNT: usize = 2;

/// Model selection and fit quality for the best-fit model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeaderScalars {
    pub i_sfh: f64,
    pub i_ir: f64,
    pub chi2: f64,
    pub redshift: f64,
}

impl From<[f64; HEADER_VALUE_COUNT]> for HeaderScalars {
    fn from(v: [f64; HEADER_VALUE_COUNT]) -> Self {
        Self {
            i_sfh: v[0],
            i_ir: v[1],
            chi2: v[2],
            redshift: v[3],
        }
    }
}

/// Physical parameter values of the best-fit model, in report column order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestFitParameters {
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
}

impl From<[f64; BEST_FIT_VALUE_COUNT]> for BestFitParameters {
    fn from(v: [f64; BEST_FIT_VALUE_COUNT]) -> Self {
        Self {
            fmu_sfh: v[0],
            fmu_ir: v[1],
            mu: v[2],
            tauv: v[3],
            s_sfr: v[4],
            m: v[5],
            ldust: v[6],
            t_w_bc: v[7],
            t_c_ism: v[8],
            xi_c_tot: v[9],
            xi_pah_tot: v[10],
            xi_mir_tot: v[11],
            x_w_tot: v[12],
            tvism: v[13],
            mdust: v[14],
            sfr: v[15],
        }
    }
}

/// Extra scalars emitted by the SkyNet build of the fitting code
///
/// The SkyNet line also carries `i_ir`, which replaces the header value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkyNetScalars {
    pub i_opt: f64,
    pub dmstar: f64,
    pub dfmu_aux: f64,
    pub dz: f64,
}

/// One photometric filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterRecord {
    pub name: String,
    pub observed_flux: f64,
    pub observational_uncertainty: f64,
    pub flux_bfm: f64,
}

/// Posterior percentiles for one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p2_5: f64,
    pub p16: f64,
    pub p50: f64,
    pub p84: f64,
    pub p97_5: f64,
}

impl From<[f64; PERCENTILE_COUNT]> for Percentiles {
    fn from(v: [f64; PERCENTILE_COUNT]) -> Self {
        Self {
            p2_5: v[0],
            p16: v[1],
            p50: v[2],
            p84: v[3],
            p97_5: v[4],
        }
    }
}

/// One (x, density) pair of a marginal PDF histogram
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub x_axis: f64,
    pub hist_value: f64,
}

/// One fitted parameter with its percentile set and (possibly empty) histogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterRecord {
    pub name: String,
    pub percentiles: Percentiles,
    pub histogram: Vec<HistogramBin>,
}

/// Decoded result tree for one point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    pub point_name: String,
    pub header: HeaderScalars,
    pub best_fit: BestFitParameters,
    pub skynet: Option<SkyNetScalars>,
    pub filters: Vec<FilterRecord>,
    pub parameters: Vec<ParameterRecord>,
}

impl FitResult {
    /// Total histogram rows across all parameters
    pub fn histogram_len(&self) -> usize {
        self.parameters.iter().map(|p| p.histogram.len()).sum()
    }
}

/// A contributor identity credited by one assimilation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContributorCredit {
    pub user_id: i64,
    pub credited_at: DateTime<Utc>,
}

impl ContributorCredit {
    /// Credit every distinct user id once, all stamped with the same time
    pub fn for_users(user_ids: &[i64], credited_at: DateTime<Utc>) -> Vec<Self> {
        let mut credits: Vec<Self> = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            if !credits.iter().any(|c| c.user_id == user_id) {
                credits.push(Self {
                    user_id,
                    credited_at,
                });
            }
        }
        credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credits_collapse_duplicate_users() {
        let now = Utc::now();
        let credits = ContributorCredit::for_users(&[7, 3, 7, 9, 3], now);
        let ids: Vec<i64> = credits.iter().map(|c| c.user_id).collect();
        assert_eq!(ids, vec![7, 3, 9]);
        assert!(credits.iter().all(|c| c.credited_at == now));
    }

    #[test]
    fn test_best_fit_column_order() {
        let mut values = [0.0; BEST_FIT_VALUE_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as f64;
        }
        let best_fit = BestFitParameters::from(values);
        assert_eq!(best_fit.fmu_sfh, 0.0);
        assert_eq!(best_fit.ldust, 6.0);
        assert_eq!(best_fit.x_w_tot, 12.0);
        assert_eq!(best_fit.sfr, 15.0);
    }
}
