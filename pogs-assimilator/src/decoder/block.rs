//! Per-block accumulator
//!
//! A [`BlockParser`] is opened on a marker line, fed every following line of
//! its block, and closed with [`BlockParser::finish`]. The first error is
//! final: the caller drops the parser and waits for the next marker.

use super::fields::{filter_names, parse_count, parse_exact};
use super::state::{step, Action, DecodeState, LineKind, PARAMETER_PREFIX};
use crate::catalog::is_known_parameter;
use crate::error::{DecodeError, FormatErrorKind};
use crate::types::{
    BestFitParameters, FilterRecord, FitResult, HeaderScalars, HistogramBin, ParameterRecord,
    Percentiles, SkyNetScalars, BEST_FIT_VALUE_COUNT, HEADER_VALUE_COUNT, HISTOGRAM_VALUE_COUNT,
    PERCENTILE_COUNT, SKYNET_VALUE_COUNT,
};

/// Parameter still collecting its histogram and percentiles
#[derive(Debug)]
struct OpenParameter {
    name: String,
    line: usize,
    percentiles: Option<Percentiles>,
    histogram: Vec<HistogramBin>,
}

impl OpenParameter {
    fn close(self, point_name: &str) -> Result<ParameterRecord, DecodeError> {
        match self.percentiles {
            Some(percentiles) => Ok(ParameterRecord {
                name: self.name,
                percentiles,
                histogram: self.histogram,
            }),
            None => Err(DecodeError::Format {
                point_name: Some(point_name.to_string()),
                line: self.line,
                kind: FormatErrorKind::MissingPercentiles { name: self.name },
            }),
        }
    }
}

#[derive(Debug)]
pub struct BlockParser {
    point_name: String,
    offset: usize,
    state: DecodeState,
    filters: Vec<FilterRecord>,
    header: Option<HeaderScalars>,
    best_fit: Option<BestFitParameters>,
    /// SkyNet scalars plus the `i_ir` that replaces the header value
    skynet: Option<(SkyNetScalars, f64)>,
    parameters: Vec<ParameterRecord>,
    open_parameter: Option<OpenParameter>,
}

impl BlockParser {
    /// Open a block on its marker line
    pub fn open(marker_line: &str, line_no: usize) -> Result<Self, DecodeError> {
        let point_name = marker_line
            .split_whitespace()
            .nth(1)
            .ok_or(DecodeError::Format {
                point_name: None,
                line: line_no,
                kind: FormatErrorKind::MissingPointName,
            })?
            .to_string();

        Ok(Self {
            point_name,
            offset: 0,
            state: DecodeState::FilterNames,
            filters: Vec::new(),
            header: None,
            best_fit: None,
            skynet: None,
            parameters: Vec::new(),
            open_parameter: None,
        })
    }

    pub fn point_name(&self) -> &str {
        &self.point_name
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Consume one non-marker line of this block
    pub fn feed(&mut self, line: &str, line_no: usize) -> Result<(), DecodeError> {
        self.offset += 1;
        let kind = LineKind::classify(line);
        let next = step(self.state, self.offset, kind, self.open_parameter.is_some())
            .map_err(|kind| self.format_error(line_no, kind))?;

        self.apply(next.action, line, line_no)?;
        self.state = next.next;
        Ok(())
    }

    /// Close the block; `last_line` is the number of its final line
    pub fn finish(mut self, last_line: usize) -> Result<FitResult, DecodeError> {
        if let Some(missing) = self.state.missing_at_close() {
            return Err(self.format_error(last_line, FormatErrorKind::Truncated { missing }));
        }
        self.close_parameter()?;

        let (Some(mut header), Some(best_fit)) = (self.header, self.best_fit) else {
            return Err(self.format_error(
                last_line,
                FormatErrorKind::Truncated {
                    missing: "the best-fit model header line",
                },
            ));
        };
        if let Some(i_ir) = self.skynet_i_ir() {
            header.i_ir = i_ir;
        }

        Ok(FitResult {
            point_name: self.point_name,
            header,
            best_fit,
            skynet: self.skynet.map(|(scalars, _)| scalars),
            filters: self.filters,
            parameters: self.parameters,
        })
    }

    fn apply(&mut self, action: Action, line: &str, line_no: usize) -> Result<(), DecodeError> {
        match action {
            Action::Skip => {}
            Action::ReadFilterNames => {
                let names = filter_names(line);
                if names.is_empty() {
                    return Err(self.format_error(line_no, FormatErrorKind::NoFilters));
                }
                self.filters = names
                    .into_iter()
                    .map(|name| FilterRecord {
                        name,
                        observed_flux: 0.0,
                        observational_uncertainty: 0.0,
                        flux_bfm: 0.0,
                    })
                    .collect();
            }
            Action::ReadFilterFluxes => {
                let values = self.filter_values(line, line_no, "observed fluxes")?;
                for (filter, value) in self.filters.iter_mut().zip(values) {
                    filter.observed_flux = value;
                }
            }
            Action::ReadFilterUncertainties => {
                let values = self.filter_values(line, line_no, "observational uncertainties")?;
                for (filter, value) in self.filters.iter_mut().zip(values) {
                    filter.observational_uncertainty = value;
                }
            }
            Action::ReadHeaderScalars => {
                let values = parse_exact::<HEADER_VALUE_COUNT>(line, "best-fit model header")
                    .map_err(|kind| self.format_error(line_no, kind))?;
                self.header = Some(values.into());
            }
            Action::ReadBestFitScalars => {
                let values = parse_exact::<BEST_FIT_VALUE_COUNT>(line, "best-fit parameters")
                    .map_err(|kind| self.format_error(line_no, kind))?;
                self.best_fit = Some(values.into());
            }
            Action::ReadBestFitModelFluxes => {
                let values = self.filter_values(line, line_no, "best-fit model fluxes")?;
                for (filter, value) in self.filters.iter_mut().zip(values) {
                    filter.flux_bfm = value;
                }
            }
            Action::OpenParameter => {
                self.close_parameter()?;
                let name = parameter_name(line)
                    .ok_or_else(|| self.format_error(line_no, FormatErrorKind::EmptyParameterName))?;
                if !is_known_parameter(&name) {
                    return Err(DecodeError::UnknownParameter {
                        point_name: self.point_name.clone(),
                        line: line_no,
                        name,
                    });
                }
                self.open_parameter = Some(OpenParameter {
                    name,
                    line: line_no,
                    percentiles: None,
                    histogram: Vec::new(),
                });
            }
            Action::ReadHistogramRow => {
                let values = parse_exact::<HISTOGRAM_VALUE_COUNT>(line, "histogram row")
                    .map_err(|kind| self.format_error(line_no, kind))?;
                if let Some(parameter) = self.open_parameter.as_mut() {
                    parameter.histogram.push(HistogramBin {
                        x_axis: values[0],
                        hist_value: values[1],
                    });
                }
            }
            Action::ReadPercentiles => {
                let values = parse_exact::<PERCENTILE_COUNT>(line, "percentiles")
                    .map_err(|kind| self.format_error(line_no, kind))?;
                match self.open_parameter.as_mut() {
                    Some(parameter) if parameter.percentiles.is_none() => {
                        parameter.percentiles = Some(values.into());
                    }
                    Some(parameter) => {
                        let name = parameter.name.clone();
                        return Err(self.format_error(
                            line_no,
                            FormatErrorKind::DuplicatePercentiles { name },
                        ));
                    }
                    None => {
                        return Err(self.format_error(line_no, FormatErrorKind::OrphanPercentiles))
                    }
                }
            }
            Action::ReadSkyNetScalars => {
                let values = parse_exact::<SKYNET_VALUE_COUNT>(line, "SkyNet values")
                    .map_err(|kind| self.format_error(line_no, kind))?;
                // Column order: i_opt i_ir dmstar dfmu_aux dz
                self.skynet = Some((
                    SkyNetScalars {
                        i_opt: values[0],
                        dmstar: values[2],
                        dfmu_aux: values[3],
                        dz: values[4],
                    },
                    values[1],
                ));
            }
        }
        Ok(())
    }

    fn filter_values(
        &self,
        line: &str,
        line_no: usize,
        field: &'static str,
    ) -> Result<Vec<f64>, DecodeError> {
        parse_count(line, self.filters.len(), field).map_err(|kind| self.format_error(line_no, kind))
    }

    fn close_parameter(&mut self) -> Result<(), DecodeError> {
        if let Some(parameter) = self.open_parameter.take() {
            let record = parameter.close(&self.point_name)?;
            self.parameters.push(record);
        }
        Ok(())
    }

    fn skynet_i_ir(&self) -> Option<f64> {
        self.skynet.map(|(_, i_ir)| i_ir)
    }

    fn format_error(&self, line: usize, kind: FormatErrorKind) -> DecodeError {
        DecodeError::Format {
            point_name: Some(self.point_name.clone()),
            line,
            kind,
        }
    }
}

/// Name between the first and second `...` of a parameter name line
fn parameter_name(line: &str) -> Option<String> {
    let rest = line.strip_prefix(PARAMETER_PREFIX)?;
    let name = rest.split("...").next().unwrap_or(rest).trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_at_parameter_section() -> BlockParser {
        let mut block = BlockParser::open(" ####### P1", 1).unwrap();
        let lines = [
            " # OBSERVED FLUXES (and ERRORS):",
            "#   fuv   nuv",
            "  1.0E-03  2.0E-03",
            "  1.0E-04  2.0E-04",
            "#",
            "#",
            "#",
            " # BEST FIT MODEL: (i_sfh, i_ir, chi2, redshift)",
            "  1234  56  0.75  0.0123",
            " #.fmu(SFH) fmu(IR) mu tauv sSFR M* Ldust T_W^BC T_C^ISM xi_C^tot xi_PAH^tot xi_MIR^tot xi_W^tot tvism Mdust SFR",
            "  1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16",
            " #  BEST FIT MODEL FLUXES",
            "  1.1E-03  2.1E-03",
        ];
        for (i, line) in lines.iter().enumerate() {
            block.feed(line, i + 2).unwrap();
        }
        block
    }

    #[test]
    fn test_open_reads_point_name() {
        let block = BlockParser::open(" ####### pxl_10_20 extra", 5).unwrap();
        assert_eq!(block.point_name(), "pxl_10_20");
        assert_eq!(block.state(), DecodeState::FilterNames);
    }

    #[test]
    fn test_open_without_point_name_fails() {
        let err = BlockParser::open(" ####### ", 3).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Format {
                point_name: None,
                line: 3,
                kind: FormatErrorKind::MissingPointName
            }
        ));
    }

    #[test]
    fn test_fixed_section_populates_result() {
        let block = open_at_parameter_section();
        assert_eq!(block.state(), DecodeState::ParameterSection);

        let result = block.finish(14).unwrap();
        assert_eq!(result.point_name, "P1");
        assert_eq!(result.header.i_sfh, 1234.0);
        assert_eq!(result.header.redshift, 0.0123);
        assert_eq!(result.best_fit.sfr, 16.0);
        assert_eq!(result.filters.len(), 2);
        assert_eq!(result.filters[1].name, "nuv");
        assert_eq!(result.filters[1].observed_flux, 2.0e-3);
        assert_eq!(result.filters[1].observational_uncertainty, 2.0e-4);
        assert_eq!(result.filters[1].flux_bfm, 2.1e-3);
        assert!(result.parameters.is_empty());
    }

    #[test]
    fn test_flux_count_must_match_filter_names() {
        let mut block = BlockParser::open(" ####### P1", 1).unwrap();
        block.feed("#", 2).unwrap();
        block.feed("# fuv nuv u", 3).unwrap();
        let err = block.feed("1 2", 4).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Format {
                line: 4,
                kind: FormatErrorKind::FieldCount {
                    expected: 3,
                    found: 2,
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn test_parameter_with_histogram_and_percentiles() {
        let mut block = open_at_parameter_section();
        block.feed(" # MARGINAL PDF HISTOGRAMS FOR EACH PARAMETER......", 15).unwrap();
        block.feed("# ... f_mu (SFH) ...", 16).unwrap();
        block.feed("  0.0250  0.0000", 17).unwrap();
        block.feed("  0.0750  0.1250", 18).unwrap();
        block.feed("#....percentiles of the PDF......", 19).unwrap();
        block.feed("  0.1  0.2  0.3  0.4  0.5", 20).unwrap();

        let result = block.finish(20).unwrap();
        assert_eq!(result.parameters.len(), 1);
        let parameter = &result.parameters[0];
        assert_eq!(parameter.name, "f_mu (SFH)");
        assert_eq!(parameter.histogram.len(), 2);
        assert_eq!(parameter.histogram[1].hist_value, 0.125);
        assert_eq!(parameter.percentiles.p50, 0.3);
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let mut block = open_at_parameter_section();
        let err = block.feed("# ... not_a_parameter ...", 15).unwrap_err();
        match err {
            DecodeError::UnknownParameter { point_name, line, name } => {
                assert_eq!(point_name, "P1");
                assert_eq!(line, 15);
                assert_eq!(name, "not_a_parameter");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parameter_without_percentiles_rejected_at_close() {
        let mut block = open_at_parameter_section();
        block.feed("# ... tau_V ...", 15).unwrap();
        block.feed("  0.1  0.9", 16).unwrap();
        let err = block.finish(16).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Format {
                line: 15,
                kind: FormatErrorKind::MissingPercentiles { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_percentiles_rejected() {
        let mut block = open_at_parameter_section();
        block.feed("# ... tau_V ...", 15).unwrap();
        block.feed("#....percentiles of the PDF......", 16).unwrap();
        block.feed("1 2 3 4 5", 17).unwrap();
        block.feed("#....percentiles of the PDF......", 18).unwrap();
        let err = block.feed("1 2 3 4 5", 19).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Format {
                kind: FormatErrorKind::DuplicatePercentiles { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_skynet_line_overrides_i_ir() {
        let mut block = open_at_parameter_section();
        block.feed(" #...theSkyNet parameters", 15).unwrap();
        block.feed("  77  99  0.5  0.25  0.001", 16).unwrap();

        let result = block.finish(16).unwrap();
        assert_eq!(result.header.i_ir, 99.0);
        let skynet = result.skynet.unwrap();
        assert_eq!(skynet.i_opt, 77.0);
        assert_eq!(skynet.dmstar, 0.5);
        assert_eq!(skynet.dfmu_aux, 0.25);
        assert_eq!(skynet.dz, 0.001);
    }

    #[test]
    fn test_truncated_block_rejected() {
        let mut block = BlockParser::open(" ####### P1", 1).unwrap();
        block.feed("#", 2).unwrap();
        block.feed("# fuv", 3).unwrap();
        let err = block.finish(3).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Format {
                kind: FormatErrorKind::Truncated { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_parameter_name_extraction() {
        assert_eq!(parameter_name("# ... M(stars) ..."), Some("M(stars)".to_string()));
        assert_eq!(parameter_name("# ...tau_V^ISM..."), Some("tau_V^ISM".to_string()));
        assert_eq!(parameter_name("# ... ..."), None);
    }
}
