//! Fit report text builder
//!
//! Produces report blocks laid out exactly like the fitting code's output:
//! filter lines at offsets 2-4, header at 9, best-fit values at 11, model
//! fluxes at 13, then the parameter section.

/// Offset of the best-fit parameter line within a rendered block
pub const BEST_FIT_LINE: usize = 11;

/// Offset of the first histogram row of the first parameter
pub const FIRST_HISTOGRAM_ROW: usize = 17;

#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub histogram: Vec<(f64, f64)>,
    /// Raw percentile line, so tests can make it malformed
    pub percentiles: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub point_name: String,
    pub filters: Vec<(String, f64, f64, f64)>,
    pub header: [f64; 4],
    pub best_fit: [f64; 16],
    pub parameters: Vec<ParameterSpec>,
    pub skynet: Option<[f64; 5]>,
}

impl BlockSpec {
    /// Three filters, two parameters with histograms
    pub fn new(point_name: &str) -> Self {
        let mut best_fit = [0.0; 16];
        for (i, v) in best_fit.iter_mut().enumerate() {
            *v = 0.5 + i as f64;
        }
        Self {
            point_name: point_name.to_string(),
            filters: vec![
                ("fuv".to_string(), 1.25e-5, 2.5e-6, 1.5e-5),
                ("nuv".to_string(), 3.5e-5, 4.0e-6, 3.25e-5),
                ("u_sdss".to_string(), 7.75e-5, 8.0e-6, 7.5e-5),
            ],
            header: [12_034.0, 311.0, 0.875, 0.0125],
            best_fit,
            parameters: vec![
                ParameterSpec {
                    name: "Ldust".to_string(),
                    histogram: vec![(8.0, 0.0), (8.5, 0.25), (9.0, 0.75)],
                    percentiles: Some("8.25 8.5 8.75 9.0 9.25".to_string()),
                },
                ParameterSpec {
                    name: "M(stars)".to_string(),
                    histogram: vec![(9.5, 0.5), (10.0, 0.5)],
                    percentiles: Some("9.5 9.625 9.75 9.875 10.0".to_string()),
                },
            ],
            skynet: None,
        }
    }

    /// Multiply every observed flux by `factor`, to tell two passes apart
    pub fn scale_fluxes(mut self, factor: f64) -> Self {
        for filter in &mut self.filters {
            filter.1 *= factor;
        }
        self
    }

    pub fn with_filters(mut self, names: &[&str]) -> Self {
        self.filters = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let base = (i + 1) as f64;
                (name.to_string(), base, base / 10.0, base * 1.1)
            })
            .collect();
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterSpec>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_percentiles(mut self, index: usize, line: &str) -> Self {
        self.parameters[index].percentiles = Some(line.to_string());
        self
    }

    pub fn with_skynet(mut self, values: [f64; 5]) -> Self {
        self.skynet = Some(values);
        self
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            format!(" ####### {}", self.point_name),
            "# OBSERVED FLUXES (and errors):".to_string(),
            format!("#   {}", join_names(&self.filters)),
            join(self.filters.iter().map(|f| f.1)),
            join(self.filters.iter().map(|f| f.2)),
            "#".to_string(),
            "# BEST FIT MODEL: (i_sfh, i_ir, chi2, redshift)".to_string(),
            "#".to_string(),
            "#".to_string(),
            join(self.header.iter().copied()),
            "#.fmu(SFH)...fmu(IR)........mu......tauv........sSFR..........M*.......Ldust".to_string(),
            join(self.best_fit.iter().copied()),
            "#".to_string(),
            join(self.filters.iter().map(|f| f.3)),
            "#".to_string(),
            "# MARGINAL PDF HISTOGRAMS FOR EACH PARAMETER......".to_string(),
        ];

        for parameter in &self.parameters {
            lines.push(format!("# ... {} ...", parameter.name));
            for (x, y) in &parameter.histogram {
                lines.push(format!("{} {}", x, y));
            }
            if let Some(percentiles) = &parameter.percentiles {
                lines.push("#....percentiles of the PDF......".to_string());
                lines.push(percentiles.clone());
            }
        }

        if let Some(values) = &self.skynet {
            lines.push(" #...theSkyNet parameters of this model".to_string());
            lines.push(join(values.iter().copied()));
        }

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Render, then swap the line at `offset` for `line`
    pub fn render_replacing(&self, offset: usize, line: &str) -> String {
        self.render()
            .lines()
            .enumerate()
            .map(|(i, original)| {
                let kept = if i == offset { line } else { original };
                format!("{kept}\n")
            })
            .collect()
    }
}

fn join_names(filters: &[(String, f64, f64, f64)]) -> String {
    filters
        .iter()
        .map(|f| f.0.as_str())
        .collect::<Vec<_>>()
        .join("   ")
}

fn join(values: impl Iterator<Item = f64>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join("  ")
}

/// Parameter with a histogram and a well-formed percentile line
pub fn parameter(name: &str, histogram: &[(f64, f64)]) -> ParameterSpec {
    ParameterSpec {
        name: name.to_string(),
        histogram: histogram.to_vec(),
        percentiles: Some("0.1 0.2 0.3 0.4 0.5".to_string()),
    }
}

/// A whole report: a short preamble followed by each block
pub fn report(blocks: &[BlockSpec]) -> String {
    let mut text = String::from("# MAGPHYS fit results\n");
    for block in blocks {
        text.push_str(&block.render());
    }
    text
}
