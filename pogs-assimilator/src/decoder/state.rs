//! Decoder state machine
//!
//! # State Progression
//! AwaitingBlockStart → FilterNames → FilterFluxes → FilterUncertainties →
//! HeaderScalars → BestFitScalars → BestFitModelFluxes → ParameterSection ⇄
//! {HistogramRows, Percentiles, SkyNetScalars}
//!
//! The fixed-offset states name the line they are waiting for; each is
//! satisfied only at its own offset from the marker line, and lines at other
//! offsets are skipped. The trailing states are driven by line content.
//! [`step`] is pure so every transition is testable without I/O.

use crate::error::FormatErrorKind;

/// Prefix of the line that opens a block; the point name follows
pub const BLOCK_MARKER: &str = " ####### ";

/// Prefix of a parameter name line (`# ... f_mu (SFH) ...`)
pub const PARAMETER_PREFIX: &str = "# ...";

/// Percentile marker; exactly one data line follows
pub const PERCENTILE_MARKER: &str = "#....percentiles of the PDF......";

/// SkyNet extension marker; exactly one data line follows
pub const SKYNET_MARKER: &str = " #...theSkyNet";

/// Shape of one input line, judged by content alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    BlockMarker,
    ParameterName,
    PercentileMarker,
    SkyNetMarker,
    Comment,
    Blank,
    Data,
}

impl LineKind {
    pub fn classify(line: &str) -> Self {
        if line.starts_with(BLOCK_MARKER) {
            LineKind::BlockMarker
        } else if line.starts_with(PERCENTILE_MARKER) {
            LineKind::PercentileMarker
        } else if line.starts_with(SKYNET_MARKER) {
            LineKind::SkyNetMarker
        } else if line.starts_with(PARAMETER_PREFIX) {
            LineKind::ParameterName
        } else if line.trim().is_empty() {
            LineKind::Blank
        } else if line.trim_start().starts_with('#') {
            LineKind::Comment
        } else {
            LineKind::Data
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Outside any block (before the first marker, or after a rejected block)
    AwaitingBlockStart,
    FilterNames,
    FilterFluxes,
    FilterUncertainties,
    HeaderScalars,
    BestFitScalars,
    BestFitModelFluxes,
    /// Variable-length section with no data line expected
    ParameterSection,
    /// Histogram rows of the open parameter
    HistogramRows,
    /// One percentile line is due
    Percentiles,
    /// One SkyNet line is due
    SkyNetScalars,
}

impl DecodeState {
    /// Line offset (from the marker line) a fixed-offset state waits for
    pub fn fixed_offset(self) -> Option<usize> {
        match self {
            DecodeState::FilterNames => Some(2),
            DecodeState::FilterFluxes => Some(3),
            DecodeState::FilterUncertainties => Some(4),
            DecodeState::HeaderScalars => Some(9),
            DecodeState::BestFitScalars => Some(11),
            DecodeState::BestFitModelFluxes => Some(13),
            _ => None,
        }
    }

    /// True once every fixed-offset line has been consumed
    pub fn in_trailing_section(self) -> bool {
        matches!(
            self,
            DecodeState::ParameterSection
                | DecodeState::HistogramRows
                | DecodeState::Percentiles
                | DecodeState::SkyNetScalars
        )
    }

    /// What a block closed in this state is still missing, if anything
    pub fn missing_at_close(self) -> Option<&'static str> {
        match self {
            DecodeState::AwaitingBlockStart => None,
            DecodeState::FilterNames => Some("the filter name line"),
            DecodeState::FilterFluxes => Some("the observed flux line"),
            DecodeState::FilterUncertainties => Some("the uncertainty line"),
            DecodeState::HeaderScalars => Some("the best-fit model header line"),
            DecodeState::BestFitScalars => Some("the best-fit parameter line"),
            DecodeState::BestFitModelFluxes => Some("the best-fit model flux line"),
            DecodeState::Percentiles => Some("the percentile values"),
            DecodeState::SkyNetScalars => Some("the SkyNet values"),
            DecodeState::ParameterSection | DecodeState::HistogramRows => None,
        }
    }
}

/// What the block parser must do with the current line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Skip,
    ReadFilterNames,
    ReadFilterFluxes,
    ReadFilterUncertainties,
    ReadHeaderScalars,
    ReadBestFitScalars,
    ReadBestFitModelFluxes,
    OpenParameter,
    ReadHistogramRow,
    ReadPercentiles,
    ReadSkyNetScalars,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub next: DecodeState,
    pub action: Action,
}

impl Step {
    fn to(next: DecodeState, action: Action) -> Self {
        Self { next, action }
    }

    fn stay(state: DecodeState) -> Self {
        Self::to(state, Action::Skip)
    }
}

/// Transition for one non-marker line inside a block
///
/// `offset` counts lines from the marker (marker = 0). `has_parameter` says
/// whether a parameter sub-block is open.
pub fn step(
    state: DecodeState,
    offset: usize,
    kind: LineKind,
    has_parameter: bool,
) -> Result<Step, FormatErrorKind> {
    use DecodeState as S;

    if let Some(expected) = state.fixed_offset() {
        if offset != expected {
            return Ok(Step::stay(state));
        }
        let step = match state {
            S::FilterNames => Step::to(S::FilterFluxes, Action::ReadFilterNames),
            S::FilterFluxes => Step::to(S::FilterUncertainties, Action::ReadFilterFluxes),
            S::FilterUncertainties => Step::to(S::HeaderScalars, Action::ReadFilterUncertainties),
            S::HeaderScalars => Step::to(S::BestFitScalars, Action::ReadHeaderScalars),
            S::BestFitScalars => Step::to(S::BestFitModelFluxes, Action::ReadBestFitScalars),
            _ => Step::to(S::ParameterSection, Action::ReadBestFitModelFluxes),
        };
        return Ok(step);
    }

    match (state, kind) {
        (S::AwaitingBlockStart, _) => Ok(Step::stay(state)),
        (_, LineKind::BlockMarker) => Err(FormatErrorKind::UnexpectedMarker {
            expected: "a line inside the block",
        }),

        // A data line is owed; only blank lines may sit in between
        (S::Percentiles | S::SkyNetScalars, LineKind::Blank) => Ok(Step::stay(state)),
        (S::Percentiles, LineKind::Data) => {
            Ok(Step::to(S::ParameterSection, Action::ReadPercentiles))
        }
        (S::SkyNetScalars, LineKind::Data) => {
            Ok(Step::to(S::ParameterSection, Action::ReadSkyNetScalars))
        }
        (S::Percentiles, _) => Err(FormatErrorKind::UnexpectedMarker {
            expected: "the percentile values",
        }),
        (S::SkyNetScalars, _) => Err(FormatErrorKind::UnexpectedMarker {
            expected: "the SkyNet values",
        }),

        (_, LineKind::ParameterName) => Ok(Step::to(S::HistogramRows, Action::OpenParameter)),
        (_, LineKind::PercentileMarker) if has_parameter => {
            Ok(Step::to(S::Percentiles, Action::Skip))
        }
        (_, LineKind::PercentileMarker) => Err(FormatErrorKind::OrphanPercentiles),
        (_, LineKind::SkyNetMarker) => Ok(Step::to(S::SkyNetScalars, Action::Skip)),
        (S::HistogramRows, LineKind::Data) => {
            Ok(Step::to(S::HistogramRows, Action::ReadHistogramRow))
        }
        (S::HistogramRows, LineKind::Comment) => Ok(Step::stay(S::ParameterSection)),
        (_, LineKind::Blank | LineKind::Comment | LineKind::Data) => Ok(Step::stay(state)),
    }
}
