//! Numeric field extraction for report data lines

use crate::error::FormatErrorKind;

/// Parse every whitespace-separated token of `line` as a finite float
///
/// `NaN` and infinities parse as `f64` but cannot be stored in the
/// `NOT NULL` value columns, so they are rejected here with the block.
pub fn parse_floats(line: &str, field: &'static str) -> Result<Vec<f64>, FormatErrorKind> {
    line.split_whitespace()
        .map(|token| {
            let value = token.parse::<f64>().map_err(|_| FormatErrorKind::NotANumber {
                field,
                token: token.to_string(),
            })?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(FormatErrorKind::NotFinite {
                    field,
                    token: token.to_string(),
                })
            }
        })
        .collect()
}

/// Parse a line that must hold exactly `expected` floats
pub fn parse_count(
    line: &str,
    expected: usize,
    field: &'static str,
) -> Result<Vec<f64>, FormatErrorKind> {
    let found = line.split_whitespace().count();
    if found != expected {
        return Err(FormatErrorKind::FieldCount {
            field,
            expected,
            found,
        });
    }
    parse_floats(line, field)
}

/// Fixed-width variant of [`parse_count`]
pub fn parse_exact<const N: usize>(
    line: &str,
    field: &'static str,
) -> Result<[f64; N], FormatErrorKind> {
    let values = parse_count(line, N, field)?;
    let mut out = [0.0; N];
    out.copy_from_slice(&values);
    Ok(out)
}

/// Filter names from the filter-name line; bare `#` tokens are comment leaders
pub fn filter_names(line: &str) -> Vec<String> {
    line.split_whitespace()
        .filter(|token| *token != "#")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_accepts_fortran_exponents() {
        let values: [f64; 3] = parse_exact("  1.234E-03  -5.0e+01 0", "fluxes").unwrap();
        assert_eq!(values, [1.234e-3, -50.0, 0.0]);
    }

    #[test]
    fn test_parse_count_rejects_short_line() {
        let err = parse_count("1 2 3 4", 5, "percentiles").unwrap_err();
        assert_eq!(
            err,
            FormatErrorKind::FieldCount {
                field: "percentiles",
                expected: 5,
                found: 4
            }
        );
    }

    #[test]
    fn test_count_checked_before_numbers() {
        // A wrong count is reported even when a token is also non-numeric
        let err = parse_count("1 x", 3, "header").unwrap_err();
        assert!(matches!(err, FormatErrorKind::FieldCount { found: 2, .. }));
    }

    #[test]
    fn test_not_a_number_names_token() {
        let err = parse_count("1.0 abc", 2, "histogram").unwrap_err();
        assert_eq!(
            err,
            FormatErrorKind::NotANumber {
                field: "histogram",
                token: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_non_finite_values_rejected() {
        for token in ["NaN", "nan", "inf", "-infinity"] {
            let line = format!("1.0 {token} 2.0");
            let err = parse_count(&line, 3, "percentiles").unwrap_err();
            assert_eq!(
                err,
                FormatErrorKind::NotFinite {
                    field: "percentiles",
                    token: token.to_string()
                }
            );
        }
    }

    #[test]
    fn test_filter_names_drop_comment_leader() {
        assert_eq!(
            filter_names("#   fuv   nuv  u_sdss  #"),
            vec!["fuv", "nuv", "u_sdss"]
        );
        assert!(filter_names("  #  ").is_empty());
    }
}
