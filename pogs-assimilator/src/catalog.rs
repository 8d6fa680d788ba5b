//! Registered fit parameter names
//!
//! Names as they appear on `# ... <name> ...` lines of the marginal PDF
//! section, in the order the fitting code emits them.

pub const PARAMETER_CATALOG: [&str; 16] = [
    "f_mu (SFH)",
    "f_mu (IR)",
    "mu parameter",
    "tau_V",
    "sSFR_0.1Gyr",
    "M(stars)",
    "Ldust",
    "T_C^ISM",
    "T_W^BC",
    "xi_C^tot",
    "xi_PAH^tot",
    "xi_MIR^tot",
    "xi_W^tot",
    "tau_V^ISM",
    "M(dust)",
    "SFR_0.1Gyr",
];

/// Position of `name` in the catalog
pub fn catalog_index(name: &str) -> Option<usize> {
    PARAMETER_CATALOG.iter().position(|known| *known == name)
}

pub fn is_known_parameter(name: &str) -> bool {
    catalog_index(name).is_some()
}
