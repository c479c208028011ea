//! Tunable parameters of the repertoire tools.
//!
//! Values are read once from the TOML file named by `REP_PARAMETERS`. When the
//! variable is unset, or names a file that does not exist, the compiled-in
//! defaults are used.
// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;

/// Environment variable holding the path of the parameters file.
pub const PARAMETERS_ENV: &str = "REP_PARAMETERS";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct Parameters {
    /// Count-ratio filter: a clonotype is dropped when the pooled sibling count
    /// reaches count_ratio_threshold times its own count.
    count_ratio_threshold: f64,
    /// Degree statistics: maximal number of substitutions.
    degree_substitutions: usize,
    /// Degree statistics: maximal number of insertions, of deletions and of both combined.
    degree_indels: usize,
    /// Degree statistics: maximal total number of mismatches.
    degree_total_mismatches: usize,
    /// Default number of samples a joint clonotype must be present in.
    join_occurrence_threshold: usize,
    /// Error correction: maximal number of substitutions between a clonotype and its parent.
    corrector_max_mismatches: usize,
    /// Error correction: count ratio below which a neighbor is treated as an error.
    corrector_ratio_threshold: f64,
    /// Lower bound applied to corrected sampling p-values.
    p_value_floor: f64,
}

const DEFAULT_PARAMETERS: Parameters = Parameters {
    count_ratio_threshold: 20.0,
    degree_substitutions: 2,
    degree_indels: 1,
    degree_total_mismatches: 2,
    join_occurrence_threshold: 2,
    corrector_max_mismatches: 2,
    corrector_ratio_threshold: 0.05,
    p_value_floor: 1e-10,
};

impl Default for Parameters {
    fn default() -> Self {
        DEFAULT_PARAMETERS
    }
}

static PARAMETERS: OnceLock<Result<Parameters>> = OnceLock::new();

fn load(path: &Path) -> Result<Parameters> {
    if !path.exists() {
        warn!(
            "could not find parameters file at {}, falling back to defaults",
            path.display()
        );
        return Ok(DEFAULT_PARAMETERS);
    }
    let s = std::fs::read_to_string(path).with_context(|| path.display().to_string())?;
    toml::from_str(&s).with_context(|| path.display().to_string())
}

/// Return a reference to the global parameters.
/// The parameters may need to be loaded; if loading fails, return Err.
fn parameters() -> &'static Result<Parameters> {
    PARAMETERS.get_or_init(|| match std::env::var_os(PARAMETERS_ENV) {
        Some(path) => load(Path::new(&path)),
        None => Ok(DEFAULT_PARAMETERS),
    })
}

macro_rules! parameter_getter {
    ($a:ident, $t:ty) => {
        pub fn $a() -> Result<&'static $t> {
            let val = match parameters() {
                Err(e) => return Err(anyhow::anyhow!("{e:#}")),
                Ok(p) => &p.$a,
            };
            if DEFAULT_PARAMETERS.$a != *val {
                warn!("using non-default {} = {:?}", stringify!($a), val);
            }
            Ok(val)
        }
    };
}

parameter_getter!(count_ratio_threshold, f64);
parameter_getter!(degree_substitutions, usize);
parameter_getter!(degree_indels, usize);
parameter_getter!(degree_total_mismatches, usize);
parameter_getter!(join_occurrence_threshold, usize);
parameter_getter!(corrector_max_mismatches, usize);
parameter_getter!(corrector_ratio_threshold, f64);
parameter_getter!(p_value_floor, f64);
