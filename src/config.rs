//! # Config — Resolved Run Configuration
//!
//! `RunConfig` is the fully-resolved set of options after CLI parsing and
//! defaulting. It is threaded explicitly through the aggregator and bucket
//! scheduler rather than read from globals or thread-locals, per the
//! "no process-wide mutable state" design note.

use crate::error::PipelineError;
use serde::Serialize;
use std::fmt;

/// Column-schema and δ-formula flavor selector for legacy compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompatFlavor {
    V01,
    V015,
    V02,
    Current,
}

impl CompatFlavor {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "v0.1" => Ok(CompatFlavor::V01),
            "v0.1.5" => Ok(CompatFlavor::V015),
            "v0.2" => Ok(CompatFlavor::V02),
            "current" => Ok(CompatFlavor::Current),
            other => Err(PipelineError::Argument(format!(
                "unknown --compat flavor '{other}' (expected v0.1, v0.1.5, v0.2, current)"
            ))),
        }
    }

    /// v0.1.5 drops the secondary `n-3` cap described in §4.6 step 1.
    pub fn has_secondary_euler_cap(self) -> bool {
        !matches!(self, CompatFlavor::V015)
    }
}

impl fmt::Display for CompatFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompatFlavor::V01 => "v0.1",
            CompatFlavor::V015 => "v0.1.5",
            CompatFlavor::V02 => "v0.2",
            CompatFlavor::Current => "current",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TraceMode {
    Decade,
    Primorial,
    None,
}

impl TraceMode {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "decade" => Ok(TraceMode::Decade),
            "primorial" => Ok(TraceMode::Primorial),
            "none" => Ok(TraceMode::None),
            other => Err(PipelineError::Argument(format!(
                "unknown --trace mode '{other}' (expected decade, primorial, none)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Model {
    Empirical,
    HlA,
}

impl Model {
    pub fn parse(s: &str) -> Result<Self, PipelineError> {
        match s {
            "empirical" => Ok(Model::Empirical),
            "hl-a" => Ok(Model::HlA),
            other => Err(PipelineError::Argument(format!(
                "unknown --model '{other}' (expected empirical, hl-a)"
            ))),
        }
    }
}

/// Fully-resolved configuration for a summary-engine run.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub alphas: Vec<f64>,
    pub trace: TraceMode,
    pub model: Model,
    pub dec_n_start: Option<u64>,
    pub dec_n_end: Option<u64>,
    pub prim_n_start: Option<u64>,
    pub prim_n_end: Option<u64>,
    pub n_start: Option<u64>,
    pub n_end: Option<u64>,
    pub dec_out: Option<String>,
    pub prim_out: Option<String>,
    pub compat: CompatFlavor,
    pub euler_cap: bool,
    pub append: bool,
    pub include_trivial: bool,
    pub segment_size: u64,
}

impl RunConfig {
    /// Dedup and sort the alpha list ascending, defaulting to `[0.5]` if empty.
    pub fn normalize_alphas(mut alphas: Vec<f64>) -> Vec<f64> {
        if alphas.is_empty() {
            return vec![0.5];
        }
        alphas.sort_by(|a, b| a.partial_cmp(b).unwrap());
        alphas.dedup_by(|a, b| (*a - *b).abs() < f64::EPSILON);
        alphas
    }

    /// Expand `-=ALPHA=-` and `-=FORMAT=-` placeholders in an output template.
    pub fn expand_template(template: &str, alpha: f64, format: &str) -> String {
        template
            .replace("-=ALPHA=-", &format!("{alpha}"))
            .replace("-=FORMAT=-", format)
    }

    /// Model tag used in default (non-templated) output filenames, per §6's
    /// `gbpairsummary-*-{empirical|hl-a}-...` naming.
    pub fn model_tag(&self) -> &'static str {
        match self.model {
            Model::Empirical => "empirical",
            Model::HlA => "hl-a",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_alphas_defaults_to_half() {
        assert_eq!(RunConfig::normalize_alphas(vec![]), vec![0.5]);
    }

    #[test]
    fn normalize_alphas_dedups_and_sorts() {
        let result = RunConfig::normalize_alphas(vec![0.8, 0.1, 0.5, 0.1, 0.5]);
        assert_eq!(result, vec![0.1, 0.5, 0.8]);
    }

    #[test]
    fn compat_flavor_parses_known_values() {
        assert_eq!(CompatFlavor::parse("v0.1").unwrap(), CompatFlavor::V01);
        assert_eq!(CompatFlavor::parse("v0.1.5").unwrap(), CompatFlavor::V015);
        assert_eq!(CompatFlavor::parse("v0.2").unwrap(), CompatFlavor::V02);
        assert_eq!(CompatFlavor::parse("current").unwrap(), CompatFlavor::Current);
        assert!(CompatFlavor::parse("bogus").is_err());
    }

    #[test]
    fn v015_drops_secondary_cap() {
        assert!(!CompatFlavor::V015.has_secondary_euler_cap());
        assert!(CompatFlavor::Current.has_secondary_euler_cap());
    }

    #[test]
    fn trace_mode_and_model_parse() {
        assert_eq!(TraceMode::parse("decade").unwrap(), TraceMode::Decade);
        assert_eq!(TraceMode::parse("none").unwrap(), TraceMode::None);
        assert!(TraceMode::parse("bogus").is_err());
        assert_eq!(Model::parse("hl-a").unwrap(), Model::HlA);
        assert!(Model::parse("bogus").is_err());
    }

    #[test]
    fn expand_template_replaces_placeholders() {
        let out = RunConfig::expand_template("gbpairsummary-=ALPHA=--=FORMAT=-.csv", 0.5, "full");
        assert_eq!(out, "gbpairsummary0.5full.csv");
    }

    fn minimal_config(model: Model) -> RunConfig {
        RunConfig {
            alphas: vec![0.5],
            trace: TraceMode::Decade,
            model,
            dec_n_start: None,
            dec_n_end: None,
            prim_n_start: None,
            prim_n_end: None,
            n_start: None,
            n_end: None,
            dec_out: None,
            prim_out: None,
            compat: CompatFlavor::Current,
            euler_cap: true,
            append: false,
            include_trivial: false,
            segment_size: 1_000_000,
        }
    }

    #[test]
    fn model_tag_matches_cli_vocabulary() {
        assert_eq!(minimal_config(Model::Empirical).model_tag(), "empirical");
        assert_eq!(minimal_config(Model::HlA).model_tag(), "hl-a");
    }
}
