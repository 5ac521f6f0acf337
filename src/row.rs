//! # Row — CSV Record Types
//!
//! The three emitted record shapes from spec §6: the raw pairs listing
//! (`gbpairs-*.csv`), the per-bucket summary row (`gbpairsummary-*.csv`, one
//! of the `full`/`norm`/`raw`/`cps` projections), and the CPS lower-bound row.
//! Header strings are exact literals from §6, including the verbatim
//! `n_5precent` misspelling preserved for compatibility with existing
//! consumers of the format.

use crate::config::Model;

/// One row of `gbpairs-*.csv`: `2N,N-M,N+M,2M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GbPairRow {
    pub two_n: u64,
    pub n_minus_m: u64,
    pub n_plus_m: u64,
    pub two_m: u64,
}

impl GbPairRow {
    pub const HEADER: &'static str = "2N,N-M,N+M,2M";

    pub fn to_csv_line(&self) -> String {
        format!("{},{},{},{}", self.two_n, self.n_minus_m, self.n_plus_m, self.two_m)
    }

    /// Property 1: (N-M)+(N+M)=2N and (N+M)-(N-M)=2M.
    pub fn is_internally_consistent(&self) -> bool {
        self.n_minus_m + self.n_plus_m == self.two_n && self.n_plus_m - self.n_minus_m == self.two_m
    }
}

/// Which projection of the summary schema a row is rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryVariant {
    Full,
    Norm,
    Raw,
    Cps,
}

/// One bucket-close row of `gbpairsummary-*.csv` (the `full`/`norm`/`raw`
/// projections; `cps` rows use `CpsRow` instead). Holds every field named
/// in the `full` schema so any projection can be rendered from one value.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRow {
    pub first: u64,
    pub last: u64,
    pub start: u64,
    pub min_at: u64,
    pub g_min: f64,
    pub max_at: u64,
    pub g_max: f64,
    pub n0: u64,
    pub c_min: f64,
    pub n1: u64,
    pub c_max: f64,
    pub n_geom: u64,
    pub count: u64,
    pub c_avg: f64,
    pub n_v: u64,
    pub calign_min: f64,
    pub n_u: u64,
    pub calign_max: f64,
    pub n_a: u64,
    pub cbound_min: f64,
    pub n_b: u64,
    pub cbound_max: f64,
    pub jitter: f64,
}

impl SummaryRow {
    /// Header for the given (model, variant) combination. The `full` header
    /// is the literal §6 string with `Cpred_*`/`Gpred` substituted for their
    /// empirical counterparts when `model` is `Empirical`; `norm` and `raw`
    /// are the count-only and normalized-only projections of that schema.
    pub fn header(model: Model, variant: SummaryVariant) -> String {
        match variant {
            SummaryVariant::Cps => unreachable!("CPS rows use CpsRow::HEADER"),
            SummaryVariant::Full => match model {
                Model::HlA => "FIRST,LAST,START,minAt*,Gpred(minAt*),maxAt*,Gpred(maxAt*),n_0*,Cpred_min(n_0*),n_1*,Cpred_max(n_1*),n_geom,<COUNT>*,Cpred_avg,n_v,Calign_min(n_v),n_u,Calign_max(n_u),n_a,CboundMin(n_a),n_b,CboundMax(n_b),jitter".to_string(),
                Model::Empirical => "FIRST,LAST,START,minAt*,G(minAt*),maxAt*,G(maxAt*),n_0*,C_min(n_0*),n_1*,C_max(n_1*),n_geom,<COUNT>*,C_avg".to_string(),
            },
            SummaryVariant::Raw => "FIRST,LAST,START,minAt*,maxAt*,n_geom,<COUNT>*".to_string(),
            SummaryVariant::Norm => match model {
                Model::HlA => "n_geom,<COUNT>*,Cpred_avg".to_string(),
                Model::Empirical => "n_geom,<COUNT>*,C_avg".to_string(),
            },
        }
    }

    pub fn to_csv_line(&self, model: Model, variant: SummaryVariant) -> String {
        match variant {
            SummaryVariant::Cps => unreachable!("CPS rows use CpsRow::to_csv_line"),
            SummaryVariant::Full => {
                let base = format!(
                    "{},{},{},{},{:.6},{},{:.6},{},{:.6},{},{:.6},{},{},{:.6}",
                    self.first,
                    self.last,
                    self.start,
                    self.min_at,
                    self.g_min,
                    self.max_at,
                    self.g_max,
                    self.n0,
                    self.c_min,
                    self.n1,
                    self.c_max,
                    self.n_geom,
                    self.count,
                    self.c_avg,
                );
                match model {
                    Model::Empirical => base,
                    Model::HlA => format!(
                        "{base},{},{:.6},{},{:.6},{},{:.6},{},{:.6},{:.6}",
                        self.n_v,
                        self.calign_min,
                        self.n_u,
                        self.calign_max,
                        self.n_a,
                        self.cbound_min,
                        self.n_b,
                        self.cbound_max,
                        self.jitter,
                    ),
                }
            }
            SummaryVariant::Raw => format!(
                "{},{},{},{},{},{},{}",
                self.first, self.last, self.start, self.min_at, self.max_at, self.n_geom, self.count
            ),
            SummaryVariant::Norm => format!("{},{},{:.6}", self.n_geom, self.count, self.c_avg),
        }
    }

    /// True when the bucket closed without evaluating a single `n` (e.g. a
    /// decade bucket whose range fell entirely outside `[n_start, n_end]`).
    /// Such rows carry no meaningful extrema and are skipped rather than
    /// emitted.
    pub fn count_is_zero(&self) -> bool {
        self.count == 0
    }

    /// Property 2 (empirical rows): min(C_min,C_max) <= C_avg <= max(C_min,C_max) at 6 dp.
    pub fn c_avg_within_bounds(&self) -> bool {
        let lo = self.c_min.min(self.c_max);
        let hi = self.c_min.max(self.c_max);
        let round6 = |v: f64| (v * 1_000_000.0).round() / 1_000_000.0;
        round6(lo) <= round6(self.c_avg) + 1e-9 && round6(self.c_avg) <= round6(hi) + 1e-9
    }
}

/// One row of the CPS CSV. `n_5precent` keeps the source's misspelling
/// verbatim, as required for consumers that parse the header literally.
#[derive(Debug, Clone, Copy)]
pub struct CpsRow {
    pub first: u64,
    pub last: u64,
    pub alpha: f64,
    pub pre_mertens: Option<f64>,
    pub mertens: f64,
    pub delta_mertens: f64,
    pub n_5precent: u64,
    pub nzero_stat: f64,
    pub eta_stat: f64,
    pub mertens_asymp: f64,
    pub delta_mertens_asymp: f64,
    pub nzero_stat_asymp: f64,
    pub eta_stat_asymp: f64,
}

impl CpsRow {
    pub const HEADER: &'static str = "FIRST,LAST,Alpha,PreMertens,Mertens,DeltaMertens,n_5precent,NzeroStat,EtaStat,MertensAsymp,DeltaMertensAsymp,NzeroStatAsymp,EtaStatAsymp";

    pub fn to_csv_line(&self) -> String {
        let pre = self
            .pre_mertens
            .map(|v| format!("{v:.6}"))
            .unwrap_or_default();
        format!(
            "{},{},{},{},{:.6},{:.6},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            self.first,
            self.last,
            self.alpha,
            pre,
            self.mertens,
            self.delta_mertens,
            self.n_5precent,
            self.nzero_stat,
            self.eta_stat,
            self.mertens_asymp,
            self.delta_mertens_asymp,
            self.nzero_stat_asymp,
            self.eta_stat_asymp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // S3's (3,97) pair as a row: 2N=100, N-M=3, N+M=97, 2M=94.
    #[test]
    fn gbpair_row_consistency() {
        let row = GbPairRow {
            two_n: 100,
            n_minus_m: 3,
            n_plus_m: 97,
            two_m: 94,
        };
        assert!(row.is_internally_consistent());
        assert_eq!(row.to_csv_line(), "100,3,97,94");
    }

    #[test]
    fn inconsistent_gbpair_row_detected() {
        let row = GbPairRow {
            two_n: 100,
            n_minus_m: 3,
            n_plus_m: 96,
            two_m: 94,
        };
        assert!(!row.is_internally_consistent());
    }

    #[test]
    fn empirical_full_header_drops_pred_naming() {
        let header = SummaryRow::header(Model::Empirical, SummaryVariant::Full);
        assert!(header.contains("G(minAt*)"));
        assert!(!header.contains("Gpred"));
        assert!(!header.contains("jitter"));
    }

    #[test]
    fn hla_full_header_keeps_alignment_columns() {
        let header = SummaryRow::header(Model::HlA, SummaryVariant::Full);
        assert!(header.ends_with("jitter"));
        assert!(header.contains("Calign_min(n_v)"));
    }

    #[test]
    fn cps_header_preserves_misspelling() {
        assert!(CpsRow::HEADER.contains("n_5precent"));
        assert!(!CpsRow::HEADER.contains("n_5percent"));
    }

    #[test]
    fn c_avg_within_bounds_detects_violation() {
        let row = SummaryRow {
            first: 1,
            last: 2,
            start: 1,
            min_at: 1,
            g_min: 0.0,
            max_at: 2,
            g_max: 0.0,
            n0: 1,
            c_min: 1.0,
            n1: 2,
            c_max: 2.0,
            n_geom: 1,
            count: 1,
            c_avg: 5.0, // out of [1,2]
            n_v: 0,
            calign_min: 0.0,
            n_u: 0,
            calign_max: 0.0,
            n_a: 0,
            cbound_min: 0.0,
            n_b: 0,
            cbound_max: 0.0,
            jitter: 0.0,
        };
        assert!(!row.c_avg_within_bounds());
    }

    #[test]
    fn count_is_zero_detects_empty_bucket() {
        let mut row = SummaryRow {
            first: 0,
            last: 0,
            start: 0,
            min_at: 0,
            g_min: 0.0,
            max_at: 0,
            g_max: 0.0,
            n0: 0,
            c_min: 0.0,
            n1: 0,
            c_max: 0.0,
            n_geom: 0,
            count: 0,
            c_avg: 0.0,
            n_v: 0,
            calign_min: 0.0,
            n_u: 0,
            calign_max: 0.0,
            n_a: 0,
            cbound_min: 0.0,
            n_b: 0,
            cbound_max: 0.0,
            jitter: 0.0,
        };
        assert!(row.count_is_zero());
        row.count = 3;
        assert!(!row.count_is_zero());
    }
}
