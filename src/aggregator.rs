//! # Window Aggregator (C6)
//!
//! Per spec §4.6: for each evaluated `n`, compute `δ = ⌊α·n⌋` (with the Euler
//! cap and the compat-dependent secondary cap), count pairs via the cursor,
//! normalize into `C_n`, and fold the result into the current bucket's
//! `WindowInterval`. `min_at`/`max_at`/`n0`/`n1` always track the *empirical*
//! `G`/`C` extrema — they describe where the real data peaks — while the
//! value reported at those points depends on `model`: empirical runs report
//! the empirical value itself, HL-A runs report the prediction evaluated at
//! that same `n` (the `Gpred(...)`/`Cpred_*` columns in §6 item 4).

use crate::config::CompatFlavor;
use crate::row::SummaryRow;

/// δ = floor(alpha*n), Euler-capped, then secondary-capped per §4.6 step 1.
pub fn compute_delta(n: u64, alpha: f64, compat: CompatFlavor, euler_cap_enabled: bool) -> u64 {
    let mut delta = (alpha * n as f64).floor().max(0.0) as u64;

    if euler_cap_enabled {
        let nf = n as f64;
        let euler_raw = (((2.0 * nf + 1.0) - (8.0 * nf + 1.0).sqrt()) / 2.0).ceil() - 1.0;
        let euler = if euler_raw < 0.0 { 0 } else { euler_raw as u64 };
        delta = delta.min(euler);
    }

    let secondary_applies = compat.has_secondary_euler_cap() || alpha > 0.5;
    if secondary_applies {
        delta = delta.min(n.saturating_sub(3));
    } else {
        delta = delta.max(1);
    }
    delta
}

/// N(n,δ) = (ln n)^2 / (δ + [include_trivial ? 1/2 : 0]).
pub fn normalizer(n: u64, delta: u64, include_trivial: bool) -> f64 {
    let ln_n = (n as f64).ln();
    let denom = delta as f64 + if include_trivial { 0.5 } else { 0.0 };
    (ln_n * ln_n) / denom
}

/// `n_min` passed to the pair cursor for a window of half-width `delta`
/// around `n` (the window is the open interval `(n-delta, n+delta)`).
pub fn window_n_min(n: u64, delta: u64) -> u64 {
    n.saturating_sub(delta)
}

#[derive(Debug, Clone, Copy)]
struct Extremum {
    value: f64,
    at: Option<u64>,
    companion: f64,
}

impl Extremum {
    fn new_min() -> Self {
        Extremum {
            value: f64::INFINITY,
            at: None,
            companion: 0.0,
        }
    }
    fn new_max() -> Self {
        Extremum {
            value: f64::NEG_INFINITY,
            at: None,
            companion: 0.0,
        }
    }
}

/// Per-(α, bucket) accumulator. One instance is live at a time per
/// (α, bucket_kind); `close` materializes it into a `SummaryRow` and the
/// caller resets by constructing a fresh instance for the next bucket.
pub struct WindowInterval {
    n_start: Option<u64>,
    n_last: Option<u64>,
    n_geom: u64,
    min_g: Extremum,
    max_g: Extremum,
    min_c: Extremum,
    max_c: Extremum,
    min_calign: Extremum,
    max_calign: Extremum,
    min_cbound: Extremum,
    max_cbound: Extremum,
    sum_pairs: u64,
    sum_c_empirical: f64,
    sum_c_pred: f64,
    count_norm: u64,
}

impl WindowInterval {
    pub fn new(n_geom: u64) -> Self {
        WindowInterval {
            n_start: None,
            n_last: None,
            n_geom,
            min_g: Extremum::new_min(),
            max_g: Extremum::new_max(),
            min_c: Extremum::new_min(),
            max_c: Extremum::new_max(),
            min_calign: Extremum::new_min(),
            max_calign: Extremum::new_max(),
            min_cbound: Extremum::new_min(),
            max_cbound: Extremum::new_max(),
            sum_pairs: 0,
            sum_c_empirical: 0.0,
            sum_c_pred: 0.0,
            count_norm: 0,
        }
    }

    /// Fold in one evaluated `n`. `pc` is the raw ordered pair count from the
    /// cursor; `c_n` is the empirical normalized quantity; `c_pred` is
    /// `2S_GB(2n)` (model-independent; callers in empirical-only runs may
    /// pass `c_n` itself if HL-A was never computed). `calign`/`cbound` come
    /// from the remainder envelope evaluated with the align/bound flavors.
    #[allow(clippy::too_many_arguments)]
    pub fn update(&mut self, n: u64, pc: u64, c_n: f64, c_pred: f64, calign: f64, cbound: f64) {
        if self.n_start.is_none() {
            self.n_start = Some(n);
        }
        self.n_last = Some(n);

        let g_n = pc as f64;
        if g_n < self.min_g.value {
            self.min_g = Extremum {
                value: g_n,
                at: Some(n),
                companion: c_pred,
            };
        }
        if g_n > self.max_g.value {
            self.max_g = Extremum {
                value: g_n,
                at: Some(n),
                companion: c_pred,
            };
        }
        if c_n < self.min_c.value {
            self.min_c = Extremum {
                value: c_n,
                at: Some(n),
                companion: c_pred,
            };
        }
        if c_n > self.max_c.value {
            self.max_c = Extremum {
                value: c_n,
                at: Some(n),
                companion: c_pred,
            };
        }
        if calign < self.min_calign.value {
            self.min_calign = Extremum {
                value: calign,
                at: Some(n),
                companion: 0.0,
            };
        }
        if calign > self.max_calign.value {
            self.max_calign = Extremum {
                value: calign,
                at: Some(n),
                companion: 0.0,
            };
        }
        if cbound < self.min_cbound.value {
            self.min_cbound = Extremum {
                value: cbound,
                at: Some(n),
                companion: 0.0,
            };
        }
        if cbound > self.max_cbound.value {
            self.max_cbound = Extremum {
                value: cbound,
                at: Some(n),
                companion: 0.0,
            };
        }

        self.sum_pairs += pc;
        self.sum_c_empirical += c_n;
        self.sum_c_pred += c_pred;
        self.count_norm += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.n_start.is_none()
    }

    /// Materialize the accumulated state as a `SummaryRow`. `model` selects
    /// whether the `G`/`C` columns report empirical values or predictions
    /// evaluated at the tracked argmin/argmax points, and whether `C_avg`
    /// averages the empirical or predicted per-n values.
    pub fn close(&self, model: crate::config::Model) -> SummaryRow {
        let count = self.count_norm.max(1) as f64;
        let (g_min, g_max, c_min, c_max, c_avg) = match model {
            crate::config::Model::Empirical => (
                self.min_g.value,
                self.max_g.value,
                self.min_c.value,
                self.max_c.value,
                self.sum_c_empirical / count,
            ),
            crate::config::Model::HlA => (
                self.min_g.companion,
                self.max_g.companion,
                self.min_c.companion,
                self.max_c.companion,
                self.sum_c_pred / count,
            ),
        };

        SummaryRow {
            first: self.n_start.unwrap_or(0),
            last: self.n_last.unwrap_or(0),
            start: self.n_start.unwrap_or(0),
            min_at: self.min_g.at.unwrap_or(0),
            g_min,
            max_at: self.max_g.at.unwrap_or(0),
            g_max,
            n0: self.min_c.at.unwrap_or(0),
            c_min,
            n1: self.max_c.at.unwrap_or(0),
            c_max,
            n_geom: self.n_geom,
            count: self.sum_pairs,
            c_avg,
            n_v: self.min_calign.at.unwrap_or(0),
            calign_min: self.min_calign.value,
            n_u: self.max_calign.at.unwrap_or(0),
            calign_max: self.max_calign.value,
            n_a: self.min_cbound.at.unwrap_or(0),
            cbound_min: self.min_cbound.value,
            n_b: self.max_cbound.at.unwrap_or(0),
            cbound_max: self.max_cbound.value,
            jitter: (self.max_c.value - self.min_c.value).abs(),
        }
    }
}
