//! # Bucket Scheduler (C7)
//!
//! Two bucketing strategies over the geometric windows Goldbach pairs are
//! summarized into (spec §4.7):
//!
//! - `DecadeScheduler`: the decade sequence `{4,5,6,7,8,9,10,20,...,100,200,
//!   ...}`. Level `k=0` buckets are single integers `[d, d+1)` for `d` in
//!   `4..=9`; each subsequent level `k ≥ 1` buckets are `[d·10^k, (d+1)·10^k)`
//!   for `d` in `1..=9`. Each bucket's geometric anchor is
//!   `n_geom = ⌊10^k·√(d·(d+1))⌋`, OR'd with 1 (forced odd) whenever `k > 0`.
//! - `PrimorialScheduler`: breakpoints at the primorial values `p#` for each
//!   prime `p` (from the stream), with three evenly spaced sub-fraction
//!   checkpoints between consecutive breakpoints labeled `{p}PR{n}D{q}` where
//!   `q ∈ {1,2,3}` identifies the quarter-point.
//!
//! Both schedulers treat a bucket whose resolved `[n_start, n_end)` range is
//! empty (`n_start >= n_end` after applying a run's `--*-n-start/end` clamp)
//! as producing no row at all, per the resolved "large-F start past end"
//! open question (see DESIGN.md).

/// One decade-sequence bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecadeBucket {
    pub n_start: u64,
    pub n_end: u64,
    pub k: u32,
    pub d: u64,
}

impl DecadeBucket {
    /// `n_geom = floor(10^k * sqrt(d*(d+1)))`, forced odd (OR 1) when k>0.
    pub fn n_geom(&self) -> u64 {
        let scale = 10u64.pow(self.k);
        let product = (self.d as f64) * ((self.d + 1) as f64);
        let raw = (scale as f64 * product.sqrt()).floor() as u64;
        if self.k > 0 {
            raw | 1
        } else {
            raw
        }
    }
}

pub struct DecadeScheduler;

impl DecadeScheduler {
    /// All decade buckets whose `[n_start, n_end)` intersects `[first, last]`.
    pub fn buckets(first: u64, last: u64) -> Vec<DecadeBucket> {
        let mut out = Vec::new();

        for d in 4..=9u64 {
            let bucket = DecadeBucket {
                n_start: d,
                n_end: d + 1,
                k: 0,
                d,
            };
            if bucket.n_end > first && bucket.n_start <= last {
                out.push(bucket);
            }
        }

        let mut k = 1u32;
        loop {
            let scale = 10u64.pow(k);
            let level_start = scale; // d=1 boundary
            if level_start > last {
                break;
            }
            for d in 1..=9u64 {
                let n_start = d * scale;
                let n_end = (d + 1) * scale;
                if n_start > last {
                    break;
                }
                if n_end > first {
                    out.push(DecadeBucket {
                        n_start,
                        n_end,
                        k,
                        d,
                    });
                }
            }
            k += 1;
            if k > 18 {
                break; // 10^18 already exceeds any realistic n; guards against infinite loop.
            }
        }

        out
    }
}

/// One primorial-scheduler checkpoint: either a breakpoint at `p#` itself
/// (`quarter == 0`) or one of three evenly spaced sub-fraction checkpoints
/// between consecutive breakpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimorialBucket {
    pub n_start: u64,
    pub n_end: u64,
    pub prime: u64,
    pub primorial: u128,
    pub quarter: u8,
}

impl PrimorialBucket {
    /// Label of the form `{p}PR{n}D{q}` for sub-fraction checkpoints, or
    /// `{p}PR{n}` for a bare breakpoint.
    pub fn label(&self) -> String {
        if self.quarter == 0 {
            format!("{}PR{}", self.prime, self.n_end)
        } else {
            format!("{}PR{}D{}", self.prime, self.n_end, self.quarter)
        }
    }
}

pub struct PrimorialScheduler;

impl PrimorialScheduler {
    /// Primorial breakpoints (and their quarter sub-checkpoints) covering
    /// `[first, last]`, derived from `primes` (ascending, starting at 2).
    pub fn buckets(primes: &[u64], first: u64, last: u64) -> Vec<PrimorialBucket> {
        let mut out = Vec::new();
        let mut primorial: u128 = 1;
        let mut prev_boundary: u64 = first.max(2);

        for &p in primes {
            let next_primorial = match primorial.checked_mul(p as u128) {
                Some(v) if v <= u64::MAX as u128 => v,
                _ => break,
            };
            let boundary = next_primorial as u64;
            if boundary <= prev_boundary {
                primorial = next_primorial;
                continue;
            }
            if prev_boundary > last {
                break;
            }

            let span = boundary - prev_boundary;
            for q in 1..=3u8 {
                let quarter_point = prev_boundary + (span * q as u64) / 4;
                if quarter_point > prev_boundary && quarter_point < boundary && quarter_point <= last {
                    out.push(PrimorialBucket {
                        n_start: prev_boundary,
                        n_end: quarter_point,
                        prime: p,
                        primorial: next_primorial,
                        quarter: q,
                    });
                }
            }
            if boundary > prev_boundary && boundary <= last {
                out.push(PrimorialBucket {
                    n_start: prev_boundary,
                    n_end: boundary,
                    prime: p,
                    primorial: next_primorial,
                    quarter: 0,
                });
            }

            prev_boundary = boundary;
            primorial = next_primorial;
            if boundary > last {
                break;
            }
        }

        out
    }
}
