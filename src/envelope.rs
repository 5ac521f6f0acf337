//! # Remainder Envelope (C5)
//!
//! `R(δ,n) = exp(base(δ,n) + δ·tail(δ,n))`, a CRT-inspired analytic bound on
//! the sieve remainder, per spec §4.5.
//!
//! The starting prime `s` is 3 when `3 | n`, else 5. Primes are walked from
//! `s` upward accumulating `R_k^(s) = ∏(p_i - 1)` over `p_i ∈ [s, p_k]`; the
//! fence prime `p*` is the one at the largest index `k*` with `(R_k^(s))² ≤ δ`.
//! `base(δ,n)` sums `log(p - r)` over the committed primes `[s, p*]`, with a
//! correction term for primes dividing `n` (where the exponent is `p-1`
//! instead of `p-r`). `tail(δ,n)` continues for up to `exposure_count` further
//! primes past the fence, each contributing `log(p - r_tail) / (R_i^(s))²`.
//!
//! Two optional flavors:
//! - `short_interval`: the product bound uses `√δ` in place of `δ`.
//! - `tenting`: caps each `log(p - r)` term at `log(min(p - r, t + 1))` where
//!   `t = (n + r) mod p`.
//!
//! Evaluation is memoized per `n`: repeated calls with the same `n` and a
//! monotonically non-decreasing `δ` resume from the last committed fence
//! instead of re-walking primes from `s`. A hard cap stops prime intake once
//! the running primorial of committed primes exceeds the largest odd
//! primorial that fits in 64 bits (`3·5·…·53`); beyond the cap, any further
//! prime (dividing `n` or not) contributes its uncorrected `log(p - r)` term
//! and no further primes are examined.

use crate::primestore::PrimeStream;

/// `3 * 5 * 7 * ... * 53`, the largest odd primorial fitting in a u64.
pub const PRIMORIAL_CAP: u128 = 3 * 5 * 7 * 11 * 13 * 17 * 19 * 23 * 29 * 31 * 37 * 41 * 43 * 47 * 53;

/// Residue parameter selecting which family of exponents to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residue {
    /// Goldbach pair-counting remainder (r=2).
    Goldbach,
    /// Simple-prime-counting remainder (r=1).
    SimplePrime,
}

impl Residue {
    fn r(self) -> u64 {
        match self {
            Residue::Goldbach => 2,
            Residue::SimplePrime => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RemainderFlavor {
    pub residue: Residue,
    pub tail_residue: Residue,
    pub short_interval: bool,
    pub tenting: bool,
    pub exposure_count: usize,
}

impl Default for RemainderFlavor {
    fn default() -> Self {
        RemainderFlavor {
            residue: Residue::Goldbach,
            tail_residue: Residue::Goldbach,
            short_interval: false,
            tenting: false,
            exposure_count: 8,
        }
    }
}

struct CommittedPrime {
    p: u64,
    divides_n: bool,
}

/// Per-`n` memoized envelope state. Construct once per `n`, call `evaluate`
/// with non-decreasing `δ` values.
pub struct RemainderEnvelope<'a> {
    stream: &'a PrimeStream,
    flavor: RemainderFlavor,
    n: u64,
    start_idx: usize,
    committed: Vec<CommittedPrime>,
    /// index into `stream` of the next prime not yet examined for commitment.
    next_idx: usize,
    running_primorial: u128,
    capped: bool,
    /// R_k^(s) = product of (p-1) over committed primes, tracked as f64 to
    /// avoid overflow once many primes are committed (it grows past u128
    /// range only far beyond the 64-bit primorial cap, at which point intake
    /// stops anyway, but f64 keeps the comparison against delta well-behaved
    /// even near the cap).
    running_r: f64,
    base_sum: f64,
}

impl<'a> RemainderEnvelope<'a> {
    pub fn new(n: u64, stream: &'a PrimeStream, flavor: RemainderFlavor) -> Self {
        let s = if n % 3 == 0 { 3 } else { 5 };
        let start_idx = stream
            .iter()
            .position(|p| p == s)
            .unwrap_or_else(|| stream.len());
        RemainderEnvelope {
            stream,
            flavor,
            n,
            start_idx,
            committed: Vec::new(),
            next_idx: start_idx,
            running_primorial: 1,
            capped: false,
            running_r: 1.0,
            base_sum: 0.0,
        }
    }

    fn tent_term(&self, p: u64, r: u64) -> f64 {
        if !self.flavor.tenting {
            return ((p - r) as f64).ln();
        }
        let t = (self.n + r) % p;
        let capped = std::cmp::min(p.saturating_sub(r), t + 1);
        (capped as f64).ln()
    }

    /// Advance commitment of primes (growing `base_sum` and `running_r`)
    /// until the fence condition `(R_k^(s))^2 <= delta_for_product` first
    /// fails, or the primorial cap is hit, or the stream is exhausted.
    fn advance_fence(&mut self, delta_for_product: f64) {
        if self.capped {
            return;
        }
        loop {
            if self.next_idx >= self.stream.len() {
                break;
            }
            let p = self.stream.get(self.next_idx);
            if p < 3 {
                self.next_idx += 1;
                continue;
            }
            // Fence condition per spec.md §4.5: k* is the largest k with
            // (R_k^(s))^2 <= delta. Check the *prospective* R including this
            // candidate prime before committing it — committing first and
            // checking after always lets in one extra prime past the true
            // fence.
            let prospective_r = self.running_r * (p - 1) as f64;
            if prospective_r * prospective_r > delta_for_product {
                break;
            }
            let new_primorial = self.running_primorial.saturating_mul(p as u128);
            if new_primorial > PRIMORIAL_CAP {
                self.capped = true;
                break;
            }
            let divides_n = self.n % p == 0;
            let r = self.flavor.residue.r();
            let term = if divides_n {
                ((p - 1) as f64).ln()
            } else {
                self.tent_term(p, r)
            };
            self.base_sum += term;
            self.running_r *= (p - 1) as f64;
            self.running_primorial = new_primorial;
            self.committed.push(CommittedPrime { p, divides_n });
            self.next_idx += 1;
        }
    }

    /// `tail(delta, n)`: sum over up to `exposure_count` primes beyond the
    /// fence of `log(p - r_tail) / (R_i^(s))^2`, `R_i` the running product of
    /// `(p-1)` including that prime. Does not mutate committed state.
    fn tail_sum(&self) -> f64 {
        if self.capped {
            return 0.0;
        }
        let r_tail = self.flavor.tail_residue.r();
        let mut running = self.running_r;
        let mut idx = self.next_idx;
        let mut sum = 0.0;
        let mut taken = 0usize;
        while taken < self.flavor.exposure_count && idx < self.stream.len() {
            let p = self.stream.get(idx);
            if p < 3 {
                idx += 1;
                continue;
            }
            running *= (p - 1) as f64;
            let term = if self.flavor.tenting {
                self.tent_term(p, r_tail)
            } else {
                ((p.saturating_sub(r_tail)) as f64).ln()
            };
            sum += term / (running * running);
            idx += 1;
            taken += 1;
        }
        sum
    }

    /// Evaluate `R(delta, n)`. `delta` values across successive calls for the
    /// same instance must be non-decreasing to benefit from memoization;
    /// passing a smaller delta still produces a correct (if unmemoized)
    /// result, recomputing nothing since fence state only ever grows.
    pub fn evaluate(&mut self, delta: u64) -> f64 {
        let delta_f = delta as f64;
        let delta_for_product = if self.flavor.short_interval {
            delta_f.sqrt()
        } else {
            delta_f
        };
        self.advance_fence(delta_for_product);
        let base = self.base_sum;
        let tail = self.tail_sum();
        (base + delta_f * tail).exp()
    }

    pub fn fence_prime(&self) -> Option<u64> {
        self.committed.last().map(|c| c.p)
    }

    pub fn is_capped(&self) -> bool {
        self.capped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sieve::sieve_to;

    fn stream_to(limit: u64) -> PrimeStream {
        PrimeStream::from_bitmap(&sieve_to(limit))
    }

    #[test]
    fn starting_prime_depends_on_divisibility_by_three() {
        let stream = stream_to(1000);
        let mut env_div3 = RemainderEnvelope::new(9, &stream, RemainderFlavor::default());
        env_div3.evaluate(100);
        assert_eq!(env_div3.start_idx, stream.iter().position(|p| p == 3).unwrap());

        let mut env_not3 = RemainderEnvelope::new(10, &stream, RemainderFlavor::default());
        env_not3.evaluate(100);
        assert_eq!(env_not3.start_idx, stream.iter().position(|p| p == 5).unwrap());
    }

    #[test]
    fn monotone_delta_matches_fresh_evaluation() {
        let stream = stream_to(10_000);
        let flavor = RemainderFlavor::default();

        let mut incremental = RemainderEnvelope::new(30, &stream, flavor);
        incremental.evaluate(10);
        incremental.evaluate(500);
        let via_incremental = incremental.evaluate(5000);

        let mut fresh = RemainderEnvelope::new(30, &stream, flavor);
        let via_fresh = fresh.evaluate(5000);

        assert!((via_incremental - via_fresh).abs() < 1e-9);
    }

    // Exact fence boundary: n=9 (s=3), delta=100. Committing p=3 gives
    // R=2 (R^2=4<=100); committing p=5 gives R=8 (R^2=64<=100); committing
    // p=7 would give R=48 (R^2=2304>100), so p=7 must be excluded and the
    // fence stops at p=5.
    #[test]
    fn fence_excludes_prime_that_would_push_r_over_threshold() {
        let stream = stream_to(1000);
        let mut env = RemainderEnvelope::new(9, &stream, RemainderFlavor::default());
        env.evaluate(100);
        assert_eq!(env.fence_prime(), Some(5));
        assert_eq!(env.committed.len(), 2);
    }

    #[test]
    fn larger_delta_commits_at_least_as_many_primes() {
        let stream = stream_to(10_000);
        let flavor = RemainderFlavor::default();
        let mut env = RemainderEnvelope::new(30, &stream, flavor);
        env.evaluate(10);
        let after_small = env.committed.len();
        env.evaluate(100_000);
        let after_large = env.committed.len();
        assert!(after_large >= after_small);
    }

    #[test]
    fn short_interval_flavor_uses_sqrt_delta_in_fence() {
        let stream = stream_to(10_000);
        let mut plain = RemainderEnvelope::new(30, &stream, RemainderFlavor::default());
        plain.evaluate(10_000);

        let short = RemainderFlavor {
            short_interval: true,
            ..RemainderFlavor::default()
        };
        let mut short_env = RemainderEnvelope::new(30, &stream, short);
        short_env.evaluate(10_000);

        // sqrt(10000)=100 admits a much smaller fence than delta=10000 itself.
        assert!(short_env.committed.len() <= plain.committed.len());
    }

    #[test]
    fn result_is_positive_and_finite() {
        let stream = stream_to(10_000);
        let mut env = RemainderEnvelope::new(42, &stream, RemainderFlavor::default());
        let value = env.evaluate(1000);
        assert!(value.is_finite());
        assert!(value > 0.0);
    }

    #[test]
    fn primorial_cap_eventually_stops_intake() {
        let stream = stream_to(1_000_000);
        let mut env = RemainderEnvelope::new(30, &stream, RemainderFlavor::default());
        // A very large delta should eventually saturate the primorial cap.
        env.evaluate(u64::MAX / 4);
        assert!(env.is_capped());
    }
}
