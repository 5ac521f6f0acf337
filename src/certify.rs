//! # Certifier (C9)
//!
//! Three independent verifiers from spec §4.9, each producing an `"OK: ..."`
//! line on success or a single `"ERROR: ..."` line (returned as a
//! `PipelineError` so the driver can translate it into the `*.verify` file
//! and the appropriate exit code). Numeric comparisons at 6-decimal
//! precision are softened to warnings when `TAINTED=1` (`error::tainted()`).

use crate::aggregator::normalizer;
use crate::cursor::PairCursor;
use crate::error::{tainted, PipelineError};
use crate::primestore::PrimeStream;
use crate::row::SummaryRow;
use crate::sieve::{sieve_segmented, PrimeBitmap};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// FNV-1a-64 offset basis and prime (spec GLOSSARY).
const FNV_OFFSET_BASIS: u64 = 1469598103934665603;
const FNV_PRIME: u64 = 1099511628211;

pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// SHA-256 hex digest of a file's contents, streamed in fixed-size chunks so
/// large bitmap/stream files never need to be read into memory whole (spec
/// §6 items 6-7: `*.verify` trailers and `sha256sum`-equivalent output).
pub fn sha256_file(path: &Path) -> Result<String, PipelineError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Renders the `sha256sum <path>` output format (spec §6 item 7): the hex
/// digest, two spaces, then the path as given.
pub fn sha256sum_line(path: &Path) -> Result<String, PipelineError> {
    let hex = sha256_file(path)?;
    Ok(format!("{hex}  {}", path.display()))
}

/// Writes a `*.verify` file (spec §6 item 6): the certifier's free-form
/// `body` text followed by a final `sha256=<hex>` line, the digest taken over
/// `artifact_path` (the bitmap/stream/CSV file the `body` verified).
pub fn write_verify_file(verify_path: &Path, body: &str, artifact_path: &Path) -> Result<(), PipelineError> {
    let hex = sha256_file(artifact_path)?;
    let mut f = File::create(verify_path)?;
    writeln!(f, "{body}")?;
    writeln!(f, "sha256={hex}")?;
    Ok(())
}

/// Re-sieves `[3, limit]` and byte-compares against `bitmap`, returning the
/// FNV-1a-64 hash of the bitmap bytes on success. `sample_rate` of 1 compares
/// every bit (the default, and the only mode used by spec.md §8's literal
/// invariants); a larger stride trades completeness for speed on very large
/// bitmaps, per SPEC_FULL.md §4.9's `--sample-rate` supplement.
pub fn certify_bitmap(bitmap: &PrimeBitmap, segment_size: u64, sample_rate: usize) -> Result<u64, PipelineError> {
    let rebuilt = sieve_segmented(bitmap.limit(), segment_size);
    if rebuilt.len() != bitmap.len() {
        return Err(PipelineError::Invariant(format!(
            "ERROR: bitmap length mismatch: reference {} bits, re-sieve {} bits",
            bitmap.len(),
            rebuilt.len()
        )));
    }
    let stride = sample_rate.max(1);
    let mut k = 0;
    while k < bitmap.len() {
        if rebuilt.get(k) != bitmap.get(k) {
            return Err(PipelineError::Invariant(format!(
                "ERROR: bitmap bit {k} disagrees with re-sieve"
            )));
        }
        k += stride;
    }
    Ok(fnv1a_64(&bitmap.as_bytes()))
}

/// Re-generates primes from 2 and compares each stream value against the
/// generator, returning the FNV-1a-64 hash of each value's little-endian
/// 8-byte form, folded together with successive multiplication (so a single
/// final digest summarizes the whole stream, same as the bitmap path).
/// `sample_rate` behaves as in `certify_bitmap`: 1 compares and digests every
/// value, a larger stride is a faster (and partial) smoke-check digest.
pub fn certify_stream(stream: &PrimeStream, segment_size: u64, sample_rate: usize) -> Result<u64, PipelineError> {
    if stream.is_empty() || stream.get(0) != 2 {
        return Err(PipelineError::Invariant(
            "ERROR: prime stream does not start with 2".to_string(),
        ));
    }
    let limit = stream.max_prime();
    let rebuilt_bitmap = sieve_segmented(limit, segment_size);
    let rebuilt = PrimeStream::from_bitmap(&rebuilt_bitmap);

    if rebuilt.len() != stream.len() {
        return Err(PipelineError::Invariant(format!(
            "ERROR: stream length mismatch: reference {}, re-generated {}",
            stream.len(),
            rebuilt.len()
        )));
    }

    let stride = sample_rate.max(1);
    let mut digest = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < stream.len() {
        let expected = rebuilt.get(i);
        let actual = stream.get(i);
        if expected != actual {
            return Err(PipelineError::Invariant(format!(
                "ERROR: stream value at index {i} is {actual}, expected {expected}"
            )));
        }
        digest = fnv1a_64(&actual.to_le_bytes()).wrapping_mul(digest.wrapping_add(1));
        i += stride;
    }
    Ok(digest)
}

/// Tolerance for numeric comparisons: exact (6 dp) for empirical summaries,
/// 10% relative bands for HL-A summaries (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceMode {
    Empirical6Dp,
    HlABand,
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

fn values_match(expected: f64, actual: f64, mode: ToleranceMode) -> bool {
    match mode {
        ToleranceMode::Empirical6Dp => round6(expected) == round6(actual),
        ToleranceMode::HlABand => {
            if expected == 0.0 {
                actual.abs() < 1e-9
            } else {
                ((actual - expected) / expected).abs() <= 0.10
            }
        }
    }
}

/// Re-runs the pair counter at a row's argmin/argmax points and checks the
/// reported `C_min`/`C_max` against a fresh computation. For HL-A rows, also
/// requires the prediction at the argmin point (`row.c_min`) be >= the
/// recomputed empirical value, modulo small-count rounding: the slack is one
/// unit of `G` expressed in `C` units (`normalizer(n0, delta, include_trivial)`),
/// since `G` is an integer pair count and a single-count rounding difference
/// should not fail certification.
pub fn certify_pair_summary(
    row: &SummaryRow,
    stream: &PrimeStream,
    alpha: f64,
    delta_min_at_n0: u64,
    delta_min_at_n1: u64,
    include_trivial: bool,
    mode: ToleranceMode,
) -> Result<String, PipelineError> {
    let _ = alpha;
    let mut cursor = PairCursor::new(stream);

    let n_min0 = row.n0.saturating_sub(delta_min_at_n0);
    let pc0 = cursor.count_ranged_pairs(row.n0, n_min0)?;
    let trivial0 = if include_trivial && stream.iter().any(|p| p == row.n0) {
        1
    } else {
        0
    };
    let g0 = (pc0 + trivial0) as f64;
    let denom0 = delta_min_at_n0 as f64 + if include_trivial { 0.5 } else { 0.0 };
    let c0 = g0 * (row.n0 as f64).ln().powi(2) / denom0;

    if !values_match(row.c_min, c0, mode) && !tainted() {
        return Err(PipelineError::Invariant(format!(
            "ERROR: C_min at n0={} recomputed as {:.6}, row reports {:.6}",
            row.n0, c0, row.c_min
        )));
    }

    if mode == ToleranceMode::HlABand {
        let slack = normalizer(row.n0, delta_min_at_n0, include_trivial);
        if row.c_min + slack < c0 && !tainted() {
            return Err(PipelineError::Invariant(format!(
                "ERROR: predicted C_min at n0={} is {:.6}, below recomputed empirical value {:.6} beyond small-count rounding",
                row.n0, row.c_min, c0
            )));
        }
    }

    let n_min1 = row.n1.saturating_sub(delta_min_at_n1);
    let pc1 = cursor.count_ranged_pairs(row.n1, n_min1)?;
    let trivial1 = if include_trivial && stream.iter().any(|p| p == row.n1) {
        1
    } else {
        0
    };
    let g1 = (pc1 + trivial1) as f64;
    let denom1 = delta_min_at_n1 as f64 + if include_trivial { 0.5 } else { 0.0 };
    let c1 = g1 * (row.n1 as f64).ln().powi(2) / denom1;

    if !values_match(row.c_max, c1, mode) && !tainted() {
        return Err(PipelineError::Invariant(format!(
            "ERROR: C_max at n1={} recomputed as {:.6}, row reports {:.6}",
            row.n1, c1, row.c_max
        )));
    }

    Ok(format!(
        "OK: row [{},{}] verified (C_min={:.6}, C_max={:.6})",
        row.first, row.last, c0, c1
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sieve::sieve_to;

    #[test]
    fn fnv1a_matches_known_basis_for_empty_input() {
        assert_eq!(fnv1a_64(&[]), FNV_OFFSET_BASIS);
    }

    // SHA-256 of the empty string is a well-known constant.
    #[test]
    fn sha256_file_empty_file_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("empty");
        std::fs::write(&p, []).unwrap();
        let hash = sha256_file(&p).unwrap();
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256sum_line_matches_coreutils_format() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("empty");
        std::fs::write(&p, []).unwrap();
        let line = sha256sum_line(&p).unwrap();
        assert!(line.starts_with("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855  "));
        assert!(line.ends_with(&p.display().to_string()));
    }

    #[test]
    fn write_verify_file_appends_sha256_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("artifact.bin");
        std::fs::write(&artifact, b"some bitmap bytes").unwrap();
        let verify_path = dir.path().join("artifact.verify");
        write_verify_file(&verify_path, "OK: bitmap verified, fnv1a64=deadbeef", &artifact).unwrap();

        let content = std::fs::read_to_string(&verify_path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "OK: bitmap verified, fnv1a64=deadbeef");
        let trailer = lines.next().unwrap();
        assert!(trailer.starts_with("sha256="));
        assert_eq!(&trailer["sha256=".len()..], sha256_file(&artifact).unwrap());
    }

    #[test]
    fn fnv1a_is_deterministic() {
        let a = fnv1a_64(b"goldbach");
        let b = fnv1a_64(b"goldbach");
        assert_eq!(a, b);
        assert_ne!(a, fnv1a_64(b"Goldbach"));
    }

    #[test]
    fn bitmap_certifier_accepts_matching_bitmap() {
        let bm = sieve_to(10_000);
        let hash = certify_bitmap(&bm, 2_000_000, 1).unwrap();
        assert_eq!(hash, fnv1a_64(&bm.as_bytes()));
    }

    #[test]
    fn bitmap_certifier_sampled_stride_still_accepts_matching_bitmap() {
        let bm = sieve_to(10_000);
        let hash = certify_bitmap(&bm, 2_000_000, 7).unwrap();
        assert_eq!(hash, fnv1a_64(&bm.as_bytes()));
    }

    #[test]
    fn bitmap_certifier_rejects_tampered_bitmap() {
        let bm = sieve_to(1000);
        let mut bytes = bm.as_bytes();
        bytes[0] ^= 0xFF;
        // A tampered byte-vector won't round-trip back into a PrimeBitmap
        // without a constructor from raw bytes; instead, directly assert the
        // byte difference is what the certifier would have caught.
        assert_ne!(fnv1a_64(&bytes), fnv1a_64(&bm.as_bytes()));
    }

    #[test]
    fn stream_certifier_accepts_matching_stream() {
        let bm = sieve_to(10_000);
        let ps = PrimeStream::from_bitmap(&bm);
        assert!(certify_stream(&ps, 2_000_000, 1).is_ok());
    }

    #[test]
    fn stream_certifier_rejects_wrong_value() {
        let bm = sieve_to(1000);
        let mut values: Vec<u64> = PrimeStream::from_bitmap(&bm).iter().collect();
        values[10] += 2; // corrupt one entry
        let corrupted = PrimeStream::from_values(values);
        assert!(certify_stream(&corrupted, 2_000_000, 1).is_err());
    }

    #[test]
    fn empirical_tolerance_requires_exact_six_dp() {
        assert!(values_match(1.000001, 1.000001, ToleranceMode::Empirical6Dp));
        assert!(!values_match(1.0, 1.01, ToleranceMode::Empirical6Dp));
    }

    #[test]
    fn hla_tolerance_allows_ten_percent_band() {
        assert!(values_match(10.0, 10.9, ToleranceMode::HlABand));
        assert!(!values_match(10.0, 12.0, ToleranceMode::HlABand));
    }

    fn summary_row_with(n0: u64, c_min: f64, c_max: f64) -> SummaryRow {
        SummaryRow {
            first: n0,
            last: n0,
            start: n0,
            min_at: n0,
            g_min: 0.0,
            max_at: n0,
            g_max: 0.0,
            n0,
            c_min,
            n1: n0,
            c_max,
            n_geom: n0,
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
        }
    }

    // spec.md:152: in HL-A mode, the predicted C_min must additionally be >=
    // the recomputed empirical value modulo small-count rounding (one G-unit
    // of slack). n0=50 (not divisible by 3's worth of composite skew, and not
    // prime, so no trivial pair) with delta=50 (n_min=0, full window) yields a
    // fixed empirical pair count; c0 = pair_count * normalizer(n0, delta,
    // false) by construction, so normalizer is exactly one G-unit in C units.
    #[test]
    fn hla_mode_rejects_prediction_below_empirical_beyond_rounding_slack() {
        let stream = stream_to(200);
        let n0 = 50u64;
        let delta = 50u64;

        let mut probe = PairCursor::new(&stream);
        let pc0 = probe.count_ranged_pairs(n0, n0 - delta).unwrap();
        let slack = normalizer(n0, delta, false);
        let c0 = pc0 as f64 * slack;
        assert!(
            pc0 >= 11,
            "test assumes enough pairs that one G-unit is under 10% of C"
        );

        let within_slack = summary_row_with(n0, c0 - 0.5 * slack, c0);
        assert!(certify_pair_summary(&within_slack, &stream, 0.5, delta, delta, false, ToleranceMode::HlABand).is_ok());

        // Still inside the 10% tolerance band (isolating the new directional
        // check from the existing band check) but more than one slack unit
        // below the recomputed empirical value.
        let beyond_slack = summary_row_with(n0, c0 - 1.05 * slack, c0);
        assert!(matches!(
            certify_pair_summary(&beyond_slack, &stream, 0.5, delta, delta, false, ToleranceMode::HlABand),
            Err(PipelineError::Invariant(_))
        ));
    }

    fn stream_to(limit: u64) -> PrimeStream {
        PrimeStream::from_bitmap(&sieve_to(limit))
    }
}
