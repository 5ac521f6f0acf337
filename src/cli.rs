//! # CLI Execution Functions
//!
//! Extracted from `main.rs` to keep the entry point slim. Contains the
//! execution logic for each subcommand: sieve, store, the summary engine,
//! merge, and certify.

use anyhow::{Context, Result};
use gbsieve::aggregator::{compute_delta, normalizer, window_n_min, WindowInterval};
use gbsieve::bucket::{DecadeScheduler, PrimorialScheduler};
use gbsieve::certify::ToleranceMode;
use gbsieve::checkpoint::{PartialCsvHandle, ResumePolicy};
use gbsieve::config::{CompatFlavor, Model, RunConfig, TraceMode};
use gbsieve::cursor::PairCursor;
use gbsieve::envelope::{RemainderEnvelope, RemainderFlavor};
use gbsieve::hla::hl_a;
use gbsieve::primestore::PrimeStream;
use gbsieve::progress::Progress;
use gbsieve::row::{SummaryRow, SummaryVariant};
use gbsieve::sieve::{sieve_segmented, PrimeBitmap};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Number of leading primes handed to `PrimorialScheduler`: the primorial of
/// the first ~15 odd primes (times 2) already exceeds `u64::MAX`, so the
/// scheduler never examines more than that regardless of how many we pass.
const PRIMORIAL_SEED_PRIMES: usize = 24;

/// Configure the rayon global thread pool.
pub fn configure_rayon(threads: usize) {
    if threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
            warn!(error = %e, "could not configure rayon thread pool");
        }
    }
}

pub fn run_sieve(limit: u64, out: &Path, segment_size: Option<u64>) -> Result<()> {
    let segment_size = segment_size.unwrap_or(gbsieve::sieve::MIN_SEGMENT_SIZE);
    info!(limit, segment_size, "sieving");
    let bitmap = sieve_segmented(limit, segment_size);
    fs::write(out, bitmap.as_bytes()).with_context(|| format!("writing {}", out.display()))?;
    info!(primes = bitmap.count_ones() + 1, "sieve complete");
    Ok(())
}

pub fn run_store(bitmap_path: &Path, limit: u64, out: &Path) -> Result<()> {
    let bytes = fs::read(bitmap_path).with_context(|| format!("reading {}", bitmap_path.display()))?;
    let bitmap = PrimeBitmap::from_bytes(&bytes, limit);
    let stream = PrimeStream::from_bitmap(&bitmap);
    stream
        .write_raw(out)
        .map_err(anyhow::Error::from)?;
    info!(primes = stream.len(), "stream written");
    Ok(())
}

/// Per-(α, trace-kind) set of `.partial.csv` handles, one per summary
/// variant. Rows append to these as buckets close; §5's crash-safety
/// guarantee ("a crashed process leaves a well-formed prefix") comes from
/// `PartialCsvHandle::append_line`'s flush-every-write behavior, and each
/// handle is only finalized (renamed to its real `gbpairsummary-*.csv` name)
/// once the whole bucket sweep for that α has completed successfully.
struct RowHandles {
    full: PartialCsvHandle,
    norm: PartialCsvHandle,
    raw: PartialCsvHandle,
}

fn variant_tag(variant: SummaryVariant) -> &'static str {
    match variant {
        SummaryVariant::Full => "full",
        SummaryVariant::Norm => "norm",
        SummaryVariant::Raw => "raw",
        SummaryVariant::Cps => "cps",
    }
}

fn open_row_handles(config: &RunConfig, alpha: f64, trace_tag: &str) -> Result<RowHandles> {
    let policy = if config.append {
        ResumePolicy::Append
    } else {
        ResumePolicy::Overwrite
    };
    let dir = Path::new(".");
    let mut open_one = |variant: SummaryVariant| -> Result<PartialCsvHandle> {
        let suffix = format!("{trace_tag}-{}-{}", config.model_tag(), variant_tag(variant));
        let handle = PartialCsvHandle::open(dir, alpha, &suffix, policy).map_err(anyhow::Error::from)?;
        if handle
            .existing_lines()
            .map_err(anyhow::Error::from)?
            .is_empty()
        {
            handle
                .append_line(&SummaryRow::header(config.model, variant))
                .map_err(anyhow::Error::from)?;
        }
        Ok(handle)
    };
    Ok(RowHandles {
        full: open_one(SummaryVariant::Full)?,
        norm: open_one(SummaryVariant::Norm)?,
        raw: open_one(SummaryVariant::Raw)?,
    })
}

fn append_row(handles: &RowHandles, row: &SummaryRow, config: &RunConfig) -> Result<()> {
    handles
        .full
        .append_line(&row.to_csv_line(config.model, SummaryVariant::Full))
        .map_err(anyhow::Error::from)?;
    handles
        .norm
        .append_line(&row.to_csv_line(config.model, SummaryVariant::Norm))
        .map_err(anyhow::Error::from)?;
    handles
        .raw
        .append_line(&row.to_csv_line(config.model, SummaryVariant::Raw))
        .map_err(anyhow::Error::from)?;
    Ok(())
}

fn final_output_path(config: &RunConfig, alpha: f64, template: &Option<String>, format: &str) -> String {
    match template {
        Some(t) => RunConfig::expand_template(t, alpha, format),
        None => format!("gbpairsummary-{alpha}-{}-{format}.csv", config.model_tag()),
    }
}

fn finalize_row_handles(handles: RowHandles, config: &RunConfig, alpha: f64, template: &Option<String>) -> Result<()> {
    handles
        .full
        .finalize(Path::new(&final_output_path(config, alpha, template, "full")))
        .map_err(anyhow::Error::from)?;
    handles
        .norm
        .finalize(Path::new(&final_output_path(config, alpha, template, "norm")))
        .map_err(anyhow::Error::from)?;
    handles
        .raw
        .finalize(Path::new(&final_output_path(config, alpha, template, "raw")))
        .map_err(anyhow::Error::from)?;
    Ok(())
}

/// Align-flavor and bound-flavor envelope evaluations at `(n, delta)`, used
/// to populate the `Calign_*`/`Cbound_*` columns.
fn envelope_pair(n: u64, delta: u64, stream: &PrimeStream) -> (f64, f64) {
    let mut align = RemainderEnvelope::new(n, stream, RemainderFlavor::default());
    let calign = align.evaluate(delta);
    let bound_flavor = RemainderFlavor {
        tenting: true,
        ..RemainderFlavor::default()
    };
    let mut bound = RemainderEnvelope::new(n, stream, bound_flavor);
    let cbound = bound.evaluate(delta);
    (calign, cbound)
}

/// Sweeps one bucket for every α in lockstep: outer loop over `n`, inner
/// loop over `α`'s, per spec.md §9's concurrency model ("outer loop is over
/// n, inner over α's"). A single `PairCursor` serves every α at a given `n`
/// since `count_ranged_pairs` recomputes `lo`/`hi` fresh from the cursor's
/// forward-only `idx` on every call, so interleaving distinct α's (distinct
/// δ's) at the same n is safe. Each α still accumulates into its own
/// `WindowInterval`, reset per bucket.
fn run_bucket_lockstep(
    n_range: (u64, u64),
    n_geom: u64,
    alphas: &[f64],
    stream: &PrimeStream,
    config: &RunConfig,
    cursor: &mut PairCursor,
    progress: &Progress,
) -> Result<Vec<SummaryRow>> {
    let mut windows: Vec<WindowInterval> = alphas.iter().map(|_| WindowInterval::new(n_geom)).collect();
    let (lo, hi) = n_range;
    for n in lo..hi {
        if n < 3 {
            continue;
        }
        for (alpha, window) in alphas.iter().zip(windows.iter_mut()) {
            let delta = compute_delta(n, *alpha, config.compat, config.euler_cap);
            let n_min = window_n_min(n, delta);
            let pc = cursor
                .count_ranged_pairs(n, n_min)
                .map_err(anyhow::Error::from)?;
            let c_n = (pc as f64) * normalizer(n, delta, config.include_trivial);
            let c_pred = if matches!(config.model, Model::HlA) {
                hl_a(n, stream).map_err(anyhow::Error::from)?
            } else {
                c_n
            };
            let (calign, cbound) = envelope_pair(n, delta, stream);
            window.update(n, pc, c_n, c_pred, calign, cbound);
            progress.record_n(1);
        }
    }
    for _ in alphas {
        progress.record_row();
    }
    Ok(windows.into_iter().map(|w| w.close(config.model)).collect())
}

pub fn run_summary(prime_raw_file: &Path, config: &RunConfig) -> Result<()> {
    let stream = PrimeStream::open_mmap(prime_raw_file).map_err(anyhow::Error::from)?;
    let progress = Progress::new();
    let reporter = progress.spawn_reporter(Duration::from_secs(30));

    let first = config.n_start.or(config.dec_n_start).unwrap_or(4);
    let last = config.n_end.or(config.dec_n_end).unwrap_or(stream.max_prime());

    match config.trace {
        TraceMode::Decade => {
            let dec_first = config.dec_n_start.unwrap_or(first);
            let dec_last = config.dec_n_end.unwrap_or(last);
            let buckets = DecadeScheduler::buckets(dec_first, dec_last);
            let mut cursor = PairCursor::new(&stream);
            let mut handles: Vec<RowHandles> = config
                .alphas
                .iter()
                .map(|alpha| open_row_handles(config, *alpha, "dec"))
                .collect::<Result<_>>()?;
            for bucket in &buckets {
                progress.set_current(format!("n_start={}", bucket.n_start));
                if bucket.n_start >= bucket.n_end {
                    continue; // resolved open question: empty bucket emits no row
                }
                let rows = run_bucket_lockstep(
                    (bucket.n_start, bucket.n_end),
                    bucket.n_geom(),
                    &config.alphas,
                    &stream,
                    config,
                    &mut cursor,
                    &progress,
                )?;
                for (row, handle) in rows.iter().zip(handles.iter()) {
                    if !row.count_is_zero() {
                        append_row(handle, row, config)?;
                    }
                }
            }
            for (alpha, handle) in config.alphas.iter().zip(handles) {
                finalize_row_handles(handle, config, *alpha, &config.dec_out)?;
            }
        }
        TraceMode::Primorial => {
            let prim_first = config.prim_n_start.unwrap_or(first);
            let prim_last = config.prim_n_end.unwrap_or(last);
            let seed_primes: Vec<u64> = stream.iter().take(PRIMORIAL_SEED_PRIMES).collect();
            let buckets = PrimorialScheduler::buckets(&seed_primes, prim_first, prim_last);
            let mut cursor = PairCursor::new(&stream);
            let mut handles: Vec<RowHandles> = config
                .alphas
                .iter()
                .map(|alpha| open_row_handles(config, *alpha, "prim"))
                .collect::<Result<_>>()?;
            for bucket in &buckets {
                progress.set_current(bucket.label());
                if bucket.n_start >= bucket.n_end {
                    continue;
                }
                let rows = run_bucket_lockstep(
                    (bucket.n_start, bucket.n_end),
                    bucket.n_end,
                    &config.alphas,
                    &stream,
                    config,
                    &mut cursor,
                    &progress,
                )?;
                for (row, handle) in rows.iter().zip(handles.iter()) {
                    if !row.count_is_zero() {
                        append_row(handle, row, config)?;
                    }
                }
            }
            for (alpha, handle) in config.alphas.iter().zip(handles) {
                finalize_row_handles(handle, config, *alpha, &config.prim_out)?;
            }
        }
        TraceMode::None => {}
    }

    progress.stop_reporting();
    let _ = reporter.join();
    Ok(())
}

/// Parses a CPS CSV's data rows into `MergeInputRow`s. `nstar` is left `None`
/// since the CPS file format (spec §6 item 5) does not carry it as a
/// separate column; the merger falls back to the run's last `delta_mertens`
/// in that case (see `merge::merge_run`).
pub fn run_merge(inputs: &[std::path::PathBuf], out: &Path, all_alpha: bool) -> Result<()> {
    use gbsieve::merge::{merge, merge_parallel, MergeInputRow};

    let mut rows = Vec::new();
    for path in inputs {
        let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        for line in content.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() < 13 {
                continue;
            }
            rows.push(MergeInputRow {
                alpha: fields[2].parse().unwrap_or(0.0),
                n_start: fields[0].parse().unwrap_or(0),
                n_end: fields[1].parse().unwrap_or(0),
                pre_mertens: fields[3].parse().ok(),
                mertens: fields[4].parse().unwrap_or(0.0),
                nstar: None,
                delta_mertens: fields[5].parse().unwrap_or(0.0),
                n_5percent: fields[6].parse().unwrap_or(0),
                nzero_stat: fields[7].parse().unwrap_or(0.0),
                eta_stat: fields[8].parse().unwrap_or(0.0),
                mertens_asymp: fields[9].parse().unwrap_or(0.0),
                delta_mertens_asymp: fields[10].parse().unwrap_or(0.0),
                nzero_stat_asymp: fields[11].parse().unwrap_or(0.0),
                eta_stat_asymp: fields[12].parse().unwrap_or(0.0),
            });
        }
    }

    let result = if all_alpha {
        merge_parallel(rows).map_err(anyhow::Error::from)?
    } else {
        merge(rows).map_err(anyhow::Error::from)?
    };
    for w in &result.warnings {
        warn!("{w}");
    }

    let mut f = std::fs::File::create(out).with_context(|| format!("creating {}", out.display()))?;
    writeln!(f, "{}", gbsieve::row::CpsRow::HEADER)?;
    for row in &result.rows {
        writeln!(f, "{}", row.to_csv_line())?;
    }
    info!(rows = result.rows.len(), warnings = result.warnings.len(), "merge complete");
    Ok(())
}

/// Emits spec §6 item 3's `gbpairs-*.csv` listing: one row per even target
/// in `[two_n_start, two_n_end]`, reporting the minimal Goldbach pair found
/// for that target (see `cursor::minimal_pair`). Rows must cover strictly
/// consecutive even targets with no gaps, so a missing pair is a fatal
/// invariant violation rather than a skipped row.
pub fn run_list_pairs(prime_raw_file: &Path, two_n_start: u64, two_n_end: u64, out: &Path) -> Result<()> {
    let stream = PrimeStream::open_mmap(prime_raw_file).map_err(anyhow::Error::from)?;
    let start = two_n_start + (two_n_start % 2);
    let mut f = fs::File::create(out).with_context(|| format!("creating {}", out.display()))?;
    writeln!(f, "{}", gbsieve::row::GbPairRow::HEADER)?;

    let mut emitted = 0usize;
    let mut two_n = start;
    while two_n <= two_n_end {
        match gbsieve::cursor::minimal_pair(two_n, &stream) {
            Some(row) => {
                writeln!(f, "{}", row.to_csv_line())?;
                emitted += 1;
            }
            None => {
                return Err(anyhow::Error::from(gbsieve::error::PipelineError::Invariant(format!(
                    "no Goldbach pair found for 2N={two_n} within stream coverage"
                ))));
            }
        }
        two_n += 2;
    }
    info!(rows = emitted, "pair listing complete");
    Ok(())
}

pub fn run_certify_bitmap(
    path: &Path,
    limit: u64,
    segment_size: u64,
    sample_rate: usize,
    verify_out: Option<&Path>,
) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let bitmap = PrimeBitmap::from_bytes(&bytes, limit);
    match gbsieve::certify::certify_bitmap(&bitmap, segment_size, sample_rate) {
        Ok(hash) => {
            let body = format!("OK: bitmap verified, fnv1a64={hash:016x}");
            println!("{body}");
            if let Some(out) = verify_out {
                gbsieve::certify::write_verify_file(out, &body, path)
                    .map_err(anyhow::Error::from)?;
            }
            Ok(())
        }
        Err(e) => {
            println!("{e}");
            Err(anyhow::Error::from(e))
        }
    }
}

pub fn run_certify_stream(
    path: &Path,
    segment_size: u64,
    sample_rate: usize,
    verify_out: Option<&Path>,
) -> Result<()> {
    let stream = PrimeStream::open_mmap(path).map_err(anyhow::Error::from)?;
    match gbsieve::certify::certify_stream(&stream, segment_size, sample_rate) {
        Ok(digest) => {
            let body = format!("OK: stream verified, digest={digest:016x}");
            println!("{body}");
            if let Some(out) = verify_out {
                gbsieve::certify::write_verify_file(out, &body, path)
                    .map_err(anyhow::Error::from)?;
            }
            Ok(())
        }
        Err(e) => {
            println!("{e}");
            Err(anyhow::Error::from(e))
        }
    }
}

/// Emits a `sha256sum`-equivalent line (spec §6 item 7) for an arbitrary
/// produced artifact (bitmap, stream, or CSV file).
pub fn run_sha256sum(path: &Path) -> Result<()> {
    let line = gbsieve::certify::sha256sum_line(path).map_err(anyhow::Error::from)?;
    println!("{line}");
    Ok(())
}

/// Independently re-verifies a `gbpairsummary-*.csv` against the prime
/// stream it was generated from (spec §4.9's third certifier): re-runs the
/// pair counter at each row's argmin/argmax points and checks the reported
/// `C_min`/`C_max`. Assumes the `full` schema column order (§6 item 4).
#[allow(clippy::too_many_arguments)]
pub fn run_certify_summary(
    csv_path: &Path,
    prime_raw_file: &Path,
    alpha: f64,
    compat: CompatFlavor,
    euler_cap: bool,
    include_trivial: bool,
    model: Model,
    verify_out: Option<&Path>,
) -> Result<()> {
    let stream = PrimeStream::open_mmap(prime_raw_file).map_err(anyhow::Error::from)?;
    let content = fs::read_to_string(csv_path).with_context(|| format!("reading {}", csv_path.display()))?;
    let mode = match model {
        Model::HlA => ToleranceMode::HlABand,
        Model::Empirical => ToleranceMode::Empirical6Dp,
    };

    let mut checked = 0usize;
    let mut report = String::new();
    for line in content.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 14 {
            return Err(anyhow::Error::from(gbsieve::error::PipelineError::Data(format!(
                "{} has too few fields ({}) for the full summary schema",
                csv_path.display(),
                fields.len()
            ))));
        }
        let row = SummaryRow {
            first: fields[0].parse().unwrap_or(0),
            last: fields[1].parse().unwrap_or(0),
            start: fields[2].parse().unwrap_or(0),
            min_at: fields[3].parse().unwrap_or(0),
            g_min: fields[4].parse().unwrap_or(0.0),
            max_at: fields[5].parse().unwrap_or(0),
            g_max: fields[6].parse().unwrap_or(0.0),
            n0: fields[7].parse().unwrap_or(0),
            c_min: fields[8].parse().unwrap_or(0.0),
            n1: fields[9].parse().unwrap_or(0),
            c_max: fields[10].parse().unwrap_or(0.0),
            n_geom: fields[11].parse().unwrap_or(0),
            count: fields[12].parse().unwrap_or(0),
            c_avg: fields[13].parse().unwrap_or(0.0),
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

        let delta_at_n0 = compute_delta(row.n0, alpha, compat, euler_cap);
        let delta_at_n1 = compute_delta(row.n1, alpha, compat, euler_cap);
        let message = gbsieve::certify::certify_pair_summary(
            &row,
            &stream,
            alpha,
            delta_at_n0,
            delta_at_n1,
            include_trivial,
            mode,
        )
        .map_err(anyhow::Error::from)?;
        println!("{message}");
        report.push_str(&message);
        report.push('\n');
        checked += 1;
    }

    if let Some(out) = verify_out {
        let body = report.trim_end();
        gbsieve::certify::write_verify_file(out, body, csv_path).map_err(anyhow::Error::from)?;
    }

    info!(rows_checked = checked, "summary certification complete");
    Ok(())
}
