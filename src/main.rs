//! # Main — CLI Entry Point
//!
//! Routes subcommands to the sieve/store/summary/merge/certify engines.
//!
//! ## Subcommands
//!
//! - `sieve`: produce a `*.bitmap` file for a given limit.
//! - `store`: convert a `*.bitmap` into a `*.raw` prime stream.
//! - `summary`: the summary engine described in full in the external
//!   interfaces — counts Goldbach pairs per α across a decade/primorial
//!   bucket schedule and emits `gbpairsummary-*.csv` rows.
//! - `merge`: stitch per-chunk CPS CSVs for one or all α's into one
//!   contiguous CSV.
//! - `certify`: independently re-verify a bitmap, stream, or summary CSV.
//!   Each target accepts `--verify-out` to additionally write a `*.verify`
//!   file carrying a trailing `sha256=<hex>` line.
//! - `sha256-sum`: print a `sha256sum`-compatible digest line for any file.
//!
//! ## Global options
//!
//! - `--threads`: Rayon thread pool size (0 = all cores).

mod cli;

use clap::{Parser, Subcommand};
use gbsieve::config::{CompatFlavor, Model, TraceMode};
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "gbsieve", about = "Sieve-theoretic Goldbach pair counter and summary engine")]
struct Cli {
    /// Rayon thread pool size (0 = use all cores)
    #[arg(long, global = true, default_value_t = 0)]
    threads: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sieve primes up to a limit, writing an odd-only bitmap.
    Sieve {
        limit: u64,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        segment_size: Option<u64>,
    },
    /// Convert a bitmap file into a sequential prime-stream (.raw) file.
    Store {
        bitmap: PathBuf,
        limit: u64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Run the summary engine over a prime-stream file.
    Summary {
        prime_raw_file: PathBuf,

        #[arg(long = "alpha")]
        alpha: Vec<f64>,

        #[arg(long, default_value = "decade")]
        trace: String,

        #[arg(long, default_value = "empirical")]
        model: String,

        #[arg(long)]
        dec_n_start: Option<u64>,
        #[arg(long)]
        dec_n_end: Option<u64>,
        #[arg(long)]
        prim_n_start: Option<u64>,
        #[arg(long)]
        prim_n_end: Option<u64>,
        #[arg(long)]
        n_start: Option<u64>,
        #[arg(long)]
        n_end: Option<u64>,

        #[arg(long)]
        dec_out: Option<String>,
        #[arg(long)]
        prim_out: Option<String>,

        #[arg(long, default_value = "current")]
        compat: String,

        #[arg(long, default_value_t = true)]
        euler_cap: bool,
        #[arg(long, default_value_t = false)]
        no_euler_cap: bool,

        #[arg(long, default_value_t = false)]
        append: bool,
        #[arg(long, default_value_t = false)]
        no_append: bool,

        #[arg(long, default_value_t = false)]
        include_trivial: bool,

        #[arg(long, default_value_t = false)]
        config_line: bool,
    },
    /// Emit a gbpairs-*.csv listing of minimal Goldbach pairs over a 2N range.
    ListPairs {
        prime_raw_file: PathBuf,
        two_n_start: u64,
        two_n_end: u64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Merge per-chunk CPS CSVs into one contiguous CSV.
    Merge {
        #[arg(long)]
        input: Vec<PathBuf>,
        #[arg(long)]
        out: PathBuf,
        /// Merge each alpha's rows independently via the rayon thread pool.
        #[arg(long, default_value_t = false)]
        all_alpha: bool,
    },
    /// Independently re-verify a bitmap, stream, or summary CSV.
    Certify {
        #[command(subcommand)]
        what: CertifyTarget,
    },
    /// Print a `sha256sum`-compatible digest line for an artifact file.
    Sha256Sum { path: PathBuf },
}

#[derive(Subcommand)]
enum CertifyTarget {
    Bitmap {
        path: PathBuf,
        limit: u64,
        #[arg(long, default_value_t = gbsieve::sieve::MIN_SEGMENT_SIZE)]
        segment_size: u64,
        /// Check every Nth bit instead of every bit (trades completeness for speed).
        #[arg(long, default_value_t = 1)]
        sample_rate: usize,
        /// Write a *.verify file (certifier text plus a trailing sha256= line).
        #[arg(long)]
        verify_out: Option<PathBuf>,
    },
    Stream {
        path: PathBuf,
        #[arg(long, default_value_t = gbsieve::sieve::MIN_SEGMENT_SIZE)]
        segment_size: u64,
        #[arg(long, default_value_t = 1)]
        sample_rate: usize,
        #[arg(long)]
        verify_out: Option<PathBuf>,
    },
    /// Re-verify a gbpairsummary-*.csv against the prime stream it came from.
    Summary {
        csv: PathBuf,
        #[arg(long)]
        prime_raw_file: PathBuf,
        #[arg(long, default_value_t = 0.5)]
        alpha: f64,
        #[arg(long, default_value = "current")]
        compat: String,
        #[arg(long, default_value_t = true)]
        euler_cap: bool,
        #[arg(long, default_value_t = false)]
        include_trivial: bool,
        #[arg(long, default_value = "empirical")]
        model: String,
        #[arg(long)]
        verify_out: Option<PathBuf>,
    },
}

fn resolve_compat(s: &str) -> anyhow::Result<CompatFlavor> {
    CompatFlavor::parse(s).map_err(anyhow::Error::from)
}

fn resolve_trace(s: &str) -> anyhow::Result<TraceMode> {
    TraceMode::parse(s).map_err(anyhow::Error::from)
}

fn resolve_model(s: &str) -> anyhow::Result<Model> {
    Model::parse(s).map_err(anyhow::Error::from)
}

fn main() -> anyhow::Result<()> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt().json().with_target(false).init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli_args = Cli::parse();
    cli::configure_rayon(cli_args.threads);

    let exit_code = match &cli_args.command {
        Commands::Sieve { limit, out, segment_size } => cli::run_sieve(*limit, out, *segment_size),
        Commands::Store { bitmap, limit, out } => cli::run_store(bitmap, *limit, out),
        Commands::Summary {
            prime_raw_file,
            alpha,
            trace,
            model,
            dec_n_start,
            dec_n_end,
            prim_n_start,
            prim_n_end,
            n_start,
            n_end,
            dec_out,
            prim_out,
            compat,
            euler_cap,
            no_euler_cap,
            append,
            no_append,
            include_trivial,
            config_line,
        } => {
            let config = gbsieve::config::RunConfig {
                alphas: gbsieve::config::RunConfig::normalize_alphas(alpha.clone()),
                trace: resolve_trace(trace)?,
                model: resolve_model(model)?,
                dec_n_start: *dec_n_start,
                dec_n_end: *dec_n_end,
                prim_n_start: *prim_n_start,
                prim_n_end: *prim_n_end,
                n_start: *n_start,
                n_end: *n_end,
                dec_out: dec_out.clone(),
                prim_out: prim_out.clone(),
                compat: resolve_compat(compat)?,
                euler_cap: *euler_cap && !*no_euler_cap,
                append: *append && !*no_append,
                include_trivial: *include_trivial,
                segment_size: gbsieve::sieve::MIN_SEGMENT_SIZE,
            };
            if *config_line {
                eprintln!("{}", serde_json::to_string(&config)?);
            }
            cli::run_summary(prime_raw_file, &config)
        }
        Commands::ListPairs {
            prime_raw_file,
            two_n_start,
            two_n_end,
            out,
        } => cli::run_list_pairs(prime_raw_file, *two_n_start, *two_n_end, out),
        Commands::Merge { input, out, all_alpha } => cli::run_merge(input, out, *all_alpha),
        Commands::Certify { what } => match what {
            CertifyTarget::Bitmap { path, limit, segment_size, sample_rate, verify_out } => {
                cli::run_certify_bitmap(path, *limit, *segment_size, *sample_rate, verify_out.as_deref())
            }
            CertifyTarget::Stream { path, segment_size, sample_rate, verify_out } => {
                cli::run_certify_stream(path, *segment_size, *sample_rate, verify_out.as_deref())
            }
            CertifyTarget::Summary {
                csv,
                prime_raw_file,
                alpha,
                compat,
                euler_cap,
                include_trivial,
                model,
                verify_out,
            } => cli::run_certify_summary(
                csv,
                prime_raw_file,
                *alpha,
                resolve_compat(compat)?,
                *euler_cap,
                *include_trivial,
                resolve_model(model)?,
                verify_out.as_deref(),
            ),
        },
        Commands::Sha256Sum { path } => cli::run_sha256sum(path),
    };

    if let Err(e) = &exit_code {
        if let Some(pipeline_err) = e.downcast_ref::<gbsieve::error::PipelineError>() {
            eprintln!("{pipeline_err}");
            std::process::exit(pipeline_err.exit_code());
        }
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
