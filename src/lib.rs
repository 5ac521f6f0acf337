//! # gbsieve — Core Library
//!
//! A reproducible sieve-theoretic Goldbach pair counter: an odd-only
//! segmented sieve feeds a sequential prime stream, a streaming two-pointer
//! cursor counts ordered Goldbach pairs inside a window around each `n`, and
//! a window aggregator folds those counts (plus a Hardy–Littlewood
//! prediction and a CRT-inspired remainder envelope) into decade and
//! primorial bucket rows. A merger stitches per-chunk CSVs back together and
//! a certifier independently re-verifies them.
//!
//! ## Module organization
//!
//! - [`sieve`] — odd-only segmented prime bitmap (C1)
//! - [`primestore`] — bitmap → ordered uint64 prime stream, in-memory or mmap'd (C2)
//! - [`cursor`] — streaming two-pointer Goldbach pair counter (C3)
//! - [`hla`] — Hardy–Littlewood A prediction 2S_GB(2n) (C4)
//! - [`envelope`] — CRT-inspired analytic remainder bound R(δ,n) (C5)
//! - [`aggregator`] — per-(α,bucket) window accumulator (C6)
//! - [`bucket`] — decade and primorial bucket schedulers (C7)
//! - [`merge`] — per-chunk CSV merger and CPS lower-bound derivation (C8)
//! - [`certify`] — independent bitmap/stream/summary re-verification (C9)
//! - [`config`] — resolved run configuration and compat flavors
//! - [`row`] — CSV record types and header schemas
//! - [`error`] — error kinds, exit codes, TAINTED handling
//! - [`checkpoint`] — partial-CSV resumable-unit handling
//! - [`progress`] — background run progress reporting
//!
//! `cli` (subcommand argument parsing and dispatch) is private to the
//! `gbsieve` binary and declared in `main.rs`, not part of this library.

pub mod aggregator;
pub mod bucket;
pub mod certify;
pub mod checkpoint;
pub mod config;
pub mod cursor;
pub mod envelope;
pub mod error;
pub mod hla;
pub mod merge;
pub mod primestore;
pub mod progress;
pub mod row;
pub mod sieve;
