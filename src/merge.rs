//! # Merger / CPS Engine (C8)
//!
//! Merges per-chunk CPS rows for a single α (or all α's) into one contiguous
//! CSV per spec §4.8: group by α, sort by `n_start`, reject overlaps, warn on
//! gaps, and merge each maximal contiguous run into a single output row. Field
//! inheritance within a merged run follows §4.8's literal rules; `n_start`/
//! `n_end` here use the inclusive-`LAST` convention documented in DESIGN.md.

use crate::error::{GapWarning, PipelineError};
use crate::row::CpsRow;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// One input CPS row prior to merging (superset of `CpsRow` plus the
/// internal `nstar` field used only to pick `delta_mertens`, not emitted).
#[derive(Debug, Clone)]
pub struct MergeInputRow {
    pub alpha: f64,
    pub n_start: u64,
    pub n_end: u64,
    pub pre_mertens: Option<f64>,
    pub mertens: f64,
    pub nstar: Option<u64>,
    pub delta_mertens: f64,
    pub n_5percent: u64,
    pub nzero_stat: f64,
    pub eta_stat: f64,
    pub mertens_asymp: f64,
    pub delta_mertens_asymp: f64,
    pub nzero_stat_asymp: f64,
    pub eta_stat_asymp: f64,
}

pub struct MergeResult {
    pub rows: Vec<CpsRow>,
    pub warnings: Vec<GapWarning>,
}

/// Group rows by α (sorted ascending via `BTreeMap` over the bit pattern).
fn group_by_alpha(rows: Vec<MergeInputRow>) -> Vec<Vec<MergeInputRow>> {
    let mut by_alpha: BTreeMap<u64, Vec<MergeInputRow>> = BTreeMap::new();
    for r in rows {
        by_alpha.entry(r.alpha.to_bits()).or_default().push(r);
    }
    by_alpha.into_values().collect()
}

/// Sort one α's rows by `n_start`, reject overlaps, split into maximal
/// contiguous runs (warning on each gap), and merge each run into one row.
fn merge_group(mut group: Vec<MergeInputRow>) -> Result<(Vec<CpsRow>, Vec<GapWarning>), PipelineError> {
    group.sort_by_key(|r| r.n_start);

    for w in group.windows(2) {
        if w[0].n_end >= w[1].n_start {
            return Err(PipelineError::Overlap(format!(
                "alpha={}: rows [{},{}] and [{},{}] overlap",
                w[0].alpha, w[0].n_start, w[0].n_end, w[1].n_start, w[1].n_end
            )));
        }
    }

    let mut runs: Vec<Vec<MergeInputRow>> = Vec::new();
    let mut warnings = Vec::new();
    for r in group {
        let contiguous = runs
            .last()
            .and_then(|run| run.last())
            .map(|prev| prev.n_end + 1 == r.n_start)
            .unwrap_or(false);
        if contiguous {
            runs.last_mut().unwrap().push(r);
        } else {
            if let Some(run) = runs.last() {
                let prev = run.last().unwrap();
                warnings.push(GapWarning {
                    alpha: r.alpha,
                    prev_end: prev.n_end,
                    next_start: r.n_start,
                });
            }
            runs.push(vec![r]);
        }
    }

    let rows_out: Vec<CpsRow> = runs.iter().map(|run| merge_run(run)).collect();
    Ok((rows_out, warnings))
}

/// Merge a (possibly multi-α, possibly fragmented) set of rows. Returns
/// `Err(PipelineError::Overlap)` on the first overlapping pair found for any
/// α; gaps are collected as warnings alongside the merged rows.
pub fn merge(rows: Vec<MergeInputRow>) -> Result<MergeResult, PipelineError> {
    let mut out_rows = Vec::new();
    let mut warnings = Vec::new();

    for group in group_by_alpha(rows) {
        let (rows, group_warnings) = merge_group(group)?;
        out_rows.extend(rows);
        warnings.extend(group_warnings);
    }

    Ok(MergeResult {
        rows: out_rows,
        warnings,
    })
}

/// Same contract as `merge`, but processes each α's group independently via
/// rayon (spec.md §4.8 supplement's `--all-alpha` mode): distinct α groups
/// share no mutable state, so this is safe without any locking.
pub fn merge_parallel(rows: Vec<MergeInputRow>) -> Result<MergeResult, PipelineError> {
    let groups = group_by_alpha(rows);
    let results: Vec<Result<(Vec<CpsRow>, Vec<GapWarning>), PipelineError>> =
        groups.into_par_iter().map(merge_group).collect();

    let mut out_rows = Vec::new();
    let mut warnings = Vec::new();
    for result in results {
        let (rows, group_warnings) = result?;
        out_rows.extend(rows);
        warnings.extend(group_warnings);
    }

    Ok(MergeResult {
        rows: out_rows,
        warnings,
    })
}

fn merge_run(run: &[MergeInputRow]) -> CpsRow {
    let first = run.first().expect("merge_run called with empty run");
    let last = run.last().expect("merge_run called with empty run");

    let pre_mertens = run
        .iter()
        .find_map(|r| r.pre_mertens.filter(|&v| v >= first.n_start as f64))
        .or(first.pre_mertens);
    let effective_pre = pre_mertens.unwrap_or(0.0);

    let nstar_row = run
        .iter()
        .find(|r| r.nstar.map(|v| v as f64 > effective_pre).unwrap_or(false));
    let delta_mertens = nstar_row.map(|r| r.delta_mertens).unwrap_or(last.delta_mertens);

    let n_5percent = run.iter().find(|r| r.n_5percent != 0).map(|r| r.n_5percent).unwrap_or(0);

    let eta_row = run.iter().rev().find(|r| {
        r.nzero_stat > effective_pre && r.nzero_stat > n_5percent as f64 && r.eta_stat > 0.0
    });
    let (nzero_stat, eta_stat) = eta_row
        .map(|r| (r.nzero_stat, r.eta_stat))
        .unwrap_or((last.nzero_stat, last.eta_stat));

    CpsRow {
        first: first.n_start,
        last: last.n_end,
        alpha: first.alpha,
        pre_mertens,
        mertens: last.mertens,
        delta_mertens,
        n_5precent: n_5percent,
        nzero_stat,
        eta_stat,
        mertens_asymp: last.mertens_asymp,
        delta_mertens_asymp: last.delta_mertens_asymp,
        nzero_stat_asymp: last.nzero_stat_asymp,
        eta_stat_asymp: last.eta_stat_asymp,
    }
}
