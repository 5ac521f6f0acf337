//! # Checkpoint — Partial CSV Resumable Units
//!
//! Per spec §5: "the external driver treats `.partial.csv` files as
//! resumable units — a process writing a partial file must treat any
//! pre-existing partial file for the same (α, bucket-suffix) as its own
//! previous state and either overwrite or append per the driver's selected
//! policy." `PartialCsvHandle` is the write side of that contract: a
//! line-buffered append-only file (so a crashed process leaves a
//! well-formed prefix, per §5's ordering guarantee) plus an atomic
//! temp-file-then-rename finalize step, reusing the same crash-safety
//! pattern as `PrimeStream::write_raw`.

use crate::error::PipelineError;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePolicy {
    Overwrite,
    Append,
}

pub struct PartialCsvHandle {
    path: PathBuf,
}

impl PartialCsvHandle {
    /// Open (or create) the partial file for `(alpha, bucket_suffix)` under
    /// `dir`, applying `policy` to any pre-existing state for that key.
    pub fn open(
        dir: &Path,
        alpha: f64,
        bucket_suffix: &str,
        policy: ResumePolicy,
    ) -> Result<Self, PipelineError> {
        let path = dir.join(format!("gbpairsummary-{alpha}-{bucket_suffix}.partial.csv"));
        if policy == ResumePolicy::Overwrite && path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(PartialCsvHandle { path })
    }

    /// Lines already committed to the partial file, in order (empty if the
    /// file does not yet exist — the common case for `Overwrite` policy or a
    /// fresh run).
    pub fn existing_lines(&self) -> Result<Vec<String>, PipelineError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut out = Vec::new();
        for line in reader.lines() {
            out.push(line?);
        }
        Ok(out)
    }

    /// Append one line (without trailing newline) and flush immediately, so
    /// the file is always a well-formed prefix on crash.
    pub fn append_line(&self, line: &str) -> Result<(), PipelineError> {
        let mut f = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(f, "{line}")?;
        f.flush()?;
        Ok(())
    }

    /// Promote the partial file to its final path via rename (atomic on the
    /// same filesystem), consuming the resumable unit.
    pub fn finalize(self, final_path: &Path) -> Result<(), PipelineError> {
        fs::rename(&self.path, final_path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
