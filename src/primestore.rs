//! # Prime Store — Sequential Prime Stream (C2)
//!
//! Converts a `PrimeBitmap` into the ordered sequence described in spec §4.2:
//! primes in ascending order, first element the literal 2, as a little-endian
//! uint64 stream. `PrimeStream` is the read-only view shared by the cursor,
//! HL-A predictor, envelope, merger, and certifier; it can be backed either
//! by an owned in-memory `Vec<u64>` (chaining C1→C2 without a disk
//! round-trip) or by a memory-mapped `.raw` file.
//!
//! ## mmap lifetime
//!
//! `open_mmap` models the scoped-acquisition pattern from the design notes:
//! the mapping is `MAP_PRIVATE` read-only and is unmapped when the returned
//! `PrimeStream` (and its underlying `Mmap`) is dropped — there is no path
//! that leaks the mapping.

use crate::error::PipelineError;
use crate::sieve::PrimeBitmap;
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

enum Backing {
    Owned(Vec<u64>),
    Mapped(Mmap),
}

/// Ordered sequence of primes, first element 2, strictly increasing.
pub struct PrimeStream {
    backing: Backing,
}

impl PrimeStream {
    /// Build the stream directly from a sieved bitmap, without touching disk.
    pub fn from_bitmap(bitmap: &PrimeBitmap) -> Self {
        let mut v = Vec::with_capacity(bitmap.count_ones() + 1);
        v.push(2);
        v.extend(bitmap.iter_odd_primes());
        PrimeStream {
            backing: Backing::Owned(v),
        }
    }

    /// Build the stream from an already-ordered slice (used in tests and by
    /// callers assembling a stream from another source).
    pub fn from_values(values: Vec<u64>) -> Self {
        PrimeStream {
            backing: Backing::Owned(values),
        }
    }

    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::Owned(v) => v.len(),
            Backing::Mapped(m) => m.len() / 8,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest prime covered by this stream, or 0 if empty.
    pub fn max_prime(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.get(self.len() - 1)
        }
    }

    #[inline]
    pub fn get(&self, idx: usize) -> u64 {
        match &self.backing {
            Backing::Owned(v) => v[idx],
            Backing::Mapped(m) => {
                let off = idx * 8;
                u64::from_le_bytes(m[off..off + 8].try_into().unwrap())
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Binary-search membership test: true iff `v` appears in the stream.
    pub fn contains(&self, v: u64) -> bool {
        let mut lo = 0usize;
        let mut hi = self.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.get(mid).cmp(&v) {
                std::cmp::Ordering::Equal => return true,
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        false
    }

    /// Write the stream to `path` as a contiguous little-endian uint64 file,
    /// via a temp-file-then-rename so a crashed writer leaves no partial file
    /// at the final path (spec §5: "a crashed process leaves a well-formed prefix").
    pub fn write_raw(&self, path: &Path) -> Result<(), PipelineError> {
        let tmp = path.with_extension("raw.tmp");
        {
            let mut f = File::create(&tmp)?;
            let mut buf = Vec::with_capacity(self.len() * 8);
            for v in self.iter() {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            f.write_all(&buf)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Open an existing `.raw` file as a read-only `MAP_PRIVATE` view.
    pub fn open_mmap(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path)?;
        let meta = file.metadata()?;
        if meta.len() % 8 != 0 {
            return Err(PipelineError::Data(format!(
                "{} is not a whole number of uint64 values ({} bytes)",
                path.display(),
                meta.len()
            )));
        }
        // SAFETY: the file is opened read-only and not concurrently truncated
        // by this process; memmap2's usual caveat about external mutation of
        // the backing file applies, as with any mmap of a file we do not own.
        let mmap = unsafe { Mmap::map(&file)? };
        let stream = PrimeStream {
            backing: Backing::Mapped(mmap),
        };
        if !stream.is_empty() && stream.get(0) != 2 {
            return Err(PipelineError::Data(format!(
                "{}: first value must be 2, got {}",
                path.display(),
                stream.get(0)
            )));
        }
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sieve::sieve_to;

    #[test]
    fn from_bitmap_starts_with_two() {
        let bm = sieve_to(100);
        let ps = PrimeStream::from_bitmap(&bm);
        assert_eq!(ps.get(0), 2);
        assert_eq!(ps.len(), 25);
    }

    #[test]
    fn strictly_increasing() {
        let bm = sieve_to(1000);
        let ps = PrimeStream::from_bitmap(&bm);
        for i in 1..ps.len() {
            assert!(ps.get(i) > ps.get(i - 1));
        }
    }

    #[test]
    fn write_and_mmap_roundtrip() {
        let bm = sieve_to(1000);
        let ps = PrimeStream::from_bitmap(&bm);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("primes.raw");
        ps.write_raw(&path).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.len(), ps.len() as u64 * 8);

        let mapped = PrimeStream::open_mmap(&path).unwrap();
        assert_eq!(mapped.len(), ps.len());
        for i in 0..ps.len() {
            assert_eq!(mapped.get(i), ps.get(i));
        }
    }

    #[test]
    fn open_mmap_rejects_misaligned_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.raw");
        std::fs::write(&path, [0u8; 5]).unwrap();
        assert!(PrimeStream::open_mmap(&path).is_err());
    }

    #[test]
    fn max_prime_reports_last_value() {
        let ps = PrimeStream::from_values(vec![2, 3, 5, 7, 11]);
        assert_eq!(ps.max_prime(), 11);
    }

    #[test]
    fn contains_matches_membership() {
        let bm = sieve_to(1000);
        let ps = PrimeStream::from_bitmap(&bm);
        assert!(ps.contains(2));
        assert!(ps.contains(97));
        assert!(!ps.contains(98));
        assert!(!ps.contains(1001));
    }
}
