//! Instance selection and offline filtering.
//!
//! Bitmaps are addressed by instance index: 0 is the aggregate "all"
//! instance, `i` is CPU `i - 1`.

use serde::{Deserialize, Serialize};

use crate::model::CpuStats;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    words: Vec<u64>,
    size: usize,
}

impl Bitmap {
    /// Empty bitmap able to address `size` indices.
    pub fn new(size: usize) -> Self {
        Self {
            words: vec![0; size.div_ceil(64)],
            size,
        }
    }

    /// Bitmap with every index below `size` set.
    pub fn all(size: usize) -> Self {
        let mut bm = Self::new(size);
        for idx in 0..size {
            bm.set(idx);
        }
        bm
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Sets `idx`, growing the bitmap when needed.
    pub fn set(&mut self, idx: usize) {
        if idx >= self.size {
            self.size = idx + 1;
            self.words.resize(self.size.div_ceil(64), 0);
        }
        self.words[idx / 64] |= 1 << (idx % 64);
    }

    pub fn clear(&mut self, idx: usize) {
        if idx < self.size {
            self.words[idx / 64] &= !(1 << (idx % 64));
        }
    }

    /// Indices past the end read as unset.
    pub fn is_set(&self, idx: usize) -> bool {
        idx < self.size && self.words[idx / 64] & (1 << (idx % 64)) != 0
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).filter(|&i| self.is_set(i))
    }
}

impl FromIterator<usize> for Bitmap {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bm = Bitmap::default();
        for idx in iter {
            bm.set(idx);
        }
        bm
    }
}

/// True when instance `idx` is selected and not offline.
pub fn should_emit(idx: usize, selection: &Bitmap, offline: &Bitmap) -> bool {
    selection.is_set(idx) && !offline.is_set(idx)
}

/// True when CPU instance `idx` did not tick during the interval.
///
/// The aggregate instance is never tickless.
pub fn is_tickless_cpu(idx: usize, offline: &Bitmap, interval: u64) -> bool {
    idx > 0 && !offline.is_set(idx) && interval == 0
}

/// Record emitted for a tickless CPU: all buckets zero, idle 100.
pub fn synthesize_tickless() -> CpuStats {
    CpuStats {
        idle: 100,
        ..CpuStats::default()
    }
}

/// Whether the "all" instance is computed by aggregating units. On a
/// single-unit system the interval comes from the only unit directly.
pub fn aggregate_all_instance(nr_ini: usize) -> bool {
    nr_ini > 1
}
