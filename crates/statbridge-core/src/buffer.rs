//! Two-slot sample buffers.
//!
//! Each statistic group keeps its raw per-instance records in two rotating
//! slots (current and previous sample). Buffers only grow: a record that was
//! addressable once stays addressable with its contents intact, even if the
//! instance disappears from later samples.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::BufferError;

/// Sample generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Curr,
    Prev,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::Curr => Slot::Prev,
            Slot::Prev => Slot::Curr,
        }
    }

    fn idx(self) -> usize {
        match self {
            Slot::Curr => 0,
            Slot::Prev => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// SampleBuffer
// ---------------------------------------------------------------------------

/// Per-instance records of one group, for both sample slots.
#[derive(Clone, Debug, Default)]
pub struct SampleBuffer<R> {
    slots: [Vec<R>; 2],
    allocated: usize,
    observed: [usize; 2],
}

impl<R: Clone + Default> SampleBuffer<R> {
    pub fn new() -> Self {
        Self {
            slots: [Vec::new(), Vec::new()],
            allocated: 0,
            observed: [0, 0],
        }
    }

    /// Makes room for `count` instances in both slots and records `count` as
    /// the number of instances observed in `slot`.
    pub fn ensure_capacity(&mut self, slot: Slot, count: usize) {
        if count > self.allocated {
            for records in &mut self.slots {
                records.resize(count, R::default());
            }
            self.allocated = count;
        }
        self.observed[slot.idx()] = count;
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn observed(&self, slot: Slot) -> usize {
        self.observed[slot.idx()]
    }

    pub fn element_at(&self, slot: Slot, idx: usize) -> Result<&R, BufferError> {
        self.slots[slot.idx()]
            .get(idx)
            .ok_or(BufferError::IndexOutOfBounds {
                index: idx,
                allocated: self.allocated,
            })
    }

    pub fn element_at_mut(&mut self, slot: Slot, idx: usize) -> Result<&mut R, BufferError> {
        let allocated = self.allocated;
        self.slots[slot.idx()]
            .get_mut(idx)
            .ok_or(BufferError::IndexOutOfBounds {
                index: idx,
                allocated,
            })
    }

    /// Records observed in `slot`.
    pub fn observed_records(&self, slot: Slot) -> &[R] {
        &self.slots[slot.idx()][..self.observed(slot)]
    }

    /// Replaces the contents of `slot` with `records`, growing as needed.
    pub fn load(&mut self, slot: Slot, records: &[R]) {
        self.ensure_capacity(slot, records.len());
        self.slots[slot.idx()][..records.len()].clone_from_slice(records);
    }

    /// Copies the observed records of `from` over the other slot.
    pub fn copy_slot(&mut self, from: Slot) {
        let (src, dst) = (from.idx(), from.other().idx());
        let src_records = self.slots[src].clone();
        self.slots[dst].clone_from(&src_records);
        self.observed[dst] = self.observed[src];
    }

    /// Raises the observed count of `slot` to `count`, growing as needed.
    pub fn observe(&mut self, slot: Slot, count: usize) {
        let seen = self.observed(slot);
        self.ensure_capacity(slot, count.max(seen));
    }

    /// Resets every record of `slot` to its default. Allocation is kept.
    pub fn clear_slot(&mut self, slot: Slot) {
        self.slots[slot.idx()].fill(R::default());
        self.observed[slot.idx()] = 0;
    }

    /// Full allocated records of `curr` (mutable) and of the other slot.
    pub fn split_mut(&mut self, curr: Slot) -> (&mut [R], &[R]) {
        let [a, b] = &mut self.slots;
        match curr {
            Slot::Curr => (a.as_mut_slice(), b.as_slice()),
            Slot::Prev => (b.as_mut_slice(), a.as_slice()),
        }
    }
}

impl<R> Index<(Slot, usize)> for SampleBuffer<R> {
    type Output = R;

    fn index(&self, (slot, idx): (Slot, usize)) -> &R {
        let allocated = self.allocated;
        self.slots[slot.idx()]
            .get(idx)
            .unwrap_or_else(|| panic!("instance index {idx} out of bounds (allocated {allocated})"))
    }
}

impl<R> IndexMut<(Slot, usize)> for SampleBuffer<R> {
    fn index_mut(&mut self, (slot, idx): (Slot, usize)) -> &mut R {
        let allocated = self.allocated;
        self.slots[slot.idx()]
            .get_mut(idx)
            .unwrap_or_else(|| panic!("instance index {idx} out of bounds (allocated {allocated})"))
    }
}

// ---------------------------------------------------------------------------
// GridBuffer
// ---------------------------------------------------------------------------

/// Records addressed by `(cpu, line)`, for per-CPU-per-interrupt-line data.
///
/// Row 0 is CPU "all", line 0 is the "sum" line. A record lives at offset
/// `cpu * line_stride + line`.
#[derive(Clone, Debug, Default)]
pub struct GridBuffer<R> {
    slots: [Vec<R>; 2],
    cpus: usize,
    lines: usize,
    observed: [(usize, usize); 2],
}

impl<R: Clone + Default> GridBuffer<R> {
    pub fn new() -> Self {
        Self {
            slots: [Vec::new(), Vec::new()],
            cpus: 0,
            lines: 0,
            observed: [(0, 0); 2],
        }
    }

    /// Distance between two consecutive CPU rows.
    pub fn line_stride(&self) -> usize {
        self.lines
    }

    pub fn allocated(&self) -> (usize, usize) {
        (self.cpus, self.lines)
    }

    pub fn observed(&self, slot: Slot) -> (usize, usize) {
        self.observed[slot.idx()]
    }

    /// Grows to at least `cpus` rows of `lines` records. Existing records
    /// keep their `(cpu, line)` address when the row width changes.
    pub fn ensure_capacity(&mut self, slot: Slot, cpus: usize, lines: usize) {
        let new_cpus = self.cpus.max(cpus);
        let new_lines = self.lines.max(lines);
        if new_cpus != self.cpus || new_lines != self.lines {
            for records in &mut self.slots {
                let mut grown = vec![R::default(); new_cpus * new_lines];
                for cpu in 0..self.cpus {
                    let old = &records[cpu * self.lines..(cpu + 1) * self.lines];
                    grown[cpu * new_lines..cpu * new_lines + self.lines].clone_from_slice(old);
                }
                *records = grown;
            }
            self.cpus = new_cpus;
            self.lines = new_lines;
        }
        self.observed[slot.idx()] = (cpus, lines);
    }

    fn offset(&self, cpu: usize, line: usize) -> Result<usize, BufferError> {
        if cpu >= self.cpus || line >= self.lines {
            return Err(BufferError::IndexOutOfBounds {
                index: cpu * self.line_stride() + line,
                allocated: self.cpus * self.lines,
            });
        }
        Ok(cpu * self.line_stride() + line)
    }

    pub fn element_at(&self, slot: Slot, cpu: usize, line: usize) -> Result<&R, BufferError> {
        let off = self.offset(cpu, line)?;
        Ok(&self.slots[slot.idx()][off])
    }

    pub fn element_at_mut(
        &mut self,
        slot: Slot,
        cpu: usize,
        line: usize,
    ) -> Result<&mut R, BufferError> {
        let off = self.offset(cpu, line)?;
        Ok(&mut self.slots[slot.idx()][off])
    }

    /// Row of CPU `cpu` in `slot`.
    pub fn row(&self, slot: Slot, cpu: usize) -> &[R] {
        let start = cpu * self.lines;
        &self.slots[slot.idx()][start..start + self.lines]
    }

    pub fn row_mut(&mut self, slot: Slot, cpu: usize) -> &mut [R] {
        let start = cpu * self.lines;
        let end = start + self.lines;
        &mut self.slots[slot.idx()][start..end]
    }

    pub fn copy_slot(&mut self, from: Slot) {
        let (src, dst) = (from.idx(), from.other().idx());
        let src_records = self.slots[src].clone();
        self.slots[dst].clone_from(&src_records);
        self.observed[dst] = self.observed[src];
    }

    pub fn clear_slot(&mut self, slot: Slot) {
        self.slots[slot.idx()].fill(R::default());
        self.observed[slot.idx()] = (0, 0);
    }

    /// Raises the observed CPU and line counts of `slot` without shrinking them.
    pub fn observe(&mut self, slot: Slot, cpus: usize, lines: usize) {
        let (c, l) = self.observed[slot.idx()];
        self.ensure_capacity(slot, cpus, lines);
        self.observed[slot.idx()] = (c.max(cpus), l.max(lines));
    }
}

impl<R> Index<(Slot, usize, usize)> for GridBuffer<R> {
    type Output = R;

    fn index(&self, (slot, cpu, line): (Slot, usize, usize)) -> &R {
        assert!(
            cpu < self.cpus && line < self.lines,
            "grid index ({cpu}, {line}) out of bounds (allocated {}x{})",
            self.cpus,
            self.lines
        );
        &self.slots[slot.idx()][cpu * self.lines + line]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_growth_preserves_records() {
        let mut buf: SampleBuffer<u64> = SampleBuffer::new();
        buf.ensure_capacity(Slot::Curr, 2);
        buf[(Slot::Curr, 1)] = 42;
        buf[(Slot::Prev, 0)] = 7;

        buf.ensure_capacity(Slot::Curr, 8);
        assert_eq!(buf.allocated(), 8);
        assert_eq!(buf[(Slot::Curr, 1)], 42);
        assert_eq!(buf[(Slot::Prev, 0)], 7);
        assert_eq!(buf[(Slot::Curr, 7)], 0);
    }

    #[test]
    fn test_never_shrinks() {
        let mut buf: SampleBuffer<u32> = SampleBuffer::new();
        buf.ensure_capacity(Slot::Curr, 4);
        buf.ensure_capacity(Slot::Curr, 1);
        assert_eq!(buf.allocated(), 4);
        assert_eq!(buf.observed(Slot::Curr), 1);
        assert_eq!(buf.observed_records(Slot::Curr).len(), 1);
    }

    #[test]
    fn test_element_at_bounds() {
        let mut buf: SampleBuffer<u32> = SampleBuffer::new();
        buf.ensure_capacity(Slot::Prev, 3);
        assert!(buf.element_at(Slot::Curr, 2).is_ok());
        assert_eq!(
            buf.element_at(Slot::Curr, 3),
            Err(BufferError::IndexOutOfBounds {
                index: 3,
                allocated: 3,
            })
        );
        assert!(buf.element_at_mut(Slot::Prev, 9).is_err());
    }

    #[test]
    #[should_panic(expected = "instance index 3 out of bounds")]
    fn test_index_past_allocation_panics() {
        let mut buf: SampleBuffer<u32> = SampleBuffer::new();
        buf.ensure_capacity(Slot::Curr, 3);
        let _ = buf[(Slot::Curr, 3)];
    }

    #[test]
    fn test_copy_slot() {
        let mut buf: SampleBuffer<u32> = SampleBuffer::new();
        buf.load(Slot::Curr, &[1, 2, 3]);
        buf.copy_slot(Slot::Curr);
        assert_eq!(buf.observed_records(Slot::Prev), &[1, 2, 3]);
    }

    #[test]
    fn test_grid_addressing_survives_line_growth() {
        let mut grid: GridBuffer<u32> = GridBuffer::new();
        grid.ensure_capacity(Slot::Curr, 3, 2);
        assert_eq!(grid.line_stride(), 2);
        *grid.element_at_mut(Slot::Curr, 2, 1).unwrap() = 21;
        *grid.element_at_mut(Slot::Curr, 1, 0).unwrap() = 10;

        grid.ensure_capacity(Slot::Curr, 3, 5);
        assert_eq!(grid.line_stride(), 5);
        assert_eq!(grid[(Slot::Curr, 2, 1)], 21);
        assert_eq!(grid[(Slot::Curr, 1, 0)], 10);
        assert_eq!(grid.row(Slot::Curr, 2), &[0, 21, 0, 0, 0]);

        grid.ensure_capacity(Slot::Curr, 4, 5);
        assert_eq!(grid.allocated(), (4, 5));
        assert_eq!(grid[(Slot::Curr, 2, 1)], 21);
        assert!(grid.element_at(Slot::Curr, 4, 0).is_err());
        assert!(grid.element_at(Slot::Curr, 0, 5).is_err());
    }

    proptest! {
        #[test]
        fn allocation_is_running_max(counts in proptest::collection::vec(0usize..64, 1..20)) {
            let mut buf: SampleBuffer<u64> = SampleBuffer::new();
            let mut written: Vec<(usize, u64)> = Vec::new();
            for (step, &count) in counts.iter().enumerate() {
                buf.ensure_capacity(Slot::Curr, count);
                for &(idx, val) in &written {
                    prop_assert_eq!(buf[(Slot::Curr, idx)], val);
                }
                if count > 0 {
                    let idx = step % count;
                    buf[(Slot::Curr, idx)] = step as u64 + 1;
                    written.retain(|&(i, _)| i != idx);
                    written.push((idx, step as u64 + 1));
                }
            }
            prop_assert_eq!(buf.allocated(), counts.iter().copied().max().unwrap_or(0));
        }
    }
}
