//! Counter-delta engine.
//!
//! Works out, per sample, which CPUs are offline, what the "all" aggregate
//! record holds, and how many ticks elapsed on each CPU.

use crate::buffer::{GridBuffer, Slot};
use crate::filter::Bitmap;
use crate::model::{CpuStats, SoftnetStats};

pub trait CounterDeltas {
    /// Ticks elapsed on one CPU between two samples. Zero means the CPU was
    /// tickless over the interval.
    fn per_cpu_interval(&self, curr: &CpuStats, prev: &CpuStats) -> u64;

    /// Recomputes record 0 as the sum of CPUs `1..nr`, marks offline CPUs in
    /// `offline` and returns the interval summed over online CPUs.
    fn global_cpu(
        &self,
        curr: &mut [CpuStats],
        prev: &[CpuStats],
        nr: usize,
        offline: &mut Bitmap,
    ) -> u64;

    /// Same as [`CounterDeltas::global_cpu`] for softnet counters.
    fn global_softnet(
        &self,
        curr: &mut [SoftnetStats],
        prev: &[SoftnetStats],
        nr: usize,
        offline: &mut Bitmap,
    );

    /// Recomputes row 0 of the interrupt grid as the per-line sum of CPU
    /// rows `1..nr` and marks CPUs whose row is entirely zero as offline.
    fn global_irq(&self, grid: &mut GridBuffer<u64>, slot: Slot, nr: usize, offline: &mut Bitmap);
}

// ---- Default engine ----

fn cpu_ticks(c: &CpuStats) -> u64 {
    // guest and guest_nice are already accounted in user and nice
    [
        c.nice, c.sys, c.idle, c.iowait, c.hardirq, c.softirq, c.steal,
    ]
    .into_iter()
    .fold(c.user, u64::wrapping_add)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultDeltas;

impl CounterDeltas for DefaultDeltas {
    fn per_cpu_interval(&self, curr: &CpuStats, prev: &CpuStats) -> u64 {
        cpu_ticks(curr).saturating_sub(cpu_ticks(prev))
    }

    fn global_cpu(
        &self,
        curr: &mut [CpuStats],
        prev: &[CpuStats],
        nr: usize,
        offline: &mut Bitmap,
    ) -> u64 {
        let nr = nr.min(curr.len()).min(prev.len());
        let mut all = CpuStats::default();
        let mut deltot: u64 = 0;

        for i in 1..nr {
            if curr[i].is_zero() {
                // Offline: keep last known counters so "all" stays monotonic.
                offline.set(i);
                curr[i] = prev[i];
            } else {
                let interval = self.per_cpu_interval(&curr[i], &prev[i]);
                deltot = deltot.wrapping_add(interval);
            }
            let c = &curr[i];
            all.user = all.user.wrapping_add(c.user);
            all.nice = all.nice.wrapping_add(c.nice);
            all.sys = all.sys.wrapping_add(c.sys);
            all.idle = all.idle.wrapping_add(c.idle);
            all.iowait = all.iowait.wrapping_add(c.iowait);
            all.steal = all.steal.wrapping_add(c.steal);
            all.hardirq = all.hardirq.wrapping_add(c.hardirq);
            all.softirq = all.softirq.wrapping_add(c.softirq);
            all.guest = all.guest.wrapping_add(c.guest);
            all.guest_nice = all.guest_nice.wrapping_add(c.guest_nice);
        }

        if let Some(first) = curr.first_mut() {
            *first = all;
        }
        deltot
    }

    fn global_softnet(
        &self,
        curr: &mut [SoftnetStats],
        prev: &[SoftnetStats],
        nr: usize,
        offline: &mut Bitmap,
    ) {
        let nr = nr.min(curr.len()).min(prev.len());
        let mut all = SoftnetStats::default();

        for i in 1..nr {
            if curr[i].is_zero() {
                offline.set(i);
                curr[i] = prev[i];
            }
            let s = &curr[i];
            all.processed = all.processed.wrapping_add(s.processed);
            all.dropped = all.dropped.wrapping_add(s.dropped);
            all.time_squeeze = all.time_squeeze.wrapping_add(s.time_squeeze);
            all.received_rps = all.received_rps.wrapping_add(s.received_rps);
            all.flow_limit = all.flow_limit.wrapping_add(s.flow_limit);
            all.backlog_len = all.backlog_len.wrapping_add(s.backlog_len);
        }

        if let Some(first) = curr.first_mut() {
            *first = all;
        }
    }

    fn global_irq(&self, grid: &mut GridBuffer<u64>, slot: Slot, nr: usize, offline: &mut Bitmap) {
        let (cpus, lines) = grid.allocated();
        let nr = nr.min(cpus);
        if nr == 0 {
            return;
        }
        let mut sums = vec![0u64; lines];
        for cpu in 1..nr {
            let row = grid.row(slot, cpu);
            if row.iter().all(|&c| c == 0) {
                offline.set(cpu);
                continue;
            }
            for (sum, &count) in sums.iter_mut().zip(row) {
                *sum = sum.wrapping_add(count);
            }
        }
        if nr > 1 {
            grid.row_mut(slot, 0).copy_from_slice(&sums);
        }
    }
}
