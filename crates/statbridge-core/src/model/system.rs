//! System-wide statistic records.
//!
//! These structures hold the already-decoded counters the activity monitor
//! collects at every polling interval. Cumulative counters are kept raw; the
//! bridge never turns them into rates.

use serde::{Deserialize, Serialize};

/// Archive-level header, written once with the first record.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FileHeader {
    /// Number of processors seen by the collector.
    pub ncpu: u32,
    /// Clock ticks per second (`CONFIG_HZ`).
    pub hz: u32,
    /// Operating system name, e.g. `Linux`.
    pub sysname: String,
    /// Kernel release.
    pub release: String,
    pub nodename: String,
    /// Hardware architecture, e.g. `x86_64`.
    pub machine: String,
}

/// Per-record header.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RecordHeader {
    /// Machine uptime in hundredths of a second.
    pub uptime_cs: u64,
}

/// CPU time counters.
///
/// Source: `/proc/stat`
///
/// Record 0 of the CPU group is the aggregate "all" CPU, record `i` is CPU
/// `i - 1`. As in the kernel, `user` includes `guest` and `nice` includes
/// `guest_nice`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CpuStats {
    /// Time spent in user mode (ticks).
    pub user: u64,
    /// Time spent in user mode with low priority (ticks).
    pub nice: u64,
    /// Time spent in kernel mode (ticks).
    pub sys: u64,
    /// Time spent idle (ticks).
    pub idle: u64,
    /// Time waiting for I/O to complete (ticks).
    pub iowait: u64,
    /// Time stolen by the hypervisor (ticks).
    pub steal: u64,
    /// Time servicing hardware interrupts (ticks).
    pub hardirq: u64,
    /// Time servicing software interrupts (ticks).
    pub softirq: u64,
    /// Time running a guest OS (ticks).
    pub guest: u64,
    /// Time running a niced guest OS (ticks).
    pub guest_nice: u64,
}

impl CpuStats {
    /// True when every counter is zero, which is how an offline CPU shows up.
    pub fn is_zero(&self) -> bool {
        *self == CpuStats::default()
    }
}

/// Task creation and context switch counters.
///
/// Source: `/proc/stat` (`ctxt`, `processes`)
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PcswStats {
    /// Total number of context switches.
    pub context_switch: u64,
    /// Total number of tasks created.
    pub processes: u64,
}

/// Interrupt counts for one sample.
///
/// Source: `/proc/interrupts` and `/proc/stat` (`intr`)
///
/// `lines[0]` is the "sum" line. `counts[cpu][line]` holds the count of
/// `line` on `cpu`, where row 0 is CPU "all".
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct IrqSample {
    pub lines: Vec<String>,
    pub counts: Vec<Vec<u64>>,
}

/// Swapping counters.
///
/// Source: `/proc/vmstat` (`pswpin`, `pswpout`)
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SwapStats {
    /// Pages swapped in.
    pub pswpin: u32,
    /// Pages swapped out.
    pub pswpout: u64,
}

/// Paging counters.
///
/// Source: `/proc/vmstat`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PagingStats {
    /// Kilobytes paged in from disk.
    pub pgpgin: u64,
    /// Kilobytes paged out to disk.
    pub pgpgout: u64,
    pub pgfault: u64,
    pub pgmajfault: u64,
    pub pgfree: u64,
    pub pgscan_direct: u64,
    pub pgscan_kswapd: u64,
    pub pgsteal: u64,
    pub pgdemote: u64,
    pub pgpromote: u64,
}

/// Aggregate block device I/O counters.
///
/// Source: `/proc/diskstats` summed over whole devices
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct IoStats {
    /// Total requests.
    pub total: u64,
    /// Read requests.
    pub rio: u64,
    /// Write requests.
    pub wio: u64,
    /// Discard requests.
    pub dio: u64,
    /// Kilobytes read.
    pub rkb: u64,
    /// Kilobytes written.
    pub wkb: u64,
    /// Kilobytes discarded.
    pub dkb: u64,
}

/// Memory utilization.
///
/// Source: `/proc/meminfo`
///
/// All values are in kilobytes.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct MemoryStats {
    /// Total usable RAM.
    /// Source: `MemTotal`
    pub total: u64,
    /// Source: `MemFree`
    pub free: u64,
    /// Source: `MemAvailable`
    pub available: u64,
    /// Source: `Buffers`
    pub buffers: u64,
    /// Source: `Cached`
    pub cached: u64,
    /// Source: `Committed_AS`
    pub committed: u64,
    /// Source: `Active`
    pub active: u64,
    /// Source: `Inactive`
    pub inactive: u64,
    /// Source: `Dirty`
    pub dirty: u64,
    /// Source: `AnonPages`
    pub anon_pages: u64,
    /// Source: `Slab`
    pub slab: u64,
    /// Source: `KernelStack`
    pub kernel_stack: u64,
    /// Source: `PageTables`
    pub page_tables: u64,
    /// Source: `VmallocUsed`
    pub vmalloc_used: u64,
    /// Source: `SwapFree`
    pub swap_free: u64,
    /// Source: `SwapTotal`
    pub swap_total: u64,
    /// Source: `SwapCached`
    pub swap_cached: u64,
}

/// Kernel table sizes.
///
/// Source: `/proc/sys/fs/{dentry-state,file-nr,inode-state}`, `/proc/sys/kernel/pty/nr`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct KtablesStats {
    pub dentry: u32,
    pub file_used: u32,
    pub inode_used: u32,
    pub pty_nr: u32,
}

/// Run queue and load averages.
///
/// Source: `/proc/loadavg`, `/proc/stat` (`procs_blocked`)
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct QueueStats {
    /// Runnable tasks.
    pub nr_running: u32,
    /// Tasks in the task list.
    pub nr_threads: u32,
    /// Tasks blocked on I/O.
    pub procs_blocked: u64,
    /// Load averages in hundredths (1.52 is stored as 152).
    pub load_avg_1: u32,
    pub load_avg_5: u32,
    pub load_avg_15: u32,
}

/// Huge page utilization in kilobytes.
///
/// Source: `/proc/meminfo` (`HugePages_*` times `Hugepagesize`)
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct HugeStats {
    pub total: u64,
    pub free: u64,
    pub reserved: u64,
    pub surplus: u64,
}

/// Pressure-stall information for one resource.
///
/// Source: `/proc/pressure/{cpu,io,memory}`
///
/// Averages are stored in hundredths of a percent, indexed by window
/// (10s, 60s, 300s). Totals are microseconds. The CPU resource has no
/// "full" line.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PsiStats {
    pub some_avg: [u64; 3],
    pub some_total: u64,
    pub full_avg: [u64; 3],
    pub full_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_zero_detection() {
        assert!(CpuStats::default().is_zero());
        let stolen = CpuStats {
            steal: 1,
            ..Default::default()
        };
        assert!(!stolen.is_zero());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let q: QueueStats = serde_json::from_str(r#"{"load_avg_5": 152}"#).unwrap();
        assert_eq!(q.load_avg_5, 152);
        assert_eq!(q.nr_running, 0);
    }
}
