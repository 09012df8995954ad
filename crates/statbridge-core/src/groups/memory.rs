//! Memory, paging, swap, I/O totals, kernel tables and the run queue.

use super::{
    DefineCx, ExportCx, ImportCx, StatGroup, Values, WireField, flat_group, from_hundredths,
    hundredths,
};
use crate::activity::Activities;
use crate::catalog::MetricDescriptor;
use crate::error::SessionError;
use crate::ident::pmid;
use crate::registry::{LOAD_AVG_INSTANCES, domains};
use crate::value::{MetricValue, Semantics, Unit, ValueType};

flat_group! {
    /// Pages swapped in and out.
    Swap, "swap", swap: crate::model::SwapStats {
        pswpin => (0, 8, "swap.pagesin", U32, Counter, Count),
        pswpout => (0, 9, "swap.pagesout", U64, Counter, Count),
    }
}

flat_group! {
    Paging, "paging", paging: crate::model::PagingStats {
        pgpgin => (28, 6, "mem.vmstat.pgpgin", U64, Counter, Kbytes),
        pgpgout => (28, 7, "mem.vmstat.pgpgout", U64, Counter, Kbytes),
        pgfault => (28, 16, "mem.vmstat.pgfault", U64, Counter, Count),
        pgmajfault => (28, 17, "mem.vmstat.pgmajfault", U64, Counter, Count),
        pgfree => (28, 13, "mem.vmstat.pgfree", U64, Counter, Count),
        pgscan_direct => (28, 176, "mem.vmstat.pgscan_direct_total", U64, Counter, Count),
        pgscan_kswapd => (28, 177, "mem.vmstat.pgscan_kswapd_total", U64, Counter, Count),
        pgsteal => (28, 178, "mem.vmstat.pgsteal_total", U64, Counter, Count),
        pgdemote => (28, 185, "mem.vmstat.pgdemote_total", U64, Counter, Count),
        pgpromote => (28, 187, "mem.vmstat.pgpromote_success", U64, Counter, Count),
    }
}

flat_group! {
    /// Block I/O summed over all devices.
    Io, "io", io: crate::model::IoStats {
        total => (0, 29, "disk.all.total", U64, Counter, Count),
        rio => (0, 24, "disk.all.read", U64, Counter, Count),
        wio => (0, 25, "disk.all.write", U64, Counter, Count),
        dio => (0, 96, "disk.all.discard", U64, Counter, Count),
        rkb => (0, 41, "disk.all.read_bytes", U64, Counter, Kbytes),
        wkb => (0, 42, "disk.all.write_bytes", U64, Counter, Kbytes),
        dkb => (0, 98, "disk.all.discard_bytes", U64, Counter, Kbytes),
    }
}

flat_group! {
    Ktables, "ktables", ktables: crate::model::KtablesStats {
        dentry => (27, 5, "vfs.dentry.count", U32, Instant, None),
        file_used => (27, 0, "vfs.files.count", U32, Instant, None),
        inode_used => (27, 3, "vfs.inodes.count", U32, Instant, None),
        pty_nr => (72, 3, "kernel.all.nptys", U32, Instant, None),
    }
}

// ---------------------------------------------------------------------------
// memory
// ---------------------------------------------------------------------------

/// RAM, kernel and swap memory, split by display flag.
pub struct Memory;

const fn kb(item: u32, name: &'static str) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, 1, item),
        name,
        ValueType::U64,
        Semantics::Instant,
        None,
        Unit::Kbytes,
    )
}

const RAM: std::ops::Range<usize> = 0..11;
const KERNEL: std::ops::Range<usize> = 11..16;
const SWAP: std::ops::Range<usize> = 16..19;
const PHYSMEM_MB: usize = 0;
const USED: usize = 4;

impl StatGroup for Memory {
    const NAME: &'static str = "memory";
    const METRICS: &'static [MetricDescriptor] = &[
        MetricDescriptor::new(
            pmid(60, 1, 9),
            "hinv.physmem",
            ValueType::U32,
            Semantics::Discrete,
            None,
            Unit::Mbytes,
        ),
        MetricDescriptor::new(
            pmid(60, 1, 0),
            "mem.physmem",
            ValueType::U64,
            Semantics::Discrete,
            None,
            Unit::Kbytes,
        ),
        kb(2, "mem.util.free"),
        kb(58, "mem.util.available"),
        kb(1, "mem.util.used"),
        kb(4, "mem.util.bufmem"),
        kb(5, "mem.util.cached"),
        kb(26, "mem.util.committed_AS"),
        kb(14, "mem.util.active"),
        kb(15, "mem.util.inactive"),
        kb(22, "mem.util.dirty"),
        kb(30, "mem.util.anonpages"),
        kb(25, "mem.util.slab"),
        kb(43, "mem.util.kernelStack"),
        kb(27, "mem.util.pageTables"),
        kb(51, "mem.util.vmallocUsed"),
        kb(21, "mem.util.swapFree"),
        kb(20, "mem.util.swapTotal"),
        kb(13, "mem.util.swapCached"),
    ];

    fn present(acts: &Activities) -> bool {
        acts.memory.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        let display = cx.config.memory.clone();
        if display.ram {
            cx.define_range(RAM)?;
        }
        if display.all {
            cx.define_range(KERNEL)?;
        }
        if display.swap {
            cx.define_range(SWAP)?;
        }
        Ok(())
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let Some(m) = cx.acts.memory.records(cx.slot).first().cloned() else {
            return Ok(());
        };
        let physmem_mb = u32::try_from(m.total >> 10).unwrap_or(u32::MAX);
        let values = [
            MetricValue::U32(physmem_mb),
            m.total.to_value(),
            m.free.to_value(),
            m.available.to_value(),
            MetricValue::U64(m.total.saturating_sub(m.free)),
            m.buffers.to_value(),
            m.cached.to_value(),
            m.committed.to_value(),
            m.active.to_value(),
            m.inactive.to_value(),
            m.dirty.to_value(),
            m.anon_pages.to_value(),
            m.slab.to_value(),
            m.kernel_stack.to_value(),
            m.page_tables.to_value(),
            m.vmalloc_used.to_value(),
            m.swap_free.to_value(),
            m.swap_total.to_value(),
            m.swap_cached.to_value(),
        ];
        for (idx, value) in values.into_iter().enumerate() {
            if cx.defined(idx) {
                cx.put(idx, None, value)?;
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        if idx == PHYSMEM_MB || idx == USED {
            return;
        }
        let Some((_, value)) = values.first() else {
            return;
        };
        let Some(v) = cx.decode::<u64>(idx, value) else {
            return;
        };
        let m = cx.acts.memory.record_mut(cx.slot, 0);
        let field = match idx {
            1 => &mut m.total,
            2 => &mut m.free,
            3 => &mut m.available,
            5 => &mut m.buffers,
            6 => &mut m.cached,
            7 => &mut m.committed,
            8 => &mut m.active,
            9 => &mut m.inactive,
            10 => &mut m.dirty,
            11 => &mut m.anon_pages,
            12 => &mut m.slab,
            13 => &mut m.kernel_stack,
            14 => &mut m.page_tables,
            15 => &mut m.vmalloc_used,
            16 => &mut m.swap_free,
            17 => &mut m.swap_total,
            _ => &mut m.swap_cached,
        };
        *field = v;
    }
}

// ---------------------------------------------------------------------------
// huge
// ---------------------------------------------------------------------------

/// Huge pages, collected in kB and exported in bytes.
pub struct Huge;

const fn bytes(item: u32, name: &'static str) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, 1, item),
        name,
        ValueType::U64,
        Semantics::Instant,
        None,
        Unit::Bytes,
    )
}

impl StatGroup for Huge {
    const NAME: &'static str = "huge";
    const METRICS: &'static [MetricDescriptor] = &[
        bytes(60, "mem.util.hugepagesTotalBytes"),
        bytes(61, "mem.util.hugepagesFreeBytes"),
        bytes(62, "mem.util.hugepagesRsvdBytes"),
        bytes(63, "mem.util.hugepagesSurpBytes"),
    ];

    fn present(acts: &Activities) -> bool {
        acts.huge.nr_ini() > 0
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let Some(h) = cx.acts.huge.records(cx.slot).first().cloned() else {
            return Ok(());
        };
        let pages = [h.total, h.free, h.reserved, h.surplus];
        for (idx, kb) in pages.into_iter().enumerate() {
            cx.put(idx, None, MetricValue::U64(kb * 1024))?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let Some((_, value)) = values.first() else {
            return;
        };
        let Some(v) = cx.decode::<u64>(idx, value) else {
            return;
        };
        let h = cx.acts.huge.record_mut(cx.slot, 0);
        let kb = v / 1024;
        match idx {
            0 => h.total = kb,
            1 => h.free = kb,
            2 => h.reserved = kb,
            _ => h.surplus = kb,
        }
    }
}

// ---------------------------------------------------------------------------
// queue
// ---------------------------------------------------------------------------

/// Run queue and load averages.
pub struct Queue;

const LOAD: usize = 3;

impl StatGroup for Queue {
    const NAME: &'static str = "queue";
    const METRICS: &'static [MetricDescriptor] = &[
        MetricDescriptor::new(
            pmid(60, 2, 2),
            "kernel.all.runnable",
            ValueType::U32,
            Semantics::Instant,
            None,
            Unit::None,
        ),
        MetricDescriptor::new(
            pmid(60, 2, 3),
            "kernel.all.nprocs",
            ValueType::U32,
            Semantics::Instant,
            None,
            Unit::None,
        ),
        MetricDescriptor::new(
            pmid(60, 0, 16),
            "kernel.all.blocked",
            ValueType::U64,
            Semantics::Instant,
            None,
            Unit::None,
        ),
        MetricDescriptor::new(
            pmid(60, 2, 0),
            "kernel.all.load",
            ValueType::Float,
            Semantics::Instant,
            Some(domains::LOAD_AVG),
            Unit::None,
        ),
    ];

    fn present(acts: &Activities) -> bool {
        acts.queue.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        cx.define_all()?;
        cx.fixed(domains::LOAD_AVG, &LOAD_AVG_INSTANCES)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let Some(q) = cx.acts.queue.records(cx.slot).first().cloned() else {
            return Ok(());
        };
        cx.put(0, None, q.nr_running.to_value())?;
        cx.put(1, None, q.nr_threads.to_value())?;
        cx.put(2, None, q.procs_blocked.to_value())?;
        let loads = [q.load_avg_1, q.load_avg_5, q.load_avg_15];
        for ((_, label), load) in LOAD_AVG_INSTANCES.iter().zip(loads) {
            cx.put(LOAD, Some(label), hundredths(u64::from(load)))?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let slot = cx.slot;
        for (number, value) in values {
            match idx {
                0 | 1 => {
                    if let Some(v) = cx.decode::<u32>(idx, value) {
                        let q = cx.acts.queue.record_mut(slot, 0);
                        if idx == 0 {
                            q.nr_running = v;
                        } else {
                            q.nr_threads = v;
                        }
                    }
                }
                2 => {
                    if let Some(v) = cx.decode::<u64>(idx, value) {
                        cx.acts.queue.record_mut(slot, 0).procs_blocked = v;
                    }
                }
                _ => {
                    let Some(v) = cx.decode::<f64>(idx, value) else {
                        continue;
                    };
                    let load = u32::try_from(from_hundredths(v)).unwrap_or(u32::MAX);
                    let q = cx.acts.queue.record_mut(slot, 0);
                    match number {
                        Some(1) => q.load_avg_1 = load,
                        Some(5) => q.load_avg_5 = load,
                        Some(15) => q.load_avg_15 = load,
                        _ => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::SampleInput;
    use crate::config::{MemoryDisplay, SessionConfig};
    use crate::groups::GroupId;
    use crate::groups::testing::Harness;
    use crate::model::{HugeStats, IoStats, MemoryStats, QueueStats, SwapStats};
    use pretty_assertions::assert_eq;

    fn memory_sample() -> SampleInput {
        SampleInput {
            memory: Some(MemoryStats {
                total: 16_384_000,
                free: 4_000_000,
                available: 9_000_000,
                slab: 300_000,
                swap_total: 2_000_000,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_memory_default_flags_ram_only() {
        let s = memory_sample();
        let mut h = Harness::new(
            GroupId::Memory,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(h.value(0, "hinv.physmem", None), Some("16000"));
        assert_eq!(h.value(0, "mem.util.used", None), Some("12384000"));
        assert_eq!(h.value(0, "mem.util.slab", None), None);
        assert_eq!(h.value(0, "mem.util.swapTotal", None), None);
        assert_eq!(h.store.metrics().len(), RAM.len());
    }

    #[test]
    fn test_memory_all_and_swap_flags() {
        let s = memory_sample();
        let config = SessionConfig {
            memory: MemoryDisplay {
                ram: false,
                all: true,
                swap: true,
            },
            ..Default::default()
        };
        let mut h = Harness::new(GroupId::Memory, config, std::slice::from_ref(&s));
        h.export(&s);
        assert_eq!(h.value(0, "mem.physmem", None), None);
        assert_eq!(h.value(0, "mem.util.slab", None), Some("300000"));
        assert_eq!(h.value(0, "mem.util.swapTotal", None), Some("2000000"));

        let back = h.import_all();
        let m = back[0].memory.clone().unwrap();
        assert_eq!(m.slab, 300_000);
        assert_eq!(m.swap_total, 2_000_000);
        assert_eq!(m.total, 0);
    }

    #[test]
    fn test_memory_import_skips_derived() {
        let s = memory_sample();
        let mut h = Harness::new(
            GroupId::Memory,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        let m = h.import_all()[0].memory.clone().unwrap();
        assert_eq!(m.total, 16_384_000);
        assert_eq!(m.free, 4_000_000);
        assert_eq!(m.available, 9_000_000);
    }

    #[test]
    fn test_huge_bytes_roundtrip() {
        let s = SampleInput {
            huge: Some(HugeStats {
                total: 2048,
                free: 1024,
                reserved: 0,
                surplus: 2,
            }),
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Huge,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(
            h.value(0, "mem.util.hugepagesTotalBytes", None),
            Some("2097152")
        );
        assert_eq!(h.import_all()[0].huge, s.huge);
    }

    #[test]
    fn test_load_average_instances() {
        let s = SampleInput {
            queue: Some(QueueStats {
                nr_running: 3,
                nr_threads: 812,
                procs_blocked: 1,
                load_avg_1: 152,
                load_avg_5: 98,
                load_avg_15: 5,
            }),
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Queue,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        assert_eq!(
            h.labels(domains::LOAD_AVG),
            vec![
                (1, "1 minute".to_string()),
                (5, "5 minute".to_string()),
                (15, "15 minute".to_string()),
            ]
        );
        h.export(&s);
        assert_eq!(
            h.value(0, "kernel.all.load", Some("1 minute")),
            Some("1.52")
        );
        assert_eq!(
            h.value(0, "kernel.all.load", Some("15 minute")),
            Some("0.05")
        );
        assert_eq!(h.import_all()[0].queue, s.queue);
    }

    #[test]
    fn test_io_flat_group() {
        let s = SampleInput {
            io: Some(IoStats {
                total: 10,
                rio: 6,
                wio: 4,
                dio: 0,
                rkb: 600,
                wkb: 400,
                dkb: 0,
            }),
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Io,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(h.value(0, "disk.all.read_bytes", None), Some("600"));
        assert_eq!(h.import_all()[0].io, s.io);
    }

    #[test]
    fn test_paging_reclaim_names() {
        let names: Vec<(String, &str)> = Paging::METRICS[5..]
            .iter()
            .map(|d| (d.id.to_string(), d.name))
            .collect();
        assert_eq!(
            names,
            vec![
                ("60.28.176".to_string(), "mem.vmstat.pgscan_direct_total"),
                ("60.28.177".to_string(), "mem.vmstat.pgscan_kswapd_total"),
                ("60.28.178".to_string(), "mem.vmstat.pgsteal_total"),
                ("60.28.185".to_string(), "mem.vmstat.pgdemote_total"),
                ("60.28.187".to_string(), "mem.vmstat.pgpromote_success"),
            ]
        );
        for d in Paging::METRICS {
            assert_eq!(d.value_type, ValueType::U64, "{}", d.name);
        }
    }

    #[test]
    fn test_swap_pagesout_is_64_bit() {
        assert_eq!(Swap::METRICS[0].value_type, ValueType::U32);
        assert_eq!(Swap::METRICS[1].value_type, ValueType::U64);

        let s = SampleInput {
            swap: Some(SwapStats {
                pswpin: 12,
                pswpout: 5_000_000_000,
            }),
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Swap,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(h.value(0, "swap.pagesout", None), Some("5000000000"));
        assert_eq!(h.import_all()[0].swap, s.swap);
    }
}
