//! CPU utilization, softnet, CPU frequency and context switches.
//!
//! Record 0 of every per-CPU activity is the aggregate "all"; record `i` is
//! CPU `i - 1`.

use tracing::trace;

use super::{DefineCx, ExportCx, ImportCx, StatGroup, Values, flat_group};
use crate::activity::{Activities, Activity};
use crate::buffer::Slot;
use crate::catalog::MetricDescriptor;
use crate::delta::CounterDeltas;
use crate::error::SessionError;
use crate::filter::{
    Bitmap, aggregate_all_instance, is_tickless_cpu, should_emit, synthesize_tickless,
};
use crate::ident::pmid;
use crate::model::{CpuStats, SoftnetStats};
use crate::registry::{domains, percpu_label};
use crate::value::{MetricValue, Semantics, Unit, ValueType};

const fn counter(
    cluster: u32,
    item: u32,
    name: &'static str,
    percpu: bool,
    unit: Unit,
) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, cluster, item),
        name,
        ValueType::U64,
        Semantics::Counter,
        if percpu { Some(domains::PERCPU) } else { None },
        unit,
    )
}

/// Defines the global half `0..half` of a catalog when "all" is selected and
/// the per-CPU half, plus one instance per CPU, when any CPU is.
fn define_split<R: Clone + Default>(
    cx: &mut DefineCx<'_>,
    act: &Activity<R>,
    half: usize,
) -> Result<(), SessionError> {
    if act.selection.is_set(0) {
        cx.define_range(0..half)?;
    }
    let cpus: Vec<usize> = (1..act.nr_ini())
        .filter(|&i| act.selection.is_set(i))
        .collect();
    if !cpus.is_empty() {
        cx.define_range(half..cx.catalog.len())?;
    }
    for idx in cpus {
        cx.instance(domains::PERCPU, &percpu_label(idx - 1), (idx - 1) as i32)?;
    }
    Ok(())
}

/// Record index addressed by `number` on a per-CPU metric, or 0 for "all".
fn record_index(cx: &ImportCx<'_>, idx: usize, number: Option<i32>, half: usize) -> Option<usize> {
    if idx < half {
        return Some(0);
    }
    cx.label(idx, number)?;
    usize::try_from(number?).ok().map(|n| n + 1)
}

// ---------------------------------------------------------------------------
// cpu
// ---------------------------------------------------------------------------

pub struct Cpu;

const CPU_FIELDS: usize = 11;

/// Works out offline CPUs and the "all" record for the sample in `cx.slot`,
/// and returns the interval of the "all" instance in ticks.
pub(crate) fn prepare_cpu(
    act: &mut Activity<CpuStats>,
    deltas: &dyn CounterDeltas,
    slot: Slot,
) -> u64 {
    let nr = act.nr_ini();
    act.offline = Bitmap::new(nr);
    act.buffer.observe(slot, nr);
    act.buffer.observe(slot.other(), nr);
    let (curr, prev) = act.buffer.split_mut(slot);
    let interval = if aggregate_all_instance(nr) {
        deltas.global_cpu(curr, prev, nr, &mut act.offline)
    } else {
        // Single CPU: no per-CPU records, "all" is the CPU itself.
        deltas.per_cpu_interval(&curr[0], &prev[0])
    };
    // "all" is never tickless.
    interval.max(1)
}

fn cpu_values(c: &CpuStats) -> [u64; CPU_FIELDS] {
    [
        c.user.saturating_sub(c.guest),
        c.nice.saturating_sub(c.guest_nice),
        c.sys,
        c.idle,
        c.iowait,
        c.hardirq.wrapping_add(c.softirq),
        c.softirq,
        c.hardirq,
        c.steal,
        c.guest,
        c.guest_nice,
    ]
}

impl StatGroup for Cpu {
    const NAME: &'static str = "cpu";
    const METRICS: &'static [MetricDescriptor] = &[
        counter(0, 20, "kernel.all.cpu.user", false, Unit::Msec),
        counter(0, 21, "kernel.all.cpu.nice", false, Unit::Msec),
        counter(0, 22, "kernel.all.cpu.sys", false, Unit::Msec),
        counter(0, 23, "kernel.all.cpu.idle", false, Unit::Msec),
        counter(0, 35, "kernel.all.cpu.wait.total", false, Unit::Msec),
        counter(0, 34, "kernel.all.cpu.irq.total", false, Unit::Msec),
        counter(0, 53, "kernel.all.cpu.irq.soft", false, Unit::Msec),
        counter(0, 54, "kernel.all.cpu.irq.hard", false, Unit::Msec),
        counter(0, 55, "kernel.all.cpu.steal", false, Unit::Msec),
        counter(0, 60, "kernel.all.cpu.guest", false, Unit::Msec),
        counter(0, 81, "kernel.all.cpu.guest_nice", false, Unit::Msec),
        counter(0, 0, "kernel.percpu.cpu.user", true, Unit::Msec),
        counter(0, 1, "kernel.percpu.cpu.nice", true, Unit::Msec),
        counter(0, 2, "kernel.percpu.cpu.sys", true, Unit::Msec),
        counter(0, 3, "kernel.percpu.cpu.idle", true, Unit::Msec),
        counter(0, 30, "kernel.percpu.cpu.wait.total", true, Unit::Msec),
        counter(0, 31, "kernel.percpu.cpu.irq.total", true, Unit::Msec),
        counter(0, 56, "kernel.percpu.cpu.irq.soft", true, Unit::Msec),
        counter(0, 57, "kernel.percpu.cpu.irq.hard", true, Unit::Msec),
        counter(0, 58, "kernel.percpu.cpu.steal", true, Unit::Msec),
        counter(0, 61, "kernel.percpu.cpu.guest", true, Unit::Msec),
        counter(0, 83, "kernel.percpu.cpu.guest_nice", true, Unit::Msec),
    ];

    fn present(acts: &Activities) -> bool {
        acts.cpu.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        let acts = cx.acts;
        define_split(cx, &acts.cpu, CPU_FIELDS)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let slot = cx.slot;
        if cx.acts.cpu.buffer.observed(slot) == 0 {
            return Ok(());
        }
        let all_interval = prepare_cpu(&mut cx.acts.cpu, cx.deltas, slot);
        trace!(
            all_interval,
            offline = cx.acts.cpu.offline.count(),
            "cpu sample prepared"
        );

        let act = &cx.acts.cpu;
        let mut rows: Vec<(usize, CpuStats)> = Vec::with_capacity(act.nr_ini());
        for idx in 0..act.nr_ini() {
            if !should_emit(idx, &act.selection, &act.offline) {
                continue;
            }
            let curr = act.buffer[(slot, idx)];
            if idx == 0 {
                rows.push((0, curr));
                continue;
            }
            let prev = &act.buffer[(slot.other(), idx)];
            let interval = cx.deltas.per_cpu_interval(&curr, prev);
            if is_tickless_cpu(idx, &act.offline, interval) {
                rows.push((idx, synthesize_tickless()));
            } else {
                rows.push((idx, curr));
            }
        }

        for (idx, stats) in rows {
            let values = cpu_values(&stats);
            if idx == 0 {
                if !cx.defined(0) {
                    continue;
                }
                for (i, v) in values.into_iter().enumerate() {
                    cx.put(i, None, MetricValue::U64(v))?;
                }
            } else {
                if !cx.defined(CPU_FIELDS) {
                    continue;
                }
                let label = percpu_label(idx - 1);
                cx.numbered(domains::PERCPU, &label, (idx - 1) as i32)?;
                for (i, v) in values.into_iter().enumerate() {
                    cx.put(CPU_FIELDS + i, Some(&label), MetricValue::U64(v))?;
                }
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let field = idx % CPU_FIELDS;
        // irq.total is hard + soft.
        if field == 5 {
            return;
        }
        for (number, value) in values {
            let Some(rec) = record_index(cx, idx, *number, CPU_FIELDS) else {
                continue;
            };
            let Some(v) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let c = cx.acts.cpu.record_mut(cx.slot, rec);
            match field {
                0 => c.user = v,
                1 => c.nice = v,
                2 => c.sys = v,
                3 => c.idle = v,
                4 => c.iowait = v,
                6 => c.softirq = v,
                7 => c.hardirq = v,
                8 => c.steal = v,
                9 => c.guest = v,
                _ => c.guest_nice = v,
            }
        }
    }

    fn finish(cx: &mut ImportCx<'_>) {
        let slot = cx.slot;
        let n = cx.acts.cpu.buffer.observed(slot);
        for idx in 0..n {
            let c = &mut cx.acts.cpu.buffer[(slot, idx)];
            c.user = c.user.wrapping_add(c.guest);
            c.nice = c.nice.wrapping_add(c.guest_nice);
        }
    }
}

// ---------------------------------------------------------------------------
// softnet
// ---------------------------------------------------------------------------

pub struct Softnet;

const SOFTNET_FIELDS: usize = 6;

fn softnet_values(s: &SoftnetStats) -> [u64; SOFTNET_FIELDS] {
    [
        s.processed,
        s.dropped,
        s.time_squeeze,
        s.received_rps,
        s.flow_limit,
        s.backlog_len,
    ]
}

impl StatGroup for Softnet {
    const NAME: &'static str = "softnet";
    const METRICS: &'static [MetricDescriptor] = &[
        counter(57, 0, "network.softnet.processed", false, Unit::Count),
        counter(57, 1, "network.softnet.dropped", false, Unit::Count),
        counter(57, 2, "network.softnet.time_squeeze", false, Unit::Count),
        counter(57, 4, "network.softnet.received_rps", false, Unit::Count),
        counter(57, 5, "network.softnet.flow_limit", false, Unit::Count),
        counter(57, 12, "network.softnet.backlog_length", false, Unit::Count),
        counter(57, 6, "network.softnet.percpu.processed", true, Unit::Count),
        counter(57, 7, "network.softnet.percpu.dropped", true, Unit::Count),
        counter(
            57,
            8,
            "network.softnet.percpu.time_squeeze",
            true,
            Unit::Count,
        ),
        counter(
            57,
            10,
            "network.softnet.percpu.received_rps",
            true,
            Unit::Count,
        ),
        counter(
            57,
            11,
            "network.softnet.percpu.flow_limit",
            true,
            Unit::Count,
        ),
        counter(
            57,
            13,
            "network.softnet.percpu.backlog_length",
            true,
            Unit::Count,
        ),
    ];

    fn present(acts: &Activities) -> bool {
        acts.softnet.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        let acts = cx.acts;
        define_split(cx, &acts.softnet, SOFTNET_FIELDS)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let slot = cx.slot;
        let act = &mut cx.acts.softnet;
        if act.buffer.observed(slot) == 0 {
            return Ok(());
        }
        let nr = act.nr_ini();
        act.offline = Bitmap::new(nr);
        act.buffer.observe(slot, nr);
        act.buffer.observe(slot.other(), nr);
        if aggregate_all_instance(nr) {
            let (curr, prev) = act.buffer.split_mut(slot);
            cx.deltas.global_softnet(curr, prev, nr, &mut act.offline);
        }

        let rows: Vec<(usize, SoftnetStats)> = (0..nr)
            .filter(|&idx| should_emit(idx, &act.selection, &act.offline))
            .map(|idx| (idx, act.buffer[(slot, idx)]))
            .collect();
        for (idx, stats) in rows {
            let values = softnet_values(&stats);
            if idx == 0 {
                if !cx.defined(0) {
                    continue;
                }
                for (i, v) in values.into_iter().enumerate() {
                    cx.put(i, None, MetricValue::U64(v))?;
                }
            } else {
                if !cx.defined(SOFTNET_FIELDS) {
                    continue;
                }
                let label = percpu_label(idx - 1);
                cx.numbered(domains::PERCPU, &label, (idx - 1) as i32)?;
                for (i, v) in values.into_iter().enumerate() {
                    cx.put(SOFTNET_FIELDS + i, Some(&label), MetricValue::U64(v))?;
                }
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        for (number, value) in values {
            let Some(rec) = record_index(cx, idx, *number, SOFTNET_FIELDS) else {
                continue;
            };
            let Some(v) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let s = cx.acts.softnet.record_mut(cx.slot, rec);
            match idx % SOFTNET_FIELDS {
                0 => s.processed = v,
                1 => s.dropped = v,
                2 => s.time_squeeze = v,
                3 => s.received_rps = v,
                4 => s.flow_limit = v,
                _ => s.backlog_len = v,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// pwr-cpufreq
// ---------------------------------------------------------------------------

/// Clock frequency per CPU. The "all" record is never emitted.
pub struct Cpufreq;

impl StatGroup for Cpufreq {
    const NAME: &'static str = "pwr-cpufreq";
    const METRICS: &'static [MetricDescriptor] = &[MetricDescriptor::new(
        pmid(60, 18, 0),
        "hinv.cpu.clock",
        ValueType::Float,
        Semantics::Discrete,
        Some(domains::PERCPU),
        Unit::PerUsec,
    )];

    fn present(acts: &Activities) -> bool {
        acts.cpufreq.nr_ini() > 1
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        let acts = cx.acts;
        define_split(cx, &acts.cpufreq, 0)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let slot = cx.slot;
        let act = &cx.acts.cpufreq;
        let rows: Vec<(usize, u64)> = act
            .records(slot)
            .iter()
            .enumerate()
            .take(act.nr_ini())
            .skip(1)
            .filter(|(idx, _)| act.selection.is_set(*idx))
            .map(|(idx, r)| (idx, r.cpufreq))
            .collect();
        for (idx, freq) in rows {
            let label = percpu_label(idx - 1);
            cx.numbered(domains::PERCPU, &label, (idx - 1) as i32)?;
            cx.put(0, Some(&label), super::hundredths(freq))?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        for (number, value) in values {
            let Some(rec) = record_index(cx, idx, *number, 0) else {
                continue;
            };
            if let Some(v) = cx.decode::<f64>(idx, value) {
                cx.acts.cpufreq.record_mut(cx.slot, rec).cpufreq = super::from_hundredths(v);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// pcsw
// ---------------------------------------------------------------------------

flat_group! {
    /// Context switches and forks.
    Pcsw, "pcsw", pcsw: crate::model::PcswStats {
        context_switch => (0, 13, "kernel.all.pswitch", U64, Counter, Count),
        processes => (0, 14, "kernel.all.sysfork", U64, Counter, Count),
    }
}
