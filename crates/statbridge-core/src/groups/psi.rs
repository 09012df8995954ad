//! Pressure stall information for CPU, I/O and memory.
//!
//! Averages are exported per window (10 s, 60 s, 300 s) on the PSI instance
//! domain; totals are singular microsecond counters. CPU has no "full" line.

use super::{DefineCx, ExportCx, ImportCx, StatGroup, Values, from_hundredths, hundredths};
use crate::activity::{Activities, Activity};
use crate::catalog::MetricDescriptor;
use crate::error::SessionError;
use crate::ident::pmid;
use crate::model::PsiStats;
use crate::registry::{PSI_INSTANCES, domains};
use crate::value::{MetricValue, Semantics, Unit, ValueType};

const SOME_AVG: usize = 0;
const SOME_TOTAL: usize = 1;
const FULL_AVG: usize = 2;

const fn avg(cluster: u32, item: u32, name: &'static str) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, cluster, item),
        name,
        ValueType::Float,
        Semantics::Instant,
        Some(domains::PSI),
        Unit::None,
    )
}

const fn total(cluster: u32, item: u32, name: &'static str) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, cluster, item),
        name,
        ValueType::U64,
        Semantics::Counter,
        None,
        Unit::Usec,
    )
}

fn define_psi(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
    cx.define_all()?;
    cx.fixed(domains::PSI, &PSI_INSTANCES)
}

fn export_psi(cx: &mut ExportCx<'_>, p: &PsiStats, with_full: bool) -> Result<(), SessionError> {
    let mut lines = vec![(SOME_AVG, &p.some_avg, p.some_total)];
    if with_full {
        lines.push((FULL_AVG, &p.full_avg, p.full_total));
    }
    for (avg_idx, avgs, total) in lines {
        for ((_, label), v) in PSI_INSTANCES.iter().zip(avgs) {
            cx.put(avg_idx, Some(label), hundredths(*v))?;
        }
        cx.put(avg_idx + 1, None, MetricValue::U64(total))?;
    }
    Ok(())
}

fn import_psi(
    cx: &mut ImportCx<'_>,
    act: fn(&mut Activities) -> &mut Activity<PsiStats>,
    idx: usize,
    values: &Values,
) {
    let slot = cx.slot;
    for (number, value) in values {
        if idx == SOME_AVG || idx == FULL_AVG {
            let Some(window) = PSI_INSTANCES.iter().position(|(n, _)| Some(*n) == *number) else {
                continue;
            };
            let Some(v) = cx.decode::<f64>(idx, value) else {
                continue;
            };
            let p = act(&mut *cx.acts).record_mut(slot, 0);
            let avgs = if idx == SOME_AVG {
                &mut p.some_avg
            } else {
                &mut p.full_avg
            };
            avgs[window] = from_hundredths(v);
        } else {
            let Some(v) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let p = act(&mut *cx.acts).record_mut(slot, 0);
            if idx == SOME_TOTAL {
                p.some_total = v;
            } else {
                p.full_total = v;
            }
        }
    }
}

pub struct PsiCpu;

impl StatGroup for PsiCpu {
    const NAME: &'static str = "psi-cpu";
    const METRICS: &'static [MetricDescriptor] = &[
        avg(83, 0, "kernel.all.pressure.cpu.some.avg"),
        total(83, 1, "kernel.all.pressure.cpu.some.total"),
    ];

    fn present(acts: &Activities) -> bool {
        acts.psi_cpu.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        define_psi(cx)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let Some(p) = cx.acts.psi_cpu.records(cx.slot).first().cloned() else {
            return Ok(());
        };
        export_psi(cx, &p, false)
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        import_psi(cx, |a| &mut a.psi_cpu, idx, values);
    }
}

pub struct PsiIo;

impl StatGroup for PsiIo {
    const NAME: &'static str = "psi-io";
    const METRICS: &'static [MetricDescriptor] = &[
        avg(85, 0, "kernel.all.pressure.io.some.avg"),
        total(85, 1, "kernel.all.pressure.io.some.total"),
        avg(85, 2, "kernel.all.pressure.io.full.avg"),
        total(85, 3, "kernel.all.pressure.io.full.total"),
    ];

    fn present(acts: &Activities) -> bool {
        acts.psi_io.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        define_psi(cx)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let Some(p) = cx.acts.psi_io.records(cx.slot).first().cloned() else {
            return Ok(());
        };
        export_psi(cx, &p, true)
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        import_psi(cx, |a| &mut a.psi_io, idx, values);
    }
}

pub struct PsiMem;

impl StatGroup for PsiMem {
    const NAME: &'static str = "psi-mem";
    const METRICS: &'static [MetricDescriptor] = &[
        avg(84, 0, "kernel.all.pressure.memory.some.avg"),
        total(84, 1, "kernel.all.pressure.memory.some.total"),
        avg(84, 2, "kernel.all.pressure.memory.full.avg"),
        total(84, 3, "kernel.all.pressure.memory.full.total"),
    ];

    fn present(acts: &Activities) -> bool {
        acts.psi_mem.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        define_psi(cx)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let Some(p) = cx.acts.psi_mem.records(cx.slot).first().cloned() else {
            return Ok(());
        };
        export_psi(cx, &p, true)
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        import_psi(cx, |a| &mut a.psi_mem, idx, values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::SampleInput;
    use crate::config::SessionConfig;
    use crate::groups::GroupId;
    use crate::groups::testing::Harness;
    use pretty_assertions::assert_eq;

    fn stats() -> PsiStats {
        PsiStats {
            some_avg: [152, 98, 5],
            some_total: 123_456,
            full_avg: [10, 0, 0],
            full_total: 9_000,
        }
    }

    #[test]
    fn test_psi_windows() {
        let s = SampleInput {
            psi_mem: Some(stats()),
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::PsiMem,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        assert_eq!(
            h.labels(domains::PSI),
            vec![
                (10, "10 second".to_string()),
                (60, "1 minute".to_string()),
                (300, "5 minute".to_string()),
            ]
        );
        h.export(&s);
        assert_eq!(
            h.value(0, "kernel.all.pressure.memory.some.avg", Some("10 second")),
            Some("1.52")
        );
        assert_eq!(
            h.value(0, "kernel.all.pressure.memory.full.avg", Some("10 second")),
            Some("0.1")
        );
        assert_eq!(
            h.value(0, "kernel.all.pressure.memory.full.total", None),
            Some("9000")
        );
        assert_eq!(h.import_all()[0].psi_mem, s.psi_mem);
    }

    #[test]
    fn test_psi_cpu_has_no_full_line() {
        let s = SampleInput {
            psi_cpu: Some(stats()),
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::PsiCpu,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(
            h.value(0, "kernel.all.pressure.cpu.some.total", None),
            Some("123456")
        );
        assert_eq!(h.store.metrics().len(), 2);
        assert_eq!(
            h.import_all()[0].psi_cpu,
            Some(PsiStats {
                full_avg: [0; 3],
                full_total: 0,
                ..stats()
            })
        );
    }
}
