//! Interrupts, stored as a `(cpu, line)` grid.
//!
//! Row 0 is "all", line 0 is "sum". The "all" row feeds the global metrics,
//! CPU rows feed `kernel.percpu.interrupts` with `line::cpuN` instances.

use super::{DefineCx, ExportCx, ImportCx, StatGroup, Values};
use crate::activity::Activities;
use crate::catalog::MetricDescriptor;
use crate::error::SessionError;
use crate::filter::{Bitmap, aggregate_all_instance, should_emit};
use crate::ident::pmid;
use crate::registry::{domains, percpu_interrupt_label};
use crate::value::{MetricValue, Semantics, Unit, ValueType};

pub struct Irq;

const INTR: usize = 0;
const LINE_TOTAL: usize = 1;
const PERCPU: usize = 2;

/// Splits a `line::cpuN` label into the line name and the CPU number.
fn split_percpu_label(label: &str) -> Option<(&str, usize)> {
    let (line, cpu) = label.rsplit_once("::cpu")?;
    Some((line, cpu.parse().ok()?))
}

impl StatGroup for Irq {
    const NAME: &'static str = "irq";
    const METRICS: &'static [MetricDescriptor] = &[
        MetricDescriptor::new(
            pmid(60, 0, 12),
            "kernel.all.intr",
            ValueType::U64,
            Semantics::Counter,
            None,
            Unit::Count,
        ),
        MetricDescriptor::new(
            pmid(60, 4, 0),
            "kernel.all.interrupts.total",
            ValueType::U64,
            Semantics::Counter,
            Some(domains::IRQ),
            Unit::Count,
        ),
        MetricDescriptor::new(
            pmid(60, 4, 1),
            "kernel.percpu.interrupts",
            ValueType::U32,
            Semantics::Counter,
            Some(domains::PERCPU_INTERRUPT),
            Unit::Count,
        ),
    ];

    fn present(acts: &Activities) -> bool {
        acts.irq.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        let acts = cx.acts;
        let irq = &acts.irq;
        let lines = irq.lines.get(1..).unwrap_or_default();
        if irq.selection.is_set(0) {
            cx.define_metric(INTR)?;
            cx.define_metric(LINE_TOTAL)?;
            for line in lines {
                cx.sequential(domains::IRQ, line)?;
            }
        }
        let cpus: Vec<usize> = (1..irq.nr_ini())
            .filter(|&i| irq.selection.is_set(i))
            .collect();
        if !cpus.is_empty() {
            cx.define_metric(PERCPU)?;
        }
        // Numbers run across every CPU and line.
        for cpu in cpus {
            for line in lines {
                cx.sequential(
                    domains::PERCPU_INTERRUPT,
                    &percpu_interrupt_label(line, cpu - 1),
                )?;
            }
        }
        Ok(())
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let slot = cx.slot;
        let irq = &mut cx.acts.irq;
        let (rows, _) = irq.grid.observed(slot);
        if rows == 0 {
            return Ok(());
        }
        let nr = irq.nr_ini();
        irq.offline = Bitmap::new(nr);
        if aggregate_all_instance(nr) {
            let offline = &mut irq.offline;
            cx.deltas.global_irq(&mut irq.grid, slot, nr, offline);
        }

        let irq = &cx.acts.irq;
        let lines = irq.lines.len().min(irq.grid.line_stride());
        let mut out: Vec<(usize, Option<String>, MetricValue)> = Vec::new();
        for cpu in (0..nr.min(rows)).filter(|&c| should_emit(c, &irq.selection, &irq.offline)) {
            let row = irq.grid.row(slot, cpu);
            for (line, &count) in row.iter().enumerate().take(lines) {
                let name = &irq.lines[line];
                match (cpu, line) {
                    (0, 0) => out.push((INTR, None, MetricValue::U64(count))),
                    (0, _) => out.push((LINE_TOTAL, Some(name.clone()), MetricValue::U64(count))),
                    (_, 0) => {}
                    // Per-CPU counts are 32-bit and wrap.
                    _ => out.push((
                        PERCPU,
                        Some(percpu_interrupt_label(name, cpu - 1)),
                        MetricValue::U32(count as u32),
                    )),
                }
            }
        }

        for (idx, label, value) in out {
            if !cx.defined(idx) {
                continue;
            }
            if let Some(label) = &label {
                let domain = if idx == PERCPU {
                    domains::PERCPU_INTERRUPT
                } else {
                    domains::IRQ
                };
                cx.instance(domain, label)?;
            }
            cx.put(idx, label.as_deref(), value)?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let slot = cx.slot;
        for (number, value) in values {
            let Some(count) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let (cpu, name) = match idx {
                INTR => (0, "sum"),
                LINE_TOTAL => match cx.label(idx, *number) {
                    Some(line) => (0, line),
                    None => continue,
                },
                _ => match cx.label(idx, *number).and_then(split_percpu_label) {
                    Some((line, cpu)) => (cpu + 1, line),
                    None => continue,
                },
            };
            let irq = &mut cx.acts.irq;
            irq.line_index("sum");
            let line = irq.line_index(name);
            irq.grid.observe(slot, cpu + 1, irq.lines.len());
            if let Ok(cell) = irq.grid.element_at_mut(slot, cpu, line) {
                *cell = count;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::SampleInput;
    use crate::config::SessionConfig;
    use crate::groups::GroupId;
    use crate::groups::testing::Harness;
    use crate::model::IrqSample;
    use pretty_assertions::assert_eq;

    fn sample(counts: Vec<Vec<u64>>) -> SampleInput {
        SampleInput {
            irq: Some(IrqSample {
                lines: vec!["sum".into(), "timer".into(), "eth0".into()],
                counts,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_split_percpu_label() {
        assert_eq!(split_percpu_label("timer::cpu3"), Some(("timer", 3)));
        assert_eq!(split_percpu_label("a::b::cpu0"), Some(("a::b", 0)));
        assert_eq!(split_percpu_label("timer"), None);
    }

    #[test]
    fn test_percpu_interrupt_labels_numbered_across_cpus() {
        let s = sample(vec![vec![0; 3], vec![10, 6, 4], vec![5, 5, 0]]);
        let h = Harness::new(
            GroupId::Irq,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        assert_eq!(
            h.labels(domains::PERCPU_INTERRUPT),
            vec![
                (0, "timer::cpu0".to_string()),
                (1, "eth0::cpu0".to_string()),
                (2, "timer::cpu1".to_string()),
                (3, "eth0::cpu1".to_string()),
            ]
        );
        assert_eq!(
            h.labels(domains::IRQ),
            vec![(0, "timer".to_string()), (1, "eth0".to_string())]
        );
    }

    #[test]
    fn test_irq_export_and_import() {
        let s = sample(vec![vec![0; 3], vec![10, 6, 4], vec![5, 5, 0]]);
        let mut h = Harness::new(
            GroupId::Irq,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);

        assert_eq!(h.value(0, "kernel.all.intr", None), Some("15"));
        assert_eq!(
            h.value(0, "kernel.all.interrupts.total", Some("timer")),
            Some("11")
        );
        assert_eq!(
            h.value(0, "kernel.percpu.interrupts", Some("eth0::cpu0")),
            Some("4")
        );
        assert_eq!(
            h.value(0, "kernel.percpu.interrupts", Some("eth0::cpu1")),
            Some("0")
        );

        let back = h.import_all();
        assert_eq!(
            back[0].irq,
            Some(IrqSample {
                lines: vec!["sum".into(), "timer".into(), "eth0".into()],
                counts: vec![vec![15, 11, 4], vec![0, 6, 4], vec![0, 5, 0]],
            })
        );
    }

    #[test]
    fn test_new_line_after_definition_is_numbered_next() {
        let s = sample(vec![vec![0; 3], vec![1, 1, 0]]);
        let mut h = Harness::new(
            GroupId::Irq,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&SampleInput {
            irq: Some(IrqSample {
                lines: vec![
                    "sum".into(),
                    "timer".into(),
                    "eth0".into(),
                    "nvme0q1".into(),
                ],
                counts: vec![vec![0; 4], vec![9, 2, 3, 4]],
            }),
            ..Default::default()
        });
        assert_eq!(h.registry.number_of(domains::IRQ, "nvme0q1"), Some(2));
        assert_eq!(
            h.value(0, "kernel.all.interrupts.total", Some("nvme0q1")),
            Some("4")
        );
    }
}
