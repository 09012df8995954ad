//! File and record headers.

use super::{ExportCx, ImportCx, StatGroup, Values, WireField};
use crate::activity::Activities;
use crate::catalog::MetricDescriptor;
use crate::error::SessionError;
use crate::ident::pmid;
use crate::value::{MetricValue, Semantics, Unit, ValueType};

/// Host identification, written with the first record only.
pub struct FileHeaderGroup;

const fn uname(item: u32, name: &'static str) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, 12, item),
        name,
        ValueType::String,
        Semantics::Discrete,
        None,
        Unit::None,
    )
}

impl StatGroup for FileHeaderGroup {
    const NAME: &'static str = "file-header";
    const METRICS: &'static [MetricDescriptor] = &[
        MetricDescriptor::new(
            pmid(60, 0, 32),
            "hinv.ncpu",
            ValueType::U32,
            Semantics::Discrete,
            None,
            Unit::None,
        ),
        MetricDescriptor::new(
            pmid(60, 0, 48),
            "kernel.all.hz",
            ValueType::U32,
            Semantics::Discrete,
            None,
            Unit::CountPerSec,
        ),
        uname(0, "kernel.uname.release"),
        uname(2, "kernel.uname.sysname"),
        uname(3, "kernel.uname.machine"),
        uname(4, "kernel.uname.nodename"),
    ];

    fn present(_acts: &Activities) -> bool {
        true
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        if !cx.first_record {
            return Ok(());
        }
        let hdr = cx.acts.file_header.clone();
        cx.put(0, None, hdr.ncpu.to_value())?;
        cx.put(1, None, hdr.hz.to_value())?;
        cx.put(2, None, hdr.release.to_value())?;
        cx.put(3, None, hdr.sysname.to_value())?;
        cx.put(4, None, hdr.machine.to_value())?;
        cx.put(5, None, hdr.nodename.to_value())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let Some((_, value)) = values.first() else {
            return;
        };
        match idx {
            0 | 1 => {
                let Some(v) = cx.decode::<u32>(idx, value) else {
                    return;
                };
                if idx == 0 {
                    cx.acts.file_header.ncpu = v;
                } else {
                    cx.acts.file_header.hz = v;
                }
            }
            _ => {
                let Some(v) = cx.decode::<String>(idx, value) else {
                    return;
                };
                let hdr = &mut cx.acts.file_header;
                match idx {
                    2 => hdr.release = v,
                    3 => hdr.sysname = v,
                    4 => hdr.machine = v,
                    _ => hdr.nodename = v,
                }
            }
        }
    }
}

/// Per-record header: uptime.
pub struct RecordHeaderGroup;

impl StatGroup for RecordHeaderGroup {
    const NAME: &'static str = "record-header";
    const METRICS: &'static [MetricDescriptor] = &[MetricDescriptor::new(
        pmid(60, 26, 0),
        "kernel.all.uptime",
        ValueType::Double,
        Semantics::Instant,
        None,
        Unit::Sec,
    )];

    fn present(_acts: &Activities) -> bool {
        true
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let Some(rec) = cx.acts.record.records(cx.slot).first() else {
            return Ok(());
        };
        let uptime = rec.uptime_cs as f64 / 100.0;
        cx.put(0, None, MetricValue::Double(uptime))
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let Some((_, value)) = values.first() else {
            return;
        };
        if let Some(secs) = cx.decode::<f64>(idx, value) {
            cx.acts.record.record_mut(cx.slot, 0).uptime_cs = super::from_hundredths(secs);
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
    use crate::model::{FileHeader, RecordHeader};

    #[test]
    fn test_file_header_first_record_only() {
        let mut h = Harness::new(GroupId::FileHeader, SessionConfig::default(), &[]);
        h.acts.file_header = FileHeader {
            ncpu: 4,
            hz: 100,
            sysname: "Linux".into(),
            release: "6.8.0".into(),
            nodename: "db1".into(),
            machine: "x86_64".into(),
        };
        h.export(&SampleInput::default());
        h.export(&SampleInput::default());

        assert_eq!(h.value(0, "hinv.ncpu", None), Some("4"));
        assert_eq!(h.value(0, "kernel.uname.nodename", None), Some("db1"));
        assert_eq!(h.value(1, "hinv.ncpu", None), None);
        assert!(h.store.records()[1].values.is_empty());
    }

    #[test]
    fn test_uptime_roundtrip() {
        let mut h = Harness::new(GroupId::RecordHeader, SessionConfig::default(), &[]);
        h.export(&SampleInput {
            timestamp: 10,
            record: Some(RecordHeader { uptime_cs: 123_456 }),
            ..Default::default()
        });
        assert_eq!(h.value(0, "kernel.all.uptime", None), Some("1234.56"));
        let back = h.import_all();
        assert_eq!(back[0].record, Some(RecordHeader { uptime_cs: 123_456 }));
    }
}
