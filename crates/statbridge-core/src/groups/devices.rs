//! Block devices, serial lines, filesystems and fibre-channel hosts.

use super::{DefineCx, ExportCx, ImportCx, StatGroup, Values, WireField, item_selected};
use crate::activity::Activities;
use crate::catalog::MetricDescriptor;
use crate::error::SessionError;
use crate::ident::{InstanceDomainId, pmid};
use crate::registry::domains;
use crate::value::{MetricValue, Semantics, Unit, ValueType};

const fn metric(
    cluster: u32,
    item: u32,
    name: &'static str,
    value_type: ValueType,
    semantics: Semantics,
    indom: InstanceDomainId,
    unit: Unit,
) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(60, cluster, item),
        name,
        value_type,
        semantics,
        Some(indom),
        unit,
    )
}

// ---------------------------------------------------------------------------
// disk
// ---------------------------------------------------------------------------

/// Per-device block I/O. Instances are named by the device namer.
pub struct Disk;

const fn disk(
    item: u32,
    name: &'static str,
    value_type: ValueType,
    unit: Unit,
) -> MetricDescriptor {
    metric(
        0,
        item,
        name,
        value_type,
        Semantics::Counter,
        domains::DISK,
        unit,
    )
}

impl StatGroup for Disk {
    const NAME: &'static str = "disk";
    const METRICS: &'static [MetricDescriptor] = &[
        disk(4, "disk.dev.read", ValueType::U64, Unit::Count),
        disk(5, "disk.dev.write", ValueType::U64, Unit::Count),
        disk(28, "disk.dev.total", ValueType::U64, Unit::Count),
        disk(37, "disk.dev.total_bytes", ValueType::U64, Unit::Kbytes),
        disk(38, "disk.dev.read_bytes", ValueType::U64, Unit::Kbytes),
        disk(39, "disk.dev.write_bytes", ValueType::U64, Unit::Kbytes),
        disk(90, "disk.dev.discard_bytes", ValueType::U64, Unit::Kbytes),
        disk(72, "disk.dev.read_rawactive", ValueType::U32, Unit::Msec),
        disk(73, "disk.dev.write_rawactive", ValueType::U32, Unit::Msec),
        disk(79, "disk.dev.total_rawactive", ValueType::U32, Unit::Msec),
        disk(92, "disk.dev.discard_rawactive", ValueType::U32, Unit::Msec),
        disk(46, "disk.dev.avactive", ValueType::U32, Unit::Msec),
        disk(47, "disk.dev.aveq", ValueType::U32, Unit::Msec),
    ];

    fn present(acts: &Activities) -> bool {
        acts.disk.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        cx.define_all()?;
        let discovery = cx.discovery;
        for d in discovery.iter().flat_map(|s| &s.disk) {
            let name = cx.namer.device_name(d.major, d.minor);
            if item_selected(cx.config.disks.as_ref(), &name) {
                cx.sequential(domains::DISK, &name)?;
            }
        }
        Ok(())
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let disks = cx.acts.disk.records(cx.slot).to_vec();
        for d in disks.iter().take(cx.acts.disk.nr_ini()) {
            let name = cx.namer.device_name(d.major, d.minor);
            if !item_selected(cx.config.disks.as_ref(), &name) {
                continue;
            }
            cx.instance(domains::DISK, &name)?;
            let values = [
                (2, d.nr_ios.to_value()),
                (3, MetricValue::U64(d.rd_sect.wrapping_add(d.wr_sect) / 2)),
                (4, MetricValue::U64(d.rd_sect / 2)),
                (5, MetricValue::U64(d.wr_sect / 2)),
                (6, MetricValue::U64(d.dc_sect / 2)),
                (7, d.rd_ticks.to_value()),
                (8, d.wr_ticks.to_value()),
                (9, MetricValue::U32(d.rd_ticks.wrapping_add(d.wr_ticks))),
                (10, d.dc_ticks.to_value()),
                (11, d.tot_ticks.to_value()),
                (12, d.rq_ticks.to_value()),
            ];
            for (idx, value) in values {
                cx.put(idx, Some(&name), value)?;
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        // read/write are never written; total_bytes and total_rawactive are sums.
        if matches!(idx, 0 | 1 | 3 | 9) {
            return;
        }
        for (number, value) in values {
            let Some(label) = cx.label(idx, *number) else {
                continue;
            };
            let Some(v) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let d = cx.acts.disk.record_by(cx.slot, |_, r| r.name == label);
            d.name = label.to_string();
            let ticks = u32::try_from(v).unwrap_or(u32::MAX);
            match idx {
                2 => d.nr_ios = v,
                4 => d.rd_sect = v * 2,
                5 => d.wr_sect = v * 2,
                6 => d.dc_sect = v * 2,
                7 => d.rd_ticks = ticks,
                8 => d.wr_ticks = ticks,
                10 => d.dc_ticks = ticks,
                11 => d.tot_ticks = ticks,
                _ => d.rq_ticks = ticks,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// serial
// ---------------------------------------------------------------------------

pub struct Serial;

fn serial_label(line: u32) -> String {
    format!("serial{line}")
}

const fn tty(item: u32, name: &'static str) -> MetricDescriptor {
    metric(
        74,
        item,
        name,
        ValueType::U32,
        Semantics::Counter,
        domains::SERIAL,
        Unit::Count,
    )
}

impl StatGroup for Serial {
    const NAME: &'static str = "serial";
    const METRICS: &'static [MetricDescriptor] = &[
        tty(0, "tty.serial.rx"),
        tty(1, "tty.serial.tx"),
        tty(2, "tty.serial.frame"),
        tty(3, "tty.serial.parity"),
        tty(4, "tty.serial.brk"),
        tty(5, "tty.serial.overrun"),
    ];

    fn present(acts: &Activities) -> bool {
        acts.serial.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        cx.define_all()?;
        let discovery = cx.discovery;
        for s in discovery.iter().flat_map(|s| &s.serial) {
            cx.instance(domains::SERIAL, &serial_label(s.line), s.line as i32)?;
        }
        Ok(())
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let lines = cx.acts.serial.records(cx.slot).to_vec();
        for s in lines.iter().take(cx.acts.serial.nr_ini()) {
            let label = serial_label(s.line);
            cx.numbered(domains::SERIAL, &label, s.line as i32)?;
            let counts = [s.rx, s.tx, s.frame, s.parity, s.brk, s.overrun];
            for (idx, v) in counts.into_iter().enumerate() {
                cx.put(idx, Some(&label), MetricValue::U32(v))?;
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        for (number, value) in values {
            let Some(line) = cx
                .label(idx, *number)
                .and_then(|l| l.strip_prefix("serial"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            let Some(v) = cx.decode::<u32>(idx, value) else {
                continue;
            };
            let s = cx.acts.serial.record_by(cx.slot, |_, r| r.line == line);
            s.line = line;
            match idx {
                0 => s.rx = v,
                1 => s.tx = v,
                2 => s.frame = v,
                3 => s.parity = v,
                4 => s.brk = v,
                _ => s.overrun = v,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// filesystem
// ---------------------------------------------------------------------------

/// Filesystem capacity and inode usage, in Kbytes.
pub struct Filesystem;

const fn fs(item: u32, name: &'static str, value_type: ValueType, unit: Unit) -> MetricDescriptor {
    metric(
        5,
        item,
        name,
        value_type,
        Semantics::Instant,
        domains::FILESYS,
        unit,
    )
}

impl StatGroup for Filesystem {
    const NAME: &'static str = "filesystem";
    const METRICS: &'static [MetricDescriptor] = &[
        fs(1, "filesys.capacity", ValueType::U64, Unit::Kbytes),
        fs(3, "filesys.free", ValueType::U64, Unit::Kbytes),
        fs(2, "filesys.used", ValueType::U64, Unit::Kbytes),
        fs(8, "filesys.full", ValueType::Double, Unit::None),
        fs(4, "filesys.maxfiles", ValueType::U64, Unit::Count),
        fs(6, "filesys.freefiles", ValueType::U64, Unit::Count),
        fs(5, "filesys.usedfiles", ValueType::U64, Unit::Count),
        fs(10, "filesys.avail", ValueType::U64, Unit::Kbytes),
    ];

    fn present(acts: &Activities) -> bool {
        acts.filesystem.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        cx.define_all()?;
        let discovery = cx.discovery;
        for f in discovery.iter().flat_map(|s| &s.filesystem) {
            if item_selected(cx.config.filesystems.as_ref(), &f.fs_name) {
                cx.sequential(domains::FILESYS, &f.fs_name)?;
            }
        }
        Ok(())
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let filesystems = cx.acts.filesystem.records(cx.slot).to_vec();
        for f in filesystems.iter().take(cx.acts.filesystem.nr_ini()) {
            if !item_selected(cx.config.filesystems.as_ref(), &f.fs_name) {
                continue;
            }
            cx.instance(domains::FILESYS, &f.fs_name)?;
            let used = f.total_bytes.saturating_sub(f.free_bytes);
            let full = if f.total_bytes == 0 {
                0.0
            } else {
                used as f64 / f.total_bytes as f64 * 100.0
            };
            let values = [
                MetricValue::U64(f.total_bytes / 1024),
                MetricValue::U64(f.free_bytes / 1024),
                MetricValue::U64(used / 1024),
                MetricValue::Double(full),
                f.files.to_value(),
                f.free_files.to_value(),
                MetricValue::U64(f.files.saturating_sub(f.free_files)),
                MetricValue::U64(f.avail_bytes / 1024),
            ];
            for (idx, value) in values.into_iter().enumerate() {
                cx.put(idx, Some(&f.fs_name), value)?;
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        // used, full and usedfiles are derived.
        if matches!(idx, 2 | 3 | 6) {
            return;
        }
        for (number, value) in values {
            let Some(label) = cx.label(idx, *number) else {
                continue;
            };
            let Some(v) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let fs = &mut cx.acts.filesystem;
            let f = fs.record_by(cx.slot, |_, r| r.fs_name == label);
            f.fs_name = label.to_string();
            match idx {
                0 => f.total_bytes = v * 1024,
                1 => f.free_bytes = v * 1024,
                4 => f.files = v,
                5 => f.free_files = v,
                _ => f.avail_bytes = v * 1024,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// fchost
// ---------------------------------------------------------------------------

/// Fibre-channel host traffic. Words are four bytes.
pub struct Fchost;

const fn fc(item: u32, name: &'static str, unit: Unit) -> MetricDescriptor {
    metric(
        91,
        item,
        name,
        ValueType::U64,
        Semantics::Counter,
        domains::FCHOST,
        unit,
    )
}

impl StatGroup for Fchost {
    const NAME: &'static str = "fchost";
    const METRICS: &'static [MetricDescriptor] = &[
        fc(0, "fchost.in.frames", Unit::Count),
        fc(1, "fchost.out.frames", Unit::Count),
        fc(2, "fchost.in.bytes", Unit::Bytes),
        fc(3, "fchost.out.bytes", Unit::Bytes),
    ];

    fn present(acts: &Activities) -> bool {
        acts.fchost.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        cx.define_all()?;
        let discovery = cx.discovery;
        for f in discovery.iter().flat_map(|s| &s.fchost) {
            cx.sequential(domains::FCHOST, &f.name)?;
        }
        Ok(())
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let hosts = cx.acts.fchost.records(cx.slot).to_vec();
        for f in hosts.iter().take(cx.acts.fchost.nr_ini()) {
            cx.instance(domains::FCHOST, &f.name)?;
            let values = [f.rx_frames, f.tx_frames, f.rx_words * 4, f.tx_words * 4];
            for (idx, v) in values.into_iter().enumerate() {
                cx.put(idx, Some(&f.name), MetricValue::U64(v))?;
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        for (number, value) in values {
            let Some(label) = cx.label(idx, *number) else {
                continue;
            };
            let Some(v) = cx.decode::<u64>(idx, value) else {
                continue;
            };
            let f = cx.acts.fchost.record_by(cx.slot, |_, r| r.name == label);
            f.name = label.to_string();
            match idx {
                0 => f.rx_frames = v,
                1 => f.tx_frames = v,
                2 => f.rx_words = v / 4,
                _ => f.tx_words = v / 4,
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
    use crate::model::{DiskStats, FchostStats, FilesystemStats, SerialStats};
    use pretty_assertions::assert_eq;

    fn disk_stats(major: u32, minor: u32, nr_ios: u64) -> DiskStats {
        DiskStats {
            major,
            minor,
            nr_ios,
            rd_sect: 100,
            wr_sect: 50,
            rd_ticks: 7,
            wr_ticks: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_disk_item_filter() {
        let s = SampleInput {
            disk: vec![disk_stats(8, 0, 10), disk_stats(8, 16, 20)],
            ..Default::default()
        };
        let config = SessionConfig {
            disks: Some(vec!["dev8-16".into()]),
            ..Default::default()
        };
        let mut h = Harness::new(GroupId::Disk, config, std::slice::from_ref(&s));
        assert_eq!(h.labels(domains::DISK), vec![(0, "dev8-16".to_string())]);

        h.export(&s);
        assert_eq!(h.value(0, "disk.dev.total", Some("dev8-16")), Some("20"));
        assert_eq!(h.value(0, "disk.dev.total", Some("dev8-0")), None);
        assert_eq!(
            h.value(0, "disk.dev.total_bytes", Some("dev8-16")),
            Some("75")
        );
        assert_eq!(
            h.value(0, "disk.dev.read_bytes", Some("dev8-16")),
            Some("50")
        );
        assert_eq!(
            h.value(0, "disk.dev.total_rawactive", Some("dev8-16")),
            Some("10")
        );
        assert_eq!(h.value(0, "disk.dev.read", Some("dev8-16")), None);
    }

    #[test]
    fn test_disk_hotplug_takes_next_number() {
        let first = SampleInput {
            disk: vec![disk_stats(8, 0, 1), disk_stats(8, 16, 1)],
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Disk,
            SessionConfig::default(),
            std::slice::from_ref(&first),
        );
        h.export(&first);
        // sdb is swapped for an NVMe drive; a third device exceeds the defined count.
        h.export(&SampleInput {
            disk: vec![
                disk_stats(8, 0, 2),
                disk_stats(259, 0, 5),
                disk_stats(259, 1, 9),
            ],
            ..Default::default()
        });
        assert_eq!(
            h.labels(domains::DISK),
            vec![
                (0, "dev8-0".to_string()),
                (1, "dev8-16".to_string()),
                (2, "dev259-0".to_string()),
            ]
        );
        assert_eq!(h.value(1, "disk.dev.total", Some("dev259-0")), Some("5"));
        assert_eq!(h.value(1, "disk.dev.total", Some("dev259-1")), None);
    }

    #[test]
    fn test_disk_import_names_records_by_instance() {
        let s = SampleInput {
            disk: vec![disk_stats(8, 0, 10)],
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Disk,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        let back = h.import_all();
        assert_eq!(
            back[0].disk,
            vec![DiskStats {
                major: 0,
                minor: 0,
                name: "dev8-0".into(),
                ..disk_stats(8, 0, 10)
            }]
        );
    }

    #[test]
    fn test_serial_labels() {
        let s = SampleInput {
            serial: vec![
                SerialStats {
                    line: 0,
                    rx: 5,
                    ..Default::default()
                },
                SerialStats {
                    line: 3,
                    overrun: 1,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Serial,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(h.value(0, "tty.serial.overrun", Some("serial3")), Some("1"));
        assert_eq!(h.registry.number_of(domains::SERIAL, "serial3"), Some(3));
        assert_eq!(h.import_all()[0].serial, s.serial);
    }

    #[test]
    fn test_filesystem_derived_values() {
        let s = SampleInput {
            filesystem: vec![
                FilesystemStats {
                    fs_name: "/dev/sda1".into(),
                    total_bytes: 4096 * 1024,
                    free_bytes: 1024 * 1024,
                    avail_bytes: 512 * 1024,
                    files: 100,
                    free_files: 40,
                },
                FilesystemStats {
                    fs_name: "tmpfs".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Filesystem,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(
            h.value(0, "filesys.capacity", Some("/dev/sda1")),
            Some("4096")
        );
        assert_eq!(h.value(0, "filesys.used", Some("/dev/sda1")), Some("3072"));
        assert_eq!(h.value(0, "filesys.full", Some("/dev/sda1")), Some("75"));
        assert_eq!(
            h.value(0, "filesys.usedfiles", Some("/dev/sda1")),
            Some("60")
        );
        assert_eq!(h.value(0, "filesys.full", Some("tmpfs")), Some("0"));
        assert_eq!(h.import_all()[0].filesystem, s.filesystem);
    }

    #[test]
    fn test_fchost_words_to_bytes() {
        let s = SampleInput {
            fchost: vec![FchostStats {
                name: "host0".into(),
                rx_frames: 3,
                tx_frames: 4,
                rx_words: 100,
                tx_words: 7,
            }],
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Fchost,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(h.value(0, "fchost.in.bytes", Some("host0")), Some("400"));
        assert_eq!(h.import_all()[0].fchost, s.fchost);
    }
}
