//! Activity registry: per-group sample buffers, define-time instance counts
//! and selection bitmaps, plus the serialized form of one sample.

use serde::{Deserialize, Serialize};

use crate::buffer::{GridBuffer, SampleBuffer, Slot};
use crate::filter::Bitmap;
use crate::model::*;

/// State of one statistic group.
#[derive(Clone, Debug, Default)]
pub struct Activity<R> {
    pub buffer: SampleBuffer<R>,
    /// Instance count the group's metrics were defined for. Fixed once the
    /// catalogs are defined; export never iterates past it.
    pub nr_ini: Option<usize>,
    /// Instances the user asked to see (CPU groups).
    pub selection: Bitmap,
    /// Offline/tickless instances of the current sample.
    pub offline: Bitmap,
}

impl<R: Clone + Default> Activity<R> {
    pub fn nr_ini(&self) -> usize {
        self.nr_ini.unwrap_or(0)
    }

    pub fn raise_nr_ini(&mut self, count: usize) {
        self.nr_ini = Some(self.nr_ini().max(count));
    }

    /// Replaces `slot` with `records`. Records left over from a larger
    /// earlier sample are reset.
    pub fn load(&mut self, slot: Slot, records: &[R]) {
        self.buffer.clear_slot(slot);
        self.buffer.load(slot, records);
    }

    pub fn records(&self, slot: Slot) -> &[R] {
        self.buffer.observed_records(slot)
    }

    /// Record `idx` of `slot` for writing, raising the observed count.
    pub fn record_mut(&mut self, slot: Slot, idx: usize) -> &mut R {
        self.buffer.observe(slot, idx + 1);
        &mut self.buffer[(slot, idx)]
    }

    /// First observed record matching `key`, or a fresh one appended after
    /// the observed ones.
    pub fn record_by<F>(&mut self, slot: Slot, key: F) -> &mut R
    where
        F: Fn(usize, &R) -> bool,
    {
        let found = self
            .records(slot)
            .iter()
            .enumerate()
            .position(|(i, r)| key(i, r));
        let idx = found.unwrap_or_else(|| self.buffer.observed(slot));
        self.record_mut(slot, idx)
    }
}

/// Interrupt counts as a `(cpu, line)` grid. Line names are shared by both
/// slots and only grow.
#[derive(Clone, Debug, Default)]
pub struct IrqActivity {
    pub grid: GridBuffer<u64>,
    pub lines: Vec<String>,
    /// CPU rows ("all" included) the metrics were defined for.
    pub nr_ini: Option<usize>,
    pub selection: Bitmap,
    pub offline: Bitmap,
}

impl IrqActivity {
    pub fn nr_ini(&self) -> usize {
        self.nr_ini.unwrap_or(0)
    }

    pub fn raise_nr_ini(&mut self, count: usize) {
        self.nr_ini = Some(self.nr_ini().max(count));
    }

    /// Index of line `name`, registering it when new.
    pub fn line_index(&mut self, name: &str) -> usize {
        match self.lines.iter().position(|l| l == name) {
            Some(idx) => idx,
            None => {
                self.lines.push(name.to_string());
                self.lines.len() - 1
            }
        }
    }

    pub fn load(&mut self, slot: Slot, sample: Option<&IrqSample>) {
        self.grid.clear_slot(slot);
        let Some(sample) = sample else {
            return;
        };
        let columns: Vec<usize> = sample.lines.iter().map(|l| self.line_index(l)).collect();
        let nr_lines = self.lines.len();
        self.grid.observe(slot, sample.counts.len(), nr_lines);
        for (cpu, row) in sample.counts.iter().enumerate() {
            for (&line, &count) in columns.iter().zip(row) {
                if let Ok(cell) = self.grid.element_at_mut(slot, cpu, line) {
                    *cell = count;
                }
            }
        }
    }

    pub fn unload(&self, slot: Slot) -> Option<IrqSample> {
        let (cpus, _) = self.grid.observed(slot);
        if cpus == 0 {
            return None;
        }
        Some(IrqSample {
            lines: self.lines.clone(),
            counts: (0..cpus)
                .map(|cpu| {
                    let mut row = self.grid.row(slot, cpu).to_vec();
                    row.resize(self.lines.len(), 0);
                    row
                })
                .collect(),
        })
    }
}

macro_rules! activities {
    (
        single { $( $s:ident : $sty:ty ),* $(,)? }
        multi { $( $m:ident : $mty:ty ),* $(,)? }
    ) => {
        /// All statistic groups of a session.
        #[derive(Clone, Debug, Default)]
        pub struct Activities {
            pub file_header: FileHeader,
            $( pub $s: Activity<$sty>, )*
            $( pub $m: Activity<$mty>, )*
            pub irq: IrqActivity,
        }

        /// One polling interval, as handed in by the collector and as rebuilt
        /// on import.
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct SampleInput {
            /// Unix seconds.
            pub timestamp: i64,
            $(
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $s: Option<$sty>,
            )*
            $(
                #[serde(skip_serializing_if = "Vec::is_empty")]
                pub $m: Vec<$mty>,
            )*
            #[serde(skip_serializing_if = "Option::is_none")]
            pub irq: Option<IrqSample>,
        }

        impl Activities {
            /// Raises define-time instance counts from a sample seen before
            /// definition.
            pub fn scan(&mut self, sample: &SampleInput) {
                $( self.$s.raise_nr_ini(usize::from(sample.$s.is_some())); )*
                $( self.$m.raise_nr_ini(sample.$m.len()); )*
                if let Some(irq) = &sample.irq {
                    self.irq.raise_nr_ini(irq.counts.len());
                    for line in &irq.lines {
                        self.irq.line_index(line);
                    }
                }
            }

            /// Copies `sample` into `slot`.
            pub fn load(&mut self, slot: Slot, sample: &SampleInput) {
                $( self.$s.load(slot, sample.$s.as_slice()); )*
                $( self.$m.load(slot, &sample.$m); )*
                self.irq.load(slot, sample.irq.as_ref());
            }

            /// Rebuilds a sample from `slot`.
            pub fn unload(&self, slot: Slot, timestamp: i64) -> SampleInput {
                SampleInput {
                    timestamp,
                    $( $s: self.$s.records(slot).first().cloned(), )*
                    $( $m: self.$m.records(slot).to_vec(), )*
                    irq: self.irq.unload(slot),
                }
            }

            pub fn clear_slot(&mut self, slot: Slot) {
                $( self.$s.buffer.clear_slot(slot); )*
                $( self.$m.buffer.clear_slot(slot); )*
                self.irq.grid.clear_slot(slot);
            }
        }
    };
}

activities! {
    single {
        record: RecordHeader,
        pcsw: PcswStats,
        swap: SwapStats,
        paging: PagingStats,
        io: IoStats,
        memory: MemoryStats,
        ktables: KtablesStats,
        queue: QueueStats,
        huge: HugeStats,
        psi_cpu: PsiStats,
        psi_io: PsiStats,
        psi_mem: PsiStats,
        sock: SockStats,
        ip: IpStats,
        eip: EipStats,
        icmp: IcmpStats,
        eicmp: EicmpStats,
        tcp: TcpStats,
        etcp: EtcpStats,
        udp: UdpStats,
        sock6: Sock6Stats,
        ip6: Ip6Stats,
        eip6: Eip6Stats,
        icmp6: Icmp6Stats,
        eicmp6: Eicmp6Stats,
        udp6: Udp6Stats,
        nfs: NfsStats,
        nfsd: NfsdStats,
    }
    multi {
        cpu: CpuStats,
        softnet: SoftnetStats,
        cpufreq: CpufreqStats,
        disk: DiskStats,
        net_dev: NetDevStats,
        net_edev: NetEdevStats,
        serial: SerialStats,
        filesystem: FilesystemStats,
        fchost: FchostStats,
        fan: FanStats,
        temp: TempStats,
        voltage: InStats,
        bat: BatStats,
        usb: UsbStats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_unload() {
        let sample = SampleInput {
            timestamp: 1_700_000_000,
            pcsw: Some(PcswStats {
                context_switch: 10,
                processes: 2,
            }),
            cpu: vec![
                CpuStats::default(),
                CpuStats {
                    user: 5,
                    ..Default::default()
                },
            ],
            irq: Some(IrqSample {
                lines: vec!["sum".into(), "timer".into()],
                counts: vec![vec![9, 9], vec![9, 9]],
            }),
            ..Default::default()
        };
        let mut acts = Activities::default();
        acts.load(Slot::Curr, &sample);
        assert_eq!(acts.unload(Slot::Curr, sample.timestamp), sample);
        assert!(acts.unload(Slot::Prev, 0).pcsw.is_none());
    }

    #[test]
    fn test_scan_raises_counts() {
        let mut acts = Activities::default();
        acts.scan(&SampleInput {
            cpu: vec![CpuStats::default(); 3],
            ..Default::default()
        });
        acts.scan(&SampleInput {
            cpu: vec![CpuStats::default(); 2],
            queue: Some(QueueStats::default()),
            ..Default::default()
        });
        assert_eq!(acts.cpu.nr_ini(), 3);
        assert_eq!(acts.queue.nr_ini(), 1);
        assert_eq!(acts.disk.nr_ini, Some(0));
    }

    #[test]
    fn test_irq_lines_merge_across_samples() {
        let mut irq = IrqActivity::default();
        irq.load(
            Slot::Curr,
            Some(&IrqSample {
                lines: vec!["sum".into(), "timer".into()],
                counts: vec![vec![5, 5]],
            }),
        );
        irq.load(
            Slot::Prev,
            Some(&IrqSample {
                lines: vec!["sum".into(), "rtc0".into(), "timer".into()],
                counts: vec![vec![8, 1, 7]],
            }),
        );
        assert_eq!(irq.lines, vec!["sum", "timer", "rtc0"]);
        assert_eq!(irq.grid.row(Slot::Curr, 0), &[5, 5, 0]);
        assert_eq!(irq.grid.row(Slot::Prev, 0), &[8, 7, 1]);
    }

    #[test]
    fn test_record_by_appends_unknown_keys() {
        let mut act: Activity<NetDevStats> = Activity::default();
        for name in ["eth0", "lo", "eth0"] {
            let rec = act.record_by(Slot::Curr, |_, r| r.interface == name);
            rec.interface = name.into();
            rec.rx_bytes += 1;
        }
        let names: Vec<_> = act
            .records(Slot::Curr)
            .iter()
            .map(|r| r.interface.as_str())
            .collect();
        assert_eq!(names, vec!["eth0", "lo"]);
        assert_eq!(act.records(Slot::Curr)[0].rx_bytes, 2);
    }
}
