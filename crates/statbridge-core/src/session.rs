//! Session state machine.
//!
//! A session is bound to one archive. It defines the catalogs of every
//! enabled group once, then either exports samples into a [`MetricStore`] or
//! imports value sets back into samples, never both.
//!
//! ```text
//! Uninitialized ─define─▶ CatalogsDefined ─export_record─▶ Encoding ─┐
//!       │                        │                            ▲      │
//!       └──────attach_reader─────┴──▶ Decoding                └──────┘
//! any state except Closed ─close─▶ Closed
//! ```

use std::fmt;

use tracing::{debug, info, trace};

use crate::activity::{Activities, SampleInput};
use crate::buffer::Slot;
use crate::catalog::Catalog;
use crate::config::SessionConfig;
use crate::delta::{CounterDeltas, DefaultDeltas};
use crate::dispatch::Dispatcher;
use crate::error::SessionError;
use crate::groups::{DefineCx, ExportCx, GroupId, ImportCx};
use crate::ident::MetricId;
use crate::model::FileHeader;
use crate::naming::{DeviceNamer, TableNamer};
use crate::registry::InstanceRegistry;
use crate::store::{FetchedRecord, MetricStore, ValueSet};
use crate::value::MetricValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    CatalogsDefined,
    Encoding,
    Decoding,
    Closed,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::CatalogsDefined => "catalogs-defined",
            SessionState::Encoding => "encoding",
            SessionState::Decoding => "decoding",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct Session {
    state: SessionState,
    config: SessionConfig,
    /// One catalog per group, in [`GroupId::ALL`] order.
    catalogs: Vec<Catalog>,
    defined: Vec<GroupId>,
    registry: InstanceRegistry,
    acts: Activities,
    dispatcher: Dispatcher,
    deltas: Box<dyn CounterDeltas>,
    namer: Box<dyn DeviceNamer>,
    slot: Slot,
    records: usize,
}

impl Session {
    /// Session with the default delta engine and a device-name table taken
    /// from `config`.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let namer = TableNamer::new(&config.device_names);
        Self::with_components(config, Box::new(DefaultDeltas), Box::new(namer))
    }

    pub fn with_components(
        config: SessionConfig,
        deltas: Box<dyn CounterDeltas>,
        namer: Box<dyn DeviceNamer>,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            state: SessionState::Uninitialized,
            config,
            catalogs: GroupId::ALL.iter().map(|g| g.catalog()).collect(),
            defined: Vec::new(),
            registry: InstanceRegistry::new(),
            acts: Activities::default(),
            dispatcher: Dispatcher::new()?,
            deltas,
            namer,
            slot: Slot::Curr,
            records: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Groups whose catalogs were registered, in export order.
    pub fn defined_groups(&self) -> &[GroupId] {
        &self.defined
    }

    /// Host identification: the one given to [`Session::define`], or the one
    /// read back from the first imported record.
    pub fn file_header(&self) -> &FileHeader {
        &self.acts.file_header
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    fn expect(
        &self,
        allowed: &[SessionState],
        operation: &'static str,
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                state: self.state.name(),
                operation,
            })
        }
    }

    /// Resizes the CPU selections to the current instance counts.
    fn refresh_selections(&mut self) {
        let config = &self.config;
        let acts = &mut self.acts;
        acts.cpu.selection = config.cpu_selection(acts.cpu.nr_ini());
        acts.softnet.selection = config.cpu_selection(acts.softnet.nr_ini());
        acts.cpufreq.selection = config.cpu_selection(acts.cpufreq.nr_ini());
        acts.irq.selection = config.cpu_selection(acts.irq.nr_ini());
    }

    /// Registers the catalog and instances of every enabled group present in
    /// `discovery`. Headers are always defined.
    pub fn define(
        &mut self,
        store: &mut dyn MetricStore,
        header: &FileHeader,
        discovery: &[SampleInput],
    ) -> Result<(), SessionError> {
        self.expect(&[SessionState::Uninitialized], "define")?;
        self.acts.file_header = header.clone();
        for sample in discovery {
            self.acts.scan(sample);
        }
        self.refresh_selections();

        for &group in GroupId::ALL {
            if !group.is_header() {
                if !self.config.group_enabled(group.name()) {
                    debug!(%group, "group disabled");
                    continue;
                }
                if !group.present(&self.acts) {
                    debug!(%group, "group not present in discovery samples");
                    continue;
                }
            }
            let mut cx = DefineCx {
                catalog: &mut self.catalogs[group.index()],
                store: &mut *store,
                registry: &mut self.registry,
                acts: &self.acts,
                config: &self.config,
                namer: &*self.namer,
                discovery,
            };
            group.define(&mut cx)?;
            self.defined.push(group);
        }
        for catalog in &mut self.catalogs {
            catalog.close();
        }

        self.state = SessionState::CatalogsDefined;
        info!(
            groups = self.defined.len(),
            cpus = self.acts.cpu.nr_ini().saturating_sub(1),
            "catalogs defined"
        );
        Ok(())
    }

    /// Emits every defined group for `sample` and closes the record.
    pub fn export_record(
        &mut self,
        store: &mut dyn MetricStore,
        sample: &SampleInput,
    ) -> Result<(), SessionError> {
        self.expect(
            &[SessionState::CatalogsDefined, SessionState::Encoding],
            "export_record",
        )?;
        self.state = SessionState::Encoding;

        // Instance counts stay at their define-time value; extra CPUs only
        // grow the buffers and are never emitted.
        let (seen, defined) = (sample.cpu.len(), self.acts.cpu.nr_ini());
        if seen > defined {
            debug!(seen, defined, "sample has more cpus than defined, clamping");
        }
        self.acts.load(self.slot, sample);

        for &group in &self.defined {
            let mut cx = ExportCx {
                catalog: &self.catalogs[group.index()],
                store: &mut *store,
                registry: &mut self.registry,
                acts: &mut self.acts,
                config: &self.config,
                deltas: &*self.deltas,
                namer: &*self.namer,
                slot: self.slot,
                first_record: self.records == 0,
            };
            group.export(&mut cx)?;
        }
        store
            .write_record(sample.timestamp)
            .map_err(|err| SessionError::store("session", err))?;

        trace!(
            record = self.records,
            timestamp = sample.timestamp,
            "record exported"
        );
        self.slot = self.slot.other();
        self.records += 1;
        Ok(())
    }

    /// Switches to decoding against the instances known to the reader.
    pub fn attach_reader(&mut self, instances: InstanceRegistry) -> Result<(), SessionError> {
        self.expect(
            &[SessionState::Uninitialized, SessionState::CatalogsDefined],
            "attach_reader",
        )?;
        self.registry = instances;
        self.state = SessionState::Decoding;
        info!(domains = self.registry.domains().count(), "reader attached");
        Ok(())
    }

    pub fn import_value_set(&mut self, set: &ValueSet) -> Result<(), SessionError> {
        self.expect(&[SessionState::Decoding], "import_value_set")?;
        self.route(set.id, &set.values);
        Ok(())
    }

    pub fn import_value(
        &mut self,
        id: MetricId,
        number: Option<i32>,
        value: &MetricValue,
    ) -> Result<(), SessionError> {
        self.expect(&[SessionState::Decoding], "import_value")?;
        self.route(id, &[(number, value.clone())]);
        Ok(())
    }

    fn route(&mut self, id: MetricId, values: &[(Option<i32>, MetricValue)]) {
        let Some((group, idx)) = self.dispatcher.route(id) else {
            debug!(metric = %id, "value for unknown metric ignored");
            return;
        };
        let mut cx = ImportCx {
            catalog: &self.catalogs[group.index()],
            registry: &self.registry,
            acts: &mut self.acts,
            slot: Slot::Curr,
        };
        group.import(&mut cx, idx, values);
    }

    /// Finishes the record being imported and returns it as a sample.
    pub fn end_record(&mut self, timestamp: i64) -> Result<SampleInput, SessionError> {
        self.expect(&[SessionState::Decoding], "end_record")?;
        for &group in GroupId::ALL {
            let mut cx = ImportCx {
                catalog: &self.catalogs[group.index()],
                registry: &self.registry,
                acts: &mut self.acts,
                slot: Slot::Curr,
            };
            group.finish(&mut cx);
        }
        let sample = self.acts.unload(Slot::Curr, timestamp);
        self.acts.clear_slot(Slot::Curr);
        self.records += 1;
        Ok(sample)
    }

    /// Imports every value set of `record` and ends it.
    pub fn import_record(&mut self, record: &FetchedRecord) -> Result<SampleInput, SessionError> {
        for set in &record.sets {
            self.import_value_set(set)?;
        }
        self.end_record(record.timestamp)
    }

    pub fn close(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::InvalidState {
                state: self.state.name(),
                operation: "close",
            });
        }
        info!(records = self.records, state = %self.state, "session closed");
        self.state = SessionState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::pmid;
    use crate::model::{CpuStats, DiskStats, QueueStats, RecordHeader};
    use crate::naming::DeviceName;
    use crate::registry::{LOAD_AVG_INSTANCES, domains};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn header() -> FileHeader {
        FileHeader {
            ncpu: 2,
            hz: 100,
            sysname: "Linux".into(),
            release: "6.8.0".into(),
            nodename: "db1".into(),
            machine: "x86_64".into(),
        }
    }

    fn cpu(user: u64, idle: u64) -> CpuStats {
        CpuStats {
            user,
            idle,
            ..Default::default()
        }
    }

    fn sample(timestamp: i64, step: u64) -> SampleInput {
        SampleInput {
            timestamp,
            record: Some(RecordHeader {
                uptime_cs: 360_000 + step * 100,
            }),
            cpu: vec![
                CpuStats::default(),
                cpu(100 * step, 900 * step),
                cpu(50 * step, 950 * step),
            ],
            queue: Some(QueueStats {
                nr_running: 2,
                nr_threads: 300,
                procs_blocked: 0,
                load_avg_1: 152,
                load_avg_5: 98,
                load_avg_15: 5,
            }),
            disk: vec![DiskStats {
                major: 8,
                minor: 0,
                nr_ios: 10 * step,
                rd_sect: 64 * step,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_transitions() {
        let mut session = Session::new(SessionConfig::default()).unwrap();
        let mut store = MemoryStore::new();
        let err = session
            .export_record(&mut store, &sample(1, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                state: "uninitialized",
                operation: "export_record",
            }
        ));
        assert!(session.end_record(0).is_err());

        session
            .define(&mut store, &header(), &[sample(0, 1)])
            .unwrap();
        assert_eq!(session.state(), SessionState::CatalogsDefined);
        assert!(session.define(&mut store, &header(), &[]).is_err());

        session.export_record(&mut store, &sample(1, 1)).unwrap();
        assert_eq!(session.state(), SessionState::Encoding);
        assert!(session.attach_reader(InstanceRegistry::new()).is_err());
        assert!(
            session
                .import_value(pmid(60, 0, 20), None, &MetricValue::U64(1))
                .is_err()
        );

        session.close().unwrap();
        assert!(session.close().is_err());
        assert!(session.export_record(&mut store, &sample(2, 2)).is_err());
    }

    #[test]
    fn test_disabled_and_absent_groups_not_defined() {
        let config = SessionConfig {
            groups: Some(vec!["queue".into(), "disk".into()]),
            ..Default::default()
        };
        let mut session = Session::new(config).unwrap();
        let mut store = MemoryStore::new();
        let discovery = SampleInput {
            queue: Some(QueueStats::default()),
            cpu: vec![CpuStats::default()],
            ..Default::default()
        };
        session.define(&mut store, &header(), &[discovery]).unwrap();
        assert_eq!(
            session.defined_groups(),
            &[GroupId::FileHeader, GroupId::RecordHeader, GroupId::Queue]
        );
        assert!(store.metric_by_name("kernel.all.cpu.user").is_none());
        assert!(store.metric_by_name("kernel.all.load").is_some());
    }

    #[test]
    fn test_load_average_routes_by_instance_number() {
        let mut registry = InstanceRegistry::new();
        for (number, label) in LOAD_AVG_INSTANCES {
            registry
                .add_instance(domains::LOAD_AVG, label, number)
                .unwrap();
        }
        let mut session = Session::new(SessionConfig::default()).unwrap();
        session.attach_reader(registry).unwrap();
        session
            .import_value(pmid(60, 2, 0), Some(5), &MetricValue::Float(0.98))
            .unwrap();
        // Unknown identifiers are ignored.
        session
            .import_value(pmid(60, 4000, 1), None, &MetricValue::U64(1))
            .unwrap();

        let back = session.end_record(60).unwrap();
        assert_eq!(
            back.queue,
            Some(QueueStats {
                load_avg_5: 98,
                ..Default::default()
            })
        );
        assert_eq!(back.timestamp, 60);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let config = SessionConfig {
            device_names: vec![DeviceName {
                major: 8,
                minor: 0,
                name: "sda".into(),
            }],
            ..Default::default()
        };
        let samples = [sample(1_700_000_000, 1), sample(1_700_000_060, 2)];

        let mut exporter = Session::new(config.clone()).unwrap();
        let mut store = MemoryStore::new();
        exporter
            .define(&mut store, &header(), &samples[..1])
            .unwrap();
        for s in &samples {
            exporter.export_record(&mut store, s).unwrap();
        }
        exporter.close().unwrap();
        assert_eq!(store.records().len(), 2);
        assert_eq!(
            store.value_text(0, "disk.dev.total", Some("sda")),
            Some("10")
        );
        assert_eq!(
            store.value_text(1, "kernel.percpu.cpu.user", Some("cpu1")),
            Some("100")
        );
        assert_eq!(store.value_text(1, "kernel.uname.nodename", None), None);

        let mut importer = Session::new(config).unwrap();
        importer.attach_reader(store.instances().clone()).unwrap();
        let back: Vec<SampleInput> = store
            .fetch()
            .iter()
            .map(|r| importer.import_record(r).unwrap())
            .collect();

        assert_eq!(importer.file_header(), &header());
        assert_eq!(back.len(), 2);
        assert_eq!(back[1].timestamp, 1_700_000_060);
        assert_eq!(back[1].record, samples[1].record);
        assert_eq!(back[1].queue, samples[1].queue);
        assert_eq!(
            back[1].cpu,
            vec![cpu(300, 3700), cpu(200, 1800), cpu(100, 1900)]
        );
        assert_eq!(
            back[1].disk,
            vec![DiskStats {
                name: "sda".into(),
                nr_ios: 20,
                rd_sect: 128,
                ..Default::default()
            }]
        );
    }

    #[test]
    fn test_extra_cpus_clamped_to_defined_count() {
        let mut session = Session::new(SessionConfig {
            groups: Some(vec!["cpu".into()]),
            ..Default::default()
        })
        .unwrap();
        let mut store = MemoryStore::new();
        let first = SampleInput {
            timestamp: 0,
            cpu: vec![CpuStats::default(), cpu(10, 100), cpu(20, 100)],
            ..Default::default()
        };
        session
            .define(&mut store, &header(), std::slice::from_ref(&first))
            .unwrap();
        session.export_record(&mut store, &first).unwrap();

        let grown = SampleInput {
            timestamp: 10,
            cpu: vec![
                CpuStats::default(),
                cpu(15, 110),
                cpu(25, 110),
                cpu(5, 5),
                cpu(7, 7),
            ],
            ..Default::default()
        };
        session.export_record(&mut store, &grown).unwrap();

        assert_eq!(
            store.value_text(1, "kernel.percpu.cpu.user", Some("cpu1")),
            Some("25")
        );
        assert_eq!(
            store.value_text(1, "kernel.percpu.cpu.user", Some("cpu2")),
            None
        );
        assert_eq!(
            store.value_text(1, "kernel.percpu.cpu.user", Some("cpu3")),
            None
        );
        // "all" only sums the defined CPUs.
        assert_eq!(store.value_text(1, "kernel.all.cpu.user", None), Some("40"));
        let labels: Vec<&str> = store
            .instances()
            .instances_for(domains::PERCPU)
            .map(|(_, label)| label)
            .collect();
        assert_eq!(labels, vec!["cpu0", "cpu1"]);
    }
}
