//! External metric store seam and an in-memory implementation.
//!
//! The bridge hands the store `(metric, instance label, text)` triples and
//! closes each sample with [`MetricStore::write_record`]. [`MemoryStore`] keeps
//! everything in memory and serializes to JSON, which is what the CLI uses as
//! its archive stand-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::MetricDescriptor;
use crate::error::StoreError;
use crate::ident::{InstanceDomainId, MetricId};
use crate::registry::InstanceRegistry;
use crate::value::{MetricValue, Semantics, Unit, ValueType};

/// Opaque handle returned by the store for a registered metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricHandle(pub usize);

pub trait MetricStore {
    /// Registers a metric. Registering the same descriptor twice returns the
    /// original handle; the same id with a different descriptor is
    /// [`StoreError::Duplicate`].
    fn add_metric(&mut self, desc: &MetricDescriptor) -> Result<MetricHandle, StoreError>;

    fn add_instance(
        &mut self,
        domain: InstanceDomainId,
        label: &str,
        number: i32,
    ) -> Result<(), StoreError>;

    /// Queues a value for the record being built.
    fn put_value(
        &mut self,
        handle: MetricHandle,
        instance: Option<&str>,
        text: &str,
    ) -> Result<(), StoreError>;

    /// Closes the record being built, stamping it with `timestamp` (unix seconds).
    fn write_record(&mut self, timestamp: i64) -> Result<(), StoreError>;

    /// Stops accepting definitions and values.
    fn seal(&mut self);

    fn is_sealed(&self) -> bool;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMetric {
    pub id: MetricId,
    pub name: String,
    pub value_type: ValueType,
    pub semantics: Semantics,
    pub indom: Option<InstanceDomainId>,
    pub unit: Unit,
}

impl StoredMetric {
    fn matches(&self, desc: &MetricDescriptor) -> bool {
        self.name == desc.name
            && self.value_type == desc.value_type
            && self.semantics == desc.semantics
            && self.indom == desc.indom
            && self.unit == desc.unit
    }
}

impl From<&MetricDescriptor> for StoredMetric {
    fn from(desc: &MetricDescriptor) -> Self {
        Self {
            id: desc.id,
            name: desc.name.to_string(),
            value_type: desc.value_type,
            semantics: desc.semantics,
            indom: desc.indom,
            unit: desc.unit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub metric: MetricId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unix seconds.
    pub timestamp: i64,
    pub values: Vec<StoredValue>,
}

impl Record {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
    }
}

/// Values of one metric within one record, decoded by declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueSet {
    pub id: MetricId,
    /// `(instance number, value)`; the number is `None` for singular metrics.
    pub values: Vec<(Option<i32>, MetricValue)>,
}

/// One decoded record.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedRecord {
    pub timestamp: i64,
    pub sets: Vec<ValueSet>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    metrics: Vec<StoredMetric>,
    instances: InstanceRegistry,
    records: Vec<Record>,
    #[serde(skip)]
    pending: Vec<StoredValue>,
    #[serde(default)]
    sealed: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> &[StoredMetric] {
        &self.metrics
    }

    pub fn instances(&self) -> &InstanceRegistry {
        &self.instances
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn metric(&self, id: MetricId) -> Option<&StoredMetric> {
        self.metrics.iter().find(|m| m.id == id)
    }

    pub fn metric_by_name(&self, name: &str) -> Option<&StoredMetric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Text of `name`/`instance` in record `record`, if present.
    pub fn value_text(&self, record: usize, name: &str, instance: Option<&str>) -> Option<&str> {
        let id = self.metric_by_name(name)?.id;
        self.records
            .get(record)?
            .values
            .iter()
            .find(|v| v.metric == id && v.instance.as_deref() == instance)
            .map(|v| v.text.as_str())
    }

    /// Decodes every record into value sets, grouped per metric in first
    /// appearance order.
    pub fn fetch(&self) -> Vec<FetchedRecord> {
        self.records.iter().map(|r| self.decode_record(r)).collect()
    }

    fn decode_record(&self, record: &Record) -> FetchedRecord {
        let mut sets: Vec<ValueSet> = Vec::new();
        for stored in &record.values {
            let Some(metric) = self.metric(stored.metric) else {
                debug!(metric = %stored.metric, "value for unregistered metric skipped");
                continue;
            };
            let value = match MetricValue::parse(metric.value_type, &stored.text) {
                Ok(v) => v,
                Err(err) => {
                    warn!(metric = %metric.name, error = %err, "undecodable value skipped");
                    continue;
                }
            };
            let number = match (metric.indom, stored.instance.as_deref()) {
                (Some(domain), Some(label)) => match self.instances.number_of(domain, label) {
                    Some(n) => Some(n),
                    None => {
                        warn!(metric = %metric.name, instance = label, "unknown instance skipped");
                        continue;
                    }
                },
                _ => None,
            };
            match sets.iter_mut().find(|s| s.id == stored.metric) {
                Some(set) => set.values.push((number, value)),
                None => sets.push(ValueSet {
                    id: stored.metric,
                    values: vec![(number, value)],
                }),
            }
        }
        FetchedRecord {
            timestamp: record.timestamp,
            sets,
        }
    }
}

impl MetricStore for MemoryStore {
    fn add_metric(&mut self, desc: &MetricDescriptor) -> Result<MetricHandle, StoreError> {
        if self.sealed {
            return Err(StoreError::Sealed);
        }
        if let Some(pos) = self.metrics.iter().position(|m| m.id == desc.id) {
            if self.metrics[pos].matches(desc) {
                return Ok(MetricHandle(pos));
            }
            return Err(StoreError::Duplicate {
                id: desc.id,
                name: desc.name.to_string(),
            });
        }
        self.metrics.push(StoredMetric::from(desc));
        Ok(MetricHandle(self.metrics.len() - 1))
    }

    fn add_instance(
        &mut self,
        domain: InstanceDomainId,
        label: &str,
        number: i32,
    ) -> Result<(), StoreError> {
        if self.sealed {
            return Err(StoreError::Sealed);
        }
        self.instances.add_instance(domain, label, number)?;
        Ok(())
    }

    fn put_value(
        &mut self,
        handle: MetricHandle,
        instance: Option<&str>,
        text: &str,
    ) -> Result<(), StoreError> {
        if self.sealed {
            return Err(StoreError::Sealed);
        }
        let metric = self
            .metrics
            .get(handle.0)
            .ok_or(StoreError::UnknownHandle(handle.0))?;
        let instance = match (metric.indom, instance) {
            (Some(domain), Some(label)) => {
                if self.instances.number_of(domain, label).is_none() {
                    return Err(StoreError::UnknownInstance {
                        domain,
                        label: label.to_string(),
                    });
                }
                Some(label.to_string())
            }
            (Some(_), None) => return Err(StoreError::MissingInstance(metric.id)),
            (None, _) => None,
        };
        self.pending.push(StoredValue {
            metric: metric.id,
            instance,
            text: text.to_string(),
        });
        Ok(())
    }

    fn write_record(&mut self, timestamp: i64) -> Result<(), StoreError> {
        if self.sealed {
            return Err(StoreError::Sealed);
        }
        let values = std::mem::take(&mut self.pending);
        debug!(timestamp, values = values.len(), "record written");
        self.records.push(Record { timestamp, values });
        Ok(())
    }

    fn seal(&mut self) {
        self.sealed = true;
    }

    fn is_sealed(&self) -> bool {
        self.sealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::pmid;
    use crate::registry::domains;

    const LOAD: MetricDescriptor = MetricDescriptor::new(
        pmid(60, 2, 0),
        "kernel.all.load",
        ValueType::Float,
        Semantics::Instant,
        Some(domains::LOAD_AVG),
        Unit::None,
    );
    const NPROCS: MetricDescriptor = MetricDescriptor::new(
        pmid(60, 2, 3),
        "kernel.all.nprocs",
        ValueType::U32,
        Semantics::Instant,
        None,
        Unit::None,
    );

    #[test]
    fn test_put_and_fetch() {
        let mut store = MemoryStore::new();
        let load = store.add_metric(&LOAD).unwrap();
        let nprocs = store.add_metric(&NPROCS).unwrap();
        store
            .add_instance(domains::LOAD_AVG, "1 minute", 1)
            .unwrap();
        store
            .add_instance(domains::LOAD_AVG, "5 minute", 5)
            .unwrap();

        store.put_value(nprocs, None, "312").unwrap();
        store.put_value(load, Some("1 minute"), "0.25").unwrap();
        store.put_value(load, Some("5 minute"), "1.5").unwrap();
        store.write_record(1_700_000_000).unwrap();

        let fetched = store.fetch();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].timestamp, 1_700_000_000);
        assert_eq!(
            fetched[0].sets,
            vec![
                ValueSet {
                    id: NPROCS.id,
                    values: vec![(None, MetricValue::U32(312))],
                },
                ValueSet {
                    id: LOAD.id,
                    values: vec![
                        (Some(1), MetricValue::Float(0.25)),
                        (Some(5), MetricValue::Float(1.5))
                    ]
                },
            ]
        );
        assert_eq!(
            store.value_text(0, "kernel.all.load", Some("5 minute")),
            Some("1.5")
        );
    }

    #[test]
    fn test_add_metric_same_descriptor_reuses_handle() {
        let mut store = MemoryStore::new();
        let a = store.add_metric(&LOAD).unwrap();
        let b = store.add_metric(&LOAD).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.metrics().len(), 1);
    }

    #[test]
    fn test_put_value_checks_instances() {
        let mut store = MemoryStore::new();
        let load = store.add_metric(&LOAD).unwrap();
        assert!(matches!(
            store.put_value(load, Some("2 minute"), "1"),
            Err(StoreError::UnknownInstance { .. })
        ));
        assert_eq!(
            store.put_value(load, None, "1"),
            Err(StoreError::MissingInstance(LOAD.id))
        );
        assert_eq!(
            store.put_value(MetricHandle(9), None, "1"),
            Err(StoreError::UnknownHandle(9))
        );
    }

    #[test]
    fn test_sealed_store_rejects_everything() {
        let mut store = MemoryStore::new();
        let h = store.add_metric(&NPROCS).unwrap();
        store.seal();
        assert_eq!(store.add_metric(&LOAD), Err(StoreError::Sealed));
        assert_eq!(store.put_value(h, None, "1"), Err(StoreError::Sealed));
        assert_eq!(store.write_record(0), Err(StoreError::Sealed));
    }

    #[test]
    fn test_json_dump_roundtrip() {
        let mut store = MemoryStore::new();
        let load = store.add_metric(&LOAD).unwrap();
        store
            .add_instance(domains::LOAD_AVG, "15 minute", 15)
            .unwrap();
        store.put_value(load, Some("15 minute"), "0.05").unwrap();
        store.write_record(60).unwrap();

        let json = serde_json::to_string(&store).unwrap();
        let back: MemoryStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metrics(), store.metrics());
        assert_eq!(back.records(), store.records());
        assert_eq!(back.fetch(), store.fetch());
        assert_eq!(back.records()[0].time().unwrap().timestamp(), 60);
    }
}
