//! Instance-domain registry.
//!
//! Keeps, per instance domain, the `(number, label)` pairs created during
//! definition, in insertion order. Label lookups go through an xxh3-keyed
//! index so repeated label strings are not rehashed by the std hasher.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::RegistryError;
use crate::ident::InstanceDomainId;

/// Well-known instance domains.
pub mod domains {
    use crate::ident::{InstanceDomainId, indom};

    pub const PERCPU: InstanceDomainId = indom(60, 0);
    pub const DISK: InstanceDomainId = indom(60, 1);
    pub const LOAD_AVG: InstanceDomainId = indom(60, 2);
    pub const NET_DEV: InstanceDomainId = indom(60, 3);
    pub const IRQ: InstanceDomainId = indom(60, 4);
    pub const FILESYS: InstanceDomainId = indom(60, 5);
    pub const NFS_REQUEST: InstanceDomainId = indom(60, 7);
    pub const SERIAL: InstanceDomainId = indom(60, 35);
    pub const PSI: InstanceDomainId = indom(60, 37);
    pub const FCHOST: InstanceDomainId = indom(60, 39);
    pub const PERCPU_INTERRUPT: InstanceDomainId = indom(60, 40);
    pub const FAN: InstanceDomainId = indom(34, 0);
    pub const TEMP: InstanceDomainId = indom(34, 1);
    pub const VOLTAGE: InstanceDomainId = indom(34, 2);
    pub const USB: InstanceDomainId = indom(34, 3);
    pub const BATTERY: InstanceDomainId = indom(34, 4);
}

// ---------------------------------------------------------------------------
// Fixed numbering policies
// ---------------------------------------------------------------------------

/// Load-average periods, numbered by their length in minutes.
pub const LOAD_AVG_INSTANCES: [(i32, &str); 3] =
    [(1, "1 minute"), (5, "5 minute"), (15, "15 minute")];

/// Pressure-stall averaging windows, numbered by their length in seconds.
pub const PSI_INSTANCES: [(i32, &str); 3] =
    [(10, "10 second"), (60, "1 minute"), (300, "5 minute")];

/// NFS request kinds, numbered by their protocol opcode.
pub const NFS_REQUEST_INSTANCES: [(i32, &str); 4] =
    [(4, "getattr"), (6, "read"), (8, "write"), (18, "access")];

/// Label of CPU `cpu` (0-based, i.e. bitmap index − 1).
pub fn percpu_label(cpu: usize) -> String {
    format!("cpu{cpu}")
}

/// Label of interrupt `line` as seen by CPU `cpu`.
pub fn percpu_interrupt_label(line: &str, cpu: usize) -> String {
    format!("{line}::cpu{cpu}")
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub domain: InstanceDomainId,
    pub number: i32,
    pub label: String,
}

#[derive(Clone, Debug, Default)]
struct DomainInstances {
    entries: Vec<(i32, String)>,
    by_number: HashMap<i32, usize>,
    /// xxh3(label) -> positions in `entries`. More than one only on hash collision.
    by_label: HashMap<u64, Vec<usize>>,
}

impl DomainInstances {
    fn position_of_label(&self, label: &str) -> Option<usize> {
        self.by_label
            .get(&xxh3_64(label.as_bytes()))?
            .iter()
            .copied()
            .find(|&pos| self.entries[pos].1 == label)
    }
}

/// Per-session instance bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct InstanceRegistry {
    domains: HashMap<InstanceDomainId, DomainInstances>,
    /// Domains in first-insertion order, for deterministic dumps.
    order: Vec<InstanceDomainId>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `(number, label)` in `domain`.
    ///
    /// Returns `Ok(true)` when the instance is new and `Ok(false)` when the
    /// exact pair already exists.
    pub fn add_instance(
        &mut self,
        domain: InstanceDomainId,
        label: &str,
        number: i32,
    ) -> Result<bool, RegistryError> {
        if let Some(dom) = self.domains.get(&domain) {
            if let Some(&pos) = dom.by_number.get(&number) {
                let existing = &dom.entries[pos].1;
                if existing == label {
                    return Ok(false);
                }
                return Err(RegistryError::ConflictingInstance {
                    domain,
                    number,
                    existing: existing.clone(),
                    label: label.to_string(),
                });
            }
            if let Some(pos) = dom.position_of_label(label) {
                return Err(RegistryError::DuplicateLabel {
                    domain,
                    label: label.to_string(),
                    existing: dom.entries[pos].0,
                    number,
                });
            }
        } else {
            self.order.push(domain);
        }

        let dom = self.domains.entry(domain).or_default();
        let pos = dom.entries.len();
        dom.entries.push((number, label.to_string()));
        dom.by_number.insert(number, pos);
        dom.by_label
            .entry(xxh3_64(label.as_bytes()))
            .or_default()
            .push(pos);
        Ok(true)
    }

    /// Instances of `domain` in insertion order. Empty for unknown domains.
    pub fn instances_for(
        &self,
        domain: InstanceDomainId,
    ) -> impl Iterator<Item = (i32, &str)> + Clone + '_ {
        self.domains
            .get(&domain)
            .map(|d| d.entries.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|(n, l)| (*n, l.as_str()))
    }

    pub fn label_of(&self, domain: InstanceDomainId, number: i32) -> Option<&str> {
        let dom = self.domains.get(&domain)?;
        dom.by_number
            .get(&number)
            .map(|&pos| dom.entries[pos].1.as_str())
    }

    pub fn number_of(&self, domain: InstanceDomainId, label: &str) -> Option<i32> {
        let dom = self.domains.get(&domain)?;
        dom.position_of_label(label).map(|pos| dom.entries[pos].0)
    }

    /// Next free sequential number: one past the highest number in use.
    pub fn next_number(&self, domain: InstanceDomainId) -> i32 {
        self.domains
            .get(&domain)
            .and_then(|d| d.entries.iter().map(|(n, _)| *n).max())
            .map_or(0, |n| n + 1)
    }

    /// Returns the number of `label`, registering it with the next sequential
    /// number when it is not known yet.
    pub fn ensure_instance(
        &mut self,
        domain: InstanceDomainId,
        label: &str,
    ) -> Result<i32, RegistryError> {
        if let Some(number) = self.number_of(domain, label) {
            return Ok(number);
        }
        let number = self.next_number(domain);
        self.add_instance(domain, label, number)?;
        Ok(number)
    }

    /// Number of instances in `domain`.
    pub fn len(&self, domain: InstanceDomainId) -> usize {
        self.domains.get(&domain).map_or(0, |d| d.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.domains.values().all(|d| d.entries.is_empty())
    }

    pub fn domains(&self) -> impl Iterator<Item = InstanceDomainId> + '_ {
        self.order.iter().copied()
    }

    /// Flattened view, domains in first-insertion order.
    pub fn to_instances(&self) -> Vec<Instance> {
        self.order
            .iter()
            .flat_map(|&domain| {
                self.instances_for(domain).map(move |(number, label)| Instance {
                    domain,
                    number,
                    label: label.to_string(),
                })
            })
            .collect()
    }
}

impl TryFrom<Vec<Instance>> for InstanceRegistry {
    type Error = RegistryError;

    fn try_from(instances: Vec<Instance>) -> Result<Self, Self::Error> {
        let mut registry = Self::new();
        for inst in instances {
            registry.add_instance(inst.domain, &inst.label, inst.number)?;
        }
        Ok(registry)
    }
}

impl Serialize for InstanceRegistry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_instances().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InstanceRegistry {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let instances = Vec::<Instance>::deserialize(deserializer)?;
        Self::try_from(instances).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::indom;

    const NET: InstanceDomainId = indom(60, 3);

    #[test]
    fn test_add_instance_is_idempotent() {
        let mut reg = InstanceRegistry::new();
        assert_eq!(reg.add_instance(NET, "eth0", 0), Ok(true));
        assert_eq!(reg.add_instance(NET, "eth0", 0), Ok(false));
        assert_eq!(reg.len(NET), 1);

        let err = reg.add_instance(NET, "eth1", 0).unwrap_err();
        assert_eq!(
            err,
            RegistryError::ConflictingInstance {
                domain: NET,
                number: 0,
                existing: "eth0".into(),
                label: "eth1".into(),
            }
        );
        assert_eq!(
            reg.instances_for(NET).collect::<Vec<_>>(),
            vec![(0, "eth0")]
        );
    }

    #[test]
    fn test_label_reuse_with_other_number_rejected() {
        let mut reg = InstanceRegistry::new();
        reg.add_instance(NET, "eth0", 0).unwrap();
        assert!(matches!(
            reg.add_instance(NET, "eth0", 3),
            Err(RegistryError::DuplicateLabel {
                existing: 0,
                number: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_insertion_order_and_restartable_iteration() {
        let mut reg = InstanceRegistry::new();
        for (n, label) in [(0, "timer"), (1, "i8042"), (2, "rtc0"), (3, "acpi")] {
            reg.add_instance(domains::IRQ, label, n).unwrap();
        }
        let iter = reg.instances_for(domains::IRQ);
        let first: Vec<_> = iter.clone().map(|(_, l)| l).collect();
        let second: Vec<_> = iter.map(|(_, l)| l).collect();
        assert_eq!(first, vec!["timer", "i8042", "rtc0", "acpi"]);
        assert_eq!(first, second);
        assert_eq!(reg.instances_for(domains::DISK).count(), 0);
    }

    #[test]
    fn test_lookups() {
        let mut reg = InstanceRegistry::new();
        for (n, l) in LOAD_AVG_INSTANCES {
            reg.add_instance(domains::LOAD_AVG, l, n).unwrap();
        }
        assert_eq!(reg.label_of(domains::LOAD_AVG, 5), Some("5 minute"));
        assert_eq!(reg.number_of(domains::LOAD_AVG, "15 minute"), Some(15));
        assert_eq!(reg.label_of(domains::LOAD_AVG, 2), None);
        assert_eq!(reg.next_number(domains::LOAD_AVG), 16);
        assert_eq!(reg.next_number(domains::DISK), 0);
    }

    #[test]
    fn test_ensure_instance_numbers_sequentially() {
        let mut reg = InstanceRegistry::new();
        assert_eq!(reg.ensure_instance(domains::DISK, "sda"), Ok(0));
        assert_eq!(reg.ensure_instance(domains::DISK, "sdb"), Ok(1));
        assert_eq!(reg.ensure_instance(domains::DISK, "sda"), Ok(0));
        assert_eq!(reg.len(domains::DISK), 2);
    }

    #[test]
    fn test_serde_preserves_order() {
        let mut reg = InstanceRegistry::new();
        reg.add_instance(domains::NFS_REQUEST, "getattr", 4)
            .unwrap();
        reg.add_instance(domains::NFS_REQUEST, "read", 6).unwrap();
        reg.add_instance(NET, "lo", 0).unwrap();

        let json = serde_json::to_string(&reg).unwrap();
        let back: InstanceRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_instances(), reg.to_instances());
        assert_eq!(
            back.domains().collect::<Vec<_>>(),
            vec![domains::NFS_REQUEST, NET]
        );
    }

    #[test]
    fn test_interrupt_labels() {
        assert_eq!(percpu_label(3), "cpu3");
        assert_eq!(percpu_interrupt_label("timer", 1), "timer::cpu1");
    }
}
