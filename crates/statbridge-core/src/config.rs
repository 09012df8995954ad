//! Session configuration.
//!
//! Everything is optional in the serialized form; missing fields take the
//! defaults below (all groups, all CPUs, all devices, RAM memory metrics).

use serde::{Deserialize, Serialize};

use crate::filter::Bitmap;
use crate::naming::DeviceName;

/// Which memory metric families are exported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryDisplay {
    /// RAM utilization.
    pub ram: bool,
    /// Extra kernel memory fields (anon pages, slab, stacks, page tables, vmalloc).
    pub all: bool,
    pub swap: bool,
}

impl Default for MemoryDisplay {
    fn default() -> Self {
        Self {
            ram: true,
            all: false,
            swap: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Selected CPUs (0-based). `None` selects every CPU.
    pub cpus: Option<Vec<usize>>,
    /// Whether the aggregate CPU "all" is selected.
    pub include_all: bool,
    /// Enabled statistic groups by name. `None` enables all of them.
    pub groups: Option<Vec<String>>,
    pub memory: MemoryDisplay,
    /// Item filters: only these names are exported when set.
    pub disks: Option<Vec<String>>,
    pub interfaces: Option<Vec<String>>,
    pub filesystems: Option<Vec<String>>,
    /// Display names for block devices.
    pub device_names: Vec<DeviceName>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cpus: None,
            include_all: true,
            groups: None,
            memory: MemoryDisplay::default(),
            disks: None,
            interfaces: None,
            filesystems: None,
            device_names: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn group_enabled(&self, name: &str) -> bool {
        self.groups
            .as_ref()
            .is_none_or(|groups| groups.iter().any(|g| g == name))
    }

    /// Selection bitmap for per-CPU groups, sized for `nr` instances
    /// ("all" included).
    pub fn cpu_selection(&self, nr: usize) -> Bitmap {
        let mut bm = Bitmap::new(nr);
        if self.include_all {
            bm.set(0);
        }
        match &self.cpus {
            None => (1..nr).for_each(|i| bm.set(i)),
            Some(cpus) => cpus.iter().for_each(|&cpu| bm.set(cpu + 1)),
        }
        bm
    }
}
