//! Block device display names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub trait DeviceNamer {
    fn device_name(&self, major: u32, minor: u32) -> String;
}

/// Names every device `dev<major>-<minor>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultNamer;

impl DeviceNamer for DefaultNamer {
    fn device_name(&self, major: u32, minor: u32) -> String {
        format!("dev{major}-{minor}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceName {
    pub major: u32,
    pub minor: u32,
    pub name: String,
}

/// Looks names up in a table, falling back to [`DefaultNamer`].
#[derive(Clone, Debug, Default)]
pub struct TableNamer {
    names: HashMap<(u32, u32), String>,
}

impl TableNamer {
    pub fn new(entries: &[DeviceName]) -> Self {
        Self {
            names: entries
                .iter()
                .map(|e| ((e.major, e.minor), e.name.clone()))
                .collect(),
        }
    }
}

impl DeviceNamer for TableNamer {
    fn device_name(&self, major: u32, minor: u32) -> String {
        self.names
            .get(&(major, minor))
            .cloned()
            .unwrap_or_else(|| DefaultNamer.device_name(major, minor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_with_fallback() {
        let namer = TableNamer::new(&[DeviceName {
            major: 8,
            minor: 0,
            name: "sda".into(),
        }]);
        assert_eq!(namer.device_name(8, 0), "sda");
        assert_eq!(namer.device_name(253, 1), "dev253-1");
    }
}
