//! Power management and sensor records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Clock frequency of one CPU, in hundredths of MHz. Record 0 is CPU "all".
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CpufreqStats {
    pub cpufreq: u64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FanStats {
    pub device: String,
    pub rpm: u64,
    pub rpm_min: u64,
}

/// Temperature sensor, degrees Celsius.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(default)]
pub struct TempStats {
    pub device: String,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
}

/// Voltage input sensor, volts.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(default)]
pub struct InStats {
    pub device: String,
    pub voltage: f64,
    pub voltage_min: f64,
    pub voltage_max: f64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct BatStats {
    pub bat_id: u32,
    /// Percent.
    pub capacity: u32,
    /// [`BatteryStatus`] code.
    pub status: u32,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct UsbStats {
    pub bus_nr: u32,
    pub vendor_id: u32,
    pub product_id: u32,
    /// Maximum power in units of 2 mA.
    pub bmaxpower: u32,
    pub manufacturer: String,
    pub product: String,
}

/// Battery charge status, as reported by `/sys/class/power_supply/BAT*/status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BatteryStatus {
    #[default]
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

impl BatteryStatus {
    const ALL: [BatteryStatus; 5] = [
        BatteryStatus::Unknown,
        BatteryStatus::Charging,
        BatteryStatus::Discharging,
        BatteryStatus::NotCharging,
        BatteryStatus::Full,
    ];

    /// Out-of-range codes map to `Unknown`.
    pub fn from_code(code: u32) -> Self {
        Self::ALL
            .get(code as usize)
            .copied()
            .unwrap_or(BatteryStatus::Unknown)
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            BatteryStatus::Unknown => "Unknown",
            BatteryStatus::Charging => "Charging",
            BatteryStatus::Discharging => "Discharging",
            BatteryStatus::NotCharging => "Not charging",
            BatteryStatus::Full => "Full",
        }
    }

    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.name() == name)
            .unwrap_or(BatteryStatus::Unknown)
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_status_codes() {
        assert_eq!(BatteryStatus::from_code(1), BatteryStatus::Charging);
        assert_eq!(BatteryStatus::from_code(3).name(), "Not charging");
        assert_eq!(BatteryStatus::from_code(99), BatteryStatus::Unknown);
        assert_eq!(BatteryStatus::from_name("Full").code(), 4);
        assert_eq!(BatteryStatus::from_name("bogus"), BatteryStatus::Unknown);
    }
}
