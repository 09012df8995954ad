//! Power management sensors: fans, temperatures, voltage inputs, USB devices
//! and batteries. Metrics live in domain 34.
//!
//! Sensor instances are numbered by their position in the sample, so record
//! `i` always maps to instance number `i`.

use super::{DefineCx, ExportCx, ImportCx, StatGroup, Values, WireField};
use crate::activity::{Activities, SampleInput};
use crate::catalog::MetricDescriptor;
use crate::error::SessionError;
use crate::ident::{InstanceDomainId, pmid};
use crate::model::BatteryStatus;
use crate::registry::domains;
use crate::value::{MetricValue, Semantics, Unit, ValueType};

const fn sensor(
    cluster: u32,
    item: u32,
    name: &'static str,
    value_type: ValueType,
    semantics: Semantics,
    indom: InstanceDomainId,
) -> MetricDescriptor {
    MetricDescriptor::new(
        pmid(34, cluster, item),
        name,
        value_type,
        semantics,
        Some(indom),
        Unit::None,
    )
}

/// Registers `label(i)` as instance `i` for every record position seen
/// during discovery.
fn define_positional(
    cx: &mut DefineCx<'_>,
    domain: InstanceDomainId,
    count: impl Fn(&SampleInput) -> usize,
    label: impl Fn(usize) -> String,
) -> Result<(), SessionError> {
    cx.define_all()?;
    let seen = cx.discovery.iter().map(count).max().unwrap_or(0);
    for i in 0..seen {
        cx.instance(domain, &label(i), i as i32)?;
    }
    Ok(())
}

/// Record index of instance `number`.
fn position(number: Option<i32>) -> Option<usize> {
    usize::try_from(number?).ok()
}

/// `(value - min) / (max - min)` as a percentage, 0 when the range is empty.
fn percent_of_range(value: f64, min: f64, max: f64) -> f32 {
    if max == min {
        0.0
    } else {
        ((value - min) / (max - min) * 100.0) as f32
    }
}

// ---------------------------------------------------------------------------
// fan
// ---------------------------------------------------------------------------

pub struct Fan;

fn fan_label(i: usize) -> String {
    format!("fan{}", i + 1)
}

impl StatGroup for Fan {
    const NAME: &'static str = "fan";
    const METRICS: &'static [MetricDescriptor] = &[
        sensor(
            0,
            0,
            "power.fan.rpm",
            ValueType::U64,
            Semantics::Instant,
            domains::FAN,
        ),
        sensor(
            0,
            1,
            "power.fan.drpm",
            ValueType::U64,
            Semantics::Instant,
            domains::FAN,
        ),
        sensor(
            0,
            2,
            "power.fan.device",
            ValueType::String,
            Semantics::Discrete,
            domains::FAN,
        ),
    ];

    fn present(acts: &Activities) -> bool {
        acts.fan.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        define_positional(cx, domains::FAN, |s| s.fan.len(), fan_label)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let fans = cx.acts.fan.records(cx.slot).to_vec();
        for (i, f) in fans.iter().enumerate().take(cx.acts.fan.nr_ini()) {
            let label = fan_label(i);
            cx.numbered(domains::FAN, &label, i as i32)?;
            cx.put(0, Some(&label), f.rpm.to_value())?;
            cx.put(
                1,
                Some(&label),
                MetricValue::U64(f.rpm.saturating_sub(f.rpm_min)),
            )?;
            cx.put(2, Some(&label), f.device.to_value())?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let slot = cx.slot;
        for (number, value) in values {
            let Some(i) = position(*number) else {
                continue;
            };
            match idx {
                0 => {
                    if let Some(v) = cx.decode::<u64>(idx, value) {
                        cx.acts.fan.record_mut(slot, i).rpm = v;
                    }
                }
                2 => {
                    if let Some(v) = cx.decode::<String>(idx, value) {
                        cx.acts.fan.record_mut(slot, i).device = v;
                    }
                }
                // drpm depends on rpm_min, which is not exported.
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// temp and in
// ---------------------------------------------------------------------------

pub struct Temp;

fn temp_label(i: usize) -> String {
    format!("temp{}", i + 1)
}

impl StatGroup for Temp {
    const NAME: &'static str = "temp";
    const METRICS: &'static [MetricDescriptor] = &[
        sensor(
            1,
            0,
            "power.temp.celsius",
            ValueType::Float,
            Semantics::Instant,
            domains::TEMP,
        ),
        sensor(
            1,
            1,
            "power.temp.percent",
            ValueType::Float,
            Semantics::Instant,
            domains::TEMP,
        ),
        sensor(
            1,
            2,
            "power.temp.device",
            ValueType::String,
            Semantics::Discrete,
            domains::TEMP,
        ),
    ];

    fn present(acts: &Activities) -> bool {
        acts.temp.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        define_positional(cx, domains::TEMP, |s| s.temp.len(), temp_label)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let temps = cx.acts.temp.records(cx.slot).to_vec();
        for (i, t) in temps.iter().enumerate().take(cx.acts.temp.nr_ini()) {
            let label = temp_label(i);
            cx.numbered(domains::TEMP, &label, i as i32)?;
            let percent = percent_of_range(t.temp, t.temp_min, t.temp_max);
            cx.put(0, Some(&label), MetricValue::Float(t.temp as f32))?;
            cx.put(1, Some(&label), MetricValue::Float(percent))?;
            cx.put(2, Some(&label), t.device.to_value())?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let slot = cx.slot;
        for (number, value) in values {
            let Some(i) = position(*number) else {
                continue;
            };
            match idx {
                0 => {
                    if let Some(v) = cx.decode::<f64>(idx, value) {
                        cx.acts.temp.record_mut(slot, i).temp = v;
                    }
                }
                2 => {
                    if let Some(v) = cx.decode::<String>(idx, value) {
                        cx.acts.temp.record_mut(slot, i).device = v;
                    }
                }
                _ => {}
            }
        }
    }
}

/// Voltage inputs.
pub struct Voltage;

fn in_label(i: usize) -> String {
    format!("in{i}")
}

impl StatGroup for Voltage {
    const NAME: &'static str = "in";
    const METRICS: &'static [MetricDescriptor] = &[
        sensor(
            2,
            0,
            "power.in.voltage",
            ValueType::Float,
            Semantics::Instant,
            domains::VOLTAGE,
        ),
        sensor(
            2,
            1,
            "power.in.percent",
            ValueType::Float,
            Semantics::Instant,
            domains::VOLTAGE,
        ),
        sensor(
            2,
            2,
            "power.in.device",
            ValueType::String,
            Semantics::Discrete,
            domains::VOLTAGE,
        ),
    ];

    fn present(acts: &Activities) -> bool {
        acts.voltage.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        define_positional(cx, domains::VOLTAGE, |s| s.voltage.len(), in_label)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let inputs = cx.acts.voltage.records(cx.slot).to_vec();
        for (i, v) in inputs.iter().enumerate().take(cx.acts.voltage.nr_ini()) {
            let label = in_label(i);
            cx.numbered(domains::VOLTAGE, &label, i as i32)?;
            let percent = percent_of_range(v.voltage, v.voltage_min, v.voltage_max);
            cx.put(0, Some(&label), MetricValue::Float(v.voltage as f32))?;
            cx.put(1, Some(&label), MetricValue::Float(percent))?;
            cx.put(2, Some(&label), v.device.to_value())?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let slot = cx.slot;
        for (number, value) in values {
            let Some(i) = position(*number) else {
                continue;
            };
            match idx {
                0 => {
                    if let Some(v) = cx.decode::<f64>(idx, value) {
                        cx.acts.voltage.record_mut(slot, i).voltage = v;
                    }
                }
                2 => {
                    if let Some(v) = cx.decode::<String>(idx, value) {
                        cx.acts.voltage.record_mut(slot, i).device = v;
                    }
                }
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// usb
// ---------------------------------------------------------------------------

/// Plugged USB devices. Vendor and product ids are exported as lowercase hex.
pub struct Usb;

fn usb_label(i: usize) -> String {
    format!("usb{i}")
}

impl StatGroup for Usb {
    const NAME: &'static str = "usb";
    const METRICS: &'static [MetricDescriptor] = &[
        sensor(
            3,
            0,
            "power.usb.bus",
            ValueType::U32,
            Semantics::Discrete,
            domains::USB,
        ),
        sensor(
            3,
            1,
            "power.usb.vendorId",
            ValueType::String,
            Semantics::Discrete,
            domains::USB,
        ),
        sensor(
            3,
            2,
            "power.usb.productId",
            ValueType::String,
            Semantics::Discrete,
            domains::USB,
        ),
        sensor(
            3,
            3,
            "power.usb.maxpower",
            ValueType::U32,
            Semantics::Discrete,
            domains::USB,
        ),
        sensor(
            3,
            4,
            "power.usb.manufacturer",
            ValueType::String,
            Semantics::Discrete,
            domains::USB,
        ),
        sensor(
            3,
            5,
            "power.usb.productName",
            ValueType::String,
            Semantics::Discrete,
            domains::USB,
        ),
    ];

    fn present(acts: &Activities) -> bool {
        acts.usb.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        define_positional(cx, domains::USB, |s| s.usb.len(), usb_label)
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let devices = cx.acts.usb.records(cx.slot).to_vec();
        for (i, u) in devices.iter().enumerate().take(cx.acts.usb.nr_ini()) {
            let label = usb_label(i);
            cx.numbered(domains::USB, &label, i as i32)?;
            let values = [
                u.bus_nr.to_value(),
                MetricValue::String(format!("{:x}", u.vendor_id)),
                MetricValue::String(format!("{:x}", u.product_id)),
                MetricValue::U32(u.bmaxpower.saturating_mul(2)),
                u.manufacturer.to_value(),
                u.product.to_value(),
            ];
            for (idx, value) in values.into_iter().enumerate() {
                cx.put(idx, Some(&label), value)?;
            }
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let slot = cx.slot;
        for (number, value) in values {
            let Some(i) = position(*number) else {
                continue;
            };
            match idx {
                0 | 3 => {
                    let Some(v) = cx.decode::<u32>(idx, value) else {
                        continue;
                    };
                    let u = cx.acts.usb.record_mut(slot, i);
                    if idx == 0 {
                        u.bus_nr = v;
                    } else {
                        u.bmaxpower = v / 2;
                    }
                }
                _ => {
                    let Some(s) = cx.decode::<String>(idx, value) else {
                        continue;
                    };
                    let u = cx.acts.usb.record_mut(slot, i);
                    match idx {
                        1 => u.vendor_id = u32::from_str_radix(&s, 16).unwrap_or_default(),
                        2 => u.product_id = u32::from_str_radix(&s, 16).unwrap_or_default(),
                        4 => u.manufacturer = s,
                        _ => u.product = s,
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// bat
// ---------------------------------------------------------------------------

pub struct Battery;

fn bat_label(id: u32) -> String {
    format!("BAT{id}")
}

impl StatGroup for Battery {
    const NAME: &'static str = "bat";
    const METRICS: &'static [MetricDescriptor] = &[
        sensor(
            4,
            0,
            "power.bat.capacity",
            ValueType::U32,
            Semantics::Instant,
            domains::BATTERY,
        ),
        sensor(
            4,
            1,
            "power.bat.status",
            ValueType::String,
            Semantics::Instant,
            domains::BATTERY,
        ),
    ];

    fn present(acts: &Activities) -> bool {
        acts.bat.nr_ini() > 0
    }

    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        cx.define_all()?;
        let discovery = cx.discovery;
        for sample in discovery {
            for (i, b) in sample.bat.iter().enumerate() {
                cx.instance(domains::BATTERY, &bat_label(b.bat_id), i as i32)?;
            }
        }
        Ok(())
    }

    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
        let batteries = cx.acts.bat.records(cx.slot).to_vec();
        for (i, b) in batteries.iter().enumerate().take(cx.acts.bat.nr_ini()) {
            let label = bat_label(b.bat_id);
            cx.numbered(domains::BATTERY, &label, i as i32)?;
            cx.put(0, Some(&label), b.capacity.to_value())?;
            let status = BatteryStatus::from_code(b.status).name();
            cx.put(1, Some(&label), MetricValue::String(status.to_string()))?;
        }
        Ok(())
    }

    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
        let slot = cx.slot;
        for (number, value) in values {
            let Some(i) = position(*number) else {
                continue;
            };
            let bat_id = cx
                .label(idx, *number)
                .and_then(|l| l.strip_prefix("BAT"))
                .and_then(|id| id.parse::<u32>().ok());
            let decoded = if idx == 0 {
                cx.decode::<u32>(idx, value)
            } else {
                cx.decode::<String>(idx, value)
                    .map(|s| BatteryStatus::from_name(&s).code())
            };
            let Some(v) = decoded else {
                continue;
            };
            let b = cx.acts.bat.record_mut(slot, i);
            if let Some(id) = bat_id {
                b.bat_id = id;
            }
            if idx == 0 {
                b.capacity = v;
            } else {
                b.status = v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::groups::GroupId;
    use crate::groups::testing::Harness;
    use crate::model::{BatStats, FanStats, InStats, TempStats, UsbStats};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fan_drpm_floored() {
        let s = SampleInput {
            fan: vec![
                FanStats {
                    device: "nct6775".into(),
                    rpm: 1200,
                    rpm_min: 300,
                },
                FanStats {
                    device: "nct6775".into(),
                    rpm: 100,
                    rpm_min: 300,
                },
            ],
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Fan,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        assert_eq!(
            h.labels(domains::FAN),
            vec![(0, "fan1".to_string()), (1, "fan2".to_string())]
        );
        h.export(&s);
        assert_eq!(h.value(0, "power.fan.drpm", Some("fan1")), Some("900"));
        assert_eq!(h.value(0, "power.fan.drpm", Some("fan2")), Some("0"));

        let back = h.import_all();
        assert_eq!(back[0].fan[1].rpm, 100);
        assert_eq!(back[0].fan[1].rpm_min, 0);
        assert_eq!(back[0].fan[0].device, "nct6775");
    }

    #[test]
    fn test_temp_and_in_percent() {
        let s = SampleInput {
            temp: vec![
                TempStats {
                    device: "coretemp".into(),
                    temp: 45.5,
                    temp_min: 20.0,
                    temp_max: 70.0,
                },
                TempStats {
                    device: "acpitz".into(),
                    temp: 30.0,
                    temp_min: 30.0,
                    temp_max: 30.0,
                },
            ],
            voltage: vec![InStats {
                device: "in0".into(),
                voltage: 1.5,
                voltage_min: 1.0,
                voltage_max: 2.0,
            }],
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Temp,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(
            h.value(0, "power.temp.celsius", Some("temp1")),
            Some("45.5")
        );
        assert_eq!(h.value(0, "power.temp.percent", Some("temp1")), Some("51"));
        assert_eq!(h.value(0, "power.temp.percent", Some("temp2")), Some("0"));
        assert_eq!(h.import_all()[0].temp[0].temp, 45.5);

        let mut h = Harness::new(
            GroupId::Voltage,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(h.labels(domains::VOLTAGE), vec![(0, "in0".to_string())]);
        assert_eq!(h.value(0, "power.in.percent", Some("in0")), Some("50"));
    }

    #[test]
    fn test_usb_hex_ids() {
        let s = SampleInput {
            usb: vec![UsbStats {
                bus_nr: 3,
                vendor_id: 0x046d,
                product_id: 0xC52B,
                bmaxpower: 49,
                manufacturer: "Logitech".into(),
                product: "USB Receiver".into(),
            }],
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Usb,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(h.value(0, "power.usb.vendorId", Some("usb0")), Some("46d"));
        assert_eq!(
            h.value(0, "power.usb.productId", Some("usb0")),
            Some("c52b")
        );
        assert_eq!(h.value(0, "power.usb.maxpower", Some("usb0")), Some("98"));
        assert_eq!(h.import_all()[0].usb, s.usb);
    }

    #[test]
    fn test_battery_status_names() {
        let s = SampleInput {
            bat: vec![
                BatStats {
                    bat_id: 0,
                    capacity: 87,
                    status: 3,
                },
                BatStats {
                    bat_id: 1,
                    capacity: 100,
                    status: 42,
                },
            ],
            ..Default::default()
        };
        let mut h = Harness::new(
            GroupId::Battery,
            SessionConfig::default(),
            std::slice::from_ref(&s),
        );
        h.export(&s);
        assert_eq!(
            h.value(0, "power.bat.status", Some("BAT0")),
            Some("Not charging")
        );
        assert_eq!(
            h.value(0, "power.bat.status", Some("BAT1")),
            Some("Unknown")
        );

        let back = h.import_all();
        assert_eq!(
            back[0].bat,
            vec![
                BatStats {
                    bat_id: 0,
                    capacity: 87,
                    status: 3,
                },
                BatStats {
                    bat_id: 1,
                    capacity: 100,
                    status: 0,
                },
            ]
        );
    }
}
