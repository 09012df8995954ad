//! Statistic groups.
//!
//! Each group owns a static descriptor table and knows how to register it,
//! how to turn one sample of its records into metric values, and how to write
//! decoded values back into records. Flat single-record groups are generated
//! by [`flat_group!`]; the rest are written out by hand.

use tracing::{debug, warn};

use crate::activity::{Activities, SampleInput};
use crate::buffer::Slot;
use crate::catalog::{Catalog, MetricDescriptor};
use crate::config::SessionConfig;
use crate::delta::CounterDeltas;
use crate::error::SessionError;
use crate::ident::InstanceDomainId;
use crate::naming::DeviceNamer;
use crate::registry::InstanceRegistry;
use crate::store::MetricStore;
use crate::value::MetricValue;

mod cpu;
mod devices;
mod header;
mod irq;
mod memory;
mod network;
mod power;
mod psi;

pub use cpu::{Cpu, Cpufreq, Pcsw, Softnet};
pub use devices::{Disk, Fchost, Filesystem, Serial};
pub use header::{FileHeaderGroup, RecordHeaderGroup};
pub use irq::Irq;
pub use memory::{Huge, Io, Ktables, Memory, Paging, Queue, Swap};
pub use network::{
    Eicmp, Eicmp6, Eip, Eip6, Etcp, Icmp, Icmp6, Ip, Ip6, NetDev, NetEdev, Nfs, Nfsd, Sock, Sock6,
    Tcp, Udp, Udp6,
};
pub use power::{Battery, Fan, Temp, Usb, Voltage};
pub use psi::{PsiCpu, PsiIo, PsiMem};

/// Decoded values of one metric: `(instance number, value)`.
pub type Values = [(Option<i32>, MetricValue)];

pub trait StatGroup {
    /// Name used in configuration and error messages.
    const NAME: &'static str;
    const METRICS: &'static [MetricDescriptor];

    /// Whether the discovery samples carried data for this group.
    fn present(acts: &Activities) -> bool;

    /// Registers the group's metrics and instances.
    fn define(cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
        cx.define_all()
    }

    /// Emits the values of the current sample.
    fn export(cx: &mut ExportCx<'_>) -> Result<(), SessionError>;

    /// Writes the values of metric `idx` back into the current records.
    fn import(cx: &mut ImportCx<'_>, idx: usize, values: &Values);

    /// Runs once per imported record, after every value set.
    fn finish(_cx: &mut ImportCx<'_>) {}
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

pub struct DefineCx<'a> {
    pub catalog: &'a mut Catalog,
    pub store: &'a mut dyn MetricStore,
    pub registry: &'a mut InstanceRegistry,
    pub acts: &'a Activities,
    pub config: &'a SessionConfig,
    pub namer: &'a dyn DeviceNamer,
    /// Samples seen before definition, in collection order.
    pub discovery: &'a [SampleInput],
}

impl DefineCx<'_> {
    pub fn define_all(&mut self) -> Result<(), SessionError> {
        self.catalog.define(self.store)?;
        Ok(())
    }

    pub fn define_metric(&mut self, idx: usize) -> Result<(), SessionError> {
        self.catalog.define_metric(idx, self.store)?;
        Ok(())
    }

    pub fn define_range(&mut self, range: std::ops::Range<usize>) -> Result<(), SessionError> {
        for idx in range {
            self.define_metric(idx)?;
        }
        Ok(())
    }

    /// Registers `(number, label)` in the session registry and the store.
    pub fn instance(
        &mut self,
        domain: InstanceDomainId,
        label: &str,
        number: i32,
    ) -> Result<(), SessionError> {
        register(
            self.registry,
            self.store,
            self.catalog.group(),
            domain,
            label,
            Some(number),
        )?;
        Ok(())
    }

    /// Registers `label` with the next sequential number, unless known.
    pub fn sequential(
        &mut self,
        domain: InstanceDomainId,
        label: &str,
    ) -> Result<i32, SessionError> {
        register(
            self.registry,
            self.store,
            self.catalog.group(),
            domain,
            label,
            None,
        )
    }

    /// Registers the fixed instances of a numbering policy.
    pub fn fixed(
        &mut self,
        domain: InstanceDomainId,
        instances: &[(i32, &str)],
    ) -> Result<(), SessionError> {
        instances
            .iter()
            .try_for_each(|&(number, label)| self.instance(domain, label, number))
    }
}

pub struct ExportCx<'a> {
    pub catalog: &'a Catalog,
    pub store: &'a mut dyn MetricStore,
    pub registry: &'a mut InstanceRegistry,
    pub acts: &'a mut Activities,
    pub config: &'a SessionConfig,
    pub deltas: &'a dyn CounterDeltas,
    pub namer: &'a dyn DeviceNamer,
    /// Slot holding the sample being exported. The other slot holds the
    /// previous one.
    pub slot: Slot,
    pub first_record: bool,
}

impl ExportCx<'_> {
    pub fn defined(&self, idx: usize) -> bool {
        self.catalog.handle(idx).is_some()
    }

    pub fn put(
        &mut self,
        idx: usize,
        instance: Option<&str>,
        value: MetricValue,
    ) -> Result<(), SessionError> {
        let group = self.catalog.group();
        let desc = self.catalog.descriptor(idx);
        let handle = self
            .catalog
            .handle(idx)
            .ok_or(SessionError::UndefinedMetric {
                group,
                metric: desc.name,
            })?;
        self.store
            .put_value(handle, instance, &value.to_text())
            .map_err(|err| SessionError::store(group, err))
    }

    /// Makes sure `label` exists in `domain`, numbering it sequentially when
    /// it was not seen at definition time.
    pub fn instance(&mut self, domain: InstanceDomainId, label: &str) -> Result<(), SessionError> {
        register(
            self.registry,
            self.store,
            self.catalog.group(),
            domain,
            label,
            None,
        )?;
        Ok(())
    }

    /// Same as [`ExportCx::instance`] for domains with a fixed numbering.
    pub fn numbered(
        &mut self,
        domain: InstanceDomainId,
        label: &str,
        number: i32,
    ) -> Result<(), SessionError> {
        register(
            self.registry,
            self.store,
            self.catalog.group(),
            domain,
            label,
            Some(number),
        )?;
        Ok(())
    }
}

fn register(
    registry: &mut InstanceRegistry,
    store: &mut dyn MetricStore,
    group: &'static str,
    domain: InstanceDomainId,
    label: &str,
    number: Option<i32>,
) -> Result<i32, SessionError> {
    if let Some(known) = registry.number_of(domain, label) {
        if number.is_none_or(|n| n == known) {
            return Ok(known);
        }
    }
    let number = number.unwrap_or_else(|| registry.next_number(domain));
    if registry.add_instance(domain, label, number)? {
        debug!(group, %domain, label, number, "instance registered");
        store
            .add_instance(domain, label, number)
            .map_err(|err| SessionError::store(group, err))?;
    }
    Ok(number)
}

pub struct ImportCx<'a> {
    pub catalog: &'a Catalog,
    pub registry: &'a InstanceRegistry,
    pub acts: &'a mut Activities,
    pub slot: Slot,
}

impl<'a> ImportCx<'a> {
    /// Converts `value` for metric `idx`, or logs and skips it when it does
    /// not have the declared type.
    pub fn decode<T: WireField>(&self, idx: usize, value: &MetricValue) -> Option<T> {
        let desc = self.catalog.descriptor(idx);
        if value.value_type() != desc.value_type {
            warn!(
                group = self.catalog.group(),
                metric = desc.name,
                expected = ?desc.value_type,
                got = ?value.value_type(),
                "value of unexpected type skipped"
            );
            return None;
        }
        T::from_value(value)
    }

    /// Label of instance `number` of metric `idx`.
    pub fn label(&self, idx: usize, number: Option<i32>) -> Option<&'a str> {
        let desc = self.catalog.descriptor(idx);
        let (domain, number) = (desc.indom?, number?);
        let label = self.registry.label_of(domain, number);
        if label.is_none() {
            debug!(
                group = self.catalog.group(),
                metric = desc.name,
                number,
                "value for unknown instance skipped"
            );
        }
        label
    }
}

// ---------------------------------------------------------------------------
// Field conversions
// ---------------------------------------------------------------------------

/// Record field types that map directly onto a metric value.
pub trait WireField: Sized {
    fn to_value(&self) -> MetricValue;
    fn from_value(value: &MetricValue) -> Option<Self>;
}

impl WireField for u32 {
    fn to_value(&self) -> MetricValue {
        MetricValue::U32(*self)
    }
    fn from_value(value: &MetricValue) -> Option<Self> {
        value.as_u32()
    }
}

impl WireField for u64 {
    fn to_value(&self) -> MetricValue {
        MetricValue::U64(*self)
    }
    fn from_value(value: &MetricValue) -> Option<Self> {
        value.as_u64()
    }
}

impl WireField for f32 {
    fn to_value(&self) -> MetricValue {
        MetricValue::Float(*self)
    }
    fn from_value(value: &MetricValue) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl WireField for f64 {
    fn to_value(&self) -> MetricValue {
        MetricValue::Double(*self)
    }
    fn from_value(value: &MetricValue) -> Option<Self> {
        value.as_f64()
    }
}

impl WireField for String {
    fn to_value(&self) -> MetricValue {
        MetricValue::String(self.clone())
    }
    fn from_value(value: &MetricValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

/// Hundredths (load averages, pressure averages, clock) as a float.
pub(crate) fn hundredths(v: u64) -> MetricValue {
    MetricValue::Float((v as f64 / 100.0) as f32)
}

/// Inverse of [`hundredths`].
pub(crate) fn from_hundredths(v: f64) -> u64 {
    let scaled = (v * 100.0).round();
    if scaled.is_finite() && scaled > 0.0 {
        scaled as u64
    } else {
        0
    }
}

/// Whether `name` passes an optional item filter.
pub(crate) fn item_selected(filter: Option<&Vec<String>>, name: &str) -> bool {
    filter.is_none_or(|names| names.iter().any(|n| n == name))
}

// ---------------------------------------------------------------------------
// Generated flat groups
// ---------------------------------------------------------------------------

/// Declares a group made of one record whose fields map one-to-one onto
/// singular metrics of domain 60.
macro_rules! flat_group {
    (
        $(#[$meta:meta])*
        $group:ident, $name:literal, $act:ident: $rec:ty {
            $( $field:ident => ($cluster:literal, $item:literal, $metric:literal, $vt:ident, $sem:ident, $unit:ident) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        pub struct $group;

        impl $crate::groups::StatGroup for $group {
            const NAME: &'static str = $name;
            const METRICS: &'static [$crate::catalog::MetricDescriptor] = &[
                $(
                    $crate::catalog::MetricDescriptor::new(
                        $crate::ident::pmid(60, $cluster, $item),
                        $metric,
                        $crate::value::ValueType::$vt,
                        $crate::value::Semantics::$sem,
                        None,
                        $crate::value::Unit::$unit,
                    ),
                )+
            ];

            fn present(acts: &$crate::activity::Activities) -> bool {
                acts.$act.nr_ini() > 0
            }

            #[allow(unused_assignments)]
            fn export(
                cx: &mut $crate::groups::ExportCx<'_>,
            ) -> Result<(), $crate::error::SessionError> {
                use $crate::groups::WireField;
                let Some(rec) = cx.acts.$act.records(cx.slot).first().cloned() else {
                    return Ok(());
                };
                let rec: $rec = rec;
                let mut idx = 0;
                $(
                    cx.put(idx, None, rec.$field.to_value())?;
                    idx += 1;
                )+
                Ok(())
            }

            #[allow(unused_assignments)]
            fn import(
                cx: &mut $crate::groups::ImportCx<'_>,
                idx: usize,
                values: &$crate::groups::Values,
            ) {
                let Some((_, value)) = values.first() else {
                    return;
                };
                let slot = cx.slot;
                let mut pos = 0;
                $(
                    if pos == idx {
                        if let Some(v) = cx.decode(idx, value) {
                            cx.acts.$act.record_mut(slot, 0).$field = v;
                        }
                        return;
                    }
                    pos += 1;
                )+
            }
        }
    };
}
pub(crate) use flat_group;

// ---------------------------------------------------------------------------
// Group registry
// ---------------------------------------------------------------------------

macro_rules! statistic_groups {
    ( $( $variant:ident => $ty:ty ),+ $(,)? ) => {
        /// Every statistic group, in definition and export order.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum GroupId {
            $( $variant, )+
        }

        impl GroupId {
            pub const ALL: &'static [GroupId] = &[ $( GroupId::$variant, )+ ];

            pub fn name(self) -> &'static str {
                match self {
                    $( GroupId::$variant => <$ty as StatGroup>::NAME, )+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|g| g.name() == name)
            }

            pub fn descriptors(self) -> &'static [MetricDescriptor] {
                match self {
                    $( GroupId::$variant => <$ty as StatGroup>::METRICS, )+
                }
            }

            /// Position in [`GroupId::ALL`].
            pub fn index(self) -> usize {
                self as usize
            }

            pub fn catalog(self) -> Catalog {
                Catalog::new(self.name(), self.descriptors())
            }

            pub(crate) fn present(self, acts: &Activities) -> bool {
                match self {
                    $( GroupId::$variant => <$ty as StatGroup>::present(acts), )+
                }
            }

            pub(crate) fn define(self, cx: &mut DefineCx<'_>) -> Result<(), SessionError> {
                match self {
                    $( GroupId::$variant => <$ty as StatGroup>::define(cx), )+
                }
            }

            pub(crate) fn export(self, cx: &mut ExportCx<'_>) -> Result<(), SessionError> {
                match self {
                    $( GroupId::$variant => <$ty as StatGroup>::export(cx), )+
                }
            }

            pub(crate) fn import(self, cx: &mut ImportCx<'_>, idx: usize, values: &Values) {
                match self {
                    $( GroupId::$variant => <$ty as StatGroup>::import(cx, idx, values), )+
                }
            }

            pub(crate) fn finish(self, cx: &mut ImportCx<'_>) {
                match self {
                    $( GroupId::$variant => <$ty as StatGroup>::finish(cx), )+
                }
            }
        }

        impl std::fmt::Display for GroupId {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

statistic_groups! {
    FileHeader => FileHeaderGroup,
    RecordHeader => RecordHeaderGroup,
    Cpu => Cpu,
    Softnet => Softnet,
    Cpufreq => Cpufreq,
    Pcsw => Pcsw,
    Irq => Irq,
    Swap => Swap,
    Paging => Paging,
    Io => Io,
    Memory => Memory,
    Huge => Huge,
    Ktables => Ktables,
    Queue => Queue,
    Disk => Disk,
    NetDev => NetDev,
    NetEdev => NetEdev,
    Serial => Serial,
    Filesystem => Filesystem,
    Fchost => Fchost,
    Sock => Sock,
    Ip => Ip,
    Eip => Eip,
    Icmp => Icmp,
    Eicmp => Eicmp,
    Tcp => Tcp,
    Etcp => Etcp,
    Udp => Udp,
    Sock6 => Sock6,
    Ip6 => Ip6,
    Eip6 => Eip6,
    Icmp6 => Icmp6,
    Eicmp6 => Eicmp6,
    Udp6 => Udp6,
    Nfs => Nfs,
    Nfsd => Nfsd,
    Fan => Fan,
    Temp => Temp,
    Voltage => Voltage,
    Usb => Usb,
    Battery => Battery,
    PsiCpu => PsiCpu,
    PsiIo => PsiIo,
    PsiMem => PsiMem,
}

impl GroupId {
    /// Headers are defined in every session, whatever the configuration.
    pub fn is_header(self) -> bool {
        matches!(self, GroupId::FileHeader | GroupId::RecordHeader)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Harness running one group through define, export and import against a
    //! [`MemoryStore`].

    use super::*;
    use crate::delta::DefaultDeltas;
    use crate::naming::DefaultNamer;
    use crate::store::MemoryStore;

    pub struct Harness {
        pub group: GroupId,
        pub catalog: Catalog,
        pub store: MemoryStore,
        pub registry: InstanceRegistry,
        pub acts: Activities,
        pub config: SessionConfig,
        slot: Slot,
        records: usize,
    }

    impl Harness {
        pub fn new(group: GroupId, config: SessionConfig, discovery: &[SampleInput]) -> Self {
            let mut acts = Activities::default();
            for sample in discovery {
                acts.scan(sample);
            }
            let nr = acts.cpu.nr_ini();
            acts.cpu.selection = config.cpu_selection(nr);
            acts.softnet.selection = config.cpu_selection(acts.softnet.nr_ini());
            acts.cpufreq.selection = config.cpu_selection(acts.cpufreq.nr_ini());
            acts.irq.selection = config.cpu_selection(acts.irq.nr_ini());

            let mut h = Self {
                group,
                catalog: group.catalog(),
                store: MemoryStore::new(),
                registry: InstanceRegistry::new(),
                acts,
                config,
                slot: Slot::Curr,
                records: 0,
            };
            let mut cx = DefineCx {
                catalog: &mut h.catalog,
                store: &mut h.store,
                registry: &mut h.registry,
                acts: &h.acts,
                config: &h.config,
                namer: &DefaultNamer,
                discovery,
            };
            group.define(&mut cx).unwrap();
            h.catalog.close();
            h
        }

        pub fn export(&mut self, sample: &SampleInput) {
            self.acts.load(self.slot, sample);
            let mut cx = ExportCx {
                catalog: &self.catalog,
                store: &mut self.store,
                registry: &mut self.registry,
                acts: &mut self.acts,
                config: &self.config,
                deltas: &DefaultDeltas,
                namer: &DefaultNamer,
                slot: self.slot,
                first_record: self.records == 0,
            };
            self.group.export(&mut cx).unwrap();
            self.store.write_record(sample.timestamp).unwrap();
            self.slot = self.slot.other();
            self.records += 1;
        }

        /// Imports every exported record into a fresh activity set.
        pub fn import_all(&self) -> Vec<SampleInput> {
            let mut acts = Activities::default();
            let registry = self.store.instances().clone();
            self.store
                .fetch()
                .iter()
                .map(|record| {
                    let mut cx = ImportCx {
                        catalog: &self.catalog,
                        registry: &registry,
                        acts: &mut acts,
                        slot: Slot::Curr,
                    };
                    for set in &record.sets {
                        let idx = self.catalog.position(set.id).unwrap();
                        self.group.import(&mut cx, idx, &set.values);
                    }
                    self.group.finish(&mut cx);
                    let sample = acts.unload(Slot::Curr, record.timestamp);
                    acts.clear_slot(Slot::Curr);
                    sample
                })
                .collect()
        }

        pub fn value(&self, record: usize, name: &str, instance: Option<&str>) -> Option<&str> {
            self.store.value_text(record, name, instance)
        }

        pub fn labels(&self, domain: InstanceDomainId) -> Vec<(i32, String)> {
            self.registry
                .instances_for(domain)
                .map(|(n, l)| (n, l.to_string()))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_names_unique() {
        let mut names: Vec<_> = GroupId::ALL.iter().map(|g| g.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), GroupId::ALL.len());
        assert_eq!(GroupId::from_name("net-dev"), Some(GroupId::NetDev));
        assert_eq!(GroupId::from_name("nope"), None);
    }

    #[test]
    fn test_group_index_matches_all() {
        for (i, g) in GroupId::ALL.iter().enumerate() {
            assert_eq!(g.index(), i);
        }
    }

    #[test]
    fn test_metric_names_are_dotted_lowercase_paths() {
        for g in GroupId::ALL {
            for d in g.descriptors() {
                assert!(d.name.contains('.'), "{}", d.name);
                assert!(
                    !d.name.starts_with('.') && !d.name.ends_with('.'),
                    "{}",
                    d.name
                );
            }
        }
    }

    #[test]
    fn test_hundredths() {
        assert_eq!(hundredths(152), MetricValue::Float(1.52));
        assert_eq!(from_hundredths(1.52), 152);
        assert_eq!(from_hundredths(-3.0), 0);
    }
}
