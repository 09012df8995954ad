//! Bit-packed metric and instance-domain identifiers.
//!
//! Layouts:
//! - metric: `domain:9 | cluster:12 | item:10`
//! - instance domain: `domain:9 | serial:22`
//!
//! The layouts are shared with every other reader of the archive format and
//! must not change.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentError;

pub const DOMAIN_MAX: u32 = 0x1FF;
pub const CLUSTER_MAX: u32 = 0xFFF;
pub const ITEM_MAX: u32 = 0x3FF;
pub const SERIAL_MAX: u32 = 0x3F_FFFF;

const DOMAIN_SHIFT: u32 = 22;
const CLUSTER_SHIFT: u32 = 10;

fn check(field: &'static str, value: u32, max: u32) -> Result<u32, IdentError> {
    if value > max {
        return Err(IdentError::OutOfRange { field, value, max });
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// MetricId
// ---------------------------------------------------------------------------

/// Globally unique metric identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(u32);

impl MetricId {
    /// Packs `(domain, cluster, item)`, rejecting fields wider than their slot.
    pub fn new(domain: u32, cluster: u32, item: u32) -> Result<Self, IdentError> {
        let domain = check("domain", domain, DOMAIN_MAX)?;
        let cluster = check("cluster", cluster, CLUSTER_MAX)?;
        let item = check("item", item, ITEM_MAX)?;
        Ok(Self(domain << DOMAIN_SHIFT | cluster << CLUSTER_SHIFT | item))
    }

    /// Unpacks into `(domain, cluster, item)`.
    pub const fn decode(self) -> (u32, u32, u32) {
        (
            (self.0 >> DOMAIN_SHIFT) & DOMAIN_MAX,
            (self.0 >> CLUSTER_SHIFT) & CLUSTER_MAX,
            self.0 & ITEM_MAX,
        )
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (d, c, i) = self.decode();
        write!(f, "{d}.{c}.{i}")
    }
}

// ---------------------------------------------------------------------------
// InstanceDomainId
// ---------------------------------------------------------------------------

/// Identifier of a set of instances sharing semantics (all disks, all CPUs, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceDomainId(u32);

impl InstanceDomainId {
    pub fn new(domain: u32, serial: u32) -> Result<Self, IdentError> {
        let domain = check("domain", domain, DOMAIN_MAX)?;
        let serial = check("serial", serial, SERIAL_MAX)?;
        Ok(Self(domain << DOMAIN_SHIFT | serial))
    }

    pub const fn decode(self) -> (u32, u32) {
        ((self.0 >> DOMAIN_SHIFT) & DOMAIN_MAX, self.0 & SERIAL_MAX)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceDomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (d, s) = self.decode();
        write!(f, "{d}.{s}")
    }
}

// ---------------------------------------------------------------------------
// Const constructors for static catalogs
// ---------------------------------------------------------------------------

/// Builds a [`MetricId`] in const context. Out-of-range fields fail the build
/// when used in a `const`/`static` initializer.
pub const fn pmid(domain: u32, cluster: u32, item: u32) -> MetricId {
    assert!(domain <= DOMAIN_MAX, "metric domain out of range");
    assert!(cluster <= CLUSTER_MAX, "metric cluster out of range");
    assert!(item <= ITEM_MAX, "metric item out of range");
    MetricId(domain << DOMAIN_SHIFT | cluster << CLUSTER_SHIFT | item)
}

/// Builds an [`InstanceDomainId`] in const context.
pub const fn indom(domain: u32, serial: u32) -> InstanceDomainId {
    assert!(domain <= DOMAIN_MAX, "instance domain out of range");
    assert!(serial <= SERIAL_MAX, "instance domain serial out of range");
    InstanceDomainId(domain << DOMAIN_SHIFT | serial)
}
