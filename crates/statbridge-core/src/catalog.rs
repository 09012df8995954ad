//! Per-group metric catalogs.

use serde::Serialize;

use crate::error::{CatalogError, StoreError};
use crate::ident::{InstanceDomainId, MetricId};
use crate::store::{MetricHandle, MetricStore};
use crate::value::{Semantics, Unit, ValueType};

/// Static description of one metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MetricDescriptor {
    pub id: MetricId,
    /// Dotted lowercase name, e.g. `kernel.all.cpu.user`.
    pub name: &'static str,
    pub value_type: ValueType,
    pub semantics: Semantics,
    /// `None` for singular metrics.
    pub indom: Option<InstanceDomainId>,
    pub unit: Unit,
}

impl MetricDescriptor {
    pub const fn new(
        id: MetricId,
        name: &'static str,
        value_type: ValueType,
        semantics: Semantics,
        indom: Option<InstanceDomainId>,
        unit: Unit,
    ) -> Self {
        Self {
            id,
            name,
            value_type,
            semantics,
            indom,
            unit,
        }
    }
}

/// Descriptor table of one statistic group plus the store handles resolved
/// for it.
#[derive(Debug)]
pub struct Catalog {
    group: &'static str,
    descriptors: &'static [MetricDescriptor],
    handles: Vec<Option<MetricHandle>>,
    closed: bool,
}

impl Catalog {
    pub fn new(group: &'static str, descriptors: &'static [MetricDescriptor]) -> Self {
        Self {
            group,
            descriptors,
            handles: vec![None; descriptors.len()],
            closed: false,
        }
    }

    pub fn group(&self) -> &'static str {
        self.group
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &'static [MetricDescriptor] {
        self.descriptors
    }

    /// Registers every descriptor, in order, then closes the catalog.
    pub fn define(&mut self, store: &mut dyn MetricStore) -> Result<(), CatalogError> {
        if self.closed {
            return Err(self.unavailable(0));
        }
        for idx in 0..self.descriptors.len() {
            self.define_metric(idx, store)?;
        }
        self.closed = true;
        Ok(())
    }

    /// Registers a single descriptor. A descriptor already registered returns
    /// its existing handle.
    pub fn define_metric(
        &mut self,
        idx: usize,
        store: &mut dyn MetricStore,
    ) -> Result<MetricHandle, CatalogError> {
        let desc = *self.resolve(idx)?;
        if let Some(handle) = self.handles[idx] {
            return Ok(handle);
        }
        if self.closed || store.is_sealed() {
            return Err(self.unavailable(idx));
        }
        let handle = store.add_metric(&desc).map_err(|err| match err {
            StoreError::Duplicate { .. } => CatalogError::DuplicateMetric {
                group: self.group,
                metric: desc.name,
                id: desc.id,
            },
            _ => self.unavailable(idx),
        })?;
        self.handles[idx] = Some(handle);
        Ok(handle)
    }

    /// Ends the definition phase. Later `define_metric` calls for metrics not
    /// yet registered fail with `StoreUnavailable`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Descriptor at `idx`, or `IndexOutOfBounds`.
    pub fn resolve(&self, idx: usize) -> Result<&MetricDescriptor, CatalogError> {
        self.descriptors
            .get(idx)
            .ok_or(CatalogError::IndexOutOfBounds {
                group: self.group,
                index: idx,
                count: self.descriptors.len(),
            })
    }

    /// Descriptor at `idx`.
    ///
    /// # Panics
    /// If `idx >= len()`. Writers and readers address metrics by constant
    /// indices, so a miss is a defect in the group table.
    pub fn descriptor(&self, idx: usize) -> &MetricDescriptor {
        match self.resolve(idx) {
            Ok(desc) => desc,
            Err(err) => panic!("{err}"),
        }
    }

    /// Store handle of the metric at `idx`, if it was defined.
    ///
    /// # Panics
    /// If `idx >= len()`.
    pub fn handle(&self, idx: usize) -> Option<MetricHandle> {
        self.descriptor(idx);
        self.handles[idx]
    }

    pub fn position(&self, id: MetricId) -> Option<usize> {
        self.descriptors.iter().position(|d| d.id == id)
    }

    fn unavailable(&self, idx: usize) -> CatalogError {
        let metric = match self.descriptors.get(idx) {
            Some(d) => d.name,
            None => "<empty catalog>",
        };
        CatalogError::StoreUnavailable {
            group: self.group,
            metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::pmid;
    use crate::store::MemoryStore;

    static TABLE: [MetricDescriptor; 2] = [
        MetricDescriptor::new(
            pmid(60, 0, 13),
            "kernel.all.pswitch",
            ValueType::U64,
            Semantics::Counter,
            None,
            Unit::Count,
        ),
        MetricDescriptor::new(
            pmid(60, 0, 14),
            "kernel.all.sysfork",
            ValueType::U64,
            Semantics::Counter,
            None,
            Unit::Count,
        ),
    ];

    #[test]
    fn test_define_resolves_handles() {
        let mut store = MemoryStore::new();
        let mut cat = Catalog::new("pcsw", &TABLE);
        cat.define(&mut store).unwrap();
        assert!(cat.handle(0).is_some());
        assert!(cat.handle(1).is_some());
        assert_ne!(cat.handle(0), cat.handle(1));
        assert_eq!(store.metrics().len(), 2);
    }

    #[test]
    fn test_define_twice_is_unavailable() {
        let mut store = MemoryStore::new();
        let mut cat = Catalog::new("pcsw", &TABLE);
        cat.define(&mut store).unwrap();
        assert_eq!(
            cat.define(&mut store),
            Err(CatalogError::StoreUnavailable {
                group: "pcsw",
                metric: "kernel.all.pswitch",
            })
        );
    }

    #[test]
    fn test_define_on_sealed_store() {
        let mut store = MemoryStore::new();
        store.seal();
        let mut cat = Catalog::new("pcsw", &TABLE);
        assert!(matches!(
            cat.define(&mut store),
            Err(CatalogError::StoreUnavailable { .. })
        ));
    }

    #[test]
    fn test_conflicting_registration_is_duplicate() {
        static OTHER: [MetricDescriptor; 1] = [MetricDescriptor::new(
            pmid(60, 0, 13),
            "kernel.all.pswitch",
            ValueType::U32,
            Semantics::Instant,
            None,
            Unit::None,
        )];
        let mut store = MemoryStore::new();
        Catalog::new("pcsw", &TABLE).define(&mut store).unwrap();
        let err = Catalog::new("other", &OTHER)
            .define(&mut store)
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateMetric {
                group: "other",
                metric: "kernel.all.pswitch",
                id: pmid(60, 0, 13),
            }
        );
        assert!(err.to_string().contains("kernel.all.pswitch"));
    }

    #[test]
    fn test_resolve_past_end_fails() {
        let cat = Catalog::new("pcsw", &TABLE);
        assert_eq!(cat.resolve(1).unwrap().name, "kernel.all.sysfork");
        assert_eq!(
            cat.resolve(cat.len()),
            Err(CatalogError::IndexOutOfBounds {
                group: "pcsw",
                index: 2,
                count: 2,
            })
        );
    }

    #[test]
    #[should_panic(expected = "metric index 5 out of bounds")]
    fn test_descriptor_past_end_panics() {
        Catalog::new("pcsw", &TABLE).descriptor(5);
    }

    #[test]
    fn test_partial_definition_then_close() {
        let mut store = MemoryStore::new();
        let mut cat = Catalog::new("pcsw", &TABLE);
        cat.define_metric(1, &mut store).unwrap();
        cat.close();
        assert!(cat.handle(0).is_none());
        assert!(cat.define_metric(1, &mut store).is_ok());
        assert!(matches!(
            cat.define_metric(0, &mut store),
            Err(CatalogError::StoreUnavailable {
                metric: "kernel.all.pswitch",
                ..
            })
        ));
    }
}
