//! Routes imported metric identifiers to the group that owns them.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::trace;

use crate::catalog::MetricDescriptor;
use crate::error::DispatchError;
use crate::groups::GroupId;
use crate::ident::MetricId;

/// Identifier map built once from every catalog.
///
/// Each identifier must belong to exactly one group; a table that claims the
/// same identifier twice is rejected at construction.
#[derive(Debug)]
pub struct Dispatcher<K = GroupId> {
    map: HashMap<MetricId, (K, usize)>,
}

impl<K: Copy + Eq + Hash> Dispatcher<K> {
    /// Builds the map from `(key, group name, descriptors)` tables.
    pub fn build<'a, I>(tables: I) -> Result<Self, DispatchError>
    where
        I: IntoIterator<Item = (K, &'static str, &'a [MetricDescriptor])>,
    {
        let mut map = HashMap::new();
        let mut owners: HashMap<MetricId, &'static str> = HashMap::new();
        for (key, group, descriptors) in tables {
            for (idx, desc) in descriptors.iter().enumerate() {
                if let Some(first) = owners.insert(desc.id, group) {
                    return Err(DispatchError::DuplicateIdentifier {
                        id: desc.id,
                        first,
                        second: group,
                    });
                }
                map.insert(desc.id, (key, idx));
            }
        }
        trace!(metrics = map.len(), "dispatcher built");
        Ok(Self { map })
    }

    /// Owning group and local catalog index of `id`.
    pub fn route(&self, id: MetricId) -> Option<(K, usize)> {
        self.map.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Dispatcher<GroupId> {
    /// Dispatcher over every statistic group.
    pub fn new() -> Result<Self, DispatchError> {
        Self::build(GroupId::ALL.iter().map(|&g| (g, g.name(), g.descriptors())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::pmid;
    use crate::value::{Semantics, Unit, ValueType};

    const fn counter(item: u32, name: &'static str) -> MetricDescriptor {
        MetricDescriptor::new(
            pmid(60, 0, item),
            name,
            ValueType::U64,
            Semantics::Counter,
            None,
            Unit::Count,
        )
    }

    #[test]
    fn test_cpu_user_routes_to_cpu_group() {
        let d = Dispatcher::new().unwrap();
        let id = MetricId::new(60, 0, 20).unwrap();
        assert_eq!(d.route(id), Some((GroupId::Cpu, 0)));
        for &g in GroupId::ALL.iter().filter(|&&g| g != GroupId::Cpu) {
            assert!(g.catalog().position(id).is_none(), "{g} claims {id}");
        }
    }

    #[test]
    fn test_every_descriptor_routes_home() {
        let d = Dispatcher::new().unwrap();
        let total: usize = GroupId::ALL.iter().map(|g| g.descriptors().len()).sum();
        assert_eq!(d.len(), total);
        for &g in GroupId::ALL {
            for (idx, desc) in g.descriptors().iter().enumerate() {
                assert_eq!(d.route(desc.id), Some((g, idx)), "{}", desc.name);
            }
        }
    }

    #[test]
    fn test_unknown_identifier() {
        let d = Dispatcher::new().unwrap();
        assert_eq!(d.route(pmid(511, 4095, 1023)), None);
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        static LEFT: [MetricDescriptor; 2] = [counter(1, "left.a"), counter(2, "left.b")];
        static RIGHT: [MetricDescriptor; 2] = [counter(3, "right.a"), counter(2, "right.b")];
        let tables = [(0u8, "left", &LEFT[..]), (1u8, "right", &RIGHT[..])];
        let err = Dispatcher::build(tables).unwrap_err();
        assert_eq!(
            err,
            DispatchError::DuplicateIdentifier {
                id: pmid(60, 0, 2),
                first: "left",
                second: "right",
            }
        );
    }

    #[test]
    fn test_disjoint_tables_route_by_key() {
        static LEFT: [MetricDescriptor; 1] = [counter(20, "left.user")];
        static RIGHT: [MetricDescriptor; 1] = [counter(21, "right.nice")];
        let tables = [("left", "left", &LEFT[..]), ("right", "right", &RIGHT[..])];
        let d = Dispatcher::build(tables).unwrap();
        assert_eq!(d.route(pmid(60, 0, 20)), Some(("left", 0)));
        assert_eq!(d.route(pmid(60, 0, 21)), Some(("right", 0)));
    }
}
