use thiserror::Error;

use crate::ident::{InstanceDomainId, MetricId};
use crate::value::ValueType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentError {
    #[error("{field} value {value} out of range (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("group {group}: metric {metric} ({id}) already defined with different semantics")]
    DuplicateMetric {
        group: &'static str,
        metric: &'static str,
        id: MetricId,
    },
    #[error("group {group}: metric store not accepting definitions for {metric}")]
    StoreUnavailable {
        group: &'static str,
        metric: &'static str,
    },
    #[error("group {group}: metric index {index} out of bounds (catalog has {count})")]
    IndexOutOfBounds {
        group: &'static str,
        index: usize,
        count: usize,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("instance domain {domain}: number {number} is {existing:?}, not {label:?}")]
    ConflictingInstance {
        domain: InstanceDomainId,
        number: i32,
        existing: String,
        label: String,
    },
    #[error("instance domain {domain}: label {label:?} already numbered {existing}, not {number}")]
    DuplicateLabel {
        domain: InstanceDomainId,
        label: String,
        existing: i32,
        number: i32,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("instance index {index} out of bounds (allocated {allocated})")]
    IndexOutOfBounds { index: usize, allocated: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("metric {name} ({id}) already registered with a different descriptor")]
    Duplicate { id: MetricId, name: String },
    #[error("store is sealed")]
    Sealed,
    #[error("unknown metric handle {0}")]
    UnknownHandle(usize),
    #[error("instance {label:?} not registered in domain {domain}")]
    UnknownInstance {
        domain: InstanceDomainId,
        label: String,
    },
    #[error("metric {0} has an instance domain, value needs an instance")]
    MissingInstance(MetricId),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("metric {id} claimed by both {first} and {second}")]
    DuplicateIdentifier {
        id: MetricId,
        first: &'static str,
        second: &'static str,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("cannot parse {text:?} as {value_type:?}")]
    Parse { value_type: ValueType, text: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation {operation} not allowed in state {state}")]
    InvalidState {
        state: &'static str,
        operation: &'static str,
    },
    #[error("group {group}: metric {metric} used before definition")]
    UndefinedMetric {
        group: &'static str,
        metric: &'static str,
    },
    #[error("group {group}: {source}")]
    Store {
        group: &'static str,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Ident(#[from] IdentError),
}

impl SessionError {
    pub fn store(group: &'static str, source: StoreError) -> Self {
        Self::Store { group, source }
    }
}
