//! statbridge-core: translates system-activity samples into a flat
//! metric/instance namespace and back.
//!
//! Provides:
//! - `ident`: packed metric and instance-domain identifiers
//! - `value`: value types, semantics, units and the `MetricValue` sum type
//! - `catalog`: static metric descriptors and their resolved store handles
//! - `registry`: instance domains and numbering policies
//! - `buffer`: two-slot sample buffers and the (cpu, line) grid
//! - `filter`: selection/offline bitmaps and tickless CPU handling
//! - `delta`: counter-delta engine ("all" aggregates, offline detection)
//! - `naming`: block device display names
//! - `store`: metric store seam and the in-memory JSON-serializable store
//! - `model`: per-group record structs
//! - `activity`: per-group sample state and the `SampleInput` wire type
//! - `groups`: catalog, export and import of every statistic group
//! - `dispatch`: identifier to group routing
//! - `config`: session configuration
//! - `session`: the session state machine tying it all together

pub mod activity;
pub mod buffer;
pub mod catalog;
pub mod config;
pub mod delta;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod groups;
pub mod ident;
pub mod model;
pub mod naming;
pub mod registry;
pub mod session;
pub mod store;
pub mod value;

pub use activity::SampleInput;
pub use config::SessionConfig;
pub use session::{Session, SessionState};
pub use store::{MemoryStore, MetricStore};
