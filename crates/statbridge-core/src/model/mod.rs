//! Statistic records consumed on export and rebuilt on import.

pub mod devices;
pub mod network;
pub mod power;
pub mod system;

pub use devices::*;
pub use network::*;
pub use power::*;
pub use system::*;
