pub mod availability;
pub mod connection;
pub mod watchdog;

pub use availability::{Availability, ResourceState};
pub use connection::ManagedConnection;
pub use watchdog::{ConnectionMonitor, MonitorConfig, MonitorError, MonitorExit, MonitorHandle};
