//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the engine depends on,
//! but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IPerformanceSource`] - Upstream advertising API (fetch rows for a date range)
//! - [`IProcessProbe`] - Process liveness checks for stale-lock detection
//! - [`IClock`] - Current time, injectable for deterministic windows

pub mod clock;
pub mod performance_source;
pub mod process_probe;

pub use clock::{FixedClock, IClock};
pub use performance_source::IPerformanceSource;
pub use process_probe::IProcessProbe;
