//! Deterministic lab runtime for testing.
//!
//! The lab runtime provides:
//!
//! - Virtual time (no wall-clock dependencies)
//! - Deterministic scheduling (same seed → same execution)
//! - Stall and step-limit detection instead of hangs

pub mod config;
pub mod runtime;

pub use config::LabConfig;
pub use runtime::LabRuntime;
