//! Core data types: identifiers, time, and the exit/cause model.

pub mod cause;
pub mod defect;
pub mod exit;
pub mod id;

pub use cause::Cause;
pub use defect::Defect;
pub use exit::Exit;
pub use id::{FiberId, Time};
