//! gpushare-core: Core types for the gpushare allocation engine
//!
//! This crate provides the fundamental types used by the allocation policies:
//! - Replica-annotated device identifiers
//! - Device inventory snapshots and set operations
//! - GPU interconnect topology
//! - Configuration and inventory files
//! - Error handling

pub mod config;
pub mod device;
pub mod error;
pub mod id;
pub mod inventory;
pub mod topology;

pub use config::*;
pub use device::*;
pub use error::*;
pub use id::*;
pub use inventory::*;
pub use topology::*;
