//! gpushare-allocator: Preferred-allocation policies for GPU devices
//!
//! This crate decides which devices to hand out for a single request:
//! - Topology-aligned allocation for unshared GPUs
//! - Packed allocation, filling one device's replicas first
//! - Distributed allocation, spreading replicas across devices
//! - Policy selection based on the inventory and sharing strategy

pub mod aligned;
pub mod distributed;
pub mod packed;
pub mod policy;
pub mod selector;

pub use aligned::AlignedAllocator;
pub use distributed::distributed_allocation;
pub use packed::packed_allocation;
pub use policy::{AllocationPolicy, BestEffortPolicy};
pub use selector::{AllocationKind, PreferredAllocator};
