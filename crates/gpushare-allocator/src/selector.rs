//! Allocation policy selection

use gpushare_core::{
    AnnotatedIds, DeviceGraph, DeviceSet, GpushareError, GpushareResult, SharingStrategy,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::aligned::AlignedAllocator;
use crate::distributed::distributed_allocation;
use crate::packed::packed_allocation;
use crate::policy::AllocationPolicy;

/// Allocation algorithm chosen for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationKind {
    Aligned,
    Packed,
    Distributed,
}

impl fmt::Display for AllocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationKind::Aligned => write!(f, "aligned"),
            AllocationKind::Packed => write!(f, "packed"),
            AllocationKind::Distributed => write!(f, "distributed"),
        }
    }
}

/// Computes preferred allocations for device requests.
///
/// Holds only immutable state; the device inventory is passed into every
/// call, so one allocator can serve concurrent requests.
pub struct PreferredAllocator {
    /// Configured sharing strategy
    strategy: SharingStrategy,
    /// Topology-aware allocator for unshared GPUs
    aligned: AlignedAllocator,
}

impl PreferredAllocator {
    /// Create a new allocator
    pub fn new(
        strategy: SharingStrategy,
        graph: DeviceGraph,
        policy: Arc<dyn AllocationPolicy>,
    ) -> Self {
        Self {
            strategy,
            aligned: AlignedAllocator::new(graph, policy),
        }
    }

    /// Get the configured sharing strategy
    pub fn strategy(&self) -> SharingStrategy {
        self.strategy
    }

    /// Decide which algorithm applies to a request
    pub fn select(
        &self,
        devices: &DeviceSet,
        available: &[String],
    ) -> GpushareResult<AllocationKind> {
        if !devices.contains_mig_devices() && !AnnotatedIds::new(available).any_has_annotation() {
            return Ok(AllocationKind::Aligned);
        }

        match self.strategy {
            SharingStrategy::Packed => Ok(AllocationKind::Packed),
            SharingStrategy::Distributed => Ok(AllocationKind::Distributed),
            SharingStrategy::None => Err(GpushareError::NoValidPolicy),
        }
    }

    /// Compute the preferred allocation of `size` devices.
    ///
    /// `required` must be a subset of `available` and no longer than `size`.
    /// On success the result starts with `required` in the given order.
    pub fn preferred_allocation(
        &self,
        devices: &DeviceSet,
        available: &[String],
        required: &[String],
        size: usize,
    ) -> GpushareResult<Vec<String>> {
        validate_request(available, required, size)?;
        if size == 0 {
            return Ok(Vec::new());
        }

        let kind = self.select(devices, available).inspect_err(|e| {
            warn!(strategy = %self.strategy, error = %e, "No allocation policy applies");
        })?;

        debug!(
            policy = %kind,
            available = available.len(),
            required = required.len(),
            size = size,
            "Computing preferred allocation"
        );

        let result = match kind {
            AllocationKind::Aligned => self.aligned.allocate(available, required, size),
            AllocationKind::Packed => packed_allocation(devices, available, required, size),
            AllocationKind::Distributed => {
                distributed_allocation(devices, available, required, size)
            }
        };

        match &result {
            Ok(allocated) => debug!(policy = %kind, devices = ?allocated, "Preferred allocation"),
            Err(e) => warn!(policy = %kind, error = %e, "Preferred allocation failed"),
        }

        result
    }
}

fn validate_request(available: &[String], required: &[String], size: usize) -> GpushareResult<()> {
    if required.len() > size {
        return Err(GpushareError::InvalidRequest(format!(
            "{} required devices exceed requested size {}",
            required.len(),
            size
        )));
    }

    let available: HashSet<&str> = available.iter().map(String::as_str).collect();
    if let Some(missing) = required.iter().find(|id| !available.contains(id.as_str())) {
        return Err(GpushareError::InvalidRequest(format!(
            "required device {} is not available",
            missing
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::BestEffortPolicy;
    use gpushare_core::{Device, GpuDevice};

    fn create_test_graph(count: usize) -> DeviceGraph {
        let mut graph = DeviceGraph::new();
        for i in 0..count {
            graph.add_device(GpuDevice::new(format!("gpu{}", i), i));
        }
        graph
    }

    fn create_allocator(strategy: SharingStrategy) -> PreferredAllocator {
        PreferredAllocator::new(strategy, create_test_graph(2), Arc::new(BestEffortPolicy))
    }

    fn plain_devices(count: usize) -> DeviceSet {
        (0..count).map(|i| Device::gpu(format!("gpu{}", i), i)).collect()
    }

    fn replicated_devices(count: usize, replicas: usize) -> DeviceSet {
        (0..count)
            .flat_map(|i| {
                let gpu = Device::gpu(format!("gpu{}", i), i);
                (0..replicas).map(move |r| gpu.replica(r))
            })
            .collect()
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_gpus_use_aligned() {
        let allocator = create_allocator(SharingStrategy::None);
        let devices = plain_devices(2);
        let available = devices.ids();

        assert_eq!(
            allocator.select(&devices, &available).unwrap(),
            AllocationKind::Aligned
        );

        let mut result = allocator
            .preferred_allocation(&devices, &available, &[], 2)
            .unwrap();
        result.sort();
        assert_eq!(result, ids(&["gpu0", "gpu1"]));
    }

    #[test]
    fn test_aligned_repeated_available_ids() {
        let allocator = create_allocator(SharingStrategy::None);
        let devices = plain_devices(2);
        let available = ids(&["gpu0", "gpu0", "gpu1"]);

        let mut result = allocator
            .preferred_allocation(&devices, &available, &[], 2)
            .unwrap();
        result.sort();
        assert_eq!(result, ids(&["gpu0", "gpu1"]));

        let result = allocator
            .preferred_allocation(&devices, &ids(&["gpu0", "gpu0"]), &[], 2)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_aligned_even_with_strategy() {
        let allocator = create_allocator(SharingStrategy::Packed);
        let devices = plain_devices(2);

        assert_eq!(
            allocator.select(&devices, &devices.ids()).unwrap(),
            AllocationKind::Aligned
        );
    }

    #[test]
    fn test_mig_devices_need_strategy() {
        let mut devices = plain_devices(1);
        devices.insert(Device::mig("MIG-0-1", 0, 1));
        let available = ids(&["MIG-0-1"]);

        let err = create_allocator(SharingStrategy::None)
            .preferred_allocation(&devices, &available, &[], 1)
            .unwrap_err();
        assert!(matches!(err, GpushareError::NoValidPolicy));

        let result = create_allocator(SharingStrategy::Packed)
            .preferred_allocation(&devices, &available, &[], 1)
            .unwrap();
        assert_eq!(result, available);
    }

    #[test]
    fn test_packed_strategy() {
        let allocator = create_allocator(SharingStrategy::Packed);
        let devices = replicated_devices(2, 2);
        let available = ids(&["gpu0::1", "gpu0::0", "gpu1::0"]);

        let result = allocator
            .preferred_allocation(&devices, &available, &[], 2)
            .unwrap();
        assert_eq!(result, ids(&["gpu0::0", "gpu0::1"]));
    }

    #[test]
    fn test_distributed_strategy() {
        let allocator = create_allocator(SharingStrategy::Distributed);
        let devices = replicated_devices(2, 2);
        let available = devices.ids();

        let result = allocator
            .preferred_allocation(&devices, &available, &[], 2)
            .unwrap();
        assert_eq!(result, ids(&["gpu0::0", "gpu1::0"]));
    }

    #[test]
    fn test_idempotent() {
        let allocator = create_allocator(SharingStrategy::Distributed);
        let devices = replicated_devices(3, 3);
        let available = devices.ids();
        let required = ids(&["gpu2::1"]);

        let first = allocator
            .preferred_allocation(&devices, &available, &required, 4)
            .unwrap();
        let second = allocator
            .preferred_allocation(&devices, &available, &required, 4)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], "gpu2::1");
    }

    #[test]
    fn test_size_larger_than_available() {
        let devices = replicated_devices(1, 2);
        let available = devices.ids();

        for strategy in [SharingStrategy::Packed, SharingStrategy::Distributed] {
            let err = create_allocator(strategy)
                .preferred_allocation(&devices, &available, &[], 3)
                .unwrap_err();
            assert!(matches!(err, GpushareError::InsufficientDevices { .. }));
        }
    }

    #[test]
    fn test_aligned_size_larger_than_available() {
        let allocator = create_allocator(SharingStrategy::None);
        let devices = plain_devices(2);

        let result = allocator
            .preferred_allocation(&devices, &devices.ids(), &[], 3)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_invalid_requests() {
        let allocator = create_allocator(SharingStrategy::Packed);
        let devices = replicated_devices(1, 2);
        let available = ids(&["gpu0::0"]);

        let err = allocator
            .preferred_allocation(&devices, &available, &ids(&["gpu0::1"]), 1)
            .unwrap_err();
        assert!(matches!(err, GpushareError::InvalidRequest(_)));

        let err = allocator
            .preferred_allocation(&devices, &available, &available, 0)
            .unwrap_err();
        assert!(matches!(err, GpushareError::InvalidRequest(_)));
    }

    #[test]
    fn test_zero_size() {
        let allocator = create_allocator(SharingStrategy::None);
        let devices = replicated_devices(1, 2);

        let result = allocator
            .preferred_allocation(&devices, &devices.ids(), &[], 0)
            .unwrap();
        assert!(result.is_empty());
    }
}
