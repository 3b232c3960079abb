//! Topology-aligned allocation for unshared GPUs

use gpushare_core::{DeviceGraph, GpuDevice, GpushareError, GpushareResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::policy::AllocationPolicy;

/// Adapter between device IDs and a topology-aware [`AllocationPolicy`]
pub struct AlignedAllocator {
    /// GPUs of the node and their interconnects
    graph: DeviceGraph,
    /// Policy making the actual selection
    policy: Arc<dyn AllocationPolicy>,
}

impl AlignedAllocator {
    pub fn new(graph: DeviceGraph, policy: Arc<dyn AllocationPolicy>) -> Self {
        Self { graph, policy }
    }

    /// Run the policy over the given device IDs and return the chosen UUIDs
    pub fn allocate(
        &self,
        available: &[String],
        required: &[String],
        size: usize,
    ) -> GpushareResult<Vec<String>> {
        let available_devices = self.resolve("available", available)?;
        let required_devices = self.resolve("required", required)?;

        let allocated = self
            .policy
            .allocate(&available_devices, &required_devices, size);

        debug!(
            requested = size,
            allocated = allocated.len(),
            "Aligned allocation"
        );

        Ok(allocated.into_iter().map(|d| d.uuid).collect())
    }

    /// Look up each ID in the graph, keeping the first occurrence of repeats
    fn resolve(&self, list: &str, ids: &[String]) -> GpushareResult<Vec<GpuDevice>> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(id.as_str()))
            .map(|id| {
                self.graph.get(id).cloned().ok_or_else(|| {
                    GpushareError::InvalidDeviceList(format!(
                        "unable to retrieve list of {} devices: unknown device {}",
                        list, id
                    ))
                })
            })
            .collect()
    }
}
