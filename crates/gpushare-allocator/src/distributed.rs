//! Distributed allocation of shared devices

use gpushare_core::{AnnotatedId, DeviceSet, GpushareError, GpushareResult};
use std::collections::HashMap;
use tracing::trace;

/// Replica counts of one physical device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Replicas {
    /// Replicas of the device in the full inventory
    total: usize,
    /// Replicas still selectable in this call
    available: usize,
}

impl Replicas {
    /// Replicas already handed out
    fn used(&self) -> usize {
        self.total - self.available
    }
}

/// Allocate `size` devices, spreading replicas evenly across physical devices.
///
/// Replicas already allocated elsewhere (in the inventory but not among the
/// candidates) count against their device, so the least used devices are
/// picked first.
pub fn distributed_allocation(
    devices: &DeviceSet,
    available: &[String],
    required: &[String],
    size: usize,
) -> GpushareResult<Vec<String>> {
    let mut candidates = devices.candidates(available, required);
    let needed = size.saturating_sub(required.len());

    if candidates.len() < needed {
        return Err(GpushareError::InsufficientDevices {
            requested: size,
            available: required.len() + candidates.len(),
        });
    }

    let mut replicas = replica_accounting(devices, &candidates);

    let mut allocated = required.to_vec();
    for _ in 0..needed {
        // Re-rank after every pick so the next one sees the updated counts
        candidates.sort_by(|a, b| {
            let a_used = replicas[AnnotatedId::new(a).id()].used();
            let b_used = replicas[AnnotatedId::new(b).id()].used();
            a_used.cmp(&b_used).then_with(|| a.cmp(b))
        });

        let picked = candidates.remove(0);
        if let Some(counts) = replicas.get_mut(AnnotatedId::new(&picked).id()) {
            counts.available -= 1;
        }
        trace!(device = %picked, "Picked replica");
        allocated.push(picked);
    }

    Ok(allocated)
}

/// Count total and selectable replicas for every device behind a candidate
fn replica_accounting(devices: &DeviceSet, candidates: &[String]) -> HashMap<String, Replicas> {
    let mut replicas: HashMap<String, Replicas> = HashMap::new();
    for candidate in candidates {
        replicas
            .entry(AnnotatedId::new(candidate).id().to_string())
            .or_default()
            .available += 1;
    }
    for device in devices.iter() {
        if let Some(counts) = replicas.get_mut(AnnotatedId::new(&device.id).id()) {
            counts.total += 1;
        }
    }
    replicas
}
