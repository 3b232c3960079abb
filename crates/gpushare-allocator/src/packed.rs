//! Packed allocation of shared devices

use gpushare_core::{DeviceSet, GpushareError, GpushareResult};

/// Allocate `size` devices, required ones first, then candidates in ID order.
///
/// Replica IDs share their device's ID as a prefix, so sorting keeps the
/// replicas of one device together and fills it before moving to the next.
pub fn packed_allocation(
    devices: &DeviceSet,
    available: &[String],
    required: &[String],
    size: usize,
) -> GpushareResult<Vec<String>> {
    let mut candidates = devices.candidates(available, required);
    candidates.sort();

    let mut allocated = required.to_vec();
    allocated.extend(candidates);
    if allocated.len() < size {
        return Err(GpushareError::InsufficientDevices {
            requested: size,
            available: allocated.len(),
        });
    }

    allocated.truncate(size);
    Ok(allocated)
}
