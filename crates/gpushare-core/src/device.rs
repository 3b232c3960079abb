//! Device inventory and set operations

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::id::AnnotatedId;

/// Health of an advertised device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceHealth {
    #[default]
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for DeviceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceHealth::Healthy => write!(f, "healthy"),
            DeviceHealth::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// A single allocatable device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Advertised device ID, annotated when the device is a replica
    pub id: String,
    /// Device index; `"<gpu>"` for a full GPU, `"<gpu>:<mig>"` for a MIG instance
    pub index: String,
    /// UUID of the backing GPU or MIG instance
    pub uuid: String,
    /// Device health
    #[serde(default)]
    pub health: DeviceHealth,
}

impl Device {
    /// Create a full-GPU device
    pub fn gpu(uuid: impl Into<String>, index: usize) -> Self {
        let uuid = uuid.into();
        Self {
            id: uuid.clone(),
            index: index.to_string(),
            uuid,
            health: DeviceHealth::Healthy,
        }
    }

    /// Create a MIG device living on GPU `parent`
    pub fn mig(uuid: impl Into<String>, parent: usize, index: usize) -> Self {
        let uuid = uuid.into();
        Self {
            id: uuid.clone(),
            index: format!("{}:{}", parent, index),
            uuid,
            health: DeviceHealth::Healthy,
        }
    }

    /// Same device with the given health
    pub fn with_health(self, health: DeviceHealth) -> Self {
        Self { health, ..self }
    }

    /// Whether this device is a MIG instance
    pub fn is_mig(&self) -> bool {
        self.index.contains(':')
    }

    /// Whether this device is one replica of a shared device
    pub fn is_replica(&self) -> bool {
        AnnotatedId::new(&self.id).has_annotation()
    }

    /// Copy of this device advertised as replica `replica`
    pub fn replica(&self, replica: usize) -> Self {
        Self {
            id: AnnotatedId::with_replica(&self.uuid, replica),
            ..self.clone()
        }
    }
}

/// Immutable snapshot of the known devices, keyed by device ID
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSet {
    devices: BTreeMap<String, Device>,
}

impl DeviceSet {
    /// Create an empty device set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device, replacing any existing device with the same ID
    pub fn insert(&mut self, device: Device) {
        self.devices.insert(device.id.clone(), device);
    }

    /// Get a device by ID
    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Whether every given ID is a known device
    pub fn contains<S: AsRef<str>>(&self, ids: &[S]) -> bool {
        ids.iter().all(|id| self.devices.contains_key(id.as_ref()))
    }

    /// Whether the inventory holds any MIG device
    pub fn contains_mig_devices(&self) -> bool {
        self.devices.values().any(Device::is_mig)
    }

    /// The known devices among `ids`; unknown IDs are skipped
    pub fn subset<S: AsRef<str>>(&self, ids: &[S]) -> DeviceSet {
        let devices = ids
            .iter()
            .filter_map(|id| self.devices.get(id.as_ref()))
            .map(|d| (d.id.clone(), d.clone()))
            .collect();
        DeviceSet { devices }
    }

    /// Devices in `self` that are not in `other`
    pub fn difference(&self, other: &DeviceSet) -> DeviceSet {
        let devices = self
            .devices
            .iter()
            .filter(|(id, _)| !other.devices.contains_key(*id))
            .map(|(id, d)| (id.clone(), d.clone()))
            .collect();
        DeviceSet { devices }
    }

    /// All device IDs, in ID order
    pub fn ids(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    /// Iterate over all devices in ID order
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Known devices from `available` that are not `required`.
    ///
    /// Keeps the order of `available` and drops repeated IDs.
    pub fn candidates(&self, available: &[String], required: &[String]) -> Vec<String> {
        let required: HashSet<&str> = required.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        available
            .iter()
            .filter(|id| self.devices.contains_key(id.as_str()))
            .filter(|id| !required.contains(id.as_str()))
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl FromIterator<Device> for DeviceSet {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        let devices = iter.into_iter().map(|d| (d.id.clone(), d)).collect();
        DeviceSet { devices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn replicated(count: usize, replicas: usize) -> DeviceSet {
        (0..count)
            .flat_map(|i| {
                let gpu = Device::gpu(format!("GPU-{}", i), i);
                (0..replicas).map(move |r| gpu.replica(r))
            })
            .collect()
    }

    #[test]
    fn test_mig_detection() {
        let mut set: DeviceSet = (0..2).map(|i| Device::gpu(format!("GPU-{}", i), i)).collect();
        assert!(!set.contains_mig_devices());

        set.insert(Device::mig("MIG-0-1", 0, 1));
        assert!(set.contains_mig_devices());
        assert_eq!(set.get("MIG-0-1").unwrap().index, "0:1");
    }

    #[test]
    fn test_replica_device() {
        let gpu = Device::gpu("GPU-0", 0);
        assert!(!gpu.is_replica());

        let replica = gpu.replica(1);
        assert_eq!(replica.id, "GPU-0::1");
        assert_eq!(replica.uuid, "GPU-0");
        assert!(replica.is_replica());
        assert!(!replica.is_mig());
    }

    #[test]
    fn test_replica_keeps_health() {
        let gpu = Device::gpu("GPU-0", 0);
        assert_eq!(gpu.health, DeviceHealth::Healthy);

        let replica = gpu.with_health(DeviceHealth::Unhealthy).replica(0);
        assert_eq!(replica.health, DeviceHealth::Unhealthy);
        assert_eq!(replica.health.to_string(), "unhealthy");
    }

    #[test]
    fn test_subset_and_difference() {
        let set = replicated(2, 2);
        assert_eq!(set.len(), 4);

        let available = set.subset(&["GPU-0::0", "GPU-0::1", "GPU-1::0", "unknown"]);
        assert_eq!(available.len(), 3);

        let required = set.subset(&["GPU-0::1"]);
        let remaining = available.difference(&required);
        assert_eq!(remaining.ids(), ids(&["GPU-0::0", "GPU-1::0"]));
    }

    #[test]
    fn test_contains() {
        let set = replicated(1, 2);
        assert!(set.contains(&["GPU-0::0", "GPU-0::1"]));
        assert!(!set.contains(&["GPU-0::2"]));
    }

    #[test]
    fn test_candidates_keep_available_order() {
        let set = replicated(2, 2);
        let available = ids(&["GPU-1::1", "GPU-0::0", "GPU-1::0", "GPU-1::1", "GPU-9::0"]);
        let required = ids(&["GPU-1::0"]);

        assert_eq!(
            set.candidates(&available, &required),
            ids(&["GPU-1::1", "GPU-0::0"])
        );
    }
}
