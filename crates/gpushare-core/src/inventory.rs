//! Node inventory files
//!
//! An inventory lists the GPUs and MIG instances of a node together with the
//! links between GPUs. It is the on-disk source of both the [`DeviceSet`]
//! snapshot and the [`DeviceGraph`] used for aligned allocation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::device::{Device, DeviceHealth, DeviceSet};
use crate::topology::{DeviceGraph, GpuDevice, Link, LinkType};
use crate::{GpushareError, GpushareResult};

/// Inventory file format (TOML)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Inventory {
    /// Full GPUs
    #[serde(default, rename = "gpu")]
    pub gpus: Vec<GpuEntry>,
    /// MIG instances
    #[serde(default, rename = "mig")]
    pub migs: Vec<MigEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuEntry {
    pub uuid: String,
    pub index: usize,
    /// Replicas to advertise; overrides the configured default
    pub replicas: Option<usize>,
    #[serde(default)]
    pub health: DeviceHealth,
    /// Links to peer GPUs; each pair is listed once, on either side
    #[serde(default)]
    pub links: Vec<LinkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Index of the peer GPU
    pub peer: usize,
    pub link: LinkType,
    #[serde(default = "default_link_count")]
    pub count: u32,
}

fn default_link_count() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigEntry {
    pub uuid: String,
    /// Index of the GPU this instance lives on
    pub parent: usize,
    pub index: usize,
    pub replicas: Option<usize>,
    #[serde(default)]
    pub health: DeviceHealth,
}

impl Inventory {
    /// Load an inventory from a TOML file
    pub fn from_file(path: &Path) -> GpushareResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GpushareError::Config(format!("Failed to read inventory file: {}", e))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate an inventory from TOML text
    pub fn parse(content: &str) -> GpushareResult<Self> {
        let inventory: Inventory = toml::from_str(content)?;
        inventory.validate()?;
        Ok(inventory)
    }

    fn validate(&self) -> GpushareResult<()> {
        let mut uuids = HashSet::new();
        let uuid_iter = self
            .gpus
            .iter()
            .map(|g| g.uuid.as_str())
            .chain(self.migs.iter().map(|m| m.uuid.as_str()));
        for uuid in uuid_iter {
            if !uuids.insert(uuid) {
                return Err(GpushareError::Config(format!(
                    "Duplicate device UUID: {}",
                    uuid
                )));
            }
        }

        let mut indices = HashSet::new();
        for gpu in &self.gpus {
            if !indices.insert(gpu.index) {
                return Err(GpushareError::Config(format!(
                    "Duplicate GPU index: {}",
                    gpu.index
                )));
            }
        }

        let mut pairs = HashSet::new();
        for gpu in &self.gpus {
            for link in &gpu.links {
                if !indices.contains(&link.peer) {
                    return Err(GpushareError::Config(format!(
                        "GPU {} links to unknown peer {}",
                        gpu.uuid, link.peer
                    )));
                }
                let pair = (gpu.index.min(link.peer), gpu.index.max(link.peer));
                if !pairs.insert(pair) {
                    return Err(GpushareError::Config(format!(
                        "Duplicate link between GPU {} and GPU {}",
                        pair.0, pair.1
                    )));
                }
            }
        }

        let replicas = self
            .gpus
            .iter()
            .map(|g| (g.uuid.as_str(), g.replicas))
            .chain(self.migs.iter().map(|m| (m.uuid.as_str(), m.replicas)));
        for (uuid, replicas) in replicas {
            if replicas == Some(0) {
                return Err(GpushareError::Config(format!(
                    "Device {} must advertise at least one replica",
                    uuid
                )));
            }
        }

        if let Some(mig) = self.migs.iter().find(|m| !indices.contains(&m.parent)) {
            return Err(GpushareError::Config(format!(
                "MIG device {} references unknown GPU {}",
                mig.uuid, mig.parent
            )));
        }

        Ok(())
    }

    /// Build the device snapshot.
    ///
    /// Devices advertise `default_replicas` replicas unless their entry says
    /// otherwise; a device with more than one replica is advertised only
    /// through its annotated replica IDs.
    pub fn device_set(&self, default_replicas: usize) -> DeviceSet {
        let gpus = self
            .gpus
            .iter()
            .map(|g| (Device::gpu(&g.uuid, g.index).with_health(g.health), g.replicas));
        let migs = self
            .migs
            .iter()
            .map(|m| {
                let device = Device::mig(&m.uuid, m.parent, m.index).with_health(m.health);
                (device, m.replicas)
            });

        let devices: DeviceSet = gpus
            .chain(migs)
            .flat_map(|(device, replicas)| {
                let replicas = replicas.unwrap_or(default_replicas);
                if replicas > 1 {
                    (0..replicas).map(|r| device.replica(r)).collect::<Vec<_>>()
                } else {
                    vec![device]
                }
            })
            .collect();

        debug!(devices = devices.len(), "Built device set from inventory");
        devices
    }

    /// Build the interconnect graph of the full GPUs
    pub fn device_graph(&self) -> DeviceGraph {
        let mut graph = DeviceGraph::new();
        for gpu in &self.gpus {
            graph.add_device(GpuDevice::new(&gpu.uuid, gpu.index));
        }
        for gpu in &self.gpus {
            for entry in &gpu.links {
                let link = Link {
                    link_type: entry.link,
                    count: entry.count,
                };
                graph.connect(gpu.index, entry.peer, link);
            }
        }
        graph
    }
}
