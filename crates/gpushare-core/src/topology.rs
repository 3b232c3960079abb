//! GPU interconnect topology

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Interconnect between two GPUs, from farthest to closest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkType {
    /// Traverses the inter-socket interconnect
    CrossCpu,
    /// Behind the same CPU socket
    SameCpu,
    /// Through a PCIe host bridge
    HostBridge,
    /// Through multiple PCIe switches
    MultiSwitch,
    /// Through a single PCIe switch
    SingleSwitch,
    /// On the same board
    SameBoard,
    /// Direct NVLink connection
    NvLink,
}

impl LinkType {
    /// Placement score of a single link of this type
    pub const fn score(&self) -> u32 {
        match self {
            LinkType::CrossCpu => 10,
            LinkType::SameCpu => 20,
            LinkType::HostBridge => 30,
            LinkType::MultiSwitch => 40,
            LinkType::SingleSwitch => 50,
            LinkType::SameBoard => 60,
            LinkType::NvLink => 100,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::CrossCpu => write!(f, "cross-cpu"),
            LinkType::SameCpu => write!(f, "same-cpu"),
            LinkType::HostBridge => write!(f, "host-bridge"),
            LinkType::MultiSwitch => write!(f, "multi-switch"),
            LinkType::SingleSwitch => write!(f, "single-switch"),
            LinkType::SameBoard => write!(f, "same-board"),
            LinkType::NvLink => write!(f, "nvlink"),
        }
    }
}

/// One connection from a GPU to a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub link_type: LinkType,
    /// Number of bonded links (only meaningful for NVLink)
    pub count: u32,
}

impl Link {
    pub fn score(&self) -> u32 {
        match self.link_type {
            LinkType::NvLink => self.link_type.score() * self.count.max(1),
            other => other.score(),
        }
    }
}

/// A GPU as seen by the topology-aware allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuDevice {
    pub uuid: String,
    pub index: usize,
    /// Links to peers, keyed by peer index
    pub links: BTreeMap<usize, Vec<Link>>,
}

impl GpuDevice {
    pub fn new(uuid: impl Into<String>, index: usize) -> Self {
        Self {
            uuid: uuid.into(),
            index,
            links: BTreeMap::new(),
        }
    }

    /// Summed score of all links between this device and `peer`
    pub fn pair_score(&self, peer: &GpuDevice) -> u32 {
        self.links
            .get(&peer.index)
            .map(|links| links.iter().map(Link::score).sum())
            .unwrap_or(0)
    }
}

/// All GPUs on a node and how they are connected
#[derive(Debug, Clone, Default)]
pub struct DeviceGraph {
    devices: Vec<GpuDevice>,
}

impl DeviceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a GPU to the graph
    pub fn add_device(&mut self, device: GpuDevice) {
        self.devices.push(device);
    }

    /// Connect two GPUs by index in both directions.
    ///
    /// Each call adds to the pair's score, so a physical link is connected
    /// once. Returns false if either index is unknown.
    pub fn connect(&mut self, a: usize, b: usize, link: Link) -> bool {
        if self.by_index(a).is_none() || self.by_index(b).is_none() {
            return false;
        }
        for device in self.devices.iter_mut() {
            if device.index == a {
                device.links.entry(b).or_default().push(link);
            } else if device.index == b {
                device.links.entry(a).or_default().push(link);
            }
        }
        true
    }

    /// Find a GPU by UUID
    pub fn get(&self, uuid: &str) -> Option<&GpuDevice> {
        self.devices.iter().find(|d| d.uuid == uuid)
    }

    /// Find a GPU by index
    pub fn by_index(&self, index: usize) -> Option<&GpuDevice> {
        self.devices.iter().find(|d| d.index == index)
    }

    pub fn devices(&self) -> &[GpuDevice] {
        &self.devices
    }
}
