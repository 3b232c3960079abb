//! CLI commands implementation

use anyhow::Result;
use gpushare_allocator::{BestEffortPolicy, PreferredAllocator};
use gpushare_core::{Device, DeviceSet, Inventory, PluginConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Device snapshot and allocator loaded for one invocation
pub struct NodeContext {
    pub devices: DeviceSet,
    pub allocator: PreferredAllocator,
}

impl NodeContext {
    /// Load the inventory and build the allocator from the plugin config
    pub fn load(inventory_path: &Path, config: &PluginConfig) -> Result<Self> {
        let inventory = Inventory::from_file(inventory_path)?;
        Ok(Self::from_inventory(&inventory, config))
    }

    pub fn from_inventory(inventory: &Inventory, config: &PluginConfig) -> Self {
        let time_slicing = &config.sharing.time_slicing;
        let devices = inventory.device_set(time_slicing.replicas);
        let allocator = PreferredAllocator::new(
            time_slicing.strategy,
            inventory.device_graph(),
            Arc::new(BestEffortPolicy),
        );

        info!(
            devices = devices.len(),
            strategy = %time_slicing.strategy,
            "Loaded device inventory"
        );

        Self { devices, allocator }
    }
}

/// Compute and print the preferred allocation
pub fn allocate(
    ctx: &NodeContext,
    available: Vec<String>,
    required: Vec<String>,
    size: usize,
    json: bool,
) -> Result<()> {
    let allocated = preferred_allocation(ctx, available, required, size)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&allocated)?);
    } else {
        for id in allocated {
            println!("{}", id);
        }
    }

    Ok(())
}

fn preferred_allocation(
    ctx: &NodeContext,
    available: Vec<String>,
    required: Vec<String>,
    size: usize,
) -> Result<Vec<String>> {
    let available = if available.is_empty() {
        ctx.devices.ids()
    } else {
        available
    };

    let allocated = ctx
        .allocator
        .preferred_allocation(&ctx.devices, &available, &required, size)?;
    Ok(allocated)
}

/// Print the devices in the inventory
pub fn devices(ctx: &NodeContext) {
    if ctx.devices.is_empty() {
        println!("No devices found");
        return;
    }

    println!(
        "Devices: {} (sharing strategy: {})",
        ctx.devices.len(),
        ctx.allocator.strategy()
    );
    println!();
    println!(
        "{:<40} {:<8} {:<6} {:<8} {:<10}",
        "ID", "INDEX", "KIND", "REPLICA", "HEALTH"
    );
    println!("{}", "-".repeat(76));
    for device in ctx.devices.iter() {
        println!("{}", device_row(device));
    }
}

fn device_row(device: &Device) -> String {
    format!(
        "{:<40} {:<8} {:<6} {:<8} {:<10}",
        device.id,
        device.index,
        if device.is_mig() { "MIG" } else { "GPU" },
        if device.is_replica() { "yes" } else { "no" },
        device.health.to_string()
    )
}
