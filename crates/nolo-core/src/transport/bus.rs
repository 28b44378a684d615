//! Bus-tree snapshot types.
//!
//! A scan produces one `UsbBus` per bus, each holding its root devices with
//! hub children nested below them. Matching walks every bus in pre-order:
//! a node before its children, earlier siblings first.

use std::collections::BTreeMap;

/// One USB bus and its device tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbBus {
    pub id: String,
    pub devices: Vec<UsbDeviceNode>,
}

impl UsbBus {
    /// Pre-order walk over every device on this bus.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            stack: self.devices.iter().rev().collect(),
        }
    }
}

/// One device in a bus tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceNode {
    pub bus_id: String,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub children: Vec<UsbDeviceNode>,
}

impl UsbDeviceNode {
    /// Pre-order walk over this node and everything below it.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }
}

/// Pre-order iterator with an explicit stack.
pub struct Preorder<'a> {
    stack: Vec<&'a UsbDeviceNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a UsbDeviceNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Flat enumeration record, as the backend reports it.
#[derive(Debug, Clone)]
pub(crate) struct EnumeratedDevice {
    pub bus_id: String,
    pub address: u8,
    /// Hub port numbers from the root hub down to this device.
    pub port_chain: Vec<u32>,
    pub vendor_id: u16,
    pub product_id: u16,
}

struct Slot {
    node: UsbDeviceNode,
    chain: Vec<u32>,
    children: Vec<Slot>,
}

/// Group flat enumeration records into per-bus trees.
///
/// Each device nests under the device whose port chain is a proper prefix
/// of its own; devices whose parent hub is missing from the snapshot become
/// bus roots. Sibling order follows port numbers.
pub(crate) fn assemble_buses(devices: Vec<EnumeratedDevice>) -> Vec<UsbBus> {
    let mut by_bus: BTreeMap<String, Vec<EnumeratedDevice>> = BTreeMap::new();
    for dev in devices {
        by_bus.entry(dev.bus_id.clone()).or_default().push(dev);
    }

    by_bus
        .into_iter()
        .map(|(id, mut entries)| {
            entries.sort_by(|a, b| {
                (a.port_chain.len(), &a.port_chain, a.address)
                    .cmp(&(b.port_chain.len(), &b.port_chain, b.address))
            });
            let mut roots: Vec<Slot> = Vec::new();
            for entry in entries {
                let slot = Slot {
                    node: UsbDeviceNode {
                        bus_id: entry.bus_id,
                        address: entry.address,
                        vendor_id: entry.vendor_id,
                        product_id: entry.product_id,
                        children: Vec::new(),
                    },
                    chain: entry.port_chain,
                    children: Vec::new(),
                };
                attach(&mut roots, slot);
            }
            UsbBus {
                id,
                devices: roots.into_iter().map(strip).collect(),
            }
        })
        .collect()
}

fn attach(level: &mut Vec<Slot>, slot: Slot) {
    let parent = level.iter_mut().find(|candidate| {
        slot.chain.len() > candidate.chain.len() && slot.chain.starts_with(&candidate.chain)
    });
    match parent {
        Some(parent) => attach(&mut parent.children, slot),
        None => level.push(slot),
    }
}

fn strip(slot: Slot) -> UsbDeviceNode {
    let mut node = slot.node;
    node.children = slot.children.into_iter().map(strip).collect();
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(bus: &str, address: u8, chain: &[u32], product_id: u16) -> EnumeratedDevice {
        EnumeratedDevice {
            bus_id: bus.to_string(),
            address,
            port_chain: chain.to_vec(),
            vendor_id: 0x0421,
            product_id,
        }
    }

    #[test]
    fn nests_devices_under_their_hubs() {
        let buses = assemble_buses(vec![
            entry("001", 4, &[1, 3], 0x0003),
            entry("001", 2, &[1], 0x0001),
            entry("001", 3, &[2], 0x0002),
            entry("001", 5, &[1, 3, 2], 0x0004),
        ]);
        assert_eq!(buses.len(), 1);
        let bus = &buses[0];
        assert_eq!(bus.devices.len(), 2);
        assert_eq!(bus.devices[0].address, 2);
        assert_eq!(bus.devices[0].children[0].address, 4);
        assert_eq!(bus.devices[0].children[0].children[0].address, 5);
        assert_eq!(bus.devices[1].address, 3);
        assert!(bus.devices[1].children.is_empty());
    }

    #[test]
    fn orphaned_chains_become_roots() {
        let buses = assemble_buses(vec![entry("001", 7, &[4, 2], 0x0105)]);
        assert_eq!(buses[0].devices.len(), 1);
        assert_eq!(buses[0].devices[0].address, 7);
    }

    #[test]
    fn buses_are_kept_separate() {
        let buses = assemble_buses(vec![
            entry("002", 2, &[1], 0x0002),
            entry("001", 2, &[1], 0x0001),
        ]);
        assert_eq!(buses.len(), 2);
        assert_eq!(buses[0].id, "001");
        assert_eq!(buses[1].id, "002");
    }

    #[test]
    fn preorder_visits_node_before_children_and_siblings_in_order() {
        let buses = assemble_buses(vec![
            entry("001", 1, &[1], 0x0001),
            entry("001", 2, &[1, 1], 0x0002),
            entry("001", 3, &[1, 1, 1], 0x0003),
            entry("001", 4, &[1, 2], 0x0004),
            entry("001", 5, &[2], 0x0005),
        ]);
        let order: Vec<u8> = buses[0].preorder().map(|n| n.address).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);

        // Same order below a single subtree.
        let subtree: Vec<u8> = buses[0].devices[0].preorder().map(|n| n.address).collect();
        assert_eq!(subtree, vec![1, 2, 3, 4]);
    }
}
