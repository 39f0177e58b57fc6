//! In-memory registry of discovered devices.
//!
//! Devices are keyed by serial number — the only identity that survives an
//! address change — with the bus address as a secondary index. The last
//! decoded physical position is cached per device, so relative moves on one
//! stage can never borrow another stage's position.

use std::collections::HashMap;

use tracing::debug;

use elliptec_protocol::{BusAddress, DeviceInfo};

use crate::error::BusError;

/// One registry entry: identity plus the last known physical position.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    /// Identity and calibration as reported by the device.
    pub info: DeviceInfo,
    /// Last decoded position in the device's physical unit (degrees for
    /// rotary, millimeters for linear). `None` until a position reply has
    /// been decoded for this device.
    pub last_position: Option<f64>,
}

/// Registry of all devices discovered on the bus.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    by_serial: HashMap<u64, DeviceRecord>,
    by_address: HashMap<BusAddress, u64>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        DeviceRegistry::default()
    }

    /// Insert a freshly decoded identity record.
    ///
    /// First seen wins: a record whose serial number is already present is
    /// ignored. Returns whether the device was newly added.
    pub fn upsert(&mut self, info: DeviceInfo) -> bool {
        if self.by_serial.contains_key(&info.serial) {
            debug!(serial = info.serial, "device already registered, keeping first record");
            return false;
        }
        debug!(%info, "registering device");
        self.by_address.insert(info.address, info.serial);
        self.by_serial.insert(
            info.serial,
            DeviceRecord {
                info,
                last_position: None,
            },
        );
        true
    }

    /// Look up a device by bus address. Absence is a normal outcome.
    pub fn lookup(&self, address: BusAddress) -> Option<&DeviceRecord> {
        let serial = self.by_address.get(&address)?;
        self.by_serial.get(serial)
    }

    fn lookup_mut(&mut self, address: BusAddress) -> Option<&mut DeviceRecord> {
        let serial = self.by_address.get(&address)?;
        self.by_serial.get_mut(serial)
    }

    /// Whether any device currently holds `address`.
    pub fn contains_address(&self, address: BusAddress) -> bool {
        self.by_address.contains_key(&address)
    }

    /// Move a device to a new address.
    ///
    /// Fails with [`BusError::AddressInUse`] if the target address is
    /// assigned, leaving the registry untouched.
    pub fn rename(&mut self, old: BusAddress, new: BusAddress) -> Result<(), BusError> {
        if self.contains_address(new) {
            return Err(BusError::AddressInUse(new));
        }
        let serial = *self
            .by_address
            .get(&old)
            .ok_or(BusError::DeviceNotFound(old))?;
        self.by_address.remove(&old);
        self.by_address.insert(new, serial);
        if let Some(record) = self.by_serial.get_mut(&serial) {
            record.info.address = new;
        }
        debug!(%old, %new, serial, "device readdressed");
        Ok(())
    }

    /// Record the last decoded physical position for a device.
    pub fn record_position(&mut self, address: BusAddress, position: f64) {
        if let Some(record) = self.lookup_mut(address) {
            record.last_position = Some(position);
        }
    }

    /// Last known physical position of a device, if one has been decoded.
    pub fn last_position(&self, address: BusAddress) -> Option<f64> {
        self.lookup(address).and_then(|r| r.last_position)
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }

    /// Iterate over all records in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.by_serial.values()
    }
}
