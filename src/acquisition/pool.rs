use crate::error::AcquisitionError;

use super::topology::DEVICES_PER_GROUP;

/// Four I2C addresses packed into one word, slot 0 in the lowest byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPackage(pub u32);

impl AddressPackage {
    pub fn from_addresses(addresses: [u8; DEVICES_PER_GROUP]) -> Self {
        Self(u32::from_le_bytes(addresses))
    }

    pub fn addresses(&self) -> [u8; DEVICES_PER_GROUP] {
        self.0.to_le_bytes()
    }
}

/// One logical device slot bound to an I2C address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle {
    pub slot: usize,
    pub address: u8,
}

/// Fixed pool of device handles, one per distinct address on a sub-bus.
///
/// The same four handles address every multiplexer group and every bank.
#[derive(Debug, Default)]
pub struct DevicePool {
    handles: [Option<DeviceHandle>; DEVICES_PER_GROUP],
}

impl DevicePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind all four slots from a packed address word.
    pub fn bind_package(&mut self, package: AddressPackage) -> Result<(), AcquisitionError> {
        let addresses = package.addresses();
        for (slot, address) in addresses.iter().enumerate() {
            check_address(slot, *address)?;
        }
        for (slot, address) in addresses.into_iter().enumerate() {
            self.handles[slot] = Some(DeviceHandle { slot, address });
        }
        Ok(())
    }

    /// Bind slot 0 only; the other slots become unbound.
    pub fn bind_single(&mut self, address: u8) -> Result<(), AcquisitionError> {
        check_address(0, address)?;
        self.handles = [Some(DeviceHandle { slot: 0, address }), None, None, None];
        Ok(())
    }

    /// Handle for slot `index`.
    ///
    /// `None` for an index outside `0..4` or an unbound slot. Callers iterate
    /// topology routes, so `None` here means a programming error.
    pub fn which_device(&self, index: usize) -> Option<&DeviceHandle> {
        self.handles.get(index).and_then(Option::as_ref)
    }
}

fn check_address(slot: usize, address: u8) -> Result<(), AcquisitionError> {
    if address > 0x7F {
        return Err(AcquisitionError::InvalidAddress { slot, address });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_package_is_little_endian() {
        let package = AddressPackage(0x0F0E0D0C);
        assert_eq!(package.addresses(), [0x0C, 0x0D, 0x0E, 0x0F]);
        assert_eq!(AddressPackage::from_addresses([0x0C, 0x0D, 0x0E, 0x0F]), package);
    }

    #[test]
    fn test_bind_package() {
        let mut pool = DevicePool::new();
        pool.bind_package(AddressPackage(0x0F0E0D0C)).unwrap();
        assert_eq!(pool.which_device(2).unwrap().address, 0x0E);
        assert_eq!(pool.which_device(3).unwrap().slot, 3);
    }

    #[test]
    fn test_which_device_out_of_range() {
        let mut pool = DevicePool::new();
        pool.bind_package(AddressPackage(0x0F0E0D0C)).unwrap();
        assert!(pool.which_device(4).is_none());
        assert!(pool.which_device(usize::MAX).is_none());
    }

    #[test]
    fn test_bind_single_unbinds_other_slots() {
        let mut pool = DevicePool::new();
        pool.bind_package(AddressPackage(0x0F0E0D0C)).unwrap();
        pool.bind_single(0x18).unwrap();
        assert_eq!(pool.which_device(0).unwrap().address, 0x18);
        assert!(pool.which_device(1).is_none());
    }

    #[test]
    fn test_rejects_eight_bit_address_without_binding() {
        let mut pool = DevicePool::new();
        let err = pool.bind_package(AddressPackage(0x0F8E0D0C)).unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::InvalidAddress {
                slot: 2,
                address: 0x8E
            }
        ));
        assert!(pool.which_device(0).is_none());
    }
}
