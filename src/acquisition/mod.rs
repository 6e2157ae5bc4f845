//! Node addressing and acquisition.
//!
//! Every topology runs the same routine: walk the topology's routes in buffer
//! order, select the multiplexer group before each block of four devices, and
//! copy each node's reply into its block. Named wrappers exist per topology size.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use tracing::{debug, info, warn};

use crate::error::AcquisitionError;
use crate::frame::MeasurementBuffer;
use crate::sensors::{AxisMask, MagTransport, REPLY_LEN, STATUS_NO_DATA, SensorSettings};

pub mod mux;
pub mod pool;
pub mod topology;

pub use mux::MuxSelector;
pub use pool::{AddressPackage, DeviceHandle, DevicePool};
pub use topology::{NodeRoute, Topology};

use topology::NODE_BLOCK_LEN;

/// How the device pool is bound during init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// One address in slot 0.
    Single(u8),
    /// Four addresses, one per slot.
    Package(AddressPackage),
}

struct ActiveScan {
    topology: Topology,
    mask: AxisMask,
    scratch: Vec<u8>,
}

/// Drives one transport per I2C line plus an optional group multiplexer.
pub struct AcquisitionEngine<T, P, D> {
    banks: Vec<T>,
    pool: DevicePool,
    mux: Option<MuxSelector<P, D>>,
    active: Option<ActiveScan>,
}

impl<T, P, D> AcquisitionEngine<T, P, D>
where
    T: MagTransport,
    P: OutputPin,
    D: DelayNs,
{
    /// `banks[0]` is the line used by every topology; 32 and 64 nodes also
    /// use `banks[1]` and `banks[1..4]`.
    pub fn new(banks: Vec<T>) -> Self {
        Self {
            banks,
            pool: DevicePool::new(),
            mux: None,
            active: None,
        }
    }

    pub fn topology(&self) -> Option<Topology> {
        self.active.as_ref().map(|a| a.topology)
    }

    pub fn axis_mask(&self) -> Option<AxisMask> {
        self.active.as_ref().map(|a| a.mask)
    }

    pub fn which_device(&self, index: usize) -> Option<&DeviceHandle> {
        self.pool.which_device(index)
    }

    pub fn mux(&self) -> Option<&MuxSelector<P, D>> {
        self.mux.as_ref()
    }

    pub fn into_parts(self) -> (Vec<T>, Option<MuxSelector<P, D>>) {
        (self.banks, self.mux)
    }

    pub fn init_single_node(
        &mut self,
        address: u8,
        buffer: &mut MeasurementBuffer,
        zyxt: u8,
        settings: &SensorSettings,
    ) -> Result<u8, AcquisitionError> {
        self.init_topology(Topology::Single, Addressing::Single(address), buffer, zyxt, None, settings)
    }

    pub fn init_four_node(
        &mut self,
        package: AddressPackage,
        buffer: &mut MeasurementBuffer,
        zyxt: u8,
        settings: &SensorSettings,
    ) -> Result<u8, AcquisitionError> {
        self.init_topology(Topology::Four, Addressing::Package(package), buffer, zyxt, None, settings)
    }

    pub fn init_16_nodes(
        &mut self,
        package: AddressPackage,
        buffer: &mut MeasurementBuffer,
        zyxt: u8,
        mux: MuxSelector<P, D>,
        settings: &SensorSettings,
    ) -> Result<u8, AcquisitionError> {
        self.init_topology(Topology::Sixteen, Addressing::Package(package), buffer, zyxt, Some(mux), settings)
    }

    pub fn init_32_nodes(
        &mut self,
        package: AddressPackage,
        buffer: &mut MeasurementBuffer,
        zyxt: u8,
        mux: MuxSelector<P, D>,
        settings: &SensorSettings,
    ) -> Result<u8, AcquisitionError> {
        self.init_topology(Topology::ThirtyTwo, Addressing::Package(package), buffer, zyxt, Some(mux), settings)
    }

    pub fn init_64_nodes(
        &mut self,
        package: AddressPackage,
        buffer: &mut MeasurementBuffer,
        zyxt: u8,
        mux: MuxSelector<P, D>,
        settings: &SensorSettings,
    ) -> Result<u8, AcquisitionError> {
        self.init_topology(Topology::SixtyFour, Addressing::Package(package), buffer, zyxt, Some(mux), settings)
    }

    pub fn read_single_node(&mut self, buffer: &mut MeasurementBuffer) -> Result<(), AcquisitionError> {
        self.read_topology(Topology::Single, buffer)
    }

    pub fn read_four_nodes(&mut self, buffer: &mut MeasurementBuffer) -> Result<(), AcquisitionError> {
        self.read_topology(Topology::Four, buffer)
    }

    pub fn read_16_nodes(&mut self, buffer: &mut MeasurementBuffer) -> Result<(), AcquisitionError> {
        self.read_topology(Topology::Sixteen, buffer)
    }

    pub fn read_32_nodes(&mut self, buffer: &mut MeasurementBuffer) -> Result<(), AcquisitionError> {
        self.read_topology(Topology::ThirtyTwo, buffer)
    }

    pub fn read_64_nodes(&mut self, buffer: &mut MeasurementBuffer) -> Result<(), AcquisitionError> {
        self.read_topology(Topology::SixtyFour, buffer)
    }

    /// Address and configure every node of `topology`.
    ///
    /// Writes the first node's configuration status into the buffer header and
    /// returns it. A multiplexer passed here replaces any previously recorded
    /// one and is kept even when the arguments are rejected, so a corrected
    /// call may pass `None`. Multiplexed topologies fail without one.
    pub fn init_topology(
        &mut self,
        topology: Topology,
        addressing: Addressing,
        buffer: &mut MeasurementBuffer,
        zyxt: u8,
        mux: Option<MuxSelector<P, D>>,
        settings: &SensorSettings,
    ) -> Result<u8, AcquisitionError> {
        self.active = None;
        if let Some(mux) = mux {
            self.mux = Some(mux);
        }

        let mask = AxisMask::new(zyxt)?;
        check_buffer(topology, buffer)?;
        if self.banks.len() < topology.banks() {
            return Err(AcquisitionError::MissingBus {
                topology: topology.to_string(),
                needed: topology.banks(),
                available: self.banks.len(),
            });
        }
        if topology.is_multiplexed() && self.mux.is_none() {
            return Err(AcquisitionError::MissingMultiplexer(topology.to_string()));
        }

        match addressing {
            Addressing::Single(address) => self.pool.bind_single(address)?,
            Addressing::Package(package) => self.pool.bind_package(package)?,
        }

        let mut first_status = None;
        for route in topology.routes() {
            self.route_group(&route)?;
            let address = self.address_for(&route)?;
            let status = self.banks[route.bank].configure(address, settings);
            if status == STATUS_NO_DATA {
                warn!(node = route.index, bank = route.bank, address, "node did not answer configuration");
            }
            first_status.get_or_insert(status);
        }
        let status = first_status.unwrap_or(STATUS_NO_DATA);
        buffer.write_header(status);

        info!(
            %topology,
            zyxt = mask.bits(),
            status,
            "sensor array initialised"
        );
        self.active = Some(ActiveScan {
            topology,
            mask,
            scratch: vec![0; topology.blocks_len()],
        });
        Ok(status)
    }

    /// Poll every node of the active topology into `buffer`.
    ///
    /// A node that fails keeps whatever status its transport reported; the scan
    /// always covers every node. On `Err` the buffer is left untouched.
    pub fn read_topology(
        &mut self,
        topology: Topology,
        buffer: &mut MeasurementBuffer,
    ) -> Result<(), AcquisitionError> {
        let (mask, mut scratch) = match self.active.as_mut() {
            Some(active) if active.topology == topology => {
                (active.mask, std::mem::take(&mut active.scratch))
            }
            _ => return Err(AcquisitionError::NotInitialized(topology.to_string())),
        };
        let result = check_buffer(topology, buffer).and_then(|_| self.scan(topology, mask, &mut scratch));
        if result.is_ok() {
            let start = topology.header_len();
            let end = start + scratch.len();
            let bytes = buffer.bytes_mut();
            bytes[start..end].copy_from_slice(&scratch);
            bytes[end..].fill(0);
        }
        if let Some(active) = self.active.as_mut() {
            active.scratch = scratch;
        }
        result
    }

    fn scan(&mut self, topology: Topology, mask: AxisMask, scratch: &mut [u8]) -> Result<(), AcquisitionError> {
        let mut reply = [0u8; REPLY_LEN];
        let mut failed = 0usize;
        for route in topology.routes() {
            self.route_group(&route)?;
            let address = self.address_for(&route)?;
            let bank = &mut self.banks[route.bank];

            bank.start_measurement(address, mask);
            reply.fill(0);
            let status = bank.read_measurement(address, mask, &mut reply);
            if status == STATUS_NO_DATA {
                failed += 1;
            }

            let start = route.index * NODE_BLOCK_LEN;
            scratch[start..start + NODE_BLOCK_LEN].copy_from_slice(&reply[..NODE_BLOCK_LEN]);
        }
        debug!(%topology, failed, "scan complete");
        Ok(())
    }

    /// Select the route's group when it starts a new block of four devices.
    fn route_group(&mut self, route: &NodeRoute) -> Result<(), AcquisitionError> {
        match (route.group, route.slot) {
            (Some(group), 0) => match self.mux.as_mut() {
                Some(mux) => mux.select_group(group),
                None => Err(AcquisitionError::MissingMultiplexer(format!("group {}", group))),
            },
            _ => Ok(()),
        }
    }

    fn address_for(&self, route: &NodeRoute) -> Result<u8, AcquisitionError> {
        self.pool
            .which_device(route.slot)
            .map(|handle| handle.address)
            .ok_or(AcquisitionError::UnboundSlot(route.slot))
    }
}

fn check_buffer(topology: Topology, buffer: &MeasurementBuffer) -> Result<(), AcquisitionError> {
    if buffer.topology() != topology {
        return Err(AcquisitionError::BufferMismatch {
            expected: topology.buffer_len(),
            actual: buffer.len(),
        });
    }
    Ok(())
}
