use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};
use tracing::trace;

use crate::error::AcquisitionError;

use super::topology::GROUPS_PER_BANK;

/// Default time allowed for the multiplexer to switch before the first read.
pub const DEFAULT_SETTLE_US: u32 = 10;

/// Two select lines routing the shared I2C line to one of four groups.
pub struct MuxSelector<P, D> {
    s1: P,
    s0: P,
    delay: D,
    settle_us: u32,
    route: Option<(bool, bool)>,
}

impl<P, D> MuxSelector<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(s1: P, s0: P, delay: D) -> Self {
        Self {
            s1,
            s0,
            delay,
            settle_us: DEFAULT_SETTLE_US,
            route: None,
        }
    }

    pub fn with_settle_us(mut self, settle_us: u32) -> Self {
        self.settle_us = settle_us;
        self
    }

    /// Drive both select lines, then wait for the switch to settle.
    pub fn set_mux(&mut self, s1: bool, s0: bool) -> Result<(), AcquisitionError> {
        self.s1
            .set_state(PinState::from(s1))
            .map_err(|e| AcquisitionError::Mux(format!("S1: {:?}", e)))?;
        self.s0
            .set_state(PinState::from(s0))
            .map_err(|e| AcquisitionError::Mux(format!("S0: {:?}", e)))?;
        self.route = Some((s1, s0));
        self.delay.delay_us(self.settle_us);
        trace!(s1, s0, "multiplexer route set");
        Ok(())
    }

    /// Route group `group` (0..=3) onto the bus.
    pub fn select_group(&mut self, group: u8) -> Result<(), AcquisitionError> {
        if group as usize >= GROUPS_PER_BANK {
            return Err(AcquisitionError::InvalidGroup(group));
        }
        self.set_mux(group & 0b10 != 0, group & 0b01 != 0)
    }

    /// Last applied (S1, S0) levels.
    pub fn current_route(&self) -> Option<(bool, bool)> {
        self.route
    }

    pub fn release(self) -> (P, P, D) {
        (self.s1, self.s0, self.delay)
    }
}
