use serde::Deserialize;

use crate::error::AcquisitionError;

pub mod i2c;

/// Largest raw reply a node can produce: status plus T, X, Y and Z words.
pub const REPLY_LEN: usize = 9;

/// Status byte left in a node's reply when the bus transaction itself failed.
pub const STATUS_NO_DATA: u8 = 0xFF;

/// Error bit inside a status byte reported by the sensor.
pub const STATUS_ERROR_BIT: u8 = 0x10;

/// One measurement channel of an MLX90393, in the order the device replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Temperature,
    X,
    Y,
    Z,
}

impl Channel {
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Temperature => "t",
            Channel::X => "x",
            Channel::Y => "y",
            Channel::Z => "z",
        }
    }
}

/// `zyxt` selection nibble: bit 0 temperature, bit 1 X, bit 2 Y, bit 3 Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMask(u8);

impl AxisMask {
    /// X, Y and Z without temperature.
    pub const XYZ: AxisMask = AxisMask(0x0E);

    pub fn new(zyxt: u8) -> Result<Self, AcquisitionError> {
        if zyxt == 0 || zyxt > 0x0F {
            return Err(AcquisitionError::InvalidAxisMask(zyxt));
        }
        Ok(Self(zyxt))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, channel: Channel) -> bool {
        let bit = match channel {
            Channel::Temperature => 0x01,
            Channel::X => 0x02,
            Channel::Y => 0x04,
            Channel::Z => 0x08,
        };
        self.0 & bit != 0
    }

    /// Selected channels in reply order.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        [Channel::Temperature, Channel::X, Channel::Y, Channel::Z]
            .into_iter()
            .filter(move |c| self.contains(*c))
    }

    pub fn channel_count(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Bytes in the raw reply to a read-measurement command.
    pub fn reply_len(&self) -> usize {
        1 + 2 * self.channel_count()
    }
}

impl Default for AxisMask {
    fn default() -> Self {
        Self::XYZ
    }
}

/// How a 16-bit field word is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    Signed,
    Unsigned,
}

/// Per-node analog front-end settings, written once during topology init.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SensorSettings {
    #[serde(default = "default_gain_sel")]
    pub gain_sel: u8,
    #[serde(default)]
    pub res_x: u8,
    #[serde(default)]
    pub res_y: u8,
    #[serde(default)]
    pub res_z: u8,
    #[serde(default = "default_dig_filt")]
    pub dig_filt: u8,
    #[serde(default)]
    pub osr: u8,
}

fn default_gain_sel() -> u8 {
    7
}

fn default_dig_filt() -> u8 {
    2
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            gain_sel: default_gain_sel(),
            res_x: 0,
            res_y: 0,
            res_z: 0,
            dig_filt: default_dig_filt(),
            osr: 0,
        }
    }
}

impl SensorSettings {
    /// Field words are two's complement at resolutions 0 and 1 and offset
    /// binary above that. Temperature is always unsigned.
    pub fn encoding(&self, channel: Channel) -> SampleEncoding {
        let res = match channel {
            Channel::Temperature => return SampleEncoding::Unsigned,
            Channel::X => self.res_x,
            Channel::Y => self.res_y,
            Channel::Z => self.res_z,
        };
        if res <= 1 {
            SampleEncoding::Signed
        } else {
            SampleEncoding::Unsigned
        }
    }

    /// Worst-case single-measurement conversion time for `mask`, in microseconds.
    pub fn conversion_time_us(&self, mask: AxisMask) -> u32 {
        let osr = 1u32 << self.osr.min(3);
        let filt = 1u32 << self.dig_filt.min(7);
        let per_axis = 67 + 64 * osr * (2 + filt);
        let magnetic = mask
            .channels()
            .filter(|c| *c != Channel::Temperature)
            .count() as u32;
        let mut total = magnetic * per_axis;
        if mask.contains(Channel::Temperature) {
            total += 67 + 192 * osr;
        }
        total
    }
}

/// The "read raw field sample" capability for one I2C line.
///
/// Implementations never fail with `Err`: a transaction that could not be
/// completed is reported through the returned status byte, usually
/// [`STATUS_NO_DATA`].
#[cfg_attr(test, mockall::automock)]
pub trait MagTransport {
    /// Apply `settings` to the node at `address`, returning its status byte.
    fn configure(&mut self, address: u8, settings: &SensorSettings) -> u8;

    /// Trigger a single measurement of `mask` and wait for it to complete.
    fn start_measurement(&mut self, address: u8, mask: AxisMask) -> u8;

    /// Fetch the result of the last measurement into `reply` (status first).
    fn read_measurement(&mut self, address: u8, mask: AxisMask, reply: &mut [u8; REPLY_LEN])
        -> u8;
}
