use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use tracing::debug;

use crate::sensors::{AxisMask, MagTransport, REPLY_LEN, STATUS_NO_DATA, SensorSettings};

const CMD_START_MEASUREMENT: u8 = 0x30;
const CMD_READ_MEASUREMENT: u8 = 0x40;
const CMD_READ_REGISTER: u8 = 0x50;
const CMD_WRITE_REGISTER: u8 = 0x60;
const CMD_EXIT: u8 = 0x80;

const REG_CONF1: u8 = 0x00;
const REG_CONF3: u8 = 0x02;

const GAIN_SEL_SHIFT: u16 = 4;
const GAIN_SEL_MASK: u16 = 0x7 << GAIN_SEL_SHIFT;
// OSR[1:0] DIG_FILT[4:2] RES_X[6:5] RES_Y[8:7] RES_Z[10:9]
const CONF3_MASK: u16 = 0x07FF;

/// MLX90393 command transport on one I2C line.
///
/// Several nodes share the line; every call names the node by address, so the
/// same instance serves all four device slots behind every multiplexer group.
pub struct Mlx90393<I2C, D> {
    i2c: I2C,
    delay: D,
    settings: SensorSettings,
}

impl<I2C, D> Mlx90393<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            settings: SensorSettings::default(),
        }
    }

    /// Release the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn read_register(&mut self, address: u8, reg: u8) -> Result<(u8, u16), I2C::Error> {
        let mut rx = [0u8; 3];
        self.i2c
            .write_read(address, &[CMD_READ_REGISTER, reg << 2], &mut rx)?;
        Ok((rx[0], u16::from_be_bytes([rx[1], rx[2]])))
    }

    fn write_register(&mut self, address: u8, reg: u8, value: u16) -> Result<u8, I2C::Error> {
        let [hi, lo] = value.to_be_bytes();
        let mut rx = [0u8; 1];
        self.i2c
            .write_read(address, &[CMD_WRITE_REGISTER, hi, lo, reg << 2], &mut rx)?;
        Ok(rx[0])
    }

    fn try_configure(&mut self, address: u8, settings: &SensorSettings) -> Result<u8, I2C::Error> {
        let mut status = [0u8; 1];
        self.i2c.write_read(address, &[CMD_EXIT], &mut status)?;

        let (_, conf1) = self.read_register(address, REG_CONF1)?;
        let conf1 = (conf1 & !GAIN_SEL_MASK) | ((settings.gain_sel as u16 & 0x7) << GAIN_SEL_SHIFT);
        self.write_register(address, REG_CONF1, conf1)?;

        let (_, conf3) = self.read_register(address, REG_CONF3)?;
        let conf3 = (conf3 & !CONF3_MASK) | pack_conf3(settings);
        self.write_register(address, REG_CONF3, conf3)
    }
}

fn pack_conf3(settings: &SensorSettings) -> u16 {
    (settings.osr as u16 & 0x3)
        | (settings.dig_filt as u16 & 0x7) << 2
        | (settings.res_x as u16 & 0x3) << 5
        | (settings.res_y as u16 & 0x3) << 7
        | (settings.res_z as u16 & 0x3) << 9
}

impl<I2C, D> MagTransport for Mlx90393<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    fn configure(&mut self, address: u8, settings: &SensorSettings) -> u8 {
        match self.try_configure(address, settings) {
            Ok(status) => {
                self.settings = settings.clone();
                status
            }
            Err(e) => {
                debug!(address, error = ?e.kind(), "MLX90393 configuration failed");
                STATUS_NO_DATA
            }
        }
    }

    fn start_measurement(&mut self, address: u8, mask: AxisMask) -> u8 {
        let mut status = [0u8; 1];
        match self
            .i2c
            .write_read(address, &[CMD_START_MEASUREMENT | mask.bits()], &mut status)
        {
            Ok(()) => {
                self.delay.delay_us(self.settings.conversion_time_us(mask));
                status[0]
            }
            Err(e) => {
                debug!(address, error = ?e.kind(), "MLX90393 start measurement failed");
                STATUS_NO_DATA
            }
        }
    }

    fn read_measurement(
        &mut self,
        address: u8,
        mask: AxisMask,
        reply: &mut [u8; REPLY_LEN],
    ) -> u8 {
        reply.fill(0);
        let len = mask.reply_len();
        match self
            .i2c
            .write_read(address, &[CMD_READ_MEASUREMENT | mask.bits()], &mut reply[..len])
        {
            Ok(()) => reply[0],
            Err(e) => {
                debug!(address, error = ?e.kind(), "MLX90393 read measurement failed");
                reply.fill(0);
                reply[0] = STATUS_NO_DATA;
                STATUS_NO_DATA
            }
        }
    }
}
