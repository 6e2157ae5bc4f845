//! I2C sensor drivers and Linux bus setup.

pub mod mlx90393;

pub use mlx90393::Mlx90393;

#[cfg(target_os = "linux")]
pub use linux::{LinuxBank, open_banks};

#[cfg(target_os = "linux")]
mod linux {
    use linux_embedded_hal::{Delay, I2cdev};
    use tracing::info;

    use super::Mlx90393;
    use crate::error::{Result, ServiceError};

    /// MLX90393 transport on a Linux `/dev/i2c-*` device.
    pub type LinuxBank = Mlx90393<I2cdev, Delay>;

    /// Open one transport per bus path, in bank order.
    pub fn open_banks(buses: &[String]) -> Result<Vec<LinuxBank>> {
        buses
            .iter()
            .enumerate()
            .map(|(bank, path)| {
                let i2c = I2cdev::new(path).map_err(|e| {
                    ServiceError::InitializationError(format!("failed to open {}: {}", path, e))
                })?;
                info!(bank, bus = %path, "I2C bus opened");
                Ok(Mlx90393::new(i2c, Delay))
            })
            .collect()
    }
}
