//! Bridge configuration

/// Bridge settings
///
/// ```
/// use i2c_tiny_usbd::Config;
///
/// const CONFIG: Config = Config::new(16_000_000)
///     .with_bus_speed_khz(400)
///     .with_address_timeout_ms(10);
/// assert_eq!(CONFIG.bus_speed_khz(), 400);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    master_clock_hz: u32,
    bus_speed_khz: u16,
    address_timeout_ms: u32,
}

impl Config {
    /// Standard-mode I2C.
    pub const DEFAULT_BUS_SPEED_KHZ: u16 = 100;
    /// How long a start condition may wait for the bus.
    pub const DEFAULT_ADDRESS_TIMEOUT_MS: u32 = 25;

    /// Settings for an I2C master clocked at `master_clock_hz`
    pub const fn new(master_clock_hz: u32) -> Self {
        Config {
            master_clock_hz,
            bus_speed_khz: Self::DEFAULT_BUS_SPEED_KHZ,
            address_timeout_ms: Self::DEFAULT_ADDRESS_TIMEOUT_MS,
        }
    }

    /// Set the bus speed applied when the bridge starts
    pub const fn with_bus_speed_khz(mut self, khz: u16) -> Self {
        self.bus_speed_khz = khz;
        self
    }

    /// Set the time budget for capturing the bus and addressing a target
    pub const fn with_address_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.address_timeout_ms = timeout_ms;
        self
    }

    pub const fn master_clock_hz(&self) -> u32 {
        self.master_clock_hz
    }

    pub const fn bus_speed_khz(&self) -> u16 {
        self.bus_speed_khz
    }

    pub const fn address_timeout_ms(&self) -> u32 {
        self.address_timeout_ms
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults() {
        let config = Config::new(16_000_000);
        assert_eq!(config.master_clock_hz(), 16_000_000);
        assert_eq!(config.bus_speed_khz(), 100);
        assert_eq!(config.address_timeout_ms(), 25);
    }
}
