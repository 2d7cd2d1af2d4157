//! I2C bus speed selection
//!
//! The I2C master derives its SCL clock from the master clock through a
//! prescaler and an 8-bit bit-rate divisor:
//!
//! ```text
//! f_scl = f_clk / (16 + 2 * divisor * prescaler)
//! ```
//!
//! [`BusSpeedConfig::compute`] picks the smallest prescaler whose divisor
//! fits the 8-bit register. Requests that are too slow for the largest
//! prescaler saturate at the slowest achievable rate; requests that are
//! too fast saturate at the fastest one. Neither case is an error.

/// Fixed SCL overhead, in master clock cycles, added by the I2C master.
const SCL_OVERHEAD: u32 = 16;

/// I2C master clock prescaler
///
/// The discriminant is the value the hardware expects in its prescaler
/// field; the division factor is `4^discriminant`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Prescaler {
    Div1 = 0,
    Div4 = 1,
    Div16 = 2,
    Div64 = 3,
}

impl Prescaler {
    /// All prescalers, smallest first.
    pub const ALL: [Prescaler; 4] = [
        Prescaler::Div1,
        Prescaler::Div4,
        Prescaler::Div16,
        Prescaler::Div64,
    ];

    /// Returns the division factor
    pub const fn factor(self) -> u32 {
        1 << (2 * self as u32)
    }

    /// Returns the raw prescaler field value
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Clock divider settings for the I2C master
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusSpeedConfig {
    /// Prescaler applied to the master clock
    pub prescaler: Prescaler,
    /// Bit-rate divisor
    pub divisor: u8,
}

impl BusSpeedConfig {
    /// Compute the divider settings for a bus speed of `khz`, given a
    /// master clock of `master_clock_hz`.
    ///
    /// The divisor is rounded up, so the effective rate never exceeds
    /// `khz` unless `khz` is faster than the hardware can go. A `khz` of
    /// zero is treated as 1 kHz.
    pub fn compute(master_clock_hz: u32, khz: u16) -> Self {
        let target_hz = u32::from(khz.max(1)) * 1000;
        let cycles = master_clock_hz
            .div_ceil(target_hz)
            .saturating_sub(SCL_OVERHEAD);

        for prescaler in Prescaler::ALL {
            let divisor = cycles.div_ceil(2 * prescaler.factor());
            if let Ok(divisor) = u8::try_from(divisor) {
                return BusSpeedConfig { prescaler, divisor };
            }
        }

        BusSpeedConfig {
            prescaler: Prescaler::Div64,
            divisor: u8::MAX,
        }
    }

    /// Returns the SCL frequency, in Hz, that these settings produce
    pub fn effective_hz(&self, master_clock_hz: u32) -> u32 {
        master_clock_hz
            / (SCL_OVERHEAD + 2 * u32::from(self.divisor) * self.prescaler.factor())
    }
}
