//! Logging interface, contingent on the `defmt` feature
//!
//! Only enable `defmt` when debugging, and when you're certain that your
//! logger isn't using the same USB device that carries the bridge!

macro_rules! debug {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($args)*)
    };
}

macro_rules! trace {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($args)*)
    };
}

macro_rules! warn {
    ($($args:tt)*) => {
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($args)*)
    };
}
