//! Vendor request dispatch
//!
//! A [`Bridge`] owns the I2C master and the transaction state, and services
//! one control request at a time, data phase included. Between requests it
//! only remembers the [`BusStatus`].
//!
//! # Example
//!
//! Call [`poll()`](Bridge::poll) from the firmware main loop, with the
//! chip's endpoint 0:
//!
//! ```no_run
//! use i2c_tiny_usbd::{Bridge, Config, Response};
//! # use i2c_tiny_usbd::{control::*, i2c::*, BusSpeedConfig};
//! # struct Twi; impl I2cMaster for Twi { type Error = ();
//! #   fn disable(&mut self) {} fn configure_clock(&mut self, _: BusSpeedConfig) {}
//! #   fn start(&mut self, _: u8, _: Direction) -> nb::Result<Ack, ()> { Ok(Ack::Ack) }
//! #   fn stop(&mut self) -> Result<(), ()> { Ok(()) } fn write_byte(&mut self, _: u8) -> Result<(), ()> { Ok(()) }
//! #   fn read_byte(&mut self, _: bool) -> Result<u8, ()> { Ok(0) } }
//! # struct Ep0; impl ControlEndpoint for Ep0 {
//! #   fn link_state(&self) -> LinkState { LinkState::Active } fn is_setup_pending(&self) -> bool { false }
//! #   fn read_setup(&mut self) -> [u8; 8] { [0; 8] } fn is_out_ready(&self) -> bool { false }
//! #   fn is_in_ready(&self) -> bool { true } fn bytes_in_packet(&self) -> usize { 0 }
//! #   fn read_byte(&mut self) -> u8 { 0 } fn write_byte(&mut self, _: u8) {} fn complete_out(&mut self) {}
//! #   fn complete_in(&mut self) {} fn max_packet_size(&self) -> usize { 8 } }
//! # struct Delay; impl embedded_hal::delay::DelayNs for Delay { fn delay_ns(&mut self, _: u32) {} }
//! # fn enter_bootloader() -> ! { loop {} }
//! # fn usb_stack_control(_: usb_device::control::Request) {}
//! # let (twi, mut ep0, delay) = (Twi, Ep0, Delay);
//! let mut bridge = Bridge::new(twi, delay, Config::new(16_000_000));
//! loop {
//!     match bridge.poll(&mut ep0) {
//!         Some(Response::EnterBootloader) => enter_bootloader(),
//!         Some(Response::Unhandled(request)) => usb_stack_control(request),
//!         _ => {}
//!     }
//! }
//! ```

use embedded_hal::delay::DelayNs;
use usb_device::control::Request;

use crate::{
    command::{delay_to_khz, Capabilities, Command, Transfer},
    config::Config,
    control::{parse_setup, ControlEndpoint},
    i2c::{Direction, I2cMaster},
    sequencer::{BusStatus, Sequencer},
    speed::BusSpeedConfig,
    stream::{self, Abort},
};

/// What became of a control request
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Response {
    /// The request completed, moving this many data bytes
    Completed(usize),
    /// The host abandoned the request
    Aborted(Abort),
    /// The host asked for the bootloader. The request's status stage is
    /// left to the bootloader hand-off.
    EnterBootloader,
    /// Not a bridge request
    ///
    /// Only the SETUP packet was consumed. The decoded request is handed
    /// back so that the USB stack can serve it.
    Unhandled(Request),
}

#[cfg(feature = "defmt")]
impl defmt::Format for Response {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Response::Completed(bytes) => defmt::write!(f, "Completed({=usize})", bytes),
            Response::Aborted(abort) => defmt::write!(f, "Aborted({})", abort),
            Response::EnterBootloader => defmt::write!(f, "EnterBootloader"),
            Response::Unhandled(request) => {
                defmt::write!(f, "Unhandled({=u8})", request.request)
            }
        }
    }
}

/// The USB to I2C bridge
pub struct Bridge<M, D> {
    master: M,
    delay: D,
    sequencer: Sequencer,
    config: Config,
}

impl<M: I2cMaster, D: DelayNs> Bridge<M, D> {
    /// Create a bridge, and apply the configured bus speed
    pub fn new(master: M, delay: D, config: Config) -> Self {
        let mut bridge = Bridge {
            master,
            delay,
            sequencer: Sequencer::new(),
            config,
        };
        bridge.set_bus_speed(config.bus_speed_khz());
        bridge
    }

    /// Returns the outcome of the most recent addressing attempt
    pub fn status(&self) -> BusStatus {
        self.sequencer.status()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Access the I2C master
    pub fn master(&self) -> &M {
        &self.master
    }

    /// Mutable access to the I2C master
    ///
    /// Don't use this in the middle of a bus transaction.
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    /// Release the I2C master and the delay
    pub fn free(self) -> (M, D) {
        (self.master, self.delay)
    }

    /// Reprogram the bus clock
    ///
    /// The master is disabled first; any transaction in progress is lost.
    pub fn set_bus_speed(&mut self, khz: u16) -> BusSpeedConfig {
        self.master.disable();
        let speed = BusSpeedConfig::compute(self.config.master_clock_hz(), khz);
        self.master.configure_clock(speed);
        debug!(
            "BUS SPEED {} kHz -> {} {}",
            khz,
            speed,
            speed.effective_hz(self.config.master_clock_hz())
        );
        speed
    }

    /// Service a pending SETUP packet, if there is one
    ///
    /// Returns `None` when no SETUP packet is pending.
    pub fn poll<E: ControlEndpoint>(&mut self, ep: &mut E) -> Option<Response> {
        if !ep.is_setup_pending() {
            return None;
        }
        let setup = ep.read_setup();
        let request = parse_setup(&setup);
        Some(self.dispatch(ep, &request))
    }

    /// Service `request`, whose SETUP packet was already acknowledged
    ///
    /// Runs the request's data and status stages on `ep`.
    pub fn dispatch<E: ControlEndpoint>(&mut self, ep: &mut E, request: &Request) -> Response {
        let Some(command) = Command::decode(request) else {
            return Response::Unhandled(*request);
        };
        trace!("COMMAND {}", command);

        let length = usize::from(request.length);
        let result = match command {
            Command::Echo(value) => stream::reply(ep, &value.to_le_bytes(), length),
            Command::GetCapabilities => {
                stream::reply(ep, &Capabilities::BRIDGE.bits().to_le_bytes(), length)
            }
            Command::GetStatus => stream::reply(ep, &[self.status().as_u8()], length),
            Command::SetBusSpeed(khz) => {
                self.set_bus_speed(khz);
                stream::status_in(ep).map(|()| 0)
            }
            Command::SetDelay(delay_us) => {
                self.set_bus_speed(delay_to_khz(delay_us));
                stream::status_in(ep).map(|()| 0)
            }
            Command::BusIo(transfer) => self.bus_io(ep, &transfer),
            Command::EnterBootloader => return Response::EnterBootloader,
        };

        match result {
            Ok(bytes) => Response::Completed(bytes),
            Err(abort) => {
                warn!("ABORTED {}", abort);
                Response::Aborted(abort)
            }
        }
    }

    fn bus_io<E: ControlEndpoint>(&mut self, ep: &mut E, transfer: &Transfer) -> Result<usize, Abort> {
        let skip = if transfer.begin {
            let status = self.sequencer.start_transaction(
                &mut self.master,
                &mut self.delay,
                transfer.address,
                transfer.direction,
                self.config.address_timeout_ms(),
            );
            status == BusStatus::AddressNacked
        } else {
            // Continuing a transaction that may have failed its addressing.
            self.sequencer.skip_bus()
        };

        let length = usize::from(transfer.length);
        let moved = match transfer.direction {
            Direction::Read => stream::read_phase(ep, &mut self.master, length, transfer.end, skip)?,
            Direction::Write => stream::write_phase(ep, &mut self.master, length, skip)?,
        };

        if transfer.end && !skip {
            self.sequencer.stop_transaction(&mut self.master);
        }
        Ok(moved)
    }
}
