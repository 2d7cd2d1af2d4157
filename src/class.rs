//! `usb-device` class adapter
//!
//! [`I2cTinyUsb`] runs a [`Bridge`] inside a [`usb-device`] stack. The stack
//! owns endpoint 0 and buffers whole data stages, so each vendor request is
//! served in one go from [`control_in`](UsbClass::control_in) or
//! [`control_out`](UsbClass::control_out):
//!
//! - a read is clocked off the bus straight into the control buffer,
//! - a write is clocked out of the buffer the stack already collected.
//!
//! The control buffer limits the size of a single request. IN requests that
//! don't fit are rejected before the bus is touched.
//!
//! ```no_run
//! use i2c_tiny_usbd::{class::{I2cTinyUsb, VID_PID}, Bridge, Config};
//! use usb_device::prelude::*;
//! # use i2c_tiny_usbd::{i2c::*, BusSpeedConfig};
//! # struct Twi; impl I2cMaster for Twi { type Error = ();
//! #   fn disable(&mut self) {} fn configure_clock(&mut self, _: BusSpeedConfig) {}
//! #   fn start(&mut self, _: u8, _: Direction) -> nb::Result<Ack, ()> { Ok(Ack::Ack) }
//! #   fn stop(&mut self) -> Result<(), ()> { Ok(()) } fn write_byte(&mut self, _: u8) -> Result<(), ()> { Ok(()) }
//! #   fn read_byte(&mut self, _: bool) -> Result<u8, ()> { Ok(0) } }
//! # struct Delay; impl embedded_hal::delay::DelayNs for Delay { fn delay_ns(&mut self, _: u32) {} }
//! # fn enter_bootloader() -> ! { loop {} }
//! # fn run<B: usb_device::bus::UsbBus>(bus: usb_device::bus::UsbBusAllocator<B>, twi: Twi, delay: Delay) -> ! {
//! let mut i2c = I2cTinyUsb::new(&bus, Bridge::new(twi, delay, Config::new(16_000_000)));
//! let mut device = UsbDeviceBuilder::new(&bus, VID_PID)
//!     .strings(&[StringDescriptors::default().product("i2c-tiny-usb")])
//!     .unwrap()
//!     .build();
//!
//! loop {
//!     device.poll(&mut [&mut i2c]);
//!     if i2c.take_bootloader_request() {
//!         enter_bootloader();
//!     }
//! }
//! # }
//! ```
//!
//! [`usb-device`]: https://crates.io/crates/usb-device

use embedded_hal::delay::DelayNs;
use usb_device::{class_prelude::*, prelude::UsbVidPid};

use crate::{
    bridge::{Bridge, Response},
    command::Command,
    control::{ControlEndpoint, LinkState, SETUP_LEN},
    i2c::I2cMaster,
};

/// Vendor and product IDs registered for i2c-tiny-usb
///
/// Host drivers bind to the device by these IDs.
pub const VID_PID: UsbVidPid = UsbVidPid(0x0403, 0xc631);

/// Vendor-specific interface class
const VENDOR_CLASS: u8 = 0xFF;

/// A USB class serving i2c-tiny-usb vendor requests
pub struct I2cTinyUsb<M, D> {
    interface: InterfaceNumber,
    bridge: Bridge<M, D>,
    bootloader_requested: bool,
}

impl<M: I2cMaster, D: DelayNs> I2cTinyUsb<M, D> {
    /// Allocate the class interface, and take ownership of `bridge`
    pub fn new<B: UsbBus>(alloc: &UsbBusAllocator<B>, bridge: Bridge<M, D>) -> Self {
        I2cTinyUsb {
            interface: alloc.interface(),
            bridge,
            bootloader_requested: false,
        }
    }

    pub fn bridge(&self) -> &Bridge<M, D> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut Bridge<M, D> {
        &mut self.bridge
    }

    /// Indicates if the host asked for the bootloader, and clears the request
    ///
    /// The request was already acknowledged on the bus. Let the status stage
    /// go out (a few more polls) before jumping.
    pub fn take_bootloader_request(&mut self) -> bool {
        core::mem::take(&mut self.bootloader_requested)
    }

    /// Release the bridge
    pub fn free(self) -> Bridge<M, D> {
        self.bridge
    }
}

impl<B: UsbBus, M: I2cMaster, D: DelayNs> UsbClass<B> for I2cTinyUsb<M, D> {
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> usb_device::Result<()> {
        writer.interface(self.interface, VENDOR_CLASS, 0, 0)
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let request = *xfer.request();
        let Some(command) = Command::decode(&request) else {
            return;
        };
        if !command.replies_in() {
            xfer.reject().ok();
            return;
        }

        let bridge = &mut self.bridge;
        let result = xfer.accept(|buffer| {
            let length = usize::from(request.length);
            let Some(buffer) = buffer.get_mut(..length) else {
                warn!("IN request of {} bytes exceeds the control buffer", length);
                return Err(UsbError::BufferOverflow);
            };
            let mut ep = BufferedEndpoint::reading(buffer);
            match bridge.dispatch(&mut ep, &request) {
                Response::Completed(_) => Ok(ep.position()),
                _ => Err(UsbError::InvalidState),
            }
        });
        if result.is_err() {
            debug!("IN request {=u8} rejected", request.request);
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let request = *xfer.request();
        let Some(command) = Command::decode(&request) else {
            return;
        };
        if command.replies_in() {
            xfer.reject().ok();
            return;
        }

        let response = {
            let mut ep = BufferedEndpoint::writing(xfer.data());
            self.bridge.dispatch(&mut ep, &request)
        };
        match response {
            Response::Completed(_) => xfer.accept().ok(),
            Response::EnterBootloader => {
                self.bootloader_requested = true;
                xfer.accept().ok()
            }
            Response::Aborted(_) | Response::Unhandled(_) => xfer.reject().ok(),
        };
    }
}

enum Stage<'a> {
    /// Filling the IN data stage
    In { buffer: &'a mut [u8], sent: bool },
    /// Draining the OUT data stage
    Out { data: &'a [u8] },
}

/// A [`ControlEndpoint`] over a data stage the USB stack buffers
///
/// The whole data stage is a single packet. The stack runs the status
/// stage once the request returns, so the link is always active, and the
/// host's status packet is reported as soon as the IN data is sent.
struct BufferedEndpoint<'a> {
    stage: Stage<'a>,
    position: usize,
}

impl<'a> BufferedEndpoint<'a> {
    fn reading(buffer: &'a mut [u8]) -> Self {
        BufferedEndpoint {
            stage: Stage::In {
                buffer,
                sent: false,
            },
            position: 0,
        }
    }

    fn writing(data: &'a [u8]) -> Self {
        BufferedEndpoint {
            stage: Stage::Out { data },
            position: 0,
        }
    }

    /// Bytes written to, or read from, the data stage
    fn position(&self) -> usize {
        self.position
    }
}

impl ControlEndpoint for BufferedEndpoint<'_> {
    fn link_state(&self) -> LinkState {
        LinkState::Active
    }

    fn is_setup_pending(&self) -> bool {
        false
    }

    fn read_setup(&mut self) -> [u8; SETUP_LEN] {
        [0; SETUP_LEN]
    }

    fn is_out_ready(&self) -> bool {
        match &self.stage {
            Stage::In { sent, .. } => *sent,
            Stage::Out { .. } => true,
        }
    }

    fn is_in_ready(&self) -> bool {
        true
    }

    fn bytes_in_packet(&self) -> usize {
        match &self.stage {
            Stage::In { .. } => self.position,
            Stage::Out { data } => data.len().saturating_sub(self.position),
        }
    }

    fn read_byte(&mut self) -> u8 {
        let Stage::Out { data } = &self.stage else {
            return 0;
        };
        let value = data.get(self.position).copied().unwrap_or(0);
        self.position += 1;
        value
    }

    fn write_byte(&mut self, value: u8) {
        let Stage::In { buffer, .. } = &mut self.stage else {
            return;
        };
        if let Some(slot) = buffer.get_mut(self.position) {
            *slot = value;
            self.position += 1;
        }
    }

    fn complete_out(&mut self) {}

    fn complete_in(&mut self) {
        if let Stage::In { sent, .. } = &mut self.stage {
            *sent = true;
        }
    }

    fn max_packet_size(&self) -> usize {
        match &self.stage {
            Stage::In { buffer, .. } => buffer.len(),
            // Any shortfall of the OUT data reads as a short packet.
            Stage::Out { .. } => usize::MAX,
        }
    }
}
