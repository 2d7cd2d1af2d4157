//! Vendor requests understood by the bridge
//!
//! The request codes follow the i2c-tiny-usb protocol, so existing host
//! drivers (like Linux's `i2c-tiny-usb`) work unmodified.

use usb_device::control::{Recipient, Request, RequestType};

use crate::i2c::Direction;

/// Echo `wValue` back to the host
pub const CMD_ECHO: u8 = 0;
/// Report the [`Capabilities`]
pub const CMD_GET_FUNC: u8 = 1;
/// Set the bus speed as a bit delay, in microseconds
pub const CMD_SET_DELAY: u8 = 2;
/// Report the [`BusStatus`](crate::BusStatus)
pub const CMD_GET_STATUS: u8 = 3;
/// Bus I/O; combined with [`CMD_I2C_IO_BEGIN`] and [`CMD_I2C_IO_END`]
pub const CMD_I2C_IO: u8 = 4;
/// Flag: start the bus transaction before the data phase
pub const CMD_I2C_IO_BEGIN: u8 = 1;
/// Flag: stop the bus transaction after the data phase
pub const CMD_I2C_IO_END: u8 = 2;
/// Hand the device over to its bootloader
pub const CMD_START_BOOTLOADER: u8 = 0x10;
/// Set the bus speed, in kHz
pub const CMD_SET_BAUDRATE: u8 = 0x11;

/// Read flag in the `wValue` of a bus I/O request
const I2C_M_RD: u16 = 1;

bitflags::bitflags! {
    /// I2C functionality flags, as understood by Linux I2C adapters
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Capabilities: u32 {
        const I2C = 0x0000_0001;
        const TEN_BIT_ADDR = 0x0000_0002;
        const PROTOCOL_MANGLING = 0x0000_0004;
        const SMBUS_PEC = 0x0000_0008;
        const NOSTART = 0x0000_0010;
        const SMBUS_QUICK = 0x0001_0000;
        const SMBUS_READ_BYTE = 0x0002_0000;
        const SMBUS_WRITE_BYTE = 0x0004_0000;
        const SMBUS_READ_BYTE_DATA = 0x0008_0000;
        const SMBUS_WRITE_BYTE_DATA = 0x0010_0000;
        const SMBUS_READ_WORD_DATA = 0x0020_0000;
        const SMBUS_WRITE_WORD_DATA = 0x0040_0000;
        const SMBUS_PROC_CALL = 0x0080_0000;
        const SMBUS_READ_BLOCK_DATA = 0x0100_0000;
        const SMBUS_WRITE_BLOCK_DATA = 0x0200_0000;
        const SMBUS_READ_I2C_BLOCK = 0x0400_0000;
        const SMBUS_WRITE_I2C_BLOCK = 0x0800_0000;

        /// Everything the SMBus emulation layer can build from plain I2C
        const SMBUS_EMUL = Self::SMBUS_QUICK.bits()
            | Self::SMBUS_READ_BYTE.bits()
            | Self::SMBUS_WRITE_BYTE.bits()
            | Self::SMBUS_READ_BYTE_DATA.bits()
            | Self::SMBUS_WRITE_BYTE_DATA.bits()
            | Self::SMBUS_READ_WORD_DATA.bits()
            | Self::SMBUS_WRITE_WORD_DATA.bits()
            | Self::SMBUS_PROC_CALL.bits()
            | Self::SMBUS_WRITE_BLOCK_DATA.bits()
            | Self::SMBUS_READ_I2C_BLOCK.bits()
            | Self::SMBUS_WRITE_I2C_BLOCK.bits()
            | Self::SMBUS_PEC.bits();
    }
}

impl Capabilities {
    /// What the bridge reports to the host
    pub const BRIDGE: Capabilities = Capabilities::I2C.union(Capabilities::SMBUS_EMUL);
}

/// A bus I/O request
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transfer {
    /// Start the bus transaction, and address the target
    pub begin: bool,
    /// Stop the bus transaction after the data phase
    pub end: bool,
    pub direction: Direction,
    /// 7-bit target address
    pub address: u8,
    /// Data phase length
    pub length: u16,
}

/// A decoded vendor request
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Echo(u16),
    GetCapabilities,
    /// Bit delay, in microseconds
    SetDelay(u16),
    GetStatus,
    BusIo(Transfer),
    EnterBootloader,
    /// Bus speed, in kHz
    SetBusSpeed(u16),
}

impl Command {
    /// Decode a control request
    ///
    /// Returns `None` for requests that aren't meant for the bridge.
    pub fn decode(request: &Request) -> Option<Command> {
        if request.request_type != RequestType::Vendor
            || !matches!(request.recipient, Recipient::Device | Recipient::Interface)
        {
            return None;
        }

        let command = match request.request {
            CMD_ECHO => Command::Echo(request.value),
            CMD_GET_FUNC => Command::GetCapabilities,
            CMD_SET_DELAY => Command::SetDelay(request.value),
            CMD_GET_STATUS => Command::GetStatus,
            code @ CMD_I2C_IO..=7 => Command::BusIo(Transfer {
                begin: code & CMD_I2C_IO_BEGIN != 0,
                end: code & CMD_I2C_IO_END != 0,
                direction: if request.value & I2C_M_RD != 0 {
                    Direction::Read
                } else {
                    Direction::Write
                },
                address: (request.index & 0x7F) as u8,
                length: request.length,
            }),
            CMD_START_BOOTLOADER => Command::EnterBootloader,
            CMD_SET_BAUDRATE => Command::SetBusSpeed(request.value),
            _ => return None,
        };
        Some(command)
    }

    /// Indicates if the command answers with IN data
    pub fn replies_in(&self) -> bool {
        match self {
            Command::Echo(_) | Command::GetCapabilities | Command::GetStatus => true,
            Command::BusIo(transfer) => transfer.direction == Direction::Read,
            Command::SetDelay(_) | Command::EnterBootloader | Command::SetBusSpeed(_) => false,
        }
    }
}

/// Convert a bit delay, in microseconds, to a bus speed in kHz
///
/// A delay of zero asks for the fastest speed.
pub fn delay_to_khz(delay_us: u16) -> u16 {
    1000 / delay_us.max(1)
}
