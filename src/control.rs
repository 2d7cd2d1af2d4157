//! Control endpoint abstraction
//!
//! The bridge streams control-transfer data phases packet by packet. It
//! needs more visibility into endpoint 0 than the `usb-device` control pipe
//! offers: it must see SETUP packets arriving mid-transfer, and it must
//! notice the host moving on to the status stage. [`ControlEndpoint`]
//! describes that view. The [`class`](crate::class) module provides an
//! implementation over the buffered `usb-device` control pipe.

use usb_device::{
    control::{Recipient, Request, RequestType},
    UsbDirection,
};

/// Length of a SETUP packet
pub const SETUP_LEN: usize = 8;

/// Connection state of the USB device
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Attached and not suspended
    Active,
    /// Bus is suspended
    Suspended,
    /// Detached from the host
    Disconnected,
}

/// Endpoint 0, as seen from the bridge
///
/// The endpoint has one packet buffer per direction. An OUT packet stays in
/// the buffer until [`complete_out()`](ControlEndpoint::complete_out)
/// releases it; an IN packet is assembled with
/// [`write_byte()`](ControlEndpoint::write_byte), and sent by
/// [`complete_in()`](ControlEndpoint::complete_in).
pub trait ControlEndpoint {
    /// Returns the device connection state
    fn link_state(&self) -> LinkState;

    /// Indicates if the host sent a SETUP packet that hasn't been read
    fn is_setup_pending(&self) -> bool;

    /// Read and acknowledge the pending SETUP packet
    fn read_setup(&mut self) -> [u8; SETUP_LEN];

    /// Indicates if an OUT packet (data or status) was received
    fn is_out_ready(&self) -> bool;

    /// Indicates if the IN packet buffer can be filled
    fn is_in_ready(&self) -> bool;

    /// For a received OUT packet, the number of bytes not yet read. For an
    /// IN packet under construction, the number of bytes written so far.
    fn bytes_in_packet(&self) -> usize;

    /// Read the next byte of the received OUT packet
    fn read_byte(&mut self) -> u8;

    /// Append a byte to the IN packet
    fn write_byte(&mut self, value: u8);

    /// Release the OUT packet buffer, acknowledging the packet
    fn complete_out(&mut self);

    /// Send the IN packet, which may be empty
    fn complete_in(&mut self);

    /// Returns the maximum packet size of endpoint 0
    fn max_packet_size(&self) -> usize;
}

/// Decode a SETUP packet
pub fn parse_setup(packet: &[u8; SETUP_LEN]) -> Request {
    let request_type = packet[0];
    Request {
        direction: if request_type & 0x80 != 0 {
            UsbDirection::In
        } else {
            UsbDirection::Out
        },
        request_type: match (request_type >> 5) & 0b11 {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        },
        recipient: match request_type & 0b1_1111 {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            _ => Recipient::Reserved,
        },
        request: packet[1],
        value: u16::from_le_bytes([packet[2], packet[3]]),
        index: u16::from_le_bytes([packet[4], packet[5]]),
        length: u16::from_le_bytes([packet[6], packet[7]]),
    }
}
