//! Control-transfer data phases, streamed against the I2C bus
//!
//! The USB control pipe and the I2C bus both move one byte at a time, at
//! their own pace. The functions in this module pump both from a single
//! busy-wait loop. Every iteration of that loop re-checks the USB link, in
//! this order:
//!
//! 1. a detached device aborts with [`Abort::DeviceDisconnected`],
//! 2. a suspended bus aborts with [`Abort::BusSuspended`],
//! 3. a new SETUP packet aborts with [`Abort::HostAborted`],
//! 4. a packet in the opposite direction ends the data phase early.
//!
//! An abort only stops the USB side; bytes already handed to the I2C master
//! have been clocked out. The host is expected to retry the whole request.
//!
//! When the bus is skipped (the target didn't acknowledge its address) the
//! data phase is still framed exactly the same way, but no bus cycles run,
//! and reads produce zeros.

use crate::{control::ControlEndpoint, control::LinkState, i2c::I2cMaster};

/// Reason a control transfer was abandoned
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Abort {
    /// The device was detached from the host
    DeviceDisconnected,
    /// The host suspended the bus
    BusSuspended,
    /// The host started a new control transfer
    HostAborted,
}

/// I2C side of a data phase
///
/// Either drives the master, or stands in for it when skipping. A bus
/// error switches the port to skipping for the rest of the phase.
struct BusPort<'a, M> {
    master: &'a mut M,
    skip: bool,
}

impl<'a, M: I2cMaster> BusPort<'a, M> {
    fn new(master: &'a mut M, skip: bool) -> Self {
        BusPort { master, skip }
    }

    fn put(&mut self, value: u8) {
        if self.skip {
            return;
        }
        if self.master.write_byte(value).is_err() {
            warn!("I2C write failed; skipping the rest of the phase");
            self.skip = true;
        }
    }

    fn take(&mut self, nack: bool) -> u8 {
        if self.skip {
            return 0;
        }
        self.master.read_byte(nack).unwrap_or_else(|_| {
            warn!("I2C read failed; skipping the rest of the phase");
            self.skip = true;
            0
        })
    }
}

/// Checks 1-3 of the liveness contract
fn check_link<E: ControlEndpoint>(ep: &E) -> Result<(), Abort> {
    match ep.link_state() {
        LinkState::Disconnected => Err(Abort::DeviceDisconnected),
        LinkState::Suspended => Err(Abort::BusSuspended),
        LinkState::Active if ep.is_setup_pending() => Err(Abort::HostAborted),
        LinkState::Active => Ok(()),
    }
}

/// Spin until `ready` holds, or the transfer is abandoned
fn wait_until<E: ControlEndpoint>(ep: &E, ready: impl Fn(&E) -> bool) -> Result<(), Abort> {
    loop {
        check_link(ep)?;
        if ready(ep) {
            return Ok(());
        }
        core::hint::spin_loop();
    }
}

/// Complete the status stage of a transfer without IN data
pub fn status_in<E: ControlEndpoint>(ep: &mut E) -> Result<(), Abort> {
    wait_until(ep, E::is_in_ready)?;
    ep.complete_in();
    Ok(())
}

/// Run an IN data phase of `byte_count` bytes, then its status stage.
///
/// `next` produces each byte, given the number of bytes that remain after
/// it. Returns the number of bytes sent before the host ended the phase.
fn send_in<E: ControlEndpoint>(
    ep: &mut E,
    byte_count: usize,
    mut next: impl FnMut(usize) -> u8,
) -> Result<usize, Abort> {
    // No data stage: the status stage is IN.
    if byte_count == 0 {
        status_in(ep)?;
        return Ok(0);
    }

    let max_packet_size = ep.max_packet_size();
    let mut remaining = byte_count;
    let mut last_full = false;

    while remaining > 0 || last_full {
        check_link(ep)?;
        if ep.is_out_ready() {
            debug!("IN data phase ended by host, {} bytes left", remaining);
            break;
        }

        if ep.is_in_ready() {
            let mut filled = ep.bytes_in_packet();
            while remaining > 0 && filled < max_packet_size {
                remaining -= 1;
                ep.write_byte(next(remaining));
                filled += 1;
            }
            // A full final packet is followed by a zero-length packet.
            last_full = filled == max_packet_size;
            trace!("IN packet {}", filled);
            ep.complete_in();
        }
    }

    wait_until(ep, E::is_out_ready)?;
    ep.complete_out();
    Ok(byte_count - remaining)
}

/// Reply to an IN request with fixed `data`
///
/// Sends at most `length` bytes, the host's requested length.
pub fn reply<E: ControlEndpoint>(ep: &mut E, data: &[u8], length: usize) -> Result<usize, Abort> {
    let byte_count = data.len().min(length);
    send_in(ep, byte_count, |remaining| data[byte_count - 1 - remaining])
}

/// Stream `byte_count` bytes from the host to the I2C bus
///
/// Each OUT byte is written to the bus, unless `skip` is set, in which case
/// it's discarded. Once the data phase ends, the status stage completes with
/// an empty IN packet.
///
/// Returns the number of bytes consumed. It's less than `byte_count` if
/// the host ended the phase with a short packet.
pub fn write_phase<E: ControlEndpoint, M: I2cMaster>(
    ep: &mut E,
    master: &mut M,
    byte_count: usize,
    skip: bool,
) -> Result<usize, Abort> {
    let mut bus = BusPort::new(master, skip);
    let max_packet_size = ep.max_packet_size();
    let mut remaining = byte_count;

    while remaining > 0 {
        check_link(ep)?;
        if ep.is_out_ready() {
            let mut taken = 0;
            while remaining > 0 && ep.bytes_in_packet() > 0 {
                bus.put(ep.read_byte());
                remaining -= 1;
                taken += 1;
            }
            trace!("OUT packet {}", taken);
            ep.complete_out();

            if remaining > 0 && taken < max_packet_size {
                debug!("OUT data phase ended by host, {} bytes left", remaining);
                break;
            }
        } else {
            core::hint::spin_loop();
        }
    }

    status_in(ep)?;
    Ok(byte_count - remaining)
}

/// Stream `byte_count` bytes from the I2C bus to the host
///
/// Each byte is read from the bus and acknowledged, except for the final
/// byte when `nack_last_byte` is set: that one is answered with NACK, which
/// tells the target the bus transaction is ending. When `skip` is set, the
/// bus isn't touched, and the host receives zeros.
///
/// Returns the number of bytes sent. It's less than `byte_count` if the host
/// moved on to the status stage early.
pub fn read_phase<E: ControlEndpoint, M: I2cMaster>(
    ep: &mut E,
    master: &mut M,
    byte_count: usize,
    nack_last_byte: bool,
    skip: bool,
) -> Result<usize, Abort> {
    let mut bus = BusPort::new(master, skip);
    send_in(ep, byte_count, |remaining| {
        bus.take(nack_last_byte && remaining == 0)
    })
}
