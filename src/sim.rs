//! Simulated collaborators for unit tests
//!
//! - [`SimMaster`] records every bus cycle, and plays an I2C target that
//!   acknowledges a configurable set of addresses.
//! - [`SimEndpoint`] plays the host side of endpoint 0: it delivers scripted
//!   OUT data, collects IN packets, and sends the status OUT packet once it
//!   has seen the end of an IN data phase.
//! - [`SimDelay`] counts the time it was asked to wait.

use std::collections::VecDeque;
use std::vec::Vec;

use crate::{
    control::{ControlEndpoint, LinkState, SETUP_LEN},
    i2c::{Ack, Direction, I2cMaster},
    speed::BusSpeedConfig,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
    Disable,
    Clock(BusSpeedConfig),
    Start(u8, Direction),
    Stop,
    Write(u8),
    Read { nack: bool },
}

#[derive(Debug, PartialEq, Eq)]
pub struct BusFault;

pub struct SimMaster {
    pub events: Vec<Event>,
    acking: Vec<u8>,
    read_data: VecDeque<u8>,
    busy_polls: usize,
    start_fails: bool,
    fail_write_at: Option<usize>,
    fail_read_at: Option<usize>,
    writes: usize,
    reads: usize,
}

impl SimMaster {
    pub fn new() -> Self {
        SimMaster {
            events: Vec::new(),
            acking: Vec::new(),
            read_data: VecDeque::new(),
            busy_polls: 0,
            start_fails: false,
            fail_write_at: None,
            fail_read_at: None,
            writes: 0,
            reads: 0,
        }
    }

    /// Acknowledge `address`
    pub fn acking(mut self, address: u8) -> Self {
        self.acking.push(address);
        self
    }

    /// Bytes the target sends; 0xFF once exhausted (released bus)
    pub fn with_read_data(mut self, data: &[u8]) -> Self {
        self.read_data.extend(data);
        self
    }

    /// Report the bus busy for the next `polls` start attempts
    pub fn busy_for(mut self, polls: usize) -> Self {
        self.busy_polls = polls;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.start_fails = true;
        self
    }

    pub fn fail_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    pub fn fail_read_at(mut self, index: usize) -> Self {
        self.fail_read_at = Some(index);
        self
    }

    pub fn written(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Write(value) => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// The NACK flag of every read, in order
    pub fn read_acks(&self) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Read { nack } => Some(*nack),
                _ => None,
            })
            .collect()
    }
}

impl I2cMaster for SimMaster {
    type Error = BusFault;

    fn disable(&mut self) {
        self.events.push(Event::Disable);
    }

    fn configure_clock(&mut self, config: BusSpeedConfig) {
        self.events.push(Event::Clock(config));
    }

    fn start(&mut self, address: u8, direction: Direction) -> nb::Result<Ack, BusFault> {
        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            return Err(nb::Error::WouldBlock);
        }
        if self.start_fails {
            return Err(nb::Error::Other(BusFault));
        }
        self.events.push(Event::Start(address, direction));
        if self.acking.contains(&address) {
            Ok(Ack::Ack)
        } else {
            Ok(Ack::Nack)
        }
    }

    fn stop(&mut self) -> Result<(), BusFault> {
        self.events.push(Event::Stop);
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<(), BusFault> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_write_at == Some(index) {
            return Err(BusFault);
        }
        self.events.push(Event::Write(value));
        Ok(())
    }

    fn read_byte(&mut self, nack: bool) -> Result<u8, BusFault> {
        let index = self.reads;
        self.reads += 1;
        if self.fail_read_at == Some(index) {
            return Err(BusFault);
        }
        self.events.push(Event::Read { nack });
        Ok(self.read_data.pop_front().unwrap_or(0xFF))
    }
}

/// Something that happens to the link once enough packets moved
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Interrupt {
    Disconnect,
    Suspend,
    Setup,
}

pub struct SimEndpoint {
    max_packet_size: usize,
    setup: Option<[u8; SETUP_LEN]>,
    out_packets: VecDeque<Vec<u8>>,
    out_pos: usize,
    out_completed: usize,
    in_buffer: Vec<u8>,
    in_packets: Vec<Vec<u8>>,
    /// Length of the IN data phase the host asked for
    host_expects: Option<usize>,
    /// Host waits for a short packet, even when it has all its bytes
    lazy: bool,
    status_acked: bool,
    interrupts: Vec<(usize, Interrupt)>,
}

impl SimEndpoint {
    pub fn new(max_packet_size: usize) -> Self {
        SimEndpoint {
            max_packet_size,
            setup: None,
            out_packets: VecDeque::new(),
            out_pos: 0,
            out_completed: 0,
            in_buffer: Vec::new(),
            in_packets: Vec::new(),
            host_expects: None,
            lazy: false,
            status_acked: false,
            interrupts: Vec::new(),
        }
    }

    pub fn with_setup(mut self, packet: [u8; SETUP_LEN]) -> Self {
        self.setup = Some(packet);
        self
    }

    /// Queue OUT data, split into max-size packets
    pub fn with_out_data(mut self, data: &[u8]) -> Self {
        for chunk in data.chunks(self.max_packet_size) {
            self.out_packets.push_back(chunk.to_vec());
        }
        self
    }

    pub fn expecting_in(mut self, length: usize) -> Self {
        self.host_expects = Some(length);
        self
    }

    pub fn lazy_host(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Raise `interrupt` once `packets` packets (IN and OUT) completed
    pub fn interrupt_after(mut self, packets: usize, interrupt: Interrupt) -> Self {
        self.interrupts.push((packets, interrupt));
        self
    }

    pub fn in_packets(&self) -> &[Vec<u8>] {
        &self.in_packets
    }

    pub fn in_data(&self) -> Vec<u8> {
        self.in_packets.concat()
    }

    pub fn out_completed(&self) -> usize {
        self.out_completed
    }

    pub fn status_acked(&self) -> bool {
        self.status_acked
    }

    fn raised(&self, interrupt: Interrupt) -> bool {
        let moved = self.in_packets.len() + self.out_completed;
        self.interrupts
            .iter()
            .any(|(after, raised)| *raised == interrupt && moved >= *after)
    }

    /// The host has seen the end of the IN data phase
    fn host_done(&self) -> bool {
        let Some(expects) = self.host_expects else {
            return false;
        };
        let received: usize = self.in_packets.iter().map(Vec::len).sum();
        let short = self
            .in_packets
            .last()
            .is_some_and(|packet| packet.len() < self.max_packet_size);
        short || (!self.lazy && received >= expects)
    }

    fn status_out_pending(&self) -> bool {
        !self.status_acked && self.host_done()
    }
}

impl ControlEndpoint for SimEndpoint {
    fn link_state(&self) -> LinkState {
        if self.raised(Interrupt::Disconnect) {
            LinkState::Disconnected
        } else if self.raised(Interrupt::Suspend) {
            LinkState::Suspended
        } else {
            LinkState::Active
        }
    }

    fn is_setup_pending(&self) -> bool {
        self.setup.is_some() || self.raised(Interrupt::Setup)
    }

    fn read_setup(&mut self) -> [u8; SETUP_LEN] {
        self.setup.take().unwrap_or_default()
    }

    fn is_out_ready(&self) -> bool {
        !self.out_packets.is_empty() || self.status_out_pending()
    }

    fn is_in_ready(&self) -> bool {
        true
    }

    fn bytes_in_packet(&self) -> usize {
        match self.out_packets.front() {
            Some(packet) => packet.len() - self.out_pos,
            None => self.in_buffer.len(),
        }
    }

    fn read_byte(&mut self) -> u8 {
        let value = self.out_packets[0][self.out_pos];
        self.out_pos += 1;
        value
    }

    fn write_byte(&mut self, value: u8) {
        assert!(self.in_buffer.len() < self.max_packet_size, "IN packet overflow");
        self.in_buffer.push(value);
    }

    fn complete_out(&mut self) {
        if self.out_packets.pop_front().is_some() {
            self.out_pos = 0;
            self.out_completed += 1;
        } else {
            assert!(self.status_out_pending(), "no OUT packet to complete");
            self.status_acked = true;
        }
    }

    fn complete_in(&mut self) {
        self.in_packets.push(core::mem::take(&mut self.in_buffer));
    }

    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

/// Counts requested delays, in nanoseconds
#[derive(Default)]
pub struct SimDelay {
    pub elapsed_ns: u64,
}

impl embedded_hal::delay::DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}
