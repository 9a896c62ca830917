use embedded_io_async::Write;
use log::*;

use crate::{
    control::{EOT, ETX, ACK},
    radio::{Radio, Transceiver, MarcState},
    };


/// how the receiver learns about incoming packets
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RxStrategy {
    /// watch the RX FIFO occupancy and drain packets incrementally
    #[default]
    Polling,
    /// wait for the packet received pin, then read the whole packet at once
    Interrupt,
}

/// forwards received packets to the serial tether
#[derive(Debug, Default)]
pub struct Receiver {
    strategy: RxStrategy,
    /// payload bytes announced by the current packet header and not read yet, `None` when no packet is in progress
    remaining: Option<usize>,
}

impl Receiver {
    pub const fn new(strategy: RxStrategy) -> Self {
        Self {strategy, remaining: None}
    }
    pub fn remaining(&self) -> Option<usize> {self.remaining}
    /// forget the packet in progress, the chip FIFO is flushed by the caller
    pub fn reset(&mut self) {self.remaining = None}

    /// do a bounded amount of reception work
    pub async fn poll<T: Transceiver, S: Write>(&mut self, radio: &mut Radio<T>, serial: &mut S) -> Result<(), S::Error> {
        match self.strategy {
            RxStrategy::Polling => self.poll_fifo(radio, serial).await,
            RxStrategy::Interrupt => self.poll_pin(radio, serial).await,
        }
    }

    async fn poll_fifo<T: Transceiver, S: Write>(&mut self, radio: &mut Radio<T>, serial: &mut S) -> Result<(), S::Error> {
        match self.remaining {
            None => {
                // length and address must both be there
                if radio.rx_bytes().bytes().value() > 2 {
                    let header = radio.read_header();
                    debug!("receiving packet of {} bytes", header.payload());
                    self.remaining = Some(header.payload());
                }
            },
            Some(remaining) => {
                if radio.marc_state() == MarcState::Idle {
                    // reception ended, even if short: drain what was announced
                    for _ in 0 .. remaining {
                        if forward(radio.read_fifo(), serial).await?
                            {break}
                    }
                    self.finish(radio);
                }
                // never empty the FIFO before the packet is complete (errata)
                else if remaining > 0 && radio.rx_bytes().bytes().value() > 1 {
                    self.remaining = Some(remaining - 1);
                    if forward(radio.read_fifo(), serial).await?
                        {self.finish(radio)}
                }
            },
        }
        Ok(())
    }

    async fn poll_pin<T: Transceiver, S: Write>(&mut self, radio: &mut Radio<T>, serial: &mut S) -> Result<(), S::Error> {
        if !radio.packet_received()
            {return Ok(())}
        let header = radio.read_header();
        debug!("received packet of {} bytes", header.payload());
        for _ in 0 .. header.payload() {
            if forward(radio.read_fifo(), serial).await?
                {break}
        }
        self.finish(radio);
        Ok(())
    }

    /// re-arm reception, this also flushes the status bytes appended to the packet
    fn finish<T: Transceiver>(&mut self, radio: &mut Radio<T>) {
        self.remaining = None;
        radio.start_rx();
    }
}

/// send a received byte to the host, returns true if it ends the message
async fn forward<S: Write>(byte: u8, serial: &mut S) -> Result<bool, S::Error> {
    match byte {
        ETX | ACK => Ok(false),
        EOT => {
            serial.write_all(&[EOT]).await?;
            Ok(true)
        },
        _ => {
            serial.write_all(&[byte]).await?;
            Ok(false)
        },
    }
}
