use log::*;

use crate::{
    control::EOT,
    queue::ByteQueue,
    radio::{Radio, Transceiver, PacketHeader, MAX_PAYLOAD},
    shared::Shared,
    };


/// progress of the packet being handed to the chip
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum TxState {
    /// nothing framed yet
    #[default]
    Idle,
    /// header written, payload bytes still to move to the TX FIFO
    Copying {
        remaining: u8,
        /// append EOT after the payload, this is the last packet of the message
        terminate: bool,
    },
    /// packet complete in the FIFO, waiting for the transmit strobe
    Sending,
}

/**
    moves queued bytes into radio packets, one byte per call

    A packet is framed when the message is complete (the host sent EOT) or when a full [MAX_PAYLOAD] is queued. Long messages are thus fragmented, only their last packet carries EOT.
*/
#[derive(Debug, Default)]
pub struct Transmitter {
    state: TxState,
}

impl Transmitter {
    pub const fn new() -> Self {
        Self {state: TxState::Idle}
    }
    pub fn state(&self) -> TxState {self.state}

    /// run one step of the state machine, returns true when a packet was handed to the chip
    pub fn step<T: Transceiver, const N: usize>(&mut self, radio: &mut Radio<T>, queue: &Shared<ByteQueue<N>>) -> bool {
        match self.state {
            TxState::Idle => {
                let framed = queue.with(|queue| {
                    let queued = queue.len();
                    if queue.is_complete() && queued < MAX_PAYLOAD {
                        if queue.dropped() > 0 {
                            warn!("message lost {} bytes to queue overflow", queue.dropped());
                        }
                        queue.clear_complete();
                        Some((queued, true))
                    }
                    else if queued >= MAX_PAYLOAD || queue.is_complete() {
                        Some((queued.min(MAX_PAYLOAD), false))
                    }
                    else {None}
                });
                if let Some((payload, terminate)) = framed {
                    debug!("framing packet of {} bytes, last: {}", payload, terminate);
                    radio.write_header(PacketHeader::new(payload + usize::from(terminate)));
                    self.state = TxState::Copying {remaining: payload as u8, terminate};
                }
                false
            },
            TxState::Copying {remaining, terminate} => {
                if remaining > 0 {
                    // the count was taken under the same lock and only this consumer dequeues
                    let byte = queue.with(|queue| queue.dequeue()).unwrap_or_default();
                    radio.write_fifo(byte);
                    self.state = TxState::Copying {remaining: remaining - 1, terminate};
                }
                else {
                    if terminate
                        {radio.write_fifo(EOT)}
                    self.state = TxState::Sending;
                }
                false
            },
            TxState::Sending => {
                radio.start_tx();
                self.state = TxState::Idle;
                true
            },
        }
    }
}
