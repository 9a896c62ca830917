/*!
    radio side of the link, running on the adapter microcontroller

    The adapter sits between the host (serial tether) and the remote control (half duplex radio). It is one cooperative loop: [Adapter::poll] runs each task once and every task returns after a bounded amount of work, so none of them starves the others.

    - acknowledge the host when it paused and there is room in the queue
    - receive radio packets and forward them to the host, while the radio is receiving
    - re-enter reception once a transmission is over
    - frame queued bytes into radio packets and send them, while the radio is not transmitting

    The queue is filled by the serial interrupt through a [SharedQueue], see [crate::shared].
*/

/// framing of the queue content into packets
mod transmit;
/// forwarding of received packets
mod receive;

pub use transmit::{Transmitter, TxState};
pub use receive::{Receiver, RxStrategy};

use core::convert::Infallible;
use embedded_io_async::Write;
use log::*;

use crate::{
    control::ACK,
    radio::{Radio, Transceiver},
    shared::SharedQueue,
    };


/// current direction of the half duplex radio
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RadioMode {
    Idle,
    Rx,
    Tx,
}

/// hardware watchdog, resetting the chip if not fed in time
pub trait Watchdog {
    fn feed(&mut self);
}
/// no watchdog
impl Watchdog for () {
    fn feed(&mut self) {}
}


pub struct Adapter<'q, T, S, W = ()> {
    radio: Radio<T>,
    /// serial tether to the host
    serial: S,
    watchdog: W,
    /// bytes from the host, filled by the serial interrupt
    queue: &'q SharedQueue,
    mode: RadioMode,
    transmitter: Transmitter,
    receiver: Receiver,
}

impl<'q, T: Transceiver, S: Write, W: Watchdog> Adapter<'q, T, S, W> {
    pub fn new(chip: T, serial: S, watchdog: W, queue: &'q SharedQueue, strategy: RxStrategy) -> Self {
        Self {
            radio: Radio::new(chip),
            serial,
            watchdog,
            queue,
            mode: RadioMode::Idle,
            transmitter: Transmitter::new(),
            receiver: Receiver::new(strategy),
        }
    }
    pub fn mode(&self) -> RadioMode {self.mode}
    pub fn radio(&mut self) -> &mut Radio<T> {&mut self.radio}
    pub fn serial(&mut self) -> &mut S {&mut self.serial}

    /// empty the queue and start listening
    pub fn start(&mut self) {
        self.queue.with(|queue| queue.reset());
        self.transmitter = Transmitter::new();
        self.receiver.reset();
        self.radio.start_rx();
        self.mode = RadioMode::Rx;
        info!("adapter listening");
    }

    /// run every task once
    pub async fn poll(&mut self) -> Result<(), S::Error> {
        self.watchdog.feed();
        self.acknowledge().await?;

        if self.mode == RadioMode::Rx {
            self.receiver.poll(&mut self.radio, &mut self.serial).await?;
        }
        else {
            self.reenter_rx();
        }

        if self.mode != RadioMode::Tx
        && self.transmitter.step(&mut self.radio, self.queue) {
            // switching to TX dropped whatever was being received
            self.receiver.reset();
            self.mode = RadioMode::Tx;
        }
        Ok(())
    }

    /**
        main loop of the adapter

        it only returns if the serial tether fails, a stuck loop is caught by the watchdog
    */
    pub async fn run(&mut self) -> Result<Infallible, S::Error> {
        self.start();
        loop {
            self.poll().await?;
        }
    }

    /// let the host send its next chunk if it is waiting and there is room
    async fn acknowledge(&mut self) -> Result<(), S::Error> {
        if self.queue.with(|queue| queue.acknowledge()) {
            self.serial.write_all(&[ACK]).await?;
        }
        Ok(())
    }

    fn reenter_rx(&mut self) {
        if self.mode == RadioMode::Tx && self.radio.tx_finished() {
            self.radio.start_rx();
            self.mode = RadioMode::Rx;
        }
    }
}
