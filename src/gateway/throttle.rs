use std::vec::Vec;
use log::*;

use crate::control::{EOT, ETX, ACK, is_control};


/**
    response bytes waiting to be sent to the adapter

    Text is appended by the relay, the [Throttle] consumes from the front. Control bytes never enter except for the EOT ending a response.
*/
#[derive(Debug, Default)]
pub struct Staging {
    buffer: Vec<u8>,
    /// bytes of `buffer` already sent
    start: usize,
}

impl Staging {
    pub fn new() -> Self {Self::default()}

    /// append response text, control bytes are filtered out
    pub fn push_text(&mut self, text: &[u8]) {
        self.buffer.extend(text.iter().copied().filter(|&byte| !is_control(byte)));
    }
    /// append the end of the response
    pub fn push_eot(&mut self) {
        self.buffer.push(EOT);
    }
    /// bytes not sent yet
    pub fn pending(&self) -> &[u8] {&self.buffer[self.start ..]}
    pub fn len(&self) -> usize {self.buffer.len() - self.start}
    pub fn is_empty(&self) -> bool {self.len() == 0}

    /// mark the first `size` pending bytes as sent
    fn consume(&mut self, size: usize) {
        self.start = (self.start + size).min(self.buffer.len());
        if self.start == self.buffer.len() {
            self.buffer.clear();
            self.start = 0;
        }
    }
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.start = 0;
    }
}


/**
    paces the bytes sent to the adapter

    After `chunk` bytes it appends ETX and holds back until the adapter answers. The answer is normally ACK, but any byte from the adapter releases the throttle so a lost acknowledge cannot stall the response.
*/
#[derive(Debug)]
pub struct Throttle {
    chunk: usize,
    /// bytes sent since the last pause
    sent: usize,
    waiting: bool,
}

impl Throttle {
    pub fn new(chunk: usize) -> Self {
        Self {chunk: chunk.max(1), sent: 0, waiting: false}
    }
    pub fn is_waiting(&self) -> bool {self.waiting}
    /// a call to [Self::transmit] would produce bytes
    pub fn ready(&self, staging: &Staging) -> bool {
        !self.waiting && !staging.is_empty()
    }

    /**
        move the next allowed bytes from `staging` to `frame`, followed by ETX when the chunk is full

        `frame` is left empty when waiting or when nothing is staged, so calling it repeatedly is harmless
    */
    pub fn transmit(&mut self, staging: &mut Staging, frame: &mut Vec<u8>) {
        frame.clear();
        if self.waiting
            {return}
        let size = staging.len().min(self.chunk - self.sent);
        if size == 0
            {return}
        frame.extend_from_slice(&staging.pending()[.. size]);
        staging.consume(size);
        self.sent += size;
        if self.sent >= self.chunk {
            frame.push(ETX);
            self.sent = 0;
            self.waiting = true;
            trace!("waiting for acknowledge");
        }
    }

    /// a byte arrived from the adapter
    pub fn received(&mut self, byte: u8) {
        if !self.waiting
            {return}
        if byte != ACK {
            debug!("got {:#04x} instead of acknowledge, resuming", byte);
        }
        self.waiting = false;
    }

    pub fn reset(&mut self) {
        self.sent = 0;
        self.waiting = false;
    }
}
