use log::*;

use crate::control::{EOT, ETX, ACK};

/// longest command accepted from the remote, bytes beyond are dropped
pub const COMMAND_SIZE: usize = 1024;

/// a complete command from the remote, EOT excluded
pub type Command = heapless::Vec<u8, COMMAND_SIZE>;

/**
    accumulates the bytes received from the serial tether into commands

    A command is complete when EOT arrives. A complete command not yet taken is replaced by the next one, the newest command always wins.
*/
#[derive(Debug, Default)]
pub struct SerialInput {
    pending: Command,
    complete: Option<Command>,
}

impl SerialInput {
    pub fn new() -> Self {Self::default()}

    /// process one byte from the serial tether
    pub fn push(&mut self, byte: u8) {
        match byte {
            EOT => {
                let command = core::mem::take(&mut self.pending);
                if self.complete.replace(command).is_some() {
                    warn!("command superseded before being sent");
                }
            },
            // flow control, never part of a command
            ETX | ACK => {},
            _ => if self.pending.push(byte).is_err() {
                warn!("command longer than {} bytes, dropping {:#04x}", COMMAND_SIZE, byte);
            },
        }
    }
    /// a complete command is waiting
    pub fn is_complete(&self) -> bool {self.complete.is_some()}
    /// hand the complete command over, the accumulation goes on
    pub fn take(&mut self) -> Option<Command> {self.complete.take()}
    /// bytes of the command being received
    pub fn pending(&self) -> &[u8] {&self.pending}
    /// forget everything received so far
    pub fn reset(&mut self) {
        self.pending.clear();
        self.complete = None;
    }
}
