use log::*;

use super::{
    charset::to_latin9,
    throttle::Staging,
    };

/// longest response line kept, longer lines are truncated but keep their terminator
pub const LINE_SIZE: usize = 1024;

/// role of a response line in the mpd protocol
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineKind {
    Data,
    /// successful end of response
    Ok,
    /// error, also ends the response
    Ack,
}
impl LineKind {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Ack)
    }
}

pub fn classify(line: &[u8]) -> LineKind {
    if line.starts_with(b"OK")
        {LineKind::Ok}
    else if line.starts_with(b"ACK")
        {LineKind::Ack}
    else
        {LineKind::Data}
}


/// accumulates mpd output until a line is complete
#[derive(Debug, Default)]
pub struct LineBuffer {
    line: heapless::Vec<u8, LINE_SIZE>,
    truncated: bool,
}

impl LineBuffer {
    pub fn new() -> Self {Self::default()}

    /// add a byte, returns true when it completes the line
    pub fn push(&mut self, byte: u8) -> bool {
        if byte == b'\n' {
            // room for the terminator is always kept
            let _ = self.line.push(byte);
            return true;
        }
        if self.line.len() < LINE_SIZE - 1 {
            let _ = self.line.push(byte);
        }
        else if !self.truncated {
            warn!("mpd line longer than {} bytes, truncating", LINE_SIZE);
            self.truncated = true;
        }
        false
    }
    /// bytes received since the last complete line
    pub fn line(&self) -> &[u8] {&self.line}
    /// take the line out, the buffer starts over
    pub fn take(&mut self) -> heapless::Vec<u8, LINE_SIZE> {
        self.truncated = false;
        core::mem::take(&mut self.line)
    }
    pub fn clear(&mut self) {
        self.line.clear();
        self.truncated = false;
    }
}


/// selection of the response lines worth sending over the slow link
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    /// only playlists and the end of response, the remote has no use for the rest of a listing
    Playlists,
}
impl Filter {
    /// filter to apply to the response of the given command
    pub fn for_command(command: &[u8]) -> Self {
        if command.starts_with(b"lsinfo\n")
            {Self::Playlists}
        else
            {Self::All}
    }
    pub fn passes(self, line: &[u8]) -> bool {
        match self {
            Self::All => true,
            Self::Playlists => line.starts_with(b"playlist:") || classify(line).is_terminal(),
        }
    }
}


/**
    convert a complete response line and stage it for the adapter

    returns true if the line ends the response, EOT is then staged right after it
*/
pub fn relay_line(line: &[u8], filter: Filter, staging: &mut Staging) -> bool {
    let converted = to_latin9(line);
    if filter.passes(&converted) {
        staging.push_text(&converted);
    }
    if classify(&converted).is_terminal() {
        staging.push_eot();
        true
    }
    else {false}
}
