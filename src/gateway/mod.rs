/*!
    host side of the link: relay commands from the serial tether to mpd and stream the responses back

    The central resource is the [Gateway] struct which owns the serial tether and the mpd connection and runs the command/response cycles.

    The tether is slow and its far end has a tiny buffer, so responses are paced by a [Throttle]: chunks of [CHUNK](crate::control::CHUNK) bytes each followed by [ETX](crate::control::ETX), the next chunk waits for [ACK](crate::control::ACK).

    The mpd protocol is treated as an opaque line oriented stream, the only thing interpreted is the first word of response lines: a line starting with `OK` or `ACK` ends the response.
*/

/// the gateway loop: await a command, send it to mpd, relay and drain the response
mod networking;
/// accumulation of commands from the serial tether
mod input;
/// mpd response lines and their filtering
mod response;
/// pacing of the bytes sent to the adapter
mod throttle;
/// conversion of mpd's utf-8 to the single byte charset of the remote
mod charset;
/// external collaborators: mpd connection and adapter reset
mod connection;

pub use networking::Gateway;
pub use input::{SerialInput, Command, COMMAND_SIZE};
pub use response::{LineBuffer, LineKind, Filter, classify, relay_line, LINE_SIZE};
pub use throttle::{Staging, Throttle};
pub use charset::{to_latin9, PLACEHOLDER};
pub use connection::{Connector, TcpConnector, AdapterReset};

use std::{
    path::Path,
    time::Duration,
    };
use serial2_tokio::{SerialPort, CharSize, StopBits, Parity, FlowControl};
use thiserror::Error;

use crate::control::CHUNK;


/// error regarding the gateway
#[derive(Error, Debug)]
pub enum Error {
    #[error("problem with serial tether")]
    Serial(std::io::Error),
    #[error("serial tether closed")]
    SerialClosed,
    #[error("problem with mpd connection")]
    Mpd(std::io::Error),
    #[error("unexpected greeting from mpd: {0:?}")]
    Greeting(String),
    #[error("no data arrived in expected time")]
    Timeout,
    #[error("a newer command arrived")]
    Preempted,
}
impl Error {
    /// errors of the serial tether end the gateway, all others only drop the current command
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Serial(_) | Self::SerialClosed)
    }
}


/// timings and sizes of the gateway
#[derive(Clone, Debug)]
pub struct Config {
    /// silence on both sides after which the remote is considered gone
    pub idle_timeout: Duration,
    /// silence allowed while connecting to mpd and waiting for its greeting
    pub greeting_timeout: Duration,
    /// period of the warnings about a late response, the response is still relayed
    pub stale_after: Duration,
    /// consecutive idle timeouts before the first adapter reset, doubled after each reset
    pub reset_after: u32,
    /// bytes sent to the adapter before waiting for an acknowledge
    pub chunk: usize,
    /// staged bytes above which mpd is not read anymore until the adapter catches up
    pub staging_limit: usize,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(61),
            greeting_timeout: Duration::from_secs(1),
            stale_after: Duration::from_secs(10),
            reset_after: 1,
            chunk: CHUNK,
            staging_limit: 4096,
        }
    }
}


/// open the serial tether with the given baud rate, 8 bits, no parity, software flow control
pub fn open_serial(path: impl AsRef<Path>, rate: u32) -> Result<SerialPort, std::io::Error> {
    SerialPort::open(path, |mut settings: serial2_tokio::Settings| {
        settings.set_raw();
        settings.set_baud_rate(rate)?;
        settings.set_char_size(CharSize::Bits8);
        settings.set_stop_bits(StopBits::One);
        settings.set_parity(Parity::None);
        settings.set_flow_control(FlowControl::XonXoff);
        Ok(settings)
    })
}
