use core::convert::Infallible;
use std::{
    io,
    string::String,
    vec::Vec,
    };
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt},
    time::{timeout, sleep_until, Instant},
    };
use log::*;

use super::{
    Config, Error,
    input::{SerialInput, Command},
    response::{LineBuffer, Filter, classify, relay_line, LineKind},
    throttle::{Staging, Throttle},
    connection::{Connector, AdapterReset},
    };


/// what woke the gateway up
enum Wake {
    /// bytes from the adapter, already processed
    Serial,
    /// bytes from mpd, in the caller's buffer
    Mpd(usize),
    /// mpd closed or broke the connection
    Disconnected,
    /// nothing happened but the throttle can send
    Ready,
}

/**
    relays commands from the serial tether to mpd and their responses back

    It runs the following cycle forever:

    1. wait for a complete command from the adapter, resetting the adapter when the remote stays silent
    2. connect to mpd if needed, send the command
    3. relay the response lines to the adapter until the end of response, paced by the [Throttle]
    4. finish sending what is staged

    A newer command arriving during steps 2 to 4 abandons the cycle in favor of the new one. Problems with mpd only drop the current command, problems with the serial tether end [Self::run].
*/
pub struct Gateway<S, C: Connector, R = ()> {
    serial: S,
    connector: C,
    reset: R,
    config: Config,
    mpd: Option<C::Stream>,
    input: SerialInput,
    line: LineBuffer,
    staging: Staging,
    throttle: Throttle,
    /// bytes being written to the adapter
    frame: Vec<u8>,
    /// consecutive idle timeouts
    silences: u32,
    /// idle timeouts tolerated before the next adapter reset
    silence_limit: u32,
}

impl<S, C, R> Gateway<S, C, R>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Connector,
    R: AdapterReset,
{
    pub fn new(serial: S, connector: C, reset: R, config: Config) -> Self {
        Self {
            serial,
            connector,
            reset,
            throttle: Throttle::new(config.chunk),
            silence_limit: config.reset_after.max(1),
            config,
            mpd: None,
            input: SerialInput::new(),
            line: LineBuffer::new(),
            staging: Staging::new(),
            frame: Vec::new(),
            silences: 0,
        }
    }
    pub fn config(&self) -> &Config {&self.config}
    /// a mpd connection is currently open
    pub fn is_connected(&self) -> bool {self.mpd.is_some()}

    /// relay forever, only returns when the serial tether fails
    pub async fn run(&mut self) -> Result<Infallible, Error> {
        info!("gateway started");
        loop {
            self.cycle().await?;
        }
    }

    /// run one command/response cycle
    pub async fn cycle(&mut self) -> Result<(), Error> {
        let command = self.await_command().await?;
        if command.is_empty() {
            debug!("empty command, nothing to send");
            return Ok(());
        }
        info!("command: {}", String::from_utf8_lossy(&command).trim_end());

        match self.dispatch(&command).await {
            Ok(()) => {},
            Err(error) if error.is_fatal() => return Err(error),
            Err(error) => {
                warn!("command dropped: {}", error);
                return Ok(());
            },
        }
        self.staging.reset();
        self.throttle.reset();
        self.line.clear();

        if self.relay(Filter::for_command(&command)).await? {
            self.drain().await?;
        }
        self.staging.reset();
        Ok(())
    }

    /// wait for a command from the adapter, mpd output arriving meanwhile is discarded
    async fn await_command(&mut self) -> Result<Command, Error> {
        let mut buffer = [0; 256];
        loop {
            if let Some(command) = self.input.take() {
                self.silences = 0;
                self.silence_limit = self.config.reset_after.max(1);
                return Ok(command);
            }
            match timeout(self.config.idle_timeout, self.wait(&mut buffer, true, false)).await {
                Ok(Ok(Wake::Mpd(size))) => debug!("discarding {} belated bytes from mpd", size),
                Ok(result) => {result?;},
                Err(_) => self.silence().await,
            }
        }
    }

    /// the remote has been silent for an idle period
    async fn silence(&mut self) {
        warn!("no command for {:?}", self.config.idle_timeout);
        self.input.reset();
        self.silences += 1;
        if self.silences >= self.silence_limit {
            warn!("resetting adapter after {} silent periods", self.silences);
            if let Err(error) = self.reset.reset().await {
                error!("adapter reset failed: {}", error);
            }
            self.silences = 0;
            self.silence_limit = self.silence_limit.saturating_mul(2);
        }
    }

    /// send a command to mpd, connecting first if needed
    async fn dispatch(&mut self, command: &[u8]) -> Result<(), Error> {
        if self.mpd.is_none() {
            self.connect().await?;
        }
        let Some(mpd) = self.mpd.as_mut()
            else {return Err(Error::Mpd(io::ErrorKind::NotConnected.into()))};
        let written = async {
            mpd.write_all(command).await?;
            mpd.flush().await
        }.await;
        if let Err(error) = written {
            self.mpd = None;
            return Err(Error::Mpd(error));
        }
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), Error> {
        let stream = timeout(self.config.greeting_timeout, self.connector.connect()).await
            .map_err(|_| Error::Timeout)?
            .map_err(Error::Mpd)?;
        self.mpd = Some(stream);
        self.line.clear();
        if let Err(error) = self.greeting().await {
            self.mpd = None;
            return Err(error);
        }
        Ok(())
    }

    /// wait for mpd to introduce itself, each byte restarts the timeout
    async fn greeting(&mut self) -> Result<(), Error> {
        let mut buffer = [0; 256];
        loop {
            let wake = timeout(self.config.greeting_timeout, self.wait(&mut buffer, true, false)).await
                .map_err(|_| Error::Timeout)??;
            if self.input.is_complete()
                {return Err(Error::Preempted)}
            match wake {
                Wake::Mpd(size) => for &byte in &buffer[.. size] {
                    if self.line.push(byte) {
                        let line = self.line.take();
                        let text: String = String::from_utf8_lossy(&line).trim_end().into();
                        return if classify(&line) == LineKind::Ok {
                            info!("connected to {}", text);
                            Ok(())
                        }
                        else {Err(Error::Greeting(text))};
                    }
                },
                Wake::Disconnected => return Err(Error::Mpd(io::ErrorKind::UnexpectedEof.into())),
                Wake::Serial | Wake::Ready => {},
            }
        }
    }

    /**
        relay the response to the adapter until its end

        returns true when the response is complete, false when it was abandoned because a newer command arrived or mpd went away
    */
    async fn relay(&mut self, filter: Filter) -> Result<bool, Error> {
        let mut buffer = [0; 256];
        let started = Instant::now();
        let mut stale = started + self.config.stale_after;
        loop {
            if self.input.is_complete() {
                // the rest of the response would come before the next one
                warn!("newer command, abandoning response and connection");
                self.mpd = None;
                return Ok(false);
            }
            self.transmit().await?;
            if self.mpd.is_none() {
                warn!("mpd went away during response");
                return Ok(false);
            }
            // stop reading when the adapter does not keep up
            let read_mpd = self.staging.len() < self.config.staging_limit;
            let ready = self.throttle.ready(&self.staging);
            let wake = tokio::select! {
                biased;
                wake = self.wait(&mut buffer, read_mpd, ready) => wake?,
                _ = sleep_until(stale) => {
                    warn!("no end of response after {:?}", started.elapsed());
                    stale += self.config.stale_after;
                    continue;
                },
            };
            if let Wake::Mpd(size) = wake {
                for &byte in &buffer[.. size] {
                    if !self.line.push(byte)
                        {continue}
                    let line = self.line.take();
                    debug!("mpd: {}", String::from_utf8_lossy(&line).trim_end());
                    if relay_line(&line, filter, &mut self.staging) {
                        // whatever follows the end of response is belated output
                        self.line.clear();
                        return Ok(true);
                    }
                }
            }
        }
    }

    /// send what remains staged, a newer command or a long silence of the adapter cuts it short
    async fn drain(&mut self) -> Result<(), Error> {
        let mut buffer = [0; 256];
        while !self.input.is_complete() {
            self.transmit().await?;
            if self.staging.is_empty()
                {return Ok(())}
            let ready = self.throttle.ready(&self.staging);
            match timeout(self.config.idle_timeout, self.wait(&mut buffer, true, ready)).await {
                Ok(Ok(Wake::Mpd(size))) => debug!("discarding {} bytes from mpd after end of response", size),
                Ok(result) => {result?;},
                Err(_) => {
                    warn!("adapter did not acknowledge for {:?}", self.config.idle_timeout);
                    break;
                },
            }
        }
        warn!("dropping {} unsent bytes", self.staging.len());
        Ok(())
    }

    /// send the bytes the throttle allows
    async fn transmit(&mut self) -> Result<(), Error> {
        self.throttle.transmit(&mut self.staging, &mut self.frame);
        if self.frame.is_empty()
            {return Ok(())}
        trace!("sending {} bytes to adapter", self.frame.len());
        self.serial.write_all(&self.frame).await.map_err(Error::Serial)?;
        self.serial.flush().await.map_err(Error::Serial)
    }

    /**
        wait for something to happen on either side

        bytes from the adapter are processed here, bytes from mpd are left in `buffer`. `read_mpd` allows reading mpd, `ready` makes the wait return immediately when nothing else is pending
    */
    async fn wait(&mut self, buffer: &mut [u8], read_mpd: bool, ready: bool) -> Result<Wake, Error> {
        let mut serial = [0; 64];
        tokio::select! {
            biased;
            received = self.serial.read(&mut serial) => {
                let size = received.map_err(Error::Serial)?;
                if size == 0
                    {return Err(Error::SerialClosed)}
                for &byte in &serial[.. size] {
                    self.throttle.received(byte);
                    self.input.push(byte);
                }
                Ok(Wake::Serial)
            },
            received = read_optional(&mut self.mpd, buffer), if read_mpd => match received {
                Ok(0) => {
                    info!("mpd closed the connection");
                    self.mpd = None;
                    Ok(Wake::Disconnected)
                },
                Ok(size) => Ok(Wake::Mpd(size)),
                Err(error) => {
                    warn!("mpd connection failed: {}", error);
                    self.mpd = None;
                    Ok(Wake::Disconnected)
                },
            },
            _ = std::future::ready(()), if ready => Ok(Wake::Ready),
        }
    }
}

/// read from the stream if there is one, otherwise never complete
async fn read_optional<T: AsyncRead + Unpin>(stream: &mut Option<T>, buffer: &mut [u8]) -> io::Result<usize> {
    match stream {
        Some(stream) => stream.read(buffer).await,
        None => std::future::pending().await,
    }
}
