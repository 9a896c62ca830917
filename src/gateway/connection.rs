use std::{
    future::Future,
    io,
    string::String,
    };
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    };
use log::*;


/// opens connections to mpd
pub trait Connector {
    type Stream: AsyncRead + AsyncWrite + Unpin;
    fn connect(&mut self) -> impl Future<Output = io::Result<Self::Stream>>;
}

/// mpd listening on a tcp socket
#[derive(Clone, Debug)]
pub struct TcpConnector {
    pub host: String,
    pub port: u16,
}
impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {host: host.into(), port}
    }
}
impl Connector for TcpConnector {
    type Stream = TcpStream;
    async fn connect(&mut self) -> io::Result<TcpStream> {
        debug!("connecting to mpd at {}:{}", self.host, self.port);
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        // responses are small, do not wait for more
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}


/// puts the adapter back in a known state when the remote has been silent for too long
pub trait AdapterReset {
    fn reset(&mut self) -> impl Future<Output = io::Result<()>>;
}
/// no reset line wired
impl AdapterReset for () {
    async fn reset(&mut self) -> io::Result<()> {
        warn!("adapter reset requested but no reset line is wired");
        Ok(())
    }
}
