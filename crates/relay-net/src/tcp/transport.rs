use std::io;

use mio::{Registry, Token, event::Event};

use crate::endpoint::RelayEndpoint;
use crate::tcp::STREAM;
use crate::tcp::stream::{ConnState, FramedStream};

/// A bound listener for either transport kind relay-net supports over a
/// kernel socket (`tcp://`, `ipc://`). `inproc://` endpoints never reach
/// here — `ConnectionManager::listen_at`/`maybe_reconnect` route those to
/// `relay_comm::global_inproc_hub()` before `AnyListener`/`AnyStream` are
/// even considered.
pub enum AnyListener {
    Tcp(mio::net::TcpListener),
    Unix(mio::net::UnixListener),
}

impl AnyListener {
    pub fn bind(registry: &Registry, token: Token, addr: &RelayEndpoint) -> io::Result<Self> {
        let mut listener = match addr {
            RelayEndpoint::Tcp(addr) => AnyListener::Tcp(mio::net::TcpListener::bind(*addr)?),
            RelayEndpoint::Unix(path) => {
                let _ = std::fs::remove_file(path);
                AnyListener::Unix(mio::net::UnixListener::bind(path)?)
            }
            RelayEndpoint::Inproc(_) => {
                return Err(io::Error::other("inproc endpoints are not bound through AnyListener"));
            }
        };
        listener.register(registry, token)?;
        Ok(listener)
    }

    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        match self {
            AnyListener::Tcp(l) => registry.register(l, token, STREAM),
            AnyListener::Unix(l) => registry.register(l, token, STREAM),
        }
    }

    pub fn deregister(&mut self, registry: &Registry) {
        let _ = match self {
            AnyListener::Tcp(l) => registry.deregister(l),
            AnyListener::Unix(l) => registry.deregister(l),
        };
    }

    /// Accepts one pending connection, returning the framed stream and a
    /// display-able peer identifier (socket addr, or the unix path for
    /// `ipc://` which has no meaningful peer addr).
    pub fn accept(&self) -> io::Result<(AnyStream, String)> {
        match self {
            AnyListener::Tcp(l) => {
                let (stream, addr) = l.accept()?;
                stream.set_nodelay(true)?;
                Ok((AnyStream::Tcp(FramedStream::new(stream)), addr.to_string()))
            }
            AnyListener::Unix(l) => {
                let (stream, _addr) = l.accept()?;
                Ok((AnyStream::Unix(FramedStream::new(stream)), "ipc-peer".to_owned()))
            }
        }
    }
}

/// A connected stream for either transport kind, dispatching to the
/// generic [`FramedStream`] framing state machine.
pub enum AnyStream {
    Tcp(FramedStream<mio::net::TcpStream>),
    Unix(FramedStream<mio::net::UnixStream>),
}

impl AnyStream {
    pub fn connect(registry: &Registry, token: Token, endpoint: &RelayEndpoint) -> io::Result<Self> {
        let mut stream = match endpoint {
            RelayEndpoint::Tcp(addr) => {
                let stream = mio::net::TcpStream::connect(*addr)?;
                stream.set_nodelay(true)?;
                AnyStream::Tcp(FramedStream::new(stream))
            }
            RelayEndpoint::Unix(path) => {
                AnyStream::Unix(FramedStream::new(mio::net::UnixStream::connect(path)?))
            }
            RelayEndpoint::Inproc(_) => {
                return Err(io::Error::other("inproc endpoints are not connected through AnyStream"));
            }
        };
        stream.register(registry, token)?;
        Ok(stream)
    }

    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        match self {
            AnyStream::Tcp(s) => s.register(registry, token),
            AnyStream::Unix(s) => s.register(registry, token),
        }
    }

    pub fn poll_with<F>(&mut self, registry: &Registry, token: Token, ev: &Event, on_frame: &mut F) -> ConnState
    where
        F: for<'a> FnMut(&'a [u8], bool),
    {
        match self {
            AnyStream::Tcp(s) => s.poll_with(registry, token, ev, on_frame),
            AnyStream::Unix(s) => s.poll_with(registry, token, ev, on_frame),
        }
    }

    pub fn write_or_enqueue(&mut self, registry: &Registry, token: Token, payload: &[u8], more: bool) -> ConnState {
        match self {
            AnyStream::Tcp(s) => s.write_or_enqueue(registry, token, payload, more),
            AnyStream::Unix(s) => s.write_or_enqueue(registry, token, payload, more),
        }
    }

    pub fn close(&mut self, registry: &Registry) {
        match self {
            AnyStream::Tcp(s) => s.close(registry),
            AnyStream::Unix(s) => s.close(registry),
        }
    }
}

/// Re-exported for listener bookkeeping that wants a peer address display
/// without caring which transport produced it.
pub fn describe(endpoint: &RelayEndpoint) -> String {
    match endpoint {
        RelayEndpoint::Tcp(addr) => addr.to_string(),
        RelayEndpoint::Unix(path) => path.display().to_string(),
        RelayEndpoint::Inproc(name) => format!("inproc://{name}"),
    }
}
