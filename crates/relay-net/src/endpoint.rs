use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use thiserror::Error;

/// One parsed entry of an endpoint list (spec §3 "Endpoint"/"endpoint
/// list"). `relay-wire::parse_endpoint_list` does the comma-split/trim;
/// this resolves a single trimmed entry's scheme into something the
/// transport can bind/connect to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayEndpoint {
    Tcp(SocketAddr),
    /// Unix domain socket path (`ipc://`).
    Unix(PathBuf),
    /// Routed to the in-process `relay-comm::InprocHub` rather than a kernel
    /// socket.
    Inproc(String),
}

#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("endpoint {0:?} has no recognized scheme (expected tcp://, ipc://, inproc://)")]
    UnknownScheme(String),
    #[error("couldn't resolve tcp address in {0:?}: {1}")]
    BadTcpAddr(String, std::io::Error),
    #[error("tcp endpoint {0:?} resolved to no addresses")]
    NoTcpAddr(String),
}

impl RelayEndpoint {
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        if let Some(rest) = raw.strip_prefix("tcp://") {
            let addr = rest
                .to_socket_addrs()
                .map_err(|e| EndpointError::BadTcpAddr(raw.to_owned(), e))?
                .next()
                .ok_or_else(|| EndpointError::NoTcpAddr(raw.to_owned()))?;
            return Ok(Self::Tcp(addr));
        }
        if let Some(rest) = raw.strip_prefix("ipc://") {
            return Ok(Self::Unix(PathBuf::from(rest)));
        }
        if let Some(rest) = raw.strip_prefix("inproc://") {
            return Ok(Self::Inproc(rest.to_owned()));
        }
        Err(EndpointError::UnknownScheme(raw.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp() {
        let ep = RelayEndpoint::parse("tcp://127.0.0.1:5555").unwrap();
        assert_eq!(ep, RelayEndpoint::Tcp("127.0.0.1:5555".parse().unwrap()));
    }

    #[test]
    fn parses_ipc() {
        let ep = RelayEndpoint::parse("ipc:///tmp/relay.sock").unwrap();
        assert_eq!(ep, RelayEndpoint::Unix(PathBuf::from("/tmp/relay.sock")));
    }

    #[test]
    fn parses_inproc() {
        let ep = RelayEndpoint::parse("inproc://fan-in").unwrap();
        assert_eq!(ep, RelayEndpoint::Inproc("fan-in".to_owned()));
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(matches!(RelayEndpoint::parse("udp://x"), Err(EndpointError::UnknownScheme(_))));
    }
}
