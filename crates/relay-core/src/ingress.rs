use std::sync::mpsc::Receiver;
use std::time::Duration;

use mio::Token;
use relay_net::{PollEvent, RelayConnector, RelayEndpoint};

/// The pull side of a relay pipeline. Either a real network listener/dialer
/// set (bound or connect-multi) or the receiving end of an in-process
/// fan-in channel feeding a worker pool (spec §4.5's "inproc fan-in").
pub enum Ingress {
    Network(RelayConnector),
    Inproc(Receiver<(Vec<u8>, bool)>),
}

/// A fabricated token used to tag every frame pulled off an inproc channel,
/// since that channel carries a single ordered stream rather than one per
/// peer connection.
const INPROC_TOKEN: Token = Token(usize::MAX);

impl Ingress {
    pub fn bind(endpoint: &RelayEndpoint) -> std::io::Result<Self> {
        let mut connector = RelayConnector::new()?;
        connector.listen_at(endpoint)?;
        Ok(Self::Network(connector))
    }

    pub fn connect_multi(endpoints: &[RelayEndpoint]) -> std::io::Result<Self> {
        let mut connector = RelayConnector::new()?;
        for endpoint in endpoints {
            connector.connect(endpoint.clone());
        }
        Ok(Self::Network(connector))
    }

    pub fn inproc(rx: Receiver<(Vec<u8>, bool)>) -> Self {
        Self::Inproc(rx)
    }

    /// Pulls whatever is available within `timeout`, invoking `on_frame`
    /// for each message frame. Mirrors `RelayConnector::poll_with`'s
    /// one-tick-at-a-time shape so callers can drive both ingress flavors
    /// identically from the relay loop.
    pub fn poll(&mut self, timeout: Option<Duration>, mut on_frame: impl FnMut(Token, &[u8], bool)) {
        match self {
            Ingress::Network(connector) => {
                connector.poll_with(timeout, |ev| {
                    if let PollEvent::Message { token, payload, more } = ev {
                        on_frame(token, payload, more);
                    }
                });
            }
            Ingress::Inproc(rx) => {
                if let Ok((payload, more)) = rx.recv_timeout(timeout.unwrap_or(Duration::from_millis(500))) {
                    on_frame(INPROC_TOKEN, &payload, more);
                }
            }
        }
    }
}
