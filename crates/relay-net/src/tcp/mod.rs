mod connector;
mod stream;
mod transport;

pub use connector::{PollEvent, RelayConnector, SendBehavior};
pub use stream::ConnState;
pub use transport::{AnyListener, AnyStream};

/// Single registration token used for every connection; listeners and
/// outbound/inbound streams each get their own `mio::Token` at the
/// `ConnectionManager` layer, but they all register the same interest set.
pub(crate) const STREAM: mio::Interest = mio::Interest::READABLE;
