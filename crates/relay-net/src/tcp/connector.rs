use std::sync::mpsc::{Receiver, Sender, TryRecvError};

use mio::{Events, Poll, Token};
use relay_comm::{InprocMessage, global_inproc_hub};
use relay_timing::{Duration, Repeater};
use tracing::{debug, error, warn};

use crate::endpoint::RelayEndpoint;
use crate::tcp::stream::ConnState;
use crate::tcp::transport::{AnyListener, AnyStream, describe};

#[derive(Clone, Copy, Debug)]
pub enum SendBehavior {
    Broadcast,
    Single(Token),
}

enum ConnectionVariant {
    /// Connections we initiated; retried on disconnect.
    Outbound(AnyStream, RelayEndpoint),
    /// Connections accepted from one of our listeners; not retried.
    Inbound(AnyStream),
    Listener(AnyListener),
    /// `inproc://` bind: the receive end of a `relay_comm::InprocHub`
    /// registration, keyed by its endpoint name so it can be unbound on
    /// teardown. Polled by [`ConnectionManager::drain_inproc`] rather than
    /// through `mio`, since it carries no file descriptor.
    InprocListener(Receiver<InprocMessage>, String),
    /// `inproc://` connect: retried the same way `Outbound` is, since the
    /// peer endpoint may not have bound yet.
    InprocOutbound(Sender<InprocMessage>, RelayEndpoint),
}

/// Event emitted by [`RelayConnector::poll_with`] for each notable IO
/// occurrence. Feeds the Socket Monitor's CONNECTED/ACCEPTED/DISCONNECTED
/// event mask (spec §4.2) as well as the relay loop's frame intake.
pub enum PollEvent<'a> {
    /// An outbound connection (one we called [`RelayConnector::connect`] for)
    /// completed. Maps to the monitor's CONNECTED event.
    Connect { token: Token },
    /// A listener accepted a new inbound connection. Maps to ACCEPTED.
    Accept { listener: Token, stream: Token },
    /// A connection (inbound or outbound) was closed. Maps to DISCONNECTED.
    Disconnect { token: Token },
    /// A complete frame was received.
    Message { token: Token, payload: &'a [u8], more: bool },
}

struct ConnectionManager {
    poll: Poll,
    conns: Vec<(Token, ConnectionVariant)>,
    reconnector: Repeater,
    to_be_reconnected: Vec<(Token, RelayEndpoint)>,
    newly_connected: Vec<Token>,
    next_token: usize,
}

impl ConnectionManager {
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            conns: Vec::with_capacity(5),
            reconnector: Repeater::every(Duration::from_secs(2)),
            to_be_reconnected: Vec::with_capacity(10),
            newly_connected: Vec::with_capacity(10),
            next_token: 0,
        })
    }

    fn alloc_token(&mut self) -> Token {
        let t = Token(self.next_token);
        self.next_token += 1;
        t
    }

    fn disconnect_at_index(&mut self, index: usize) {
        let (token, variant) = self.conns.swap_remove(index);
        match variant {
            ConnectionVariant::Outbound(mut stream, endpoint) => {
                stream.close(self.poll.registry());
                self.to_be_reconnected.push((token, endpoint));
            }
            ConnectionVariant::Inbound(mut stream) => stream.close(self.poll.registry()),
            ConnectionVariant::Listener(mut listener) => listener.deregister(self.poll.registry()),
            ConnectionVariant::InprocOutbound(_, endpoint) => {
                self.to_be_reconnected.push((token, endpoint));
            }
            ConnectionVariant::InprocListener(_, name) => {
                global_inproc_hub().unbind(&name);
            }
        }
    }

    fn disconnect_token(&mut self, token: Token) {
        if let Some(i) = self.conns.iter().position(|(t, _)| *t == token) {
            self.disconnect_at_index(i);
        }
    }

    fn disconnect_all_outbound(&mut self) {
        let mut i = self.conns.len();
        while i != 0 {
            i -= 1;
            if matches!(self.conns[i].1, ConnectionVariant::Outbound(..) | ConnectionVariant::InprocOutbound(..)) {
                self.disconnect_at_index(i);
            }
        }
    }

    fn connect(&mut self, endpoint: RelayEndpoint) -> Token {
        let token = self.alloc_token();
        self.to_be_reconnected.push((token, endpoint));
        self.reconnector.force_fire();
        self.maybe_reconnect();
        token
    }

    fn listen_at(&mut self, endpoint: &RelayEndpoint) -> std::io::Result<Token> {
        let token = self.alloc_token();
        if let RelayEndpoint::Inproc(name) = endpoint {
            let rx = global_inproc_hub().bind(name).map_err(|err| std::io::Error::other(err.to_string()))?;
            self.conns.push((token, ConnectionVariant::InprocListener(rx, name.clone())));
            return Ok(token);
        }
        let listener = AnyListener::bind(self.poll.registry(), token, endpoint)?;
        self.conns.push((token, ConnectionVariant::Listener(listener)));
        Ok(token)
    }

    fn maybe_reconnect(&mut self) {
        if !self.reconnector.fired() {
            return;
        }
        let mut i = self.to_be_reconnected.len();
        while i != 0 {
            i -= 1;
            let (token, endpoint) = self.to_be_reconnected[i].clone();
            if let RelayEndpoint::Inproc(name) = &endpoint {
                match global_inproc_hub().connect(name) {
                    Ok(tx) => {
                        debug!(endpoint = %describe(&endpoint), "relay-net: connected");
                        self.to_be_reconnected.swap_remove(i);
                        self.newly_connected.push(token);
                        self.conns.push((token, ConnectionVariant::InprocOutbound(tx, endpoint)));
                    }
                    Err(err) => {
                        warn!(endpoint = %describe(&endpoint), %err, "relay-net: connect failed, will retry");
                    }
                }
                continue;
            }
            match AnyStream::connect(self.poll.registry(), token, &endpoint) {
                Ok(stream) => {
                    debug!(endpoint = %describe(&endpoint), "relay-net: connected");
                    self.to_be_reconnected.swap_remove(i);
                    self.newly_connected.push(token);
                    self.conns.push((token, ConnectionVariant::Outbound(stream, endpoint)));
                }
                Err(err) => {
                    warn!(endpoint = %describe(&endpoint), %err, "relay-net: connect failed, will retry");
                }
            }
        }
    }

    fn write_or_enqueue(&mut self, where_to: SendBehavior, payload: &[u8], more: bool) {
        match where_to {
            SendBehavior::Broadcast => {
                let mut i = self.conns.len();
                while i != 0 {
                    i -= 1;
                    let disconnected = match &mut self.conns[i].1 {
                        ConnectionVariant::Outbound(stream, _) | ConnectionVariant::Inbound(stream) => {
                            let token = self.conns[i].0;
                            stream.write_or_enqueue(self.poll.registry(), token, payload, more)
                                == ConnState::Disconnected
                        }
                        ConnectionVariant::InprocOutbound(tx, _) => tx.send((payload.to_vec(), more)).is_err(),
                        ConnectionVariant::Listener(_) | ConnectionVariant::InprocListener(..) => false,
                    };
                    if disconnected {
                        self.disconnect_at_index(i);
                    }
                }
            }
            SendBehavior::Single(token) => {
                if let Some(i) = self.conns.iter().position(|(t, _)| *t == token) {
                    let disconnected = match &mut self.conns[i].1 {
                        ConnectionVariant::Outbound(stream, _) | ConnectionVariant::Inbound(stream) => {
                            stream.write_or_enqueue(self.poll.registry(), token, payload, more)
                                == ConnState::Disconnected
                        }
                        ConnectionVariant::InprocOutbound(tx, _) => tx.send((payload.to_vec(), more)).is_err(),
                        ConnectionVariant::Listener(_) | ConnectionVariant::InprocListener(..) => {
                            error!(?token, "relay-net: cannot write to a listener token");
                            false
                        }
                    };
                    if disconnected {
                        self.disconnect_at_index(i);
                    }
                } else {
                    error!(?token, "relay-net: send to unknown token");
                }
            }
        }
    }

    /// Drains every `InprocListener`'s receiver without blocking, since
    /// inproc channels carry no file descriptor for `mio` to poll. Returns
    /// whether anything was pulled, so the caller can skip blocking on the
    /// `mio` poll this tick.
    fn drain_inproc<F>(&mut self, handler: &mut F) -> bool
    where
        F: for<'a> FnMut(PollEvent<'a>),
    {
        let mut any = false;
        let mut gone = Vec::new();
        for (token, variant) in &mut self.conns {
            let ConnectionVariant::InprocListener(rx, _) = variant else { continue };
            loop {
                match rx.try_recv() {
                    Ok((payload, more)) => {
                        any = true;
                        handler(PollEvent::Message { token: *token, payload: &payload, more });
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        gone.push(*token);
                        break;
                    }
                }
            }
        }
        for token in gone {
            handler(PollEvent::Disconnect { token });
            self.disconnect_token(token);
        }
        any
    }

    fn handle_event<F>(&mut self, ev: &mio::event::Event, handler: &mut F)
    where
        F: for<'a> FnMut(PollEvent<'a>),
    {
        let event_token = ev.token();
        let Some(idx) = self.conns.iter().position(|(t, _)| *t == event_token) else {
            return;
        };

        loop {
            match &mut self.conns[idx].1 {
                ConnectionVariant::Outbound(stream, _) | ConnectionVariant::Inbound(stream) => {
                    let mut to_emit = Vec::new();
                    let state = stream.poll_with(self.poll.registry(), event_token, ev, &mut |payload, more| {
                        to_emit.push((payload.to_vec(), more));
                    });
                    for (payload, more) in to_emit {
                        handler(PollEvent::Message { token: event_token, payload: &payload, more });
                    }
                    if state == ConnState::Disconnected {
                        handler(PollEvent::Disconnect { token: event_token });
                        self.disconnect_at_index(idx);
                    }
                    return;
                }
                ConnectionVariant::Listener(listener) => {
                    let Ok((stream, peer)) = listener.accept() else { return };
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    let mut stream = stream;
                    if let Err(err) = register_inbound(&mut stream, self.poll.registry(), token) {
                        error!(%err, "relay-net: couldn't register accepted stream");
                        continue;
                    }
                    debug!(%peer, ?token, "relay-net: accepted connection");
                    handler(PollEvent::Accept { listener: event_token, stream: token });
                    self.conns.push((token, ConnectionVariant::Inbound(stream)));
                }
            }
        }
    }
}

/// `AnyStream::connect` already registers; accepted streams come
/// pre-registered from `AnyListener::accept`'s underlying mio accept, but
/// mio requires an explicit register call per accepted fd, so we redo it
/// here against the fresh token.
fn register_inbound(stream: &mut AnyStream, registry: &mio::Registry, token: Token) -> std::io::Result<()> {
    match stream {
        AnyStream::Tcp(s) => s.register(registry, token),
        AnyStream::Unix(s) => s.register(registry, token),
    }
}

/// Non-blocking multi-endpoint TCP/IPC/inproc connector built on `mio`.
///
/// Manages outbound (auto-retried) connections made via [`connect`], and
/// listeners + the inbound connections accepted from them (not retried).
/// `inproc://` endpoints are retried/accepted the same way, just routed
/// through `relay_comm::global_inproc_hub()` instead of a kernel socket.
/// Drive IO by calling [`poll_with`] regularly.
pub struct RelayConnector {
    events: Events,
    conn_mgr: ConnectionManager,
}

impl RelayConnector {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self { events: Events::with_capacity(128), conn_mgr: ConnectionManager::new()? })
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.conn_mgr.reconnector = Repeater::every(interval);
        self
    }

    /// Polls once with the given timeout and dispatches events via
    /// `handler`. Returns whether any IO events were processed.
    pub fn poll_with<F>(&mut self, timeout: Option<Duration>, mut handler: F) -> bool
    where
        F: for<'a> FnMut(PollEvent<'a>),
    {
        self.conn_mgr.maybe_reconnect();
        for token in self.conn_mgr.newly_connected.drain(..) {
            handler(PollEvent::Connect { token });
        }

        // `inproc://` endpoints carry no file descriptor, so they're drained
        // up front; if that found anything, don't block the `mio` poll below
        // waiting out the rest of `timeout`.
        let inproc_any = self.conn_mgr.drain_inproc(&mut handler);
        let mio_timeout = if inproc_any { Some(Duration::from_millis(0)) } else { timeout };

        if let Err(err) = self.conn_mgr.poll.poll(&mut self.events, mio_timeout) {
            if err.kind() != std::io::ErrorKind::Interrupted {
                error!(%err, "relay-net: poll failed");
            }
            return inproc_any;
        }

        let mut any = inproc_any;
        for ev in self.events.iter() {
            any = true;
            self.conn_mgr.handle_event(ev, &mut handler);
        }
        any
    }

    pub fn write_or_enqueue(&mut self, where_to: SendBehavior, payload: &[u8], more: bool) {
        self.conn_mgr.write_or_enqueue(where_to, payload, more);
    }

    pub fn disconnect_outbound(&mut self) {
        self.conn_mgr.disconnect_all_outbound();
    }

    pub fn disconnect(&mut self, token: Token) {
        self.conn_mgr.disconnect_token(token);
    }

    /// Schedules an outbound connection to `endpoint`, returning the token
    /// it will use once connected (and for every future reconnect attempt).
    pub fn connect(&mut self, endpoint: RelayEndpoint) -> Token {
        self.conn_mgr.connect(endpoint)
    }

    pub fn listen_at(&mut self, endpoint: &RelayEndpoint) -> std::io::Result<Token> {
        self.conn_mgr.listen_at(endpoint)
    }
}
