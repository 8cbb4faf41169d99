use std::time::Duration;

use relay_net::{EgressGroup, EventMask, PollEvent, RelayConnector, RelayEndpoint, SendBehavior};

/// The forward side of a relay pipeline: something the relay loop can
/// sample for liveness and hand frames to. Two shapes appear in the mode
/// table (spec §4.5): a connect-out group of peers (`EgressGroup`) and a
/// bound listener that broadcasts to whoever is currently attached.
pub trait Egress: Send {
    /// Refresh the liveness signal. Cheap; called once per message and
    /// again before every frame of a FORWARD-state message, so it must
    /// never block.
    fn sample(&mut self);
    fn is_live(&self) -> bool;
    fn send(&mut self, payload: Vec<u8>, more: bool);
}

/// Connect-out egress: a fixed set of peer endpoints dialed independently,
/// round-robined on send (spec §4.3).
pub struct GroupEgress {
    group: EgressGroup,
    round_robin: usize,
}

impl GroupEgress {
    pub fn new(group: EgressGroup) -> Self {
        Self { group, round_robin: 0 }
    }

    pub fn destroy(self) {
        self.group.destroy();
    }
}

impl Egress for GroupEgress {
    fn sample(&mut self) {
        self.group.sample();
    }

    fn is_live(&self) -> bool {
        self.group.is_live()
    }

    fn send(&mut self, payload: Vec<u8>, more: bool) {
        if self.group.endpoint_count() == 0 {
            return;
        }
        self.group.send(self.round_robin, payload, more);
        self.round_robin = self.round_robin.wrapping_add(1);
    }
}

/// Bound egress: a listener that broadcasts every frame to all currently
/// connected peers (e.g. the PUBLISH back role). Liveness is derived the
/// same way `EgressGroup` derives it: an `EventMask` folded into a
/// saturating live-peer count, sampled by draining the connector's pending
/// I/O with a zero timeout.
pub struct BoundEgress {
    connector: RelayConnector,
    mask: EventMask,
    liveness: i64,
}

impl BoundEgress {
    pub fn bind(endpoint: &RelayEndpoint) -> std::io::Result<Self> {
        let mut connector = RelayConnector::new()?;
        connector.listen_at(endpoint)?;
        Ok(Self { connector, mask: EventMask::new(), liveness: 0 })
    }
}

impl Egress for BoundEgress {
    fn sample(&mut self) {
        let Self { connector, mask, .. } = self;
        connector.poll_with(Some(Duration::ZERO), |ev| match ev {
            PollEvent::Accept { .. } => mask.mark_accepted(),
            PollEvent::Disconnect { .. } => mask.mark_disconnected(),
            _ => {}
        });
        let sampled = self.mask.sample();
        if sampled.connected_or_accepted() {
            self.liveness = self.liveness.saturating_add(1);
        }
        if sampled.disconnected() {
            self.liveness = self.liveness.saturating_sub(1).max(0);
        }
    }

    fn is_live(&self) -> bool {
        self.liveness > 0
    }

    fn send(&mut self, payload: Vec<u8>, more: bool) {
        self.connector.write_or_enqueue(SendBehavior::Broadcast, &payload, more);
    }
}

/// Egress side of the in-process fan-in (spec §4.5): the front-end proxy
/// loop treats the worker thread's receiving channel as its egress, so a
/// bound ingress never blocks on downstream liveness. Always reports live;
/// the channel itself has no disconnect/reconnect concept, only gone/not
/// gone, and a gone receiver means the worker thread has exited, at which
/// point the process is shutting down anyway.
pub struct InprocEgress {
    tx: std::sync::mpsc::Sender<(Vec<u8>, bool)>,
}

impl InprocEgress {
    pub fn new(tx: std::sync::mpsc::Sender<(Vec<u8>, bool)>) -> Self {
        Self { tx }
    }
}

impl Egress for InprocEgress {
    fn sample(&mut self) {}

    fn is_live(&self) -> bool {
        true
    }

    fn send(&mut self, payload: Vec<u8>, more: bool) {
        if self.tx.send((payload, more)).is_err() {
            tracing::warn!("relay-core: inproc fan-in receiver gone, dropping frame");
        }
    }
}
