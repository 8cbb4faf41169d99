use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use relay_comm::{InterruptFlag, Readiness};
use tracing::{debug, warn};

use crate::endpoint::RelayEndpoint;
use crate::monitor::EventMask;
use crate::tcp::{PollEvent, RelayConnector, SendBehavior};

const POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// One outbound endpoint of an [`EgressGroup`]: a dedicated monitor thread
/// (spec §5: "one monitor thread per egress endpoint") owns a single-peer
/// [`RelayConnector`], publishes CONNECTED/DISCONNECTED transitions to its
/// `EventMask`, and applies frames handed to it over `frame_tx` in order.
pub struct EgressEndpoint {
    mask: Arc<EventMask>,
    frame_tx: Sender<(Vec<u8>, bool)>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EgressEndpoint {
    /// Spawns the monitor thread and blocks until it has attached to its
    /// connector (spec §4.2 startup synchronisation requirement) before
    /// returning, via a [`Readiness`] handoff.
    pub fn spawn(endpoint: RelayEndpoint, interrupt: InterruptFlag) -> std::io::Result<Self> {
        let mask = Arc::new(EventMask::new());
        let (frame_tx, frame_rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let readiness = Readiness::new();

        let thread_mask = Arc::clone(&mask);
        let thread_stop = Arc::clone(&stop);
        let thread_readiness = readiness.clone();
        let handle = thread::Builder::new()
            .name(format!("egress-monitor-{endpoint:?}"))
            .spawn(move || {
                run(endpoint, thread_mask, frame_rx, thread_stop, interrupt, thread_readiness)
            })?;

        readiness.wait();
        Ok(Self { mask, frame_tx, stop, handle: Some(handle) })
    }

    pub fn mask(&self) -> &Arc<EventMask> {
        &self.mask
    }

    /// Queues a frame for this endpoint. Never blocks; drops the frame with
    /// a warning if the monitor thread has already exited (disconnected
    /// channel), mirroring the spec's "transient send failure is not
    /// surfaced" rule (spec §7).
    pub fn send(&self, payload: Vec<u8>, more: bool) {
        if self.frame_tx.send((payload, more)).is_err() {
            warn!("relay-net: egress monitor thread gone, dropping frame");
        }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EgressEndpoint {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    endpoint: RelayEndpoint,
    mask: Arc<EventMask>,
    frame_rx: Receiver<(Vec<u8>, bool)>,
    stop: Arc<AtomicBool>,
    interrupt: InterruptFlag,
    readiness: Readiness,
) {
    let mut connector = match RelayConnector::new() {
        Ok(c) => c,
        Err(err) => {
            warn!(%err, "relay-net: egress monitor couldn't create connector");
            readiness.signal();
            return;
        }
    };
    let token = connector.connect(endpoint);
    readiness.signal();

    while !stop.load(Ordering::Relaxed) && !interrupt.is_set() {
        connector.poll_with(Some(POLL_TIMEOUT), |ev| match ev {
            PollEvent::Connect { .. } => mask.mark_connected(),
            PollEvent::Accept { .. } => mask.mark_accepted(),
            PollEvent::Disconnect { .. } => mask.mark_disconnected(),
            PollEvent::Message { .. } => {
                debug!("relay-net: unexpected inbound message on egress endpoint");
            }
        });

        while let Ok((payload, more)) = frame_rx.try_recv() {
            connector.write_or_enqueue(SendBehavior::Single(token), &payload, more);
        }
    }
}
