use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::Token;
use relay_comm::InterruptFlag;
use relay_spool::Spooler;
use relay_wire::Codec;

use crate::egress::Egress;
use crate::ingress::Ingress;
use crate::keys::{PublishKey, SubscribeKey};

/// Everything a single relay loop needs to know about its pipeline's
/// optional decorations. Left `None` where a mode doesn't use them (spec
/// §4.5 mode table).
pub struct RelayLoopConfig {
    /// Role-specific codec: `Some` when this pipeline compresses outgoing
    /// frames (CLIENT/CLIENT_PUBLISH's publish side).
    pub compress: Option<Arc<dyn Codec>>,
    /// Role-specific codec: `Some` when this pipeline decompresses incoming
    /// frames (the subscribe side of PUBLISH_SUBSCRIBE/CLIENT_SUBSCRIBE).
    pub decompress: Option<Arc<dyn Codec>>,
    pub publish_key: Option<PublishKey>,
    pub subscribe_key: Option<SubscribeKey>,
    /// Bound on a single ingress poll tick, so `run`'s loop re-checks
    /// `interrupt` periodically even when no frames are arriving.
    pub poll_timeout: Option<Duration>,
}

impl Default for RelayLoopConfig {
    fn default() -> Self {
        Self {
            compress: None,
            decompress: None,
            publish_key: None,
            subscribe_key: None,
            poll_timeout: Some(Duration::from_millis(200)),
        }
    }
}

#[derive(Clone, Copy)]
enum MsgState {
    Forward,
    Spool,
    Drop,
}

struct PendingMessage {
    state: MsgState,
    frame_index: u64,
}

/// Drives one mode-shaped pipeline: pulls frames from `ingress`, decides
/// per-message whether to FORWARD or SPOOL (spec §4.4), and runs until
/// `interrupt` is set, finishing with a bounded garbage-collection drain
/// of anything left buffered in the ingress into the spooler.
pub struct RelayLoop<E: Egress> {
    ingress: Ingress,
    egress: E,
    spooler: Option<Spooler>,
    interrupt: InterruptFlag,
    config: RelayLoopConfig,
    pending: HashMap<Token, PendingMessage>,
}

impl<E: Egress> RelayLoop<E> {
    pub fn new(
        ingress: Ingress,
        egress: E,
        spooler: Option<Spooler>,
        interrupt: InterruptFlag,
        config: RelayLoopConfig,
    ) -> Self {
        Self { ingress, egress, spooler, interrupt, config, pending: HashMap::new() }
    }

    pub fn run(&mut self) {
        while !self.interrupt.is_set() {
            let Self { ingress, egress, spooler, config, pending, .. } = self;
            ingress.poll(config.poll_timeout, |token, payload, more| {
                process_frame(egress, spooler, config, pending, token, payload, more);
            });
        }
        self.gc_drain();
    }

    /// Drains anything still buffered in the ingress at shutdown into the
    /// spooler, bounded so a stalled or empty ingress can't hang exit.
    fn gc_drain(&mut self) {
        let Self { ingress, spooler, pending, .. } = self;
        let Some(spooler) = spooler.as_mut() else { return };
        let deadline = Instant::now() + Duration::from_millis(500);
        while Instant::now() < deadline {
            let mut any = false;
            ingress.poll(Some(Duration::from_millis(50)), |token, payload, more| {
                any = true;
                if let Err(err) = spooler.write(payload, more) {
                    tracing::warn!(%err, "relay-core: gc drain spool write failed");
                }
                if !more {
                    pending.remove(&token);
                }
            });
            if !any {
                break;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_frame<E: Egress>(
    egress: &mut E,
    spooler: &mut Option<Spooler>,
    config: &RelayLoopConfig,
    pending: &mut HashMap<Token, PendingMessage>,
    token: Token,
    payload: &[u8],
    more: bool,
) {
    if !pending.contains_key(&token) {
        let state = decide_state(egress, spooler, config, payload);
        pending.insert(token, PendingMessage { state, frame_index: 0 });
    }

    let frame_index = {
        let entry = pending.get_mut(&token).expect("just inserted");
        let idx = entry.frame_index;
        entry.frame_index += 1;
        idx
    };
    let mut state = pending.get(&token).expect("just inserted").state;

    // A live egress can drop mid-message; re-check before every real frame
    // and fail over to SPOOL for the remainder of this message (spec §4.4.2.e).
    if matches!(state, MsgState::Forward) && frame_index > 0 {
        egress.sample();
        if !egress.is_live() {
            state = if spooler.is_some() { MsgState::Spool } else { MsgState::Drop };
            if let Some(entry) = pending.get_mut(&token) {
                entry.state = state;
            }
        }
    }

    match state {
        MsgState::Drop => {}
        MsgState::Spool => {
            if let Some(spooler) = spooler {
                if let Err(err) = spooler.write(payload, more) {
                    tracing::warn!(%err, "relay-core: spool write failed, message lost");
                }
            }
        }
        MsgState::Forward => {
            if frame_index == 0 {
                if let Some(key) = &config.publish_key {
                    egress.send(key.bytes().to_vec(), true);
                }
            }
            let drop_as_key_frame =
                frame_index == 0 && config.subscribe_key.as_ref().is_some_and(|k| k.drop_key);
            if !drop_as_key_frame {
                egress.send(apply_translation(config, payload), more);
            }
        }
    }

    if !more {
        pending.remove(&token);
    }
}

fn decide_state<E: Egress>(
    egress: &mut E,
    spooler: &Option<Spooler>,
    config: &RelayLoopConfig,
    first_payload: &[u8],
) -> MsgState {
    if let Some(sub) = &config.subscribe_key {
        if !sub.matches(first_payload) {
            return MsgState::Drop;
        }
    }
    if spooler.is_none() {
        return MsgState::Forward;
    }
    egress.sample();
    if egress.is_live() {
        MsgState::Forward
    } else {
        MsgState::Spool
    }
}

fn apply_translation(config: &RelayLoopConfig, payload: &[u8]) -> Vec<u8> {
    if let Some(codec) = &config.compress {
        return codec.compress(payload).unwrap_or_else(|_| payload.to_vec());
    }
    if let Some(codec) = &config.decompress {
        return codec.decompress(payload).unwrap_or_else(|_| payload.to_vec());
    }
    payload.to_vec()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc::Sender;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use relay_comm::InterruptFlag;
    use relay_spool::DumpFormat;

    use super::*;
    use crate::keys::{PublishKey, SubscribeKey};

    #[derive(Clone)]
    struct RecordingEgress {
        sent: Arc<Mutex<Vec<(Vec<u8>, bool)>>>,
        live: Arc<AtomicBool>,
    }

    impl RecordingEgress {
        fn new(live: bool) -> Self {
            Self { sent: Arc::new(Mutex::new(Vec::new())), live: Arc::new(AtomicBool::new(live)) }
        }

        fn frames(&self) -> Vec<(Vec<u8>, bool)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Egress for RecordingEgress {
        fn sample(&mut self) {}

        fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }

        fn send(&mut self, payload: Vec<u8>, more: bool) {
            self.sent.lock().unwrap().push((payload, more));
        }
    }

    /// Runs `loop_` to completion on a background thread, feeding it every
    /// `(payload, more)` pair in `frames` through the inproc channel, then
    /// sets `interrupt` and joins so the garbage-collection drain runs too.
    fn drive(mut loop_: RelayLoop<RecordingEgress>, tx: Sender<(Vec<u8>, bool)>, interrupt: InterruptFlag, frames: Vec<(&[u8], bool)>) {
        let handle = std::thread::spawn(move || loop_.run());
        for (payload, more) in frames {
            tx.send((payload.to_vec(), more)).unwrap();
        }
        std::thread::sleep(Duration::from_millis(150));
        interrupt.set();
        handle.join().unwrap();
    }

    fn fanin() -> (Ingress, Sender<(Vec<u8>, bool)>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (Ingress::inproc(rx), tx)
    }

    fn fast_poll() -> RelayLoopConfig {
        RelayLoopConfig { poll_timeout: Some(Duration::from_millis(20)), ..Default::default() }
    }

    #[test]
    fn forward_preserves_frame_order_and_more_flags() {
        let (ingress, tx) = fanin();
        let egress = RecordingEgress::new(true);
        let interrupt = InterruptFlag::new();
        let loop_ = RelayLoop::new(ingress, egress.clone(), None, interrupt.clone(), fast_poll());

        drive(loop_, tx, interrupt, vec![(b"a", true), (b"b", true), (b"c", false)]);

        assert_eq!(
            egress.frames(),
            vec![(b"a".to_vec(), true), (b"b".to_vec(), true), (b"c".to_vec(), false)]
        );
    }

    #[test]
    fn dead_egress_spools_every_frame_of_the_message_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.bin");
        let spooler = relay_spool::Spooler::init(&path, DumpFormat::Binary).unwrap();

        let (ingress, tx) = fanin();
        let egress = RecordingEgress::new(false);
        let interrupt = InterruptFlag::new();
        let loop_ = RelayLoop::new(ingress, egress.clone(), Some(spooler), interrupt.clone(), fast_poll());

        drive(loop_, tx, interrupt, vec![(b"a", true), (b"b", true), (b"c", false)]);

        assert!(egress.frames().is_empty());

        let mut reader = relay_spool::Spooler::init(&path, DumpFormat::Binary).unwrap();
        assert_eq!(reader.read().unwrap(), Some((b"a".to_vec(), true)));
        assert_eq!(reader.read().unwrap(), Some((b"b".to_vec(), true)));
        assert_eq!(reader.read().unwrap(), Some((b"c".to_vec(), false)));
        assert_eq!(reader.read().unwrap(), None);
    }

    #[test]
    fn publish_key_is_prepended_exactly_once_per_message() {
        let (ingress, tx) = fanin();
        let egress = RecordingEgress::new(true);
        let interrupt = InterruptFlag::new();
        let mut cfg = fast_poll();
        cfg.publish_key = Some(PublishKey::new("topic.k", None));
        let loop_ = RelayLoop::new(ingress, egress.clone(), None, interrupt.clone(), cfg);

        drive(loop_, tx, interrupt, vec![(b"hello", false)]);

        assert_eq!(egress.frames(), vec![(b"topic.k".to_vec(), true), (b"hello".to_vec(), false)]);
    }

    #[test]
    fn drop_key_strips_the_leading_frame_of_every_message() {
        let (ingress, tx) = fanin();
        let egress = RecordingEgress::new(true);
        let interrupt = InterruptFlag::new();
        let mut cfg = fast_poll();
        cfg.subscribe_key = Some(SubscribeKey::new("evt.", true, None));
        let loop_ = RelayLoop::new(ingress, egress.clone(), None, interrupt.clone(), cfg);

        drive(loop_, tx, interrupt, vec![(b"evt.x", true), (b"payload", false)]);

        assert_eq!(egress.frames(), vec![(b"payload".to_vec(), false)]);
    }

    #[test]
    fn non_matching_subscribe_key_drops_the_whole_message() {
        let (ingress, tx) = fanin();
        let egress = RecordingEgress::new(true);
        let interrupt = InterruptFlag::new();
        let mut cfg = fast_poll();
        cfg.subscribe_key = Some(SubscribeKey::new("evt.", false, None));
        let loop_ = RelayLoop::new(ingress, egress.clone(), None, interrupt.clone(), cfg);

        drive(loop_, tx, interrupt, vec![(b"other.x", true), (b"payload", false)]);

        assert!(egress.frames().is_empty());
    }
}
