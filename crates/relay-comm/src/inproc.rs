use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use once_cell::sync::Lazy;

use crate::error::CommError;

/// The wire type carried by the process-wide hub: one frame plus its
/// "more frames follow" bit, matching what every other ingress/egress
/// path in the tree moves.
pub type InprocMessage = (Vec<u8>, bool);

static GLOBAL_HUB: Lazy<InprocHub<InprocMessage>> = Lazy::new(InprocHub::new);

/// The process-wide hub `inproc://` endpoints resolve against. Distinct
/// from the ad-hoc `mpsc::channel` the Mode Orchestrator wires directly for
/// its own internal fan-in plumbing (spec §4.5) — this one is for
/// user-configured `inproc://` endpoints anywhere in the endpoint lists
/// (e.g. a `subscribe_frontendpoints` entry), which have no other binder to
/// connect to.
pub fn global() -> &'static InprocHub<InprocMessage> {
    &GLOBAL_HUB
}

/// Fan-in registry for the inproc push/pull pair used to decouple a bound
/// front-end from a back-end whose liveness can change independently (spec
/// §4.5, "inproc fan-in"). One [`InprocHub`] is created per mode instance
/// that needs a fan-in (CLIENT, CLIENT_SUBSCRIBE) and shared between the
/// proxying front-end and the worker task, rather than looked up by a
/// process-global `(pid, index)` name the way the zeromq-backed original
/// keyed its monitor endpoints — there is exactly one hub per orchestrator,
/// so plain string keys are unambiguous.
#[derive(Default)]
pub struct InprocHub<T> {
    senders: Mutex<HashMap<String, Sender<T>>>,
}

impl<T: Send + 'static> InprocHub<T> {
    pub fn new() -> Self {
        Self { senders: Mutex::new(HashMap::new()) }
    }

    /// Binds `endpoint`, returning the receive end. Only one binder per
    /// endpoint may exist at a time.
    pub fn bind(&self, endpoint: &str) -> Result<Receiver<T>, CommError> {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        if senders.contains_key(endpoint) {
            return Err(CommError::AlreadyRegistered("inproc endpoint already bound"));
        }
        let (tx, rx) = mpsc::channel();
        senders.insert(endpoint.to_owned(), tx);
        Ok(rx)
    }

    /// Connects to an already-bound `endpoint`, returning a cloneable send
    /// handle. Multiple connectors may share one bound endpoint.
    pub fn connect(&self, endpoint: &str) -> Result<Sender<T>, CommError> {
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(endpoint)
            .cloned()
            .ok_or(CommError::NotFound)
    }

    pub fn unbind(&self, endpoint: &str) {
        self.senders.lock().unwrap_or_else(|e| e.into_inner()).remove(endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_before_bind_is_not_found() {
        let hub: InprocHub<u8> = InprocHub::new();
        assert!(matches!(hub.connect("inproc://x"), Err(CommError::NotFound)));
    }

    #[test]
    fn bind_then_connect_roundtrips_messages() {
        let hub: InprocHub<u8> = InprocHub::new();
        let rx = hub.bind("inproc://fan-in").unwrap();
        let tx = hub.connect("inproc://fan-in").unwrap();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), 2);
    }

    #[test]
    fn double_bind_fails() {
        let hub: InprocHub<u8> = InprocHub::new();
        let _rx = hub.bind("inproc://x").unwrap();
        assert!(matches!(hub.bind("inproc://x"), Err(CommError::AlreadyRegistered(_))));
    }
}
