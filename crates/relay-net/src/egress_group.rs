use relay_comm::InterruptFlag;
use relay_wire::parse_endpoint_list;
use tracing::warn;

use crate::egress::EgressEndpoint;
use crate::endpoint::{EndpointError, RelayEndpoint};

/// A set of outbound channels built from a comma-separated endpoint list
/// (spec §3 "Egress Group State", §4.3). Each entry owns its own monitor
/// thread; `liveness_count` is derived by folding every entry's sampled
/// event mask and is owned by whichever thread calls [`sample`].
pub struct EgressGroup {
    endpoints: Vec<RelayEndpoint>,
    monitors: Vec<EgressEndpoint>,
    liveness_count: i64,
}

impl EgressGroup {
    /// Parses `endpoint_list` and allocates per-endpoint bookkeeping. No IO
    /// happens until [`start_monitors`](EgressGroup::start_monitors).
    pub fn init(endpoint_list: &str) -> Result<Self, EndpointError> {
        let endpoints =
            parse_endpoint_list(endpoint_list).iter().map(|s| RelayEndpoint::parse(s)).collect::<Result<_, _>>()?;
        Ok(Self { endpoints, monitors: Vec::new(), liveness_count: 0 })
    }

    /// Starts one monitor thread per endpoint. Each thread connects its
    /// outbound channel only after it has attached its own monitor state
    /// (spec §4.2's ordering requirement is satisfied by construction: the
    /// connect happens inside the same thread that owns the mask).
    ///
    /// On any failure, already-started monitors are stopped and torn down,
    /// matching the "tear down all partially-created entries" rule of
    /// `init` in the original design (moved here since spawning, not
    /// parsing, is what can fail).
    pub fn start_monitors(&mut self, interrupt: InterruptFlag) -> std::io::Result<()> {
        for endpoint in &self.endpoints {
            match EgressEndpoint::spawn(endpoint.clone(), interrupt.clone()) {
                Ok(monitor) => self.monitors.push(monitor),
                Err(err) => {
                    warn!(%err, "relay-net: egress monitor failed to start, tearing down group");
                    self.stop_monitors();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Folds every endpoint's sampled event mask into `liveness_count`.
    /// Each observed event results in exactly one increment/decrement; the
    /// bit is cleared by `sample` as a side effect (spec §4.3).
    pub fn sample(&mut self) {
        for monitor in &self.monitors {
            let sampled = monitor.mask().sample();
            if sampled.connected_or_accepted() {
                self.liveness_count += 1;
            }
            if sampled.disconnected() {
                self.liveness_count = self.liveness_count.saturating_sub(1).max(0);
            }
        }
    }

    pub fn liveness(&self) -> i64 {
        self.liveness_count
    }

    pub fn is_live(&self) -> bool {
        self.liveness_count > 0
    }

    /// Sends one frame, round-robin across live endpoints. With only one
    /// configured endpoint (the common case) this always targets it.
    pub fn send(&self, round_robin_index: usize, payload: Vec<u8>, more: bool) {
        if self.monitors.is_empty() {
            warn!("relay-net: egress group has no endpoints, dropping frame");
            return;
        }
        let idx = round_robin_index % self.monitors.len();
        self.monitors[idx].send(payload, more);
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn stop_monitors(&mut self) {
        for monitor in &mut self.monitors {
            monitor.stop();
        }
    }

    pub fn destroy(mut self) {
        self.stop_monitors();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_parses_comma_separated_endpoints() {
        let group = EgressGroup::init("tcp://127.0.0.1:15551,tcp://127.0.0.1:15552").unwrap();
        assert_eq!(group.endpoint_count(), 2);
    }

    #[test]
    fn init_rejects_bad_scheme() {
        assert!(EgressGroup::init("udp://127.0.0.1:1").is_err());
    }
}
