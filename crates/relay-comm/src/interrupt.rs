use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Process-wide shutdown signal. A single `Arc<AtomicBool>`, written only by
/// the signal-hook registration installed in [`InterruptFlag::install`];
/// every relay loop, monitor thread and worker thread samples it with
/// [`InterruptFlag::is_set`] and exits promptly (spec §5, design note 4).
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Registers SIGINT and SIGTERM handlers that set the flag. Idempotent:
    /// sending either signal twice just sets an already-true flag (spec P8).
    pub fn install(&self) -> std::io::Result<()> {
        signal_hook::flag::register(SIGINT, Arc::clone(&self.0))?;
        signal_hook::flag::register(SIGTERM, Arc::clone(&self.0))?;
        Ok(())
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// For tests and the garbage-collection pass's own forced shutdown.
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        assert!(!InterruptFlag::new().is_set());
    }

    #[test]
    fn set_is_observed_by_clones() {
        let flag = InterruptFlag::new();
        let clone = flag.clone();
        flag.set();
        assert!(clone.is_set());
    }
}
