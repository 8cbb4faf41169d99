use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Explicit readiness handoff between a parent thread and a task it just
/// spawned (monitor thread, inproc fan-in worker). Replaces the source's
/// double-mutex baton (spec §9 design note 1): the parent calls
/// [`wait`](Readiness::wait) after spawning, the task calls
/// [`signal`](Readiness::signal) once it has completed its setup (e.g.
/// connected its monitor's PAIR-equivalent channel), and the parent is
/// guaranteed to observe that before the monitored socket begins operating.
#[derive(Clone, Debug, Default)]
pub struct Readiness {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Readiness {
    pub fn new() -> Self {
        Self { inner: Arc::new((Mutex::new(false), Condvar::new())) }
    }

    /// Marks this readiness cell as ready and wakes any waiter. Idempotent.
    pub fn signal(&self) {
        let (lock, cvar) = &*self.inner;
        let mut ready = lock.lock().unwrap_or_else(|e| e.into_inner());
        *ready = true;
        cvar.notify_all();
    }

    /// Blocks until [`signal`](Readiness::signal) has been called.
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut ready = lock.lock().unwrap_or_else(|e| e.into_inner());
        while !*ready {
            ready = cvar.wait(ready).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Bounded wait used by callers that also need to sample the interrupt
    /// flag while waiting (e.g. startup abort). Returns whether it became
    /// ready within `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let ready = lock.lock().unwrap_or_else(|e| e.into_inner());
        if *ready {
            return true;
        }
        let (ready, _) = cvar.wait_timeout(ready, timeout).unwrap_or_else(|e| e.into_inner());
        *ready
    }
}
