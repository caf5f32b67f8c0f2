use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A broadcast-only notification channel: every event bumps a sequence number
/// and wakes all waiters. Receivers track the last sequence they observed, so
/// an event can never be missed between a check and a wait.
pub struct Notify {
    sequence: Mutex<u64>,
    cond: Condvar,
}

impl Notify {
    pub fn new() -> Self {
        Self { sequence: Mutex::new(0), cond: Condvar::new() }
    }

    pub fn sequence(&self) -> u64 {
        *self.sequence.lock()
    }

    /// Broadcast: wakes every waiter, never just one
    pub fn notify_all(&self) {
        let mut sequence = self.sequence.lock();
        *sequence += 1;
        self.cond.notify_all();
    }

    /// Blocks until the sequence passes `last_seen` or the timeout elapses,
    /// returning the sequence observed at wakeup
    pub fn wait_beyond(&self, last_seen: u64, timeout: Duration) -> u64 {
        let deadline = Instant::now() + timeout;
        let mut sequence = self.sequence.lock();
        while *sequence <= last_seen {
            if self.cond.wait_until(&mut sequence, deadline).timed_out() {
                break;
            }
        }
        *sequence
    }
}

impl Default for Notify {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_broadcast_wakes_all_waiters() {
        let notify = Arc::new(Notify::new());
        let seen = notify.sequence();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let notify = notify.clone();
                thread::spawn(move || notify.wait_beyond(seen, Duration::from_secs(5)))
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        notify.notify_all();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), seen + 1);
        }
    }

    #[test]
    fn test_wait_times_out() {
        let notify = Notify::new();
        assert_eq!(notify.wait_beyond(0, Duration::from_millis(20)), 0);
    }
}
