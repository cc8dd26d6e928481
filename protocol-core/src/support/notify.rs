//! A one-shot notify/wait signal with internal re-arm, used for the
//! collection manager's four wake channels.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub struct NotificationSignal {
    flag: Mutex<bool>,
    condvar: Condvar,
}

impl NotificationSignal {
    pub fn new() -> NotificationSignal {
        NotificationSignal {
            flag: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub fn notify(&self) {
        let mut flag = self.flag.lock().unwrap();
        *flag = true;
        self.condvar.notify_all();
    }

    /// Blocks until notified, then re-arms so the next `wait` blocks again.
    pub fn wait(&self) {
        let mut flag = self.flag.lock().unwrap();
        while !*flag {
            flag = self.condvar.wait(flag).unwrap();
        }
        *flag = false;
    }

    /// Like `wait`, but gives up after `timeout` and returns whether it was
    /// actually notified (lets a runner loop poll `exit_when_done`).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut flag = self.flag.lock().unwrap();
        while !*flag {
            let (guard, result) = self.condvar.wait_timeout(flag, timeout).unwrap();
            flag = guard;
            if result.timed_out() && !*flag {
                return false;
            }
        }
        *flag = false;
        true
    }
}

impl Default for NotificationSignal {
    fn default() -> Self {
        NotificationSignal::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn wait_returns_after_notify() {
        let signal = Arc::new(NotificationSignal::new());
        let worker = {
            let signal = signal.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                signal.notify();
            })
        };
        signal.wait();
        worker.join().unwrap();
    }

    #[test]
    fn wait_timeout_expires_without_notify() {
        let signal = NotificationSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
    }
}
