//! Single-occupancy timer slot

use tokio::task::JoinHandle;

/// Holds at most one running timer task.
///
/// Arming aborts whatever was armed before, so repeated reconnect cycles can
/// never stack timers of the same kind. Each arming gets an id; a task that
/// fires reports its id through [`TimerSlot::fire`], which only succeeds while
/// that task is still the armed one.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    armed: Option<(u64, JoinHandle<()>)>,
    next_id: u64,
}

impl TimerSlot {
    /// Replace the armed timer with the task built by `spawn`
    pub(crate) fn arm<F>(&mut self, spawn: F)
    where
        F: FnOnce(u64) -> JoinHandle<()>,
    {
        self.cancel();
        self.next_id += 1;
        let id = self.next_id;
        self.armed = Some((id, spawn(id)));
    }

    /// Abort the armed timer. Returns whether one was armed.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Called by the timer task itself once it elapses. Returns false if the
    /// task was replaced or cancelled in the meantime.
    pub(crate) fn fire(&mut self, id: u64) -> bool {
        match &self.armed {
            Some((armed, _)) if *armed == id => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;

    #[tokio::test]
    async fn test_arm_replaces_previous_timer() {
        let mut slot = TimerSlot::default();
        slot.arm(|_| tokio::spawn(pending::<()>()));
        slot.arm(|_| tokio::spawn(pending::<()>()));

        assert!(slot.is_armed());
        assert!(!slot.fire(1));
        assert!(slot.fire(2));
        assert!(!slot.is_armed());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let mut slot = TimerSlot::default();
        assert!(!slot.cancel());

        slot.arm(|_| tokio::spawn(pending::<()>()));
        assert!(slot.cancel());
        assert!(!slot.cancel());
        assert!(!slot.fire(1));
    }
}
