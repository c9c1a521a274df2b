//! Debounced rebuild scheduling.
//!
//! The engine runs single-threaded; the host pumps [`RebuildScheduler::take_due`]
//! from its event loop. Changes tagged with the solver's own write-back
//! origin (or a remote merge racing a rebuild) do not reset the timer.

use std::time::{Duration, Instant};

use camber_doc::Origin;

/// Debounce window after the last triggering change.
pub const DEBOUNCE: Duration = Duration::from_millis(16);

#[derive(Debug)]
pub struct RebuildScheduler {
    debounce: Duration,
    deadline: Option<Instant>,
}

impl RebuildScheduler {
    pub fn new() -> Self {
        Self::with_debounce(DEBOUNCE)
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
        }
    }

    /// Record a document change. Only origins that trigger rebuilds reset the
    /// debounce deadline.
    pub fn note_change(&mut self, origin: &Origin, now: Instant) {
        if origin.triggers_rebuild() {
            self.deadline = Some(now + self.debounce);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When a rebuild is due, consume the deadline and return true. A change
    /// arriving mid-rebuild re-arms the deadline and is picked up by the next
    /// pump after the current rebuild completes.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for RebuildScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggering_change_arms_the_deadline() {
        let mut s = RebuildScheduler::new();
        let t0 = Instant::now();
        s.note_change(&Origin::Local, t0);
        assert!(s.is_pending());
        assert!(!s.take_due(t0));
        assert!(s.take_due(t0 + Duration::from_millis(20)));
        assert!(!s.is_pending());
    }

    #[test]
    fn writeback_does_not_arm() {
        let mut s = RebuildScheduler::new();
        let t0 = Instant::now();
        s.note_change(&Origin::SolverWriteback, t0);
        s.note_change(&Origin::RemoteInFlight, t0);
        assert!(!s.is_pending());
    }

    #[test]
    fn later_change_pushes_the_deadline_out() {
        let mut s = RebuildScheduler::new();
        let t0 = Instant::now();
        s.note_change(&Origin::Local, t0);
        s.note_change(&Origin::Remote, t0 + Duration::from_millis(10));
        assert!(!s.take_due(t0 + Duration::from_millis(20)));
        assert!(s.take_due(t0 + Duration::from_millis(30)));
    }
}
