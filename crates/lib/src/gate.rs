//! Single-slot submission gate: at most one chat request in flight.

use std::sync::atomic::{AtomicBool, Ordering};

/// Busy flag guarding chat submission. Claimed via [`SubmissionGate::try_acquire`];
/// the returned permit releases the flag on drop, so the gate cannot stay held
/// past any exit path, including a cancelled request future.
#[derive(Debug, Default)]
pub struct SubmissionGate {
    busy: AtomicBool,
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// True while a permit is held.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Claim the gate. `None` when a request is already outstanding.
    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| GatePermit { gate: self })
    }
}

/// Held for the duration of one chat exchange.
#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a SubmissionGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_and_admits_one_permit() {
        let gate = SubmissionGate::new();
        assert!(!gate.is_busy());

        let permit = gate.try_acquire().expect("first acquire");
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());

        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }
}
