//! [`LocatingGate`] – single-flight guard for detection passes.
//!
//! At most one pass may be in flight.  [`LocatingGate::try_begin`] hands out
//! a [`PassToken`] only while no other token is alive; the token releases
//! the gate when dropped, including on early return or panic unwind.
//!
//! # Example
//!
//! ```rust
//! use umbra_runtime::gate::LocatingGate;
//!
//! let gate = LocatingGate::new();
//!
//! let token = gate.try_begin().expect("gate is idle");
//! assert!(gate.try_begin().is_none()); // second scan is dropped
//!
//! drop(token);
//! assert!(gate.try_begin().is_some());
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

// ─────────────────────────────────────────────────────────────────────────────
// LocatingGate
// ─────────────────────────────────────────────────────────────────────────────

/// Shared "pass in progress" flag.  Clone it cheaply – clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct LocatingGate {
    busy: Arc<AtomicBool>,
}

impl LocatingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate.  Returns `None` when another pass holds it.
    pub fn try_begin(&self) -> Option<PassToken> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassToken {
                busy: Arc::clone(&self.busy),
            })
    }

    /// `true` while a [`PassToken`] is alive.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PassToken
// ─────────────────────────────────────────────────────────────────────────────

/// Proof of owning the single in-flight pass.  Releases the gate on drop.
#[derive(Debug)]
pub struct PassToken {
    busy: Arc<AtomicBool>,
}

impl Drop for PassToken {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_gate_hands_out_a_token() {
        let gate = LocatingGate::new();
        assert!(!gate.is_busy());
        let _token = gate.try_begin().unwrap();
        assert!(gate.is_busy());
    }

    #[test]
    fn second_claim_is_refused_while_token_lives() {
        let gate = LocatingGate::new();
        let _token = gate.try_begin().unwrap();
        assert!(gate.try_begin().is_none());
        assert!(gate.clone().try_begin().is_none());
    }

    #[test]
    fn dropping_token_releases_gate() {
        let gate = LocatingGate::new();
        drop(gate.try_begin().unwrap());
        assert!(!gate.is_busy());
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn token_is_released_on_panic_unwind() {
        let gate = LocatingGate::new();
        let cloned = gate.clone();
        let result = std::panic::catch_unwind(move || {
            let _token = cloned.try_begin().unwrap();
            panic!("pass blew up");
        });
        assert!(result.is_err());
        assert!(!gate.is_busy());
    }

    #[test]
    fn only_one_thread_wins_the_race() {
        let gate = LocatingGate::new();
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    gate.try_begin()
                })
            })
            .collect();
        let tokens: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        assert_eq!(tokens.iter().filter(|t| t.is_some()).count(), 1);
    }
}
