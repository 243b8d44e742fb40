//! The lifecycle enum shared by `ServiceManager` and `ServiceHost` (§3),
//! and its atomic storage helper.
//!
//! `state` is read far more often than it is written (every broadcast
//! samples it), so it is stored as a single `AtomicU8` rather than behind a
//! lock — matching the "volatile word, monotonic reads" discipline in §5.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum State {
    Ready = 0,
    Start = 1,
    ShuttingDown = 2,
    Stop = 3,
}

impl State {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => State::Ready,
            1 => State::Start,
            2 => State::ShuttingDown,
            _ => State::Stop,
        }
    }
}

/// An `AtomicU8`-backed `State` cell enforcing the monotonic progression
/// Ready < Start < ShuttingDown < Stop.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(initial: State) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> State {
        State::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Advances to `next` iff `next` is strictly greater than the current
    /// state, i.e. the transition never goes backward. Returns whether the
    /// store happened.
    ///
    /// Races against a concurrent `advance_to` via `compare_exchange` (§5)
    /// rather than a separate load-then-store, so two callers racing to
    /// advance past the same state can't both observe the pre-transition
    /// value and both believe they made the change.
    pub fn advance_to(&self, next: State) -> bool {
        let next = next as u8;
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            if next <= current {
                return false;
            }
            match self
                .0
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_spec_enum_order() {
        assert!(State::Ready < State::Start);
        assert!(State::Start < State::ShuttingDown);
        assert!(State::ShuttingDown < State::Stop);
    }

    #[test]
    fn advance_to_never_goes_backward() {
        let cell = StateCell::new(State::Ready);
        assert!(cell.advance_to(State::Start));
        assert_eq!(cell.get(), State::Start);
        assert!(!cell.advance_to(State::Ready), "must not regress");
        assert_eq!(cell.get(), State::Start);
        assert!(cell.advance_to(State::ShuttingDown));
        assert!(cell.advance_to(State::Stop));
        assert!(!cell.advance_to(State::Stop), "Stop is absorbing");
    }

    #[test]
    fn advance_to_under_a_race_has_exactly_one_winner() {
        let cell = std::sync::Arc::new(StateCell::new(State::Start));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || cell.advance_to(State::ShuttingDown))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1, "exactly one racer should observe the transition");
        assert_eq!(cell.get(), State::ShuttingDown);
    }
}
