//! Edge-triggered free-period gate.
//!
//! The gate only signals. Fetching or generating free-period content is
//! someone else's job.

use crate::PeriodKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Unlocked,
}

/// Emitted once per state change, never while the state holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    /// A class just ended (or the day started free).
    Unlocked,
    /// A class just started.
    Locked,
}

/// Tracks the previous period kind and reports transitions.
#[derive(Debug, Clone)]
pub struct FreePeriodGate {
    state: GateState,
}

impl Default for FreePeriodGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FreePeriodGate {
    /// Starts locked, so a first observation of a free period unlocks.
    pub fn new() -> Self {
        Self {
            state: GateState::Locked,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Feed the latest period kind. Returns a signal only on an edge.
    pub fn observe(&mut self, kind: PeriodKind) -> Option<GateSignal> {
        let next = if kind.is_free() {
            GateState::Unlocked
        } else {
            GateState::Locked
        };
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(match next {
            GateState::Unlocked => GateSignal::Unlocked,
            GateState::Locked => GateSignal::Locked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_free_unlocks_once() {
        let mut gate = FreePeriodGate::new();
        assert_eq!(gate.observe(PeriodKind::Free), Some(GateSignal::Unlocked));
        assert_eq!(gate.observe(PeriodKind::Free), None);
        assert_eq!(gate.observe(PeriodKind::Break), None);
        assert_eq!(gate.observe(PeriodKind::Holiday), None);
        assert_eq!(gate.state(), GateState::Unlocked);
    }

    #[test]
    fn test_observe_class_locks() {
        let mut gate = FreePeriodGate::new();
        assert_eq!(gate.observe(PeriodKind::Class), None);
        gate.observe(PeriodKind::Free);
        assert_eq!(gate.observe(PeriodKind::Class), Some(GateSignal::Locked));
        assert_eq!(gate.observe(PeriodKind::Class), None);
    }

    #[test]
    fn test_one_unlock_per_transition() {
        let mut gate = FreePeriodGate::new();
        let kinds = [
            PeriodKind::Class,
            PeriodKind::Free,
            PeriodKind::Free,
            PeriodKind::Class,
            PeriodKind::Break,
            PeriodKind::Holiday,
            PeriodKind::Class,
            PeriodKind::Free,
        ];
        let unlocks = kinds
            .iter()
            .filter_map(|k| gate.observe(*k))
            .filter(|s| *s == GateSignal::Unlocked)
            .count();
        assert_eq!(unlocks, 3);
    }
}
