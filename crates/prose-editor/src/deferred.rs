//! Actions that run outside the dispatch loop after a delay.
//!
//! The host drives time: it calls [`DeferredActions::take_due`] (through
//! `Editor::tick`) with its own `now`. Nothing here holds document positions
//! or nodes; a fired action works on whatever state is current by then.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::signals::VersionToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeferredKind {
    /// Hand the serialized document to the auto-save handler.
    Autosave,
    /// Recount words.
    WordCountRefresh,
}

impl DeferredKind {
    /// Auto-save waits for quiescence: every new request restarts the
    /// delay. Word counts refresh at most once per delay.
    fn restarts_on_reschedule(self) -> bool {
        matches!(self, DeferredKind::Autosave)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueAction {
    pub kind: DeferredKind,
    /// Version of the edit that last requested the action.
    pub version: VersionToken,
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    due: Instant,
    version: VersionToken,
}

/// At most one pending action per kind; the latest request wins.
#[derive(Debug, Default)]
pub struct DeferredActions {
    pending: BTreeMap<DeferredKind, Pending>,
}

impl DeferredActions {
    pub fn new() -> Self {
        DeferredActions::default()
    }

    pub fn schedule(&mut self, kind: DeferredKind, now: Instant, delay: Duration, version: VersionToken) {
        let due = now + delay;
        let due = match self.pending.get(&kind) {
            Some(existing) if !kind.restarts_on_reschedule() => existing.due,
            _ => due,
        };
        self.pending.insert(kind, Pending { due, version });
    }

    pub fn cancel(&mut self, kind: DeferredKind) -> bool {
        self.pending.remove(&kind).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, kind: DeferredKind) -> bool {
        self.pending.contains_key(&kind)
    }

    /// Earliest deadline, for hosts that sleep until the next action.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.values().map(|pending| pending.due).min()
    }

    /// Removes and returns the actions due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<DueAction> {
        let mut due: Vec<(Instant, DueAction)> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.due <= now)
            .map(|(kind, pending)| {
                (
                    pending.due,
                    DueAction {
                        kind: *kind,
                        version: pending.version,
                    },
                )
            })
            .collect();
        due.sort_by_key(|(at, action)| (*at, action.kind));
        for (_, action) in &due {
            self.pending.remove(&action.kind);
        }
        due.into_iter().map(|(_, action)| action).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn autosave_debounces_to_the_latest_edit() {
        let start = Instant::now();
        let mut actions = DeferredActions::new();
        actions.schedule(DeferredKind::Autosave, start, 2 * SECOND, VersionToken::new(1));
        actions.schedule(DeferredKind::Autosave, start + SECOND, 2 * SECOND, VersionToken::new(2));

        assert!(actions.take_due(start + 2 * SECOND).is_empty());
        assert_eq!(
            actions.take_due(start + 3 * SECOND),
            vec![DueAction {
                kind: DeferredKind::Autosave,
                version: VersionToken::new(2),
            }]
        );
        assert!(!actions.is_pending(DeferredKind::Autosave));
    }

    #[test]
    fn word_count_refresh_is_throttled() {
        let start = Instant::now();
        let mut actions = DeferredActions::new();
        actions.schedule(DeferredKind::WordCountRefresh, start, SECOND, VersionToken::new(1));
        actions.schedule(DeferredKind::WordCountRefresh, start + SECOND / 2, SECOND, VersionToken::new(2));

        assert_eq!(actions.next_due(), Some(start + SECOND));
        let due = actions.take_due(start + SECOND);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].version, VersionToken::new(2));
    }

    #[test]
    fn cancelled_actions_never_fire() {
        let start = Instant::now();
        let mut actions = DeferredActions::new();
        actions.schedule(DeferredKind::Autosave, start, SECOND, VersionToken::new(1));
        actions.schedule(DeferredKind::WordCountRefresh, start, SECOND, VersionToken::new(1));
        assert!(actions.cancel(DeferredKind::WordCountRefresh));
        actions.cancel_all();

        assert!(actions.take_due(start + 10 * SECOND).is_empty());
        assert_eq!(actions.next_due(), None);
    }
}
