//! Change and selection notifications.

use std::fmt;

use prose_state::EditorState;

/// Monotonic version of the editor's state. A token older than
/// `Editor::version` refers to a superseded state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionToken(u64);

impl VersionToken {
    pub fn new(value: u64) -> Self {
        VersionToken(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        VersionToken(self.0 + 1)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    DocumentChanged,
    SelectionChanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&EditorState, VersionToken) + Send>;

/// Listeners keyed by the signal they follow.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Signal, Listener)>,
}

impl Subscribers {
    pub fn subscribe(&mut self, signal: Signal, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, signal, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn notify(&mut self, signal: Signal, state: &EditorState, version: VersionToken) {
        for (_, wanted, listener) in &mut self.listeners {
            if *wanted == signal {
                listener(state, version);
            }
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
