//! Host embedding API for the prose editor.
//!
//! [`Editor`] owns the single current [`EditorState`](prose_state::EditorState)
//! and applies transactions to it one at a time. Hosts observe changes through
//! subscriptions carrying a [`VersionToken`] and drive deferred work
//! (auto-save, word-count refresh) by calling [`Editor::tick`] with their own
//! clock. Deferred work re-enters only through new transactions against the
//! state current at that time.

mod deferred;
mod editor;
mod error;
mod signals;

pub use deferred::{DeferredActions, DeferredKind, DueAction};
pub use editor::{AutosaveHandler, Editor, EditorOptions, MonotonicClock};
pub use error::{EditorError, EditorResult, ExitCode};
pub use signals::{Listener, Signal, SubscriptionId, VersionToken};
