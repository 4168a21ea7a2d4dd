use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use prose_config::{Config, PluginName};
use prose_markdown::{markdown_schema, MarkdownParser, MarkdownSerializer};
use prose_plugins::{
    refresh_word_count, register_features, stamp_created_dates, system_clock, toggle_todo, Clock, FeatureKeys,
};
use prose_state::{Command, EditorState, InputRules, PluginRegistry, Transaction};
use tracing::{debug, info, warn};

use crate::deferred::{DeferredActions, DeferredKind};
use crate::error::{EditorError, EditorResult};
use crate::signals::{Signal, SubscriptionId, Subscribers, VersionToken};

/// Source of monotonic time for scheduling deferred actions.
pub type MonotonicClock = Arc<dyn Fn() -> Instant + Send + Sync>;

/// Receives the serialized document when auto-save fires.
pub type AutosaveHandler = Box<dyn FnMut(&str, VersionToken) + Send>;

/// Everything [`Editor::create`] needs besides the initial text.
pub struct EditorOptions {
    pub config: Config,
    /// Wall clock for dates written into the document.
    pub clock: Clock,
    /// Clock used to schedule deferred actions.
    pub monotonic: MonotonicClock,
    /// Host plugins, applied before the feature plugins.
    pub plugins: PluginRegistry,
}

impl EditorOptions {
    pub fn new(config: Config) -> Self {
        EditorOptions {
            config,
            clock: system_clock(),
            monotonic: Arc::new(Instant::now),
            plugins: PluginRegistry::new(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_monotonic(mut self, monotonic: MonotonicClock) -> Self {
        self.monotonic = monotonic;
        self
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }
}

impl Default for EditorOptions {
    fn default() -> Self {
        EditorOptions::new(Config::default())
    }
}

/// One editor instance: the current state, the dispatch loop and the
/// actions deferred past it.
///
/// Every accepted transaction replaces the state and bumps the
/// [`VersionToken`]. After [`Editor::destroy`] every operation fails with
/// [`EditorError::Destroyed`].
pub struct Editor {
    state: Option<EditorState>,
    version: VersionToken,
    config: Config,
    features: FeatureKeys,
    input_rules: InputRules,
    serializer: MarkdownSerializer,
    clock: Clock,
    monotonic: MonotonicClock,
    deferred: DeferredActions,
    subscribers: Subscribers,
    autosave: Option<AutosaveHandler>,
}

impl Editor {
    /// Parses `markdown` and starts an editor over it with the host plugins
    /// of `options` followed by the features enabled in its config.
    pub fn create(markdown: &str, options: EditorOptions) -> EditorResult<Editor> {
        let EditorOptions {
            config,
            clock,
            monotonic,
            mut plugins,
        } = options;

        let parser = MarkdownParser::new(markdown_schema()?)?;
        let doc = parser.parse(markdown);
        let schema = parser.schema().clone();
        let input_rules = InputRules::markdown(&schema, config.editor.max_heading_level)?;
        let features = register_features(&mut plugins, &config, clock.clone())?;
        let state = EditorState::create(schema, doc, plugins.build())?;

        info!(
            plugins = state.plugins().len(),
            size = state.doc().content_size(),
            "editor created"
        );
        Ok(Editor {
            state: Some(state),
            version: VersionToken::default(),
            config,
            features,
            input_rules,
            serializer: MarkdownSerializer::new(),
            clock,
            monotonic,
            deferred: DeferredActions::new(),
            subscribers: Subscribers::default(),
            autosave: None,
        })
    }

    pub fn state(&self) -> EditorResult<&EditorState> {
        self.state.as_ref().ok_or(EditorError::Destroyed)
    }

    pub fn version(&self) -> VersionToken {
        self.version
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn features(&self) -> &FeatureKeys {
        &self.features
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.is_none()
    }

    /// The current document as markdown.
    pub fn markdown(&self) -> EditorResult<String> {
        Ok(self.serializer.serialize(self.state()?.doc()))
    }

    /// Applies `tr` to the current state. A rejected transaction leaves the
    /// state and version untouched.
    pub fn dispatch(&mut self, tr: Transaction) -> EditorResult<VersionToken> {
        let current = self.state.as_ref().ok_or(EditorError::Destroyed)?;
        let applied = current.apply_transaction(tr)?;
        for err in &applied.plugin_errors {
            warn!(plugin = %err.plugin, error = %err.message, "plugin kept its previous value");
        }

        let doc_changed = applied.transaction.doc_changed();
        let selection_changed = applied.state.selection() != current.selection();
        self.version = self.version.next();
        let state = self.state.insert(applied.state);
        debug!(version = %self.version, doc_changed, selection_changed, "dispatched transaction");

        if doc_changed {
            self.subscribers.notify(Signal::DocumentChanged, state, self.version);
        }
        if selection_changed {
            self.subscribers.notify(Signal::SelectionChanged, state, self.version);
        }
        self.schedule_deferred(doc_changed);
        Ok(self.version)
    }

    fn schedule_deferred(&mut self, doc_changed: bool) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let now = (self.monotonic)();
        if doc_changed && self.autosave.is_some() {
            self.deferred.schedule(
                DeferredKind::Autosave,
                now,
                self.config.editor.autosave_debounce(),
                self.version,
            );
        }
        let stale = self
            .features
            .word_count
            .and_then(|key| key.get_state(state))
            .is_some_and(|counts| counts.is_stale());
        if stale {
            self.deferred.schedule(
                DeferredKind::WordCountRefresh,
                now,
                self.config.word_count.throttle(),
                self.version,
            );
        }
    }

    /// Handles `text` typed over the selection: the first matching input
    /// rule wins, otherwise the text is inserted as is. New todo items get
    /// today's created date.
    pub fn handle_text_input(&mut self, text: &str) -> EditorResult<VersionToken> {
        let state = self.state()?;
        let selection = state.selection();
        let tr = match self.input_rules.run(state, selection.from(), selection.to(), text) {
            Some(tr) => tr,
            None => {
                let mut tr = state.tr();
                tr.replace_selection_with_text(text)?;
                tr
            }
        };
        let mut version = self.dispatch(tr)?;

        if self.config.plugins.is_enabled(PluginName::Todo) {
            let now = (self.clock)();
            let stamp = stamp_created_dates(self.state()?, &self.config.todo.date_format, now);
            if let Some(tr) = stamp {
                version = self.dispatch(tr)?;
            }
        }
        Ok(version)
    }

    /// Runs `command` against the current state and dispatches what it
    /// produces. Returns whether the command applied.
    pub fn run_command(&mut self, command: &Command) -> EditorResult<bool> {
        let state = self.state()?;
        let mut produced: Vec<Transaction> = Vec::new();
        let mut collect = |tr: Transaction| produced.push(tr);
        let applied = command(state, Some(&mut collect));
        for tr in produced {
            self.dispatch(tr)?;
        }
        Ok(applied)
    }

    /// Clicks the widget `key` at `pos`. Returns false when no such widget
    /// exists or its action does nothing in the current state.
    pub fn click_widget(&mut self, pos: usize, key: &str) -> EditorResult<bool> {
        let state = self.state()?;
        let Some(tr) = state.widget_at(pos, key).and_then(|widget| widget.click(state)) else {
            debug!(pos, key, "widget click ignored");
            return Ok(false);
        };
        self.dispatch(tr)?;
        Ok(true)
    }

    /// Checks or unchecks the todo item at `pos`, stamping dates.
    pub fn toggle_todo(&mut self, pos: usize) -> EditorResult<VersionToken> {
        let now = (self.clock)();
        let tr = toggle_todo(self.state()?, pos, &self.config.todo.date_format, now)?;
        self.dispatch(tr)
    }

    pub fn on_change<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&EditorState, VersionToken) + Send + 'static,
    {
        self.subscribers.subscribe(Signal::DocumentChanged, Box::new(listener))
    }

    pub fn on_selection<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&EditorState, VersionToken) + Send + 'static,
    {
        self.subscribers.subscribe(Signal::SelectionChanged, Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Installs the auto-save handler. Document changes from now on schedule
    /// a save once edits have been quiet for the configured debounce.
    pub fn set_autosave<F>(&mut self, handler: F)
    where
        F: FnMut(&str, VersionToken) + Send + 'static,
    {
        self.autosave = Some(Box::new(handler));
    }

    /// Removes the auto-save handler and any save still pending.
    pub fn clear_autosave(&mut self) {
        self.autosave = None;
        self.deferred.cancel(DeferredKind::Autosave);
    }

    pub fn is_pending(&self, kind: DeferredKind) -> bool {
        self.deferred.is_pending(kind)
    }

    /// When the host should call [`Editor::tick`] next.
    pub fn next_due(&self) -> Option<Instant> {
        self.deferred.next_due()
    }

    /// Runs the deferred actions due at `now` against the current state and
    /// returns what ran.
    pub fn tick(&mut self, now: Instant) -> EditorResult<Vec<DeferredKind>> {
        if self.is_destroyed() {
            return Ok(Vec::new());
        }
        let mut ran = Vec::new();
        for action in self.deferred.take_due(now) {
            match action.kind {
                DeferredKind::Autosave => {
                    let markdown = self.markdown()?;
                    if let Some(handler) = self.autosave.as_mut() {
                        debug!(version = %self.version, requested = %action.version, "auto-save");
                        handler(&markdown, self.version);
                    }
                }
                DeferredKind::WordCountRefresh => {
                    let Some(key) = self.features.word_count else {
                        continue;
                    };
                    let tr = refresh_word_count(self.state()?, &key);
                    self.dispatch(tr)?;
                }
            }
            ran.push(action.kind);
        }
        Ok(ran)
    }

    /// Tears the editor down: pending actions are cancelled, listeners are
    /// dropped and the state is discarded.
    pub fn destroy(&mut self) {
        if self.state.take().is_some() {
            self.deferred.cancel_all();
            self.subscribers.clear();
            self.autosave = None;
            info!(version = %self.version, "editor destroyed");
        }
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("version", &self.version)
            .field("state", &self.state)
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}
