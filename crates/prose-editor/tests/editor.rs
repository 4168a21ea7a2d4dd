use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use prose_editor::{DeferredKind, Editor, EditorError, EditorOptions, ExitCode, VersionToken};
use prose_model::Selection;
use prose_plugins::{fixed_clock, CHECKBOX_WIDGET_KEY};
use prose_state::insert_text;
use prose_test_support::test_config;

/// A monotonic clock the test moves by hand.
#[derive(Clone)]
struct ManualClock {
    start: Instant,
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    fn new() -> Self {
        let start = Instant::now();
        ManualClock {
            start,
            now: Arc::new(Mutex::new(start)),
        }
    }

    fn at(&self, millis: u64) -> Instant {
        self.start + Duration::from_millis(millis)
    }

    fn set(&self, millis: u64) {
        *self.now.lock().expect("clock lock") = self.at(millis);
    }
}

fn options(clock: &ManualClock) -> EditorOptions {
    let wall = fixed_clock(
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(7, 5, 0))
            .expect("valid timestamp"),
    );
    let now = clock.now.clone();
    EditorOptions::new(test_config())
        .with_clock(wall)
        .with_monotonic(Arc::new(move || *now.lock().expect("clock lock")))
}

fn editor(markdown: &str) -> (Editor, ManualClock) {
    let clock = ManualClock::new();
    let editor = Editor::create(markdown, options(&clock)).expect("editor starts");
    (editor, clock)
}

fn type_chars(editor: &mut Editor, text: &str) {
    for ch in text.chars() {
        editor.handle_text_input(&ch.to_string()).expect("typing applies");
    }
}

fn move_cursor(editor: &mut Editor, pos: usize) {
    let state = editor.state().expect("live editor");
    let mut tr = state.tr();
    tr.set_selection(Selection::cursor(state.doc(), pos).expect("cursor"))
        .expect("selection");
    editor.dispatch(tr).expect("selection applies");
}

#[test]
fn typing_bumps_the_version_and_notifies_listeners() {
    let (mut editor, _) = editor("");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    editor.on_change(move |state, version| {
        sink.lock().expect("sink").push((state.doc().text_content(), version.value()));
    });

    type_chars(&mut editor, "hey");

    assert_eq!(editor.version(), VersionToken::new(3));
    assert_eq!(editor.markdown().expect("live editor"), "hey");
    assert_eq!(
        *seen.lock().expect("sink"),
        vec![("h".to_string(), 1), ("he".to_string(), 2), ("hey".to_string(), 3)]
    );
}

#[test]
fn selection_moves_notify_only_selection_listeners() {
    let (mut editor, _) = editor("hello world");
    let changes = Arc::new(Mutex::new(0));
    let moves = Arc::new(Mutex::new(Vec::new()));
    let change_sink = changes.clone();
    let move_sink = moves.clone();
    editor.on_change(move |_, _| *change_sink.lock().expect("sink") += 1);
    let id = editor.on_selection(move |state, _| move_sink.lock().expect("sink").push(state.selection().head()));

    move_cursor(&mut editor, 4);
    assert!(editor.unsubscribe(id));
    move_cursor(&mut editor, 6);

    assert_eq!(*changes.lock().expect("sink"), 0);
    assert_eq!(*moves.lock().expect("sink"), vec![4]);
    assert!(!editor.unsubscribe(id));
}

#[test]
fn stale_transactions_are_rejected_without_touching_the_state() {
    let (mut editor, _) = editor("draft");
    let stale = {
        let mut tr = editor.state().expect("live editor").tr();
        tr.insert_text("old ", 1).expect("insert");
        tr
    };
    type_chars(&mut editor, "A");
    let version = editor.version();

    let err = editor.dispatch(stale).expect_err("stale transaction");

    assert!(matches!(err, EditorError::Transaction(_)));
    assert_eq!(err.exit_code(), ExitCode::Rejected);
    assert_eq!(editor.version(), version);
    assert_eq!(editor.markdown().expect("live editor"), "Adraft");
}

#[test]
fn input_rules_build_todos_with_created_dates() {
    let (mut editor, _) = editor("");

    type_chars(&mut editor, "[ ] call");

    assert_eq!(editor.markdown().expect("live editor"), "- [ ] {03/09/24} call");
    let key = editor.features().todo.expect("todo enabled");
    let todos = key.get_state(editor.state().expect("live editor")).expect("todo state");
    assert_eq!(todos.entries()[0].created.as_deref(), Some("03/09/24"));
}

#[test]
fn commands_and_widget_clicks_dispatch_transactions() {
    let (mut editor, _) = editor("- [ ] task");

    // todo_list 0, item 1, checkbox before the item's paragraph.
    assert!(editor.click_widget(2, CHECKBOX_WIDGET_KEY).expect("live editor"));
    assert_eq!(editor.markdown().expect("live editor"), "- [x] {03/09/24-03/09/24} task");
    assert!(!editor.click_widget(5, CHECKBOX_WIDGET_KEY).expect("live editor"));

    move_cursor(&mut editor, 7);
    assert!(editor.run_command(&insert_text("s")).expect("live editor"));
    assert_eq!(editor.markdown().expect("live editor"), "- [x] {03/09/24-03/09/24} tasks");
}

#[test]
fn autosave_runs_once_on_the_latest_content() {
    let clock = ManualClock::new();
    let mut opts = options(&clock);
    opts.config.editor.autosave_debounce_ms = 100;
    let mut editor = Editor::create("", opts).expect("editor starts");
    let saved = Arc::new(Mutex::new(Vec::new()));
    let sink = saved.clone();
    editor.set_autosave(move |markdown, version| sink.lock().expect("sink").push((markdown.to_string(), version)));

    type_chars(&mut editor, "a");
    clock.set(50);
    type_chars(&mut editor, "b");

    assert!(editor.tick(clock.at(120)).expect("tick").is_empty());
    assert_eq!(editor.next_due(), Some(clock.at(150)));
    assert_eq!(editor.tick(clock.at(150)).expect("tick"), vec![DeferredKind::Autosave]);
    assert!(editor.tick(clock.at(400)).expect("tick").is_empty());
    assert_eq!(*saved.lock().expect("sink"), vec![("ab".to_string(), VersionToken::new(2))]);
}

#[test]
fn word_counts_refresh_when_ticked() {
    let clock = ManualClock::new();
    let mut opts = options(&clock);
    opts.config.word_count.throttle_ms = 200;
    let mut editor = Editor::create("one two", opts).expect("editor starts");
    let key = editor.features().word_count.expect("word count enabled");

    move_cursor(&mut editor, 8);
    editor.handle_text_input(" three").expect("typing applies");

    let counts = key.get_state(editor.state().expect("live editor")).expect("counts");
    assert!(counts.is_stale());
    assert_eq!(counts.total(), 2);
    assert!(editor.is_pending(DeferredKind::WordCountRefresh));

    let version = editor.version();
    assert_eq!(
        editor.tick(clock.at(200)).expect("tick"),
        vec![DeferredKind::WordCountRefresh]
    );

    let counts = key.get_state(editor.state().expect("live editor")).expect("counts");
    assert!(!counts.is_stale());
    assert_eq!(counts.total(), 3);
    assert_eq!(editor.version(), VersionToken::new(version.value() + 1));
    assert!(!editor.is_pending(DeferredKind::WordCountRefresh));
}

#[test]
fn destroy_cancels_pending_work() {
    let (mut editor, clock) = editor("notes");
    let saved = Arc::new(Mutex::new(0));
    let sink = saved.clone();
    editor.set_autosave(move |_, _| *sink.lock().expect("sink") += 1);
    type_chars(&mut editor, "x");
    assert!(editor.is_pending(DeferredKind::Autosave));

    editor.destroy();

    assert!(editor.is_destroyed());
    assert!(editor.tick(clock.at(60_000)).expect("tick").is_empty());
    assert_eq!(*saved.lock().expect("sink"), 0);
    let err = editor.handle_text_input("y").expect_err("destroyed");
    assert_eq!(err.exit_code(), ExitCode::Destroyed);
    assert!(matches!(editor.markdown(), Err(EditorError::Destroyed)));
}

#[test]
fn invalid_markdown_never_fails_creation() {
    let (editor, _) = editor("```\nunterminated");
    assert!(editor.state().expect("live editor").doc().check().is_ok());
}
