use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use prose_model::{Node, Selection};
use prose_plugins::{
    fixed_clock, TableOfContents, VariableContext, VariableDef, VariableDefs, VariableRef, Variables,
    VARIABLE_WIDGET_KEY,
};
use prose_state::{EditorState, PluginKey, PluginRegistry, Transaction};
use prose_test_support::{doc, h, p, schema, t};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|date| date.and_hms_opt(7, 5, 0))
        .expect("valid timestamp")
}

// "Plan" 0..6, paragraph 6..34, "Steps" 34..41, "{:toc}" paragraph 41..49
fn notes() -> Node {
    doc(vec![
        h(1, vec![t("Plan")]),
        p(vec![t("Today {:date} by {:author}")]),
        h(2, vec![t("Steps")]),
        p(vec![t("{:toc}")]),
    ])
}

fn fixture(document: Node) -> (EditorState, PluginKey<Variables>) {
    let mut registry = PluginRegistry::new();
    let toc = registry.register(TableOfContents);
    let mut defs = VariableDefs::builtin(Some(toc));
    defs.insert("author", VariableDef::constant("who wrote this", "Ada"));
    let key = registry.register(Variables::new(defs, fixed_clock(now())).expect("pattern compiles"));
    let state = EditorState::create(schema().clone(), document, registry.build()).expect("plugins initialize");
    (state, key)
}

fn label(state: &EditorState, pos: usize) -> Option<String> {
    state
        .widget_at(pos, VARIABLE_WIDGET_KEY)
        .map(|widget| widget.label().to_string())
}

fn typing(state: &EditorState, pos: usize, text: &str) -> Transaction {
    let mut tr = state.tr();
    tr.insert_text(text, pos).expect("insert");
    let cursor = Selection::cursor(tr.doc(), pos + text.chars().count()).expect("cursor");
    tr.set_selection(cursor).expect("selection");
    tr
}

fn reference(pos: usize, width: usize, name: &str) -> VariableRef {
    VariableRef {
        pos,
        width,
        name: name.to_string(),
    }
}

#[test]
fn references_become_widgets_with_current_values() {
    let (state, key) = fixture(notes());

    assert_eq!(
        key.get_state(&state).expect("state").refs().to_vec(),
        vec![reference(13, 7, "date"), reference(24, 9, "author"), reference(42, 6, "toc")]
    );
    assert_eq!(label(&state, 13).as_deref(), Some("20240309"));
    assert_eq!(label(&state, 24).as_deref(), Some("Ada"));
    assert_eq!(label(&state, 42).as_deref(), Some("1: Plan\n1.1: Steps"));
    assert!(state
        .decorations_for(13, 20)
        .iter()
        .any(|deco| deco.is_inline() && deco.attr("class") == Some("var-anchor") && deco.to() == 20));
}

#[test]
fn unrelated_edits_shift_references() {
    let (state, key) = fixture(notes());

    let edited = state.apply(typing(&state, 1, "X")).expect("applies");

    assert_eq!(
        key.get_state(&edited).expect("state").refs().to_vec(),
        vec![reference(14, 7, "date"), reference(25, 9, "author"), reference(43, 6, "toc")]
    );
    assert_eq!(label(&edited, 43).as_deref(), Some("1: XPlan\n1.1: Steps"));
}

#[test]
fn breaking_a_reference_rescans_the_document() {
    let (state, key) = fixture(notes());

    let edited = state.apply(typing(&state, 15, "x")).expect("applies");

    assert_eq!(
        key.get_state(&edited).expect("state").refs().to_vec(),
        vec![reference(25, 9, "author"), reference(43, 6, "toc")]
    );
    assert_eq!(label(&edited, 13), None);
}

#[test]
fn references_typed_away_from_the_cursor_are_found() {
    let (state, key) = fixture(doc(vec![p(vec![t("plain")]), p(vec![t("x")])]));

    let mut tr = state.tr();
    tr.insert_text(" {:date}", 9).expect("insert");
    assert_eq!(tr.selection().from(), 1);
    let edited = state.apply(tr).expect("applies");

    assert_eq!(key.get_state(&edited).expect("state").refs().to_vec(), vec![reference(10, 7, "date")]);
    assert_eq!(label(&edited, 10).as_deref(), Some("20240309"));
}

#[test]
fn unknown_and_embedded_references_are_left_alone() {
    let (state, key) = fixture(doc(vec![p(vec![t("{:nope} and x{:date} and {:date}s")])]));
    assert!(key.get_state(&state).expect("state").refs().is_empty());
}

#[test]
fn help_lists_every_other_variable() {
    let (state, _) = fixture(notes());
    let mut defs = VariableDefs::builtin(None);
    defs.insert("author", VariableDef::constant("who wrote this", "Ada"));
    let cx = VariableContext { state: &state, now: now() };

    let help = defs.evaluate("help", &cx).expect("help is always defined");
    let lines: Vec<&str> = help.lines().collect();
    assert_eq!(lines[0], "{:author} : who wrote this : Ada");
    assert_eq!(lines[1], "{:date} : the current date : 20240309");
    assert_eq!(lines[2], "{:time} : the current time : 07:05:00");
    assert!(!help.contains("{:help}"));
}

#[test]
fn configured_constants_and_word_counts() {
    let values = [("project".to_string(), "prose".to_string())];
    let defs = VariableDefs::builtin(None).with_constants(values.iter().map(|(k, v)| (k, v)));
    let mut registry = PluginRegistry::new();
    let key = registry.register(Variables::new(defs, fixed_clock(now())).expect("pattern compiles"));
    let state = EditorState::create(
        schema().clone(),
        doc(vec![p(vec![t("{:project} has {:words}")])]),
        registry.build(),
    )
    .expect("plugins initialize");

    assert_eq!(key.get_state(&state).expect("state").refs().len(), 2);
    assert_eq!(label(&state, 1).as_deref(), Some("prose"));
    assert_eq!(label(&state, 16).as_deref(), Some("3"));
}
