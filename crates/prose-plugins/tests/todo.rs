use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use prose_markdown::serialize;
use prose_model::Node;
use prose_plugins::{
    fixed_clock, stamp_created_dates, toggle_hide_completed, toggle_todo, HideCompleted, TodoList,
    CHECKBOX_WIDGET_KEY, HIDDEN_CLASS,
};
use prose_state::{EditorState, PluginKey, PluginRegistry};
use prose_test_support::{md, schema};

const DATE_FORMAT: &str = "%m/%d/%y";

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 9)
        .and_then(|date| date.and_hms_opt(7, 5, 0))
        .expect("valid timestamp")
}

struct Fixture {
    state: EditorState,
    todo: PluginKey<TodoList>,
    hide: PluginKey<HideCompleted>,
}

fn fixture(document: Node) -> Fixture {
    let mut registry = PluginRegistry::new();
    let todo = registry.register(TodoList::new(DATE_FORMAT, fixed_clock(now())));
    let hide = registry.register(HideCompleted::new(false));
    let state = EditorState::create(schema().clone(), document, registry.build()).expect("plugins initialize");
    Fixture { state, todo, hide }
}

// list 0..22: "buy milk" item 1..13, "ship" item 13..21
fn shopping() -> Node {
    md("- [ ] buy milk\n- [x] {01/02/24-01/05/24} ship")
}

#[test]
fn entries_carry_state_and_dates() {
    let fx = fixture(shopping());
    let entries = fx.todo.get_state(&fx.state).expect("state").entries().to_vec();

    assert_eq!(entries.len(), 2);
    assert_eq!((entries[0].pos, entries[0].checked, entries[0].text.as_str()), (1, false, "buy milk"));
    assert_eq!(entries[0].created, None);
    assert_eq!((entries[1].pos, entries[1].checked, entries[1].text.as_str()), (13, true, "ship"));
    assert_eq!(entries[1].created.as_deref(), Some("01/02/24"));
    assert_eq!(entries[1].closed.as_deref(), Some("01/05/24"));
}

#[test]
fn checkbox_widget_toggles_and_stamps_dates() {
    let fx = fixture(shopping());

    let checkbox = fx.state.widget_at(2, CHECKBOX_WIDGET_KEY).expect("checkbox");
    assert_eq!(checkbox.label(), "[ ]");
    let next = fx.state.apply(checkbox.click(&fx.state).expect("toggle")).expect("applies");

    assert_eq!(
        serialize(next.doc()),
        "- [x] {03/09/24-03/09/24} buy milk\n- [x] {01/02/24-01/05/24} ship"
    );
    assert_eq!(
        next.widget_at(2, CHECKBOX_WIDGET_KEY).map(|w| w.label().to_string()),
        Some("[x]".to_string())
    );
}

#[test]
fn unchecking_clears_closed_date_and_keeps_created() {
    let fx = fixture(shopping());

    let tr = toggle_todo(&fx.state, 13, DATE_FORMAT, now()).expect("todo at 13");
    let next = fx.state.apply(tr).expect("applies");

    let entry = fx.todo.get_state(&next).expect("state").entries()[1].clone();
    assert!(!entry.checked);
    assert_eq!(entry.created.as_deref(), Some("01/02/24"));
    assert_eq!(entry.closed, None);
    assert_eq!(serialize(next.doc()), "- [ ] buy milk\n- [ ] {01/02/24} ship");
}

#[test]
fn toggling_a_non_todo_position_is_rejected() {
    let fx = fixture(md("plain paragraph"));
    assert!(toggle_todo(&fx.state, 0, DATE_FORMAT, now()).is_err());
}

#[test]
fn missing_created_dates_are_stamped_once() {
    let fx = fixture(shopping());

    let tr = stamp_created_dates(&fx.state, DATE_FORMAT, now()).expect("one item lacks a date");
    let next = fx.state.apply(tr).expect("applies");
    assert_eq!(
        serialize(next.doc()),
        "- [ ] {03/09/24} buy milk\n- [x] {01/02/24-01/05/24} ship"
    );
    assert!(stamp_created_dates(&next, DATE_FORMAT, now()).is_none());
}

#[test]
fn hide_completed_toggle_hides_checked_items() {
    let fx = fixture(shopping());
    let hidden_nodes = |state: &EditorState| -> Vec<(usize, usize)> {
        state
            .decorations_for(0, state.doc().content_size())
            .into_iter()
            .filter(|deco| deco.is_node() && deco.attr("class") == Some(HIDDEN_CLASS))
            .map(|deco| (deco.from(), deco.to()))
            .collect()
    };
    assert!(hidden_nodes(&fx.state).is_empty());

    let hiding = fx.state.apply(toggle_hide_completed(&fx.state, &fx.hide)).expect("applies");
    assert!(fx.hide.get_state(&hiding).expect("state").is_hiding());
    assert_eq!(hidden_nodes(&hiding), vec![(13, 21)]);

    let tr = toggle_todo(&hiding, 1, DATE_FORMAT, now()).expect("todo at 1");
    let both_done = hiding.apply(tr).expect("applies");
    let completed = fx.hide.get_state(&both_done).expect("state").completed_ranges();
    assert_eq!(completed, vec![(1, 13), (13, 21)]);

    let shown = both_done
        .apply(toggle_hide_completed(&both_done, &fx.hide))
        .expect("applies");
    assert!(hidden_nodes(&shown).is_empty());
}
