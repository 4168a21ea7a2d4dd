use pretty_assertions::assert_eq;
use prose_model::{attrs, Attrs, Node, Selection};
use prose_state::{
    insert_text, mark_active, set_block_type, toggle_mark, wrap_in_list, Command, CommandBinding, EditorState,
    PluginRegistry, Transaction,
};
use prose_test_support::{code_block, doc, h, p, schema, strong, t};

fn state_with(doc: Node, anchor: usize, head: usize) -> EditorState {
    let state = EditorState::create(schema().clone(), doc, PluginRegistry::new().build()).expect("state");
    let selection = Selection::text(state.doc(), anchor, head).expect("selection");
    let mut tr = state.tr();
    tr.set_selection(selection).expect("selection");
    state.apply(tr).expect("applies")
}

fn dispatch(command: &Command, state: &EditorState) -> Option<EditorState> {
    let mut dispatched = None;
    let ran = {
        let mut sink = |tr: Transaction| dispatched = Some(tr);
        command(state, Some(&mut sink))
    };
    if !ran {
        return None;
    }
    dispatched.map(|tr| state.apply(tr).expect("command output applies"))
}

#[test]
fn toggle_mark_adds_then_removes() {
    let strong_type = schema().mark_type("strong").expect("strong").clone();
    let toggle = toggle_mark(strong_type.clone(), Attrs::new());
    let state = state_with(doc(vec![p(vec![t("Hello world")])]), 7, 12);

    let bold = dispatch(&toggle, &state).expect("applies");
    assert_eq!(bold.doc(), &doc(vec![p(vec![t("Hello "), strong("world")])]));
    assert!(mark_active(&bold, &strong_type));

    let plain = dispatch(&toggle, &bold).expect("applies");
    assert_eq!(plain.doc(), &doc(vec![p(vec![t("Hello world")])]));
    assert!(!mark_active(&plain, &strong_type));
}

#[test]
fn toggle_mark_on_a_cursor_sets_stored_marks() {
    let strong_type = schema().mark_type("strong").expect("strong").clone();
    let toggle = toggle_mark(strong_type.clone(), Attrs::new());
    let state = state_with(doc(vec![p(vec![t("ab")])]), 2, 2);

    assert!(toggle(&state, None));
    let next = dispatch(&toggle, &state).expect("applies");
    assert_eq!(next.doc(), state.doc());
    assert!(mark_active(&next, &strong_type));

    let typed = dispatch(&insert_text("X"), &next).expect("inserts");
    assert_eq!(typed.doc(), &doc(vec![p(vec![t("a"), strong("X"), t("b")])]));
}

#[test]
fn marks_are_refused_inside_code_blocks() {
    let em = schema().mark_type("em").expect("em").clone();
    let state = state_with(doc(vec![code_block("let x")]), 1, 4);
    assert!(!toggle_mark(em, Attrs::new())(&state, None));
}

#[test]
fn set_block_type_turns_paragraphs_into_headings() {
    let heading = schema().node_type("heading").expect("heading").clone();
    let binding = CommandBinding::block("H2", heading, attrs! { "level" => 2 });
    let state = state_with(doc(vec![p(vec![t("title")])]), 3, 3);
    assert!(!binding.is_active(&state));
    assert!(!binding.is_disabled(&state));

    let next = dispatch(binding.command(), &state).expect("applies");
    assert_eq!(next.doc(), &doc(vec![h(2, vec![t("title")])]));
    assert!(binding.is_active(&next));
    assert!(binding.is_disabled(&next));
}

#[test]
fn wrap_in_list_gives_each_block_an_item() {
    let bullet = schema().node_type("bullet_list").expect("bullet list").clone();
    let wrap = wrap_in_list(bullet, Attrs::new());
    let state = state_with(doc(vec![p(vec![t("a")]), p(vec![t("b")])]), 1, 4);

    let next = dispatch(&wrap, &state).expect("applies");
    let list = next.doc().child(0).expect("list");
    assert_eq!(next.doc().child_count(), 1);
    assert_eq!(list.type_name(), "bullet_list");
    assert_eq!(list.child_count(), 2);
    assert_eq!(next.doc().text_between(8, 9, "", ""), "b");
    assert_eq!((next.selection().anchor(), next.selection().head()), (3, 8));
    assert!(!wrap(&next, None));
}

#[test]
fn single_blocks_are_wrapped_in_place() {
    let ordered = schema().node_type("ordered_list").expect("ordered list").clone();
    let wrap = wrap_in_list(ordered, attrs! { "order" => 1 });
    let state = state_with(doc(vec![p(vec![t("one")])]), 2, 2);
    let next = dispatch(&wrap, &state).expect("applies");
    assert_eq!(next.doc().child(0).map(|n| n.type_name()), Some("ordered_list"));
    assert_eq!(next.selection().head(), 4);
}

#[test]
fn derived_bindings_leave_the_base_untouched() {
    let strong_type = schema().mark_type("strong").expect("strong").clone();
    let base = CommandBinding::mark("Bold", strong_type, Attrs::new());
    let derived = base.derive(|binding| binding.with_label("Strong").with_enabled(|_| false));
    let state = state_with(doc(vec![p(vec![t("x")])]), 1, 2);

    assert_eq!(base.label(), "Bold");
    assert_eq!(derived.label(), "Strong");
    assert!(!base.is_disabled(&state));
    assert!(derived.is_disabled(&state));
    assert!(!derived.run(&state, None));
    assert!(base.run(&state, None));
}
