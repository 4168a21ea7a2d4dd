use pretty_assertions::assert_eq;
use prose_model::{attrs, Node};
use prose_state::{
    ApplyContext, EditorState, PluginApplyError, PluginKey, PluginRegistry, PluginSpec, TransactionError, ADD_TO_HISTORY,
};
use prose_test_support::{doc, md, p, schema, t};
use prose_transform::Step;

/// Holds the last value addressed to it.
struct Recorder;

impl PluginSpec for Recorder {
    type State = String;
    type Meta = String;

    fn name(&self) -> &str {
        "recorder"
    }

    fn init(&self, _state: &EditorState) -> String {
        "initial".to_string()
    }

    fn apply(&self, cx: ApplyContext<'_, String>, value: &String) -> Result<String, PluginApplyError> {
        Ok(cx.meta.cloned().unwrap_or_else(|| value.clone()))
    }
}

/// Reads the recorder's value through its key.
struct Observer {
    recorder: PluginKey<Recorder>,
}

#[derive(Debug, PartialEq)]
struct Seen {
    new_value: Option<String>,
    old_value: Option<String>,
    had_meta: bool,
}

impl PluginSpec for Observer {
    type State = Option<Seen>;
    type Meta = ();

    fn name(&self) -> &str {
        "observer"
    }

    fn init(&self, _state: &EditorState) -> Option<Seen> {
        None
    }

    fn apply(&self, cx: ApplyContext<'_, ()>, _value: &Option<Seen>) -> Result<Option<Seen>, PluginApplyError> {
        Ok(Some(Seen {
            new_value: self.recorder.get_state(cx.new_state).cloned(),
            old_value: self.recorder.get_state(cx.old_state).cloned(),
            had_meta: cx.meta.is_some(),
        }))
    }
}

/// Counts transactions without looking at other plugins.
struct Counter;

impl PluginSpec for Counter {
    type State = usize;
    type Meta = ();

    fn name(&self) -> &str {
        "counter"
    }

    fn init(&self, _state: &EditorState) -> usize {
        0
    }

    fn apply(&self, _cx: ApplyContext<'_, ()>, value: &usize) -> Result<usize, PluginApplyError> {
        Ok(value + 1)
    }
}

/// Fails on every transaction that changes the document.
struct Faulty {
    panics: bool,
}

impl PluginSpec for Faulty {
    type State = usize;
    type Meta = ();

    fn name(&self) -> &str {
        "faulty"
    }

    fn init(&self, _state: &EditorState) -> usize {
        7
    }

    fn apply(&self, cx: ApplyContext<'_, ()>, value: &usize) -> Result<usize, PluginApplyError> {
        if !cx.doc_changed() {
            return Ok(*value);
        }
        if self.panics {
            panic!("boom");
        }
        Err(PluginApplyError::new("faulty", "refused"))
    }
}

fn state_with(doc: Node, registry: PluginRegistry) -> EditorState {
    EditorState::create(schema().clone(), doc, registry.build()).expect("plugins initialize")
}

#[test]
fn later_plugins_see_updated_values_only_through_keys() {
    let mut registry = PluginRegistry::new();
    let recorder = registry.register(Recorder);
    let observer = registry.register(Observer { recorder });
    let counter = registry.register(Counter);
    let state = state_with(md("text"), registry);

    let mut tr = state.tr();
    tr.set_meta(&recorder, "x".to_string());
    let next = state.apply(tr).expect("applies");

    assert_eq!(recorder.get_state(&next).map(String::as_str), Some("x"));
    assert_eq!(
        observer.get_state(&next),
        Some(&Some(Seen {
            new_value: Some("x".to_string()),
            old_value: Some("initial".to_string()),
            had_meta: false,
        }))
    );
    assert_eq!(counter.get_state(&next), Some(&1));
    assert_eq!(recorder.get_state(&state).map(String::as_str), Some("initial"));
}

#[test]
fn meta_is_routed_to_the_addressed_plugin_only() {
    let mut registry = PluginRegistry::new();
    let first = registry.register(Recorder);
    let second = registry.register(Recorder);
    let state = state_with(md("text"), registry);

    let mut tr = state.tr();
    tr.set_meta(&second, "only me".to_string());
    assert_eq!(tr.get_meta(&second).map(String::as_str), Some("only me"));
    assert!(tr.get_meta(&first).is_none());
    let next = state.apply(tr).expect("applies");

    assert_eq!(first.get_state(&next).map(String::as_str), Some("initial"));
    assert_eq!(second.get_state(&next).map(String::as_str), Some("only me"));
}

#[test]
fn failing_plugins_keep_their_previous_value() {
    for panics in [false, true] {
        let mut registry = PluginRegistry::new();
        let faulty = registry.register(Faulty { panics });
        let counter = registry.register(Counter);
        let state = state_with(md("abc"), registry);

        let mut tr = state.tr();
        tr.insert_text("X", 1).expect("insert");
        let applied = state.apply_transaction(tr).expect("document edit still applies");

        assert_eq!(applied.state.doc(), &doc(vec![p(vec![t("Xabc")])]));
        assert_eq!(faulty.get_state(&applied.state), Some(&7));
        assert_eq!(counter.get_state(&applied.state), Some(&1));
        assert_eq!(applied.plugin_errors.len(), 1);
        assert_eq!(applied.plugin_errors[0].plugin, "faulty");
        if panics {
            assert!(applied.plugin_errors[0].message.contains("boom"));
        }
    }
}

#[test]
fn empty_transactions_keep_the_document() {
    let state = state_with(md("# Title\n\nbody"), PluginRegistry::new());
    let next = state.apply(state.tr()).expect("applies");
    assert!(Node::ptr_eq(next.doc(), state.doc()));
    assert_eq!(next.selection(), state.selection());
    assert_ne!(next.id(), state.id());
}

#[test]
fn transactions_from_superseded_states_are_stale() {
    let state = state_with(md("abc"), PluginRegistry::new());
    let mut first = state.tr();
    first.insert_text("1", 1).expect("insert");
    let mut second = state.tr();
    second.insert_text("2", 1).expect("insert");

    let next = state.apply(first).expect("first applies");
    let err = next.apply(second).expect_err("second is stale");
    assert!(matches!(err, TransactionError::Stale { .. }));
    assert_eq!(next.doc(), &doc(vec![p(vec![t("1abc")])]));
}

#[test]
fn content_violations_reject_the_whole_transaction() {
    let state = state_with(md("abc"), PluginRegistry::new());
    let list = schema().node_type("bullet_list").expect("bullet list").clone();
    let mut tr = state.tr();
    tr.insert_text("ok ", 1).expect("insert");
    tr.step(Step::SetNodeMarkup {
        pos: 0,
        node_type: list,
        attrs: attrs! { "tight" => false },
    })
    .expect("step itself applies");

    let err = state.apply(tr).expect_err("list of text is invalid");
    assert!(matches!(err, TransactionError::Invalid(_)));
    assert_eq!(state.doc(), &doc(vec![p(vec![t("abc")])]));
}

#[test]
fn selections_follow_later_steps() {
    let state = state_with(md("hello"), PluginRegistry::new());
    let mut tr = state.tr();
    tr.set_selection(prose_model::Selection::cursor(tr.doc(), 3).expect("cursor"))
        .expect("selection");
    tr.insert_text("ab", 1).expect("insert");
    tr.set_named_meta(ADD_TO_HISTORY, false);
    assert!(!tr.add_to_history());

    let next = state.apply(tr).expect("applies");
    assert_eq!(next.selection().head(), 5);
}

#[test]
fn out_of_range_selections_are_refused() {
    let state = state_with(md("hi"), PluginRegistry::new());
    let mut tr = state.tr();
    let err = tr
        .set_selection(prose_model::Selection::Text { anchor: 1, head: 99 })
        .expect_err("outside the document");
    assert!(matches!(err, TransactionError::Invalid(_)));
}

#[test]
fn a_failed_edit_rejects_the_steps_before_it() {
    let state = state_with(md("abc"), PluginRegistry::new());
    let mut tr = state.tr();
    tr.insert_text("X", 1).expect("first insert applies");
    tr.insert_text("Y", 999).expect_err("position outside the document");
    assert!(tr.failure().is_some());

    let err = state.apply(tr).expect_err("partial batch");
    assert!(matches!(err, TransactionError::Invalid(_)));
    assert_eq!(state.doc(), &doc(vec![p(vec![t("abc")])]));
}
