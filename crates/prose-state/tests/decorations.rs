use pretty_assertions::assert_eq;
use prose_model::Node;
use prose_state::{
    deco_attrs, ApplyContext, Decoration, DecorationSet, EditorState, PluginApplyError, PluginKey, PluginRegistry,
    PluginSpec, Widget,
};
use prose_test_support::{doc, p, schema, t};

/// Highlights a fixed range at init and only remaps afterwards. A widget at
/// the document start clears the highlight when clicked.
struct Highlight {
    key: PluginKey<Highlight>,
    from: usize,
    to: usize,
}

impl PluginSpec for Highlight {
    type State = DecorationSet;
    type Meta = bool;

    fn name(&self) -> &str {
        "highlight"
    }

    fn init(&self, state: &EditorState) -> DecorationSet {
        let key = self.key;
        let clear = Widget::new("clear", "x").with_action(move |state: &EditorState| {
            let mut tr = state.tr();
            tr.set_meta(&key, true);
            Some(tr)
        });
        DecorationSet::create(
            state.doc(),
            vec![
                Decoration::inline(self.from, self.to, deco_attrs([("class", "hl")])),
                Decoration::widget(0, clear.with_side(-1)),
            ],
        )
    }

    fn apply(&self, cx: ApplyContext<'_, bool>, value: &DecorationSet) -> Result<DecorationSet, PluginApplyError> {
        if cx.meta == Some(&true) {
            return Ok(value.remove(|deco| deco.is_inline()));
        }
        Ok(value.map(cx.tr.mapping(), cx.tr.doc()))
    }

    fn decorations(&self, value: &DecorationSet, _state: &EditorState) -> Option<DecorationSet> {
        Some(value.clone())
    }
}

fn highlighted(doc: Node, from: usize, to: usize) -> EditorState {
    let mut registry = PluginRegistry::new();
    registry.register_with(|key| Highlight { key, from, to });
    EditorState::create(schema().clone(), doc, registry.build()).expect("state")
}

fn inline_ranges(state: &EditorState) -> Vec<(usize, usize)> {
    let size = state.doc().content_size();
    state
        .decorations_for(0, size)
        .iter()
        .filter(|deco| deco.is_inline())
        .map(|deco| (deco.from(), deco.to()))
        .collect()
}

#[test]
fn inserting_before_shifts_by_the_inserted_length() {
    let state = highlighted(doc(vec![p(vec![t("hello world")])]), 7, 12);
    let mut tr = state.tr();
    tr.insert_text("big ", 1).expect("insert");
    let next = state.apply(tr).expect("applies");
    assert_eq!(inline_ranges(&next), vec![(11, 16)]);
    assert_eq!(next.doc().text_between(11, 16, "", ""), "world");
}

#[test]
fn deleting_the_range_drops_the_decoration() {
    let state = highlighted(doc(vec![p(vec![t("hello world")])]), 7, 12);
    let mut tr = state.tr();
    tr.delete(6, 12).expect("delete");
    let next = state.apply(tr).expect("applies");
    assert!(inline_ranges(&next).is_empty());
    assert_eq!(next.decorations_for(0, 0).len(), 1);
}

#[test]
fn widget_clicks_produce_transactions_for_their_plugin() {
    let state = highlighted(doc(vec![p(vec![t("hello world")])]), 1, 6);
    let widget = state.widget_at(0, "clear").expect("widget");
    assert!(widget.has_action());
    let tr = widget.click(&state).expect("transaction");
    let next = state.apply(tr).expect("applies");
    assert!(inline_ranges(&next).is_empty());
    assert!(next.widget_at(0, "clear").is_some());
}
