use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use prose_config::Config;
use prose_model::{Node, Selection};
use prose_plugins::{
    fixed_clock, refresh_word_count, register_features, show_word_count, TableOfContents, TocEntry, WordCount,
    WORD_COUNT_WIDGET_KEY,
};
use prose_state::{EditorState, PluginRegistry, Transaction};
use prose_test_support::{doc, h, md, p, schema, t, test_config};

fn state_with(document: Node, registry: PluginRegistry) -> EditorState {
    EditorState::create(schema().clone(), document, registry.build()).expect("plugins initialize")
}

fn typing(state: &EditorState, pos: usize, text: &str) -> Transaction {
    let mut tr = state.tr();
    tr.insert_text(text, pos).expect("insert");
    let cursor = Selection::cursor(tr.doc(), pos + text.chars().count()).expect("cursor");
    tr.set_selection(cursor).expect("selection");
    tr
}

fn count_widgets(state: &EditorState) -> Vec<(usize, String)> {
    state
        .decorations_for(0, state.doc().content_size())
        .into_iter()
        .filter_map(|deco| {
            let widget = deco.widget_ref()?;
            (widget.key() == WORD_COUNT_WIDGET_KEY).then(|| (deco.from(), widget.label().to_string()))
        })
        .collect()
}

// "Title" 0..7, "one two" 7..16, "three" 16..23
fn counted() -> Node {
    doc(vec![
        h(1, vec![t("Title")]),
        p(vec![t("one two")]),
        p(vec![t("three")]),
    ])
}

#[test]
fn word_counts_are_shown_per_block_and_section() {
    let mut registry = PluginRegistry::new();
    let key = registry.register(WordCount::new(true));
    let state = state_with(counted(), registry);

    assert_eq!(key.get_state(&state).expect("state").total(), 4);
    assert_eq!(
        count_widgets(&state),
        vec![
            (0, "4".to_string()),
            (1, "4".to_string()),
            (8, "2".to_string()),
            (17, "1".to_string()),
        ]
    );
}

#[test]
fn edits_mark_counts_stale_until_refreshed() {
    let mut registry = PluginRegistry::new();
    let key = registry.register(WordCount::new(true));
    let state = state_with(counted(), registry);

    let edited = state.apply(typing(&state, 15, " more")).expect("applies");
    let counts = key.get_state(&edited).expect("state");
    assert!(counts.is_stale());
    assert_eq!(counts.total(), 4);
    assert!(count_widgets(&edited).contains(&(22, "1".to_string())));

    let refreshed = edited.apply(refresh_word_count(&edited, &key)).expect("applies");
    let counts = key.get_state(&refreshed).expect("state");
    assert!(!counts.is_stale());
    assert_eq!(counts.total(), 5);
    assert!(count_widgets(&refreshed).contains(&(8, "3".to_string())));
}

#[test]
fn hidden_counts_have_no_widgets() {
    let mut registry = PluginRegistry::new();
    let key = registry.register(WordCount::new(true));
    let state = state_with(counted(), registry);

    let hidden = state.apply(show_word_count(&state, &key, false)).expect("applies");
    assert!(!key.get_state(&hidden).expect("state").is_showing());
    assert!(count_widgets(&hidden).is_empty());

    let shown = hidden.apply(show_word_count(&hidden, &key, true)).expect("applies");
    assert_eq!(count_widgets(&shown).len(), 4);
}

#[test]
fn toc_lists_headings_with_ids() {
    let mut registry = PluginRegistry::new();
    let key = registry.register(TableOfContents);
    // "Intro" 0..7, body 7..13, "Getting Started" 13..30
    let state = state_with(md("# Intro\n\nbody\n\n## Getting Started"), registry);

    let toc = key.get_state(&state).expect("state");
    assert_eq!(
        toc.entries().to_vec(),
        vec![
            TocEntry {
                id: "intro".to_string(),
                level: 1,
                text: "Intro".to_string(),
                pos: 0,
            },
            TocEntry {
                id: "getting-started".to_string(),
                level: 2,
                text: "Getting Started".to_string(),
                pos: 13,
            },
        ]
    );
    assert_eq!(toc.render_numbered(), "1: Intro\n1.1: Getting Started");
    assert!(state
        .decorations_for(13, 30)
        .iter()
        .any(|deco| deco.is_node() && deco.attr("id") == Some("getting-started") && deco.to() == 30));
}

#[test]
fn toc_follows_body_edits_and_rebuilds_on_heading_edits() {
    let mut registry = PluginRegistry::new();
    let key = registry.register(TableOfContents);
    let state = state_with(doc(vec![p(vec![t("lead")]), h(1, vec![t("Goal")])]), registry);

    let shifted = state.apply(typing(&state, 1, "ab")).expect("applies");
    let entries = key.get_state(&shifted).expect("state").entries().to_vec();
    assert_eq!((entries[0].pos, entries[0].id.as_str()), (8, "goal"));

    let renamed = shifted.apply(typing(&shifted, 13, "s")).expect("applies");
    let entries = key.get_state(&renamed).expect("state").entries().to_vec();
    assert_eq!((entries[0].text.as_str(), entries[0].id.as_str()), ("Goals", "goals"));
}

#[test]
fn features_follow_the_enabled_list() {
    let clock = fixed_clock(
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(7, 5, 0))
            .expect("valid timestamp"),
    );

    let mut registry = PluginRegistry::new();
    let keys = register_features(&mut registry, &test_config(), clock.clone()).expect("features build");
    assert!(keys.folding_tags.is_some());
    assert!(keys.folding_headings.is_some());
    assert!(keys.todo.is_some() && keys.hide_completed.is_some());
    assert!(keys.toc.is_some() && keys.word_count.is_some() && keys.variables.is_some());
    let state = state_with(md("# Title\n\n- [ ] task {:words}"), registry);
    assert_eq!(
        state.plugins().names(),
        vec![
            "folding-tags",
            "folding-headings",
            "todo",
            "hide-completed",
            "toc",
            "word-count",
            "variables"
        ]
    );

    let config = Config::from_toml_str("[plugins]\nenabled = [\"toc\", \"variables\"]\n").expect("valid config");
    let mut registry = PluginRegistry::new();
    let keys = register_features(&mut registry, &config, clock).expect("features build");
    assert!(keys.folding_tags.is_none() && keys.todo.is_none() && keys.word_count.is_none());
    assert_eq!(registry.len(), 2);
}
