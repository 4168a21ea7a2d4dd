//! Word counts.
//!
//! Every non-empty textblock shows its own word count; headings show the
//! total of their section and the document total sits at position 0. After
//! an edit the counts are only remapped and marked stale; the host sends
//! [`WordCountMeta::Refresh`] once its throttle interval has passed.

use prose_model::Node;
use prose_state::{
    ApplyContext, Decoration, DecorationSet, EditorState, PluginApplyError, PluginKey, PluginSpec, Transaction, Widget,
};

use crate::scan::{heading_level, is_heading, map_pos};

pub const WORD_COUNT_WIDGET_KEY: &str = "word-count";

/// Whitespace-separated words in `text`.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Words in a textblock's joined inline text. Marks can split a word across
/// text nodes; leaf inlines such as hard breaks separate words.
pub fn textblock_words(block: &Node) -> usize {
    let mut joined = String::new();
    for child in block.children() {
        match child.text() {
            Some(text) => joined.push_str(text),
            None => joined.push(' '),
        }
    }
    count_words(&joined)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TallyScope {
    Document,
    Heading(u8),
    Paragraph,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordTally {
    /// Widget position: 0 for the document, otherwise the start of the
    /// textblock's content.
    pub pos: usize,
    pub words: usize,
    pub scope: TallyScope,
}

/// Document total first, then one tally per non-empty textblock.
pub fn word_tallies(doc: &Node) -> Vec<WordTally> {
    let mut tallies = vec![WordTally {
        pos: 0,
        words: 0,
        scope: TallyScope::Document,
    }];
    // Indices into `tallies` of the headings whose section is still open.
    let mut open: Vec<(usize, u8)> = Vec::new();

    doc.descendants(|node, pos, _, _| {
        if !node.is_textblock() {
            return true;
        }
        if node.child_count() == 0 {
            return false;
        }
        let words = textblock_words(node);
        let scope = if is_heading(node) {
            let level = heading_level(node);
            while open.last().is_some_and(|(_, open_level)| *open_level >= level) {
                open.pop();
            }
            open.push((tallies.len(), level));
            TallyScope::Heading(level)
        } else {
            TallyScope::Paragraph
        };
        tallies.push(WordTally {
            pos: pos + 1,
            words: 0,
            scope,
        });
        if scope == TallyScope::Paragraph {
            let own = tallies.len() - 1;
            tallies[own].words = words;
        }
        for (index, _) in &open {
            tallies[*index].words += words;
        }
        tallies[0].words += words;
        false
    });
    tallies
}

/// Words in the whole document.
pub fn document_words(doc: &Node) -> usize {
    let mut words = 0;
    doc.descendants(|node, _, _, _| {
        if node.is_textblock() {
            words += textblock_words(node);
            return false;
        }
        true
    });
    words
}

/// Directed commands for [`WordCount`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WordCountMeta {
    Show(bool),
    /// Recount the current document.
    Refresh,
}

#[derive(Clone, Debug, Default)]
pub struct WordCountState {
    tallies: Vec<WordTally>,
    decorations: DecorationSet,
    show: bool,
    stale: bool,
}

impl WordCountState {
    pub fn tallies(&self) -> &[WordTally] {
        &self.tallies
    }

    pub fn total(&self) -> usize {
        self.tallies.first().map_or(0, |tally| tally.words)
    }

    pub fn is_showing(&self) -> bool {
        self.show
    }

    /// Whether the counts predate the latest document change.
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

pub struct WordCount {
    show_initially: bool,
}

impl WordCount {
    pub fn new(show: bool) -> Self {
        WordCount { show_initially: show }
    }

    fn count(&self, doc: &Node, show: bool) -> WordCountState {
        let tallies = word_tallies(doc);
        let decorations = tallies
            .iter()
            .map(|tally| Decoration::widget(tally.pos, Widget::new(WORD_COUNT_WIDGET_KEY, tally.words.to_string())))
            .collect();
        WordCountState {
            decorations: DecorationSet::create(doc, decorations),
            tallies,
            show,
            stale: false,
        }
    }
}

impl PluginSpec for WordCount {
    type State = WordCountState;
    type Meta = WordCountMeta;

    fn name(&self) -> &str {
        "word-count"
    }

    fn init(&self, state: &EditorState) -> WordCountState {
        self.count(state.doc(), self.show_initially)
    }

    fn apply(
        &self,
        cx: ApplyContext<'_, WordCountMeta>,
        value: &WordCountState,
    ) -> Result<WordCountState, PluginApplyError> {
        let show = match cx.meta {
            Some(WordCountMeta::Show(show)) => *show,
            _ => value.show,
        };
        if cx.meta == Some(&WordCountMeta::Refresh) {
            return Ok(self.count(cx.new_state.doc(), show));
        }
        let mapping = cx.tr.mapping();
        Ok(WordCountState {
            tallies: value
                .tallies
                .iter()
                .filter_map(|tally| {
                    map_pos(mapping, tally.pos, -1).map(|pos| WordTally {
                        pos,
                        ..tally.clone()
                    })
                })
                .collect(),
            decorations: value.decorations.map(mapping, cx.new_state.doc()),
            show,
            stale: value.stale || cx.doc_changed(),
        })
    }

    fn decorations(&self, value: &WordCountState, _state: &EditorState) -> Option<DecorationSet> {
        value.show.then(|| value.decorations.clone())
    }
}

/// A transaction recounting words.
pub fn refresh_word_count(state: &EditorState, key: &PluginKey<WordCount>) -> Transaction {
    let mut tr = state.tr();
    tr.set_meta(key, WordCountMeta::Refresh);
    tr
}

/// A transaction showing or hiding the counts.
pub fn show_word_count(state: &EditorState, key: &PluginKey<WordCount>, show: bool) -> Transaction {
    let mut tr = state.tr();
    tr.set_meta(key, WordCountMeta::Show(show));
    tr
}
