use crate::block::{self, BlockState};
use crate::core;
use crate::inline::{self, InlineState};
use crate::token::Token;

/// Block rule. Runs at the state's current line; when it matches it pushes
/// tokens, advances past the lines it consumed and returns true. In silent
/// mode it only reports whether it would match.
#[derive(Clone, Copy)]
pub struct BlockRule {
    pub name: &'static str,
    pub run: fn(&mut BlockState<'_>, bool) -> bool,
    /// Whether a match may end a running paragraph.
    pub interrupts_paragraph: bool,
}

/// Inline rule. Runs at the state's current position with the same
/// contract as [`BlockRule`].
#[derive(Clone, Copy)]
pub struct InlineRule {
    pub name: &'static str,
    pub run: fn(&mut InlineState<'_>, bool) -> bool,
}

/// Rewrites the block token stream before inline content is tokenized.
#[derive(Clone, Copy)]
pub struct CoreRule {
    pub name: &'static str,
    pub run: fn(&mut Vec<Token>),
}

#[derive(Clone, Copy)]
pub enum ParserStage {
    Block(BlockRule),
    Inline(InlineRule),
    Core(CoreRule),
}

impl ParserStage {
    pub fn name(&self) -> &'static str {
        match self {
            ParserStage::Block(rule) => rule.name,
            ParserStage::Inline(rule) => rule.name,
            ParserStage::Core(rule) => rule.name,
        }
    }
}

impl std::fmt::Debug for ParserStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            ParserStage::Block(_) => "block",
            ParserStage::Inline(_) => "inline",
            ParserStage::Core(_) => "core",
        };
        write!(f, "{kind}:{}", self.name())
    }
}

/// The default pipeline, in priority order within each phase.
pub fn default_stages() -> Vec<ParserStage> {
    vec![
        ParserStage::Block(BlockRule {
            name: "front_matter",
            run: block::front_matter,
            interrupts_paragraph: false,
        }),
        ParserStage::Block(BlockRule {
            name: "fence",
            run: block::fence,
            interrupts_paragraph: true,
        }),
        ParserStage::Block(BlockRule {
            name: "code",
            run: block::code,
            interrupts_paragraph: false,
        }),
        ParserStage::Block(BlockRule {
            name: "heading",
            run: block::heading,
            interrupts_paragraph: true,
        }),
        ParserStage::Block(BlockRule {
            name: "hr",
            run: block::hr,
            interrupts_paragraph: true,
        }),
        ParserStage::Block(BlockRule {
            name: "blockquote",
            run: block::blockquote,
            interrupts_paragraph: true,
        }),
        ParserStage::Block(BlockRule {
            name: "list",
            run: block::list,
            interrupts_paragraph: true,
        }),
        ParserStage::Block(BlockRule {
            name: "paragraph",
            run: block::paragraph,
            interrupts_paragraph: false,
        }),
        ParserStage::Core(CoreRule {
            name: "todo_dates",
            run: core::todo_dates,
        }),
        ParserStage::Core(CoreRule {
            name: "heading_ids",
            run: core::heading_ids,
        }),
        ParserStage::Inline(InlineRule {
            name: "escape",
            run: inline::escape,
        }),
        ParserStage::Inline(InlineRule {
            name: "newline",
            run: inline::newline,
        }),
        ParserStage::Inline(InlineRule {
            name: "backticks",
            run: inline::backticks,
        }),
        ParserStage::Inline(InlineRule {
            name: "image",
            run: inline::image,
        }),
        ParserStage::Inline(InlineRule {
            name: "link",
            run: inline::link,
        }),
        ParserStage::Inline(InlineRule {
            name: "strong",
            run: inline::strong,
        }),
        ParserStage::Inline(InlineRule {
            name: "strike",
            run: inline::strike,
        }),
        ParserStage::Inline(InlineRule {
            name: "mark",
            run: inline::mark,
        }),
        ParserStage::Inline(InlineRule {
            name: "em",
            run: inline::em,
        }),
        ParserStage::Inline(InlineRule {
            name: "underline",
            run: inline::underline,
        }),
        ParserStage::Inline(InlineRule {
            name: "sub",
            run: inline::sub,
        }),
        ParserStage::Inline(InlineRule {
            name: "sup",
            run: inline::sup,
        }),
    ]
}

/// Stages partitioned by phase. Phases run block, core, then inline.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    block: Vec<BlockRule>,
    core: Vec<CoreRule>,
    inline: Vec<InlineRule>,
}

impl std::fmt::Debug for BlockRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl std::fmt::Debug for InlineRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl std::fmt::Debug for CoreRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl Tokenizer {
    pub fn new(stages: &[ParserStage]) -> Self {
        let mut tokenizer = Tokenizer {
            block: Vec::new(),
            core: Vec::new(),
            inline: Vec::new(),
        };
        for stage in stages {
            match *stage {
                ParserStage::Block(rule) => tokenizer.block.push(rule),
                ParserStage::Inline(rule) => tokenizer.inline.push(rule),
                ParserStage::Core(rule) => tokenizer.core.push(rule),
            }
        }
        tokenizer
    }

    pub fn tokenize(&self, source: &str) -> Vec<Token> {
        let lines = source.lines().map(str::to_string).collect();
        let (mut tokens, _) = BlockState::new(lines, 0, &self.block).tokenize();
        for rule in &self.core {
            (rule.run)(&mut tokens);
        }
        self.tokenize_inline(&mut tokens);
        tokens
    }

    fn tokenize_inline(&self, tokens: &mut [Token]) {
        for token in tokens.iter_mut() {
            if token.name == "inline" {
                token.children = InlineState::new(&token.content, &self.inline).tokenize();
            }
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer::new(&default_stages())
    }
}
