use prose_model::{AttrValue, Attrs};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nesting {
    Open,
    Close,
    Leaf,
}

/// Flat token produced by the tokenizer stages. Block tokens named `inline`
/// carry raw text in `content` until the inline phase fills `children`.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub name: &'static str,
    pub nesting: Nesting,
    pub attrs: Attrs,
    pub content: String,
    pub children: Vec<Token>,
}

impl Token {
    pub fn new(name: &'static str, nesting: Nesting) -> Self {
        Token {
            name,
            nesting,
            attrs: Attrs::new(),
            content: String::new(),
            children: Vec::new(),
        }
    }

    pub fn open(name: &'static str) -> Self {
        Token::new(name, Nesting::Open)
    }

    pub fn close(name: &'static str) -> Self {
        Token::new(name, Nesting::Close)
    }

    pub fn leaf(name: &'static str, content: impl Into<String>) -> Self {
        let mut token = Token::new(name, Nesting::Leaf);
        token.content = content.into();
        token
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(name.to_string(), value.into());
    }
}
