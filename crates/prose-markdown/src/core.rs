use crate::heading::{generate_anchor, normalize_heading_text};
use crate::token::{Nesting, Token};

/// Splits a `{created-closed} ` prefix off todo item text. Either date may
/// be missing. Returns the dates and the remaining text.
pub fn parse_todo_dates(text: &str) -> Option<(Option<&str>, Option<&str>, &str)> {
    let body_end = text.find('}')?;
    let body = text.strip_prefix('{')?.get(..body_end - 1)?;
    let rest = &text[body_end + 1..];
    let rest = if rest.is_empty() { rest } else { rest.strip_prefix(' ')? };

    let (created, closed) = body.split_once('-').unwrap_or((body, ""));
    let is_date = |part: &str| part.chars().all(|ch| ch.is_ascii_digit() || ch == '/' || ch == '.');
    if !is_date(created) || !is_date(closed) {
        return None;
    }
    Some((non_empty(created), non_empty(closed), rest))
}

fn non_empty(part: &str) -> Option<&str> {
    (!part.is_empty()).then_some(part)
}

/// Moves todo dates from the start of an item's first paragraph into the
/// item's attributes.
pub(crate) fn todo_dates(tokens: &mut Vec<Token>) {
    for idx in 0..tokens.len() {
        let item = &tokens[idx];
        if item.name != "list_item" || item.nesting != Nesting::Open || !item.attrs.contains_key("todo_checked") {
            continue;
        }
        if tokens.get(idx + 1).map(|t| t.name) != Some("paragraph") {
            continue;
        }
        let Some(inline) = tokens.get(idx + 2).filter(|t| t.name == "inline") else {
            continue;
        };
        let Some((created, closed, rest)) = parse_todo_dates(&inline.content) else {
            continue;
        };
        let created = created.map(str::to_string);
        let closed = closed.map(str::to_string);
        let rest = rest.to_string();

        tokens[idx + 2].content = rest;
        if let Some(created) = created {
            tokens[idx].set_attr("todo_created", created);
        }
        if let Some(closed) = closed {
            tokens[idx].set_attr("todo_closed", closed);
        }
    }
}

/// Gives every heading an `id` slug derived from its text.
pub(crate) fn heading_ids(tokens: &mut Vec<Token>) {
    for idx in 0..tokens.len() {
        if tokens[idx].name != "heading" || tokens[idx].nesting != Nesting::Open {
            continue;
        }
        let id = tokens
            .get(idx + 1)
            .filter(|t| t.name == "inline")
            .map(|t| generate_anchor(&normalize_heading_text(&t.content)))
            .filter(|id| !id.is_empty());
        if let Some(id) = id {
            tokens[idx].set_attr("id", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Tokenizer;

    #[test]
    fn parses_date_prefixes() {
        assert_eq!(parse_todo_dates("{01/02/24-01/05/24} ship"), Some((Some("01/02/24"), Some("01/05/24"), "ship")));
        assert_eq!(parse_todo_dates("{01/02/24} x"), Some((Some("01/02/24"), None, "x")));
        assert_eq!(parse_todo_dates("{-3.4.24}"), Some((None, Some("3.4.24"), "")));
        assert_eq!(parse_todo_dates("{name} x"), None);
        assert_eq!(parse_todo_dates("{1/2}x"), None);
        assert_eq!(parse_todo_dates("plain"), None);
    }

    #[test]
    fn moves_dates_into_item_attrs() {
        let tokens = Tokenizer::default().tokenize("- [x] {01/02/24-01/03/24} done");
        assert_eq!(tokens[1].attrs["todo_created"].as_str(), Some("01/02/24"));
        assert_eq!(tokens[1].attrs["todo_closed"].as_str(), Some("01/03/24"));
        assert_eq!(tokens[3].content, "done");
    }

    #[test]
    fn assigns_heading_ids() {
        let tokens = Tokenizer::default().tokenize("## Getting **Started**");
        assert_eq!(tokens[0].attrs["id"].as_str(), Some("getting-started"));
    }
}
