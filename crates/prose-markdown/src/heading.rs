use pulldown_cmark::{Event, Options, Parser};

/// Flattens inline markdown in a heading to plain text with collapsed
/// whitespace.
pub fn normalize_heading_text(input: &str) -> String {
    let mut text_segments = Vec::new();
    let parser = Parser::new_ext(input, Options::ENABLE_STRIKETHROUGH);

    for event in parser {
        match event {
            Event::Text(cow) | Event::Code(cow) => text_segments.push(cow.to_string()),
            Event::SoftBreak | Event::HardBreak => text_segments.push(" ".to_string()),
            _ => {}
        }
    }

    let normalized = text_segments.join("");
    let mut collapsed = String::new();
    for (idx, segment) in normalized.split_whitespace().enumerate() {
        if idx > 0 {
            collapsed.push(' ');
        }
        collapsed.push_str(segment);
    }
    collapsed
}

/// Lowercase slug used for heading ids: alphanumerics kept, runs of
/// whitespace and dashes collapsed to one dash.
pub fn generate_anchor(normalized: &str) -> String {
    let mut anchor = String::new();
    let mut last_was_dash = false;

    for ch in normalized.chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_alphanumeric() {
            anchor.push(ch);
            last_was_dash = false;
        } else if (ch.is_whitespace() || ch == '-') && !anchor.is_empty() && !last_was_dash {
            anchor.push('-');
            last_was_dash = true;
        }
    }

    if anchor.ends_with('-') {
        anchor.pop();
    }
    anchor
}

/// Level and text of an ATX heading line (`## Title ##`).
pub(crate) fn detect_atx_heading(line: &str) -> Option<(usize, &str)> {
    if leading_indent_width(line) > 3 {
        return None;
    }
    let trimmed_start = line.trim_start();
    let pound_count = trimmed_start.chars().take_while(|ch| *ch == '#').count();
    if pound_count == 0 || pound_count > 6 {
        return None;
    }

    let after_hashes = &trimmed_start[pound_count..];
    if !after_hashes.is_empty() && !after_hashes.starts_with(char::is_whitespace) {
        return None;
    }

    let mut content = after_hashes.trim();
    let stripped_hashes = content.trim_end_matches('#');
    if stripped_hashes.len() < content.len() {
        if stripped_hashes.is_empty() {
            content = stripped_hashes;
        } else if stripped_hashes.ends_with(char::is_whitespace) {
            content = stripped_hashes.trim_end();
        }
    }
    Some((pound_count, content))
}

/// Level of a setext underline (`===` is 1, `---` is 2).
pub(crate) fn match_setext_depth(line: &str) -> Option<usize> {
    if leading_indent_width(line) > 3 {
        return None;
    }
    let trimmed = line.trim();
    let fence_char = trimmed.chars().next()?;
    if fence_char != '=' && fence_char != '-' {
        return None;
    }
    if !trimmed.chars().all(|ch| ch == fence_char) || trimmed.len() < 3 {
        return None;
    }
    Some(if fence_char == '=' { 1 } else { 2 })
}

pub(crate) fn leading_indent_width(line: &str) -> usize {
    let mut width = 0usize;
    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}
