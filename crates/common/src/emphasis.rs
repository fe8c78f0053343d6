//! Inline `**bold**` markers used inside finding bullets.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span<'a> {
    Plain(&'a str),
    Emphasis(&'a str),
}

/// Splits a bullet into plain and emphasised runs.
///
/// An opening `**` without a matching close is kept as literal text.
pub fn emphasis_spans(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("**") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("**") else {
            break;
        };
        if open > 0 {
            spans.push(Span::Plain(&rest[..open]));
        }
        if close > 0 {
            spans.push(Span::Emphasis(&after_open[..close]));
        }
        rest = &after_open[close + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::Plain(rest));
    }
    spans
}
