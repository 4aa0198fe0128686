//! Conversion of message templates to Bot API HTML.
//!
//! Templates use `**bold**` and `` `code` `` spans. Only paired markers are
//! converted; everything else is HTML-escaped, so user-provided text such as
//! file names or descriptions can never produce malformed markup.

/// Parse mode sent with every converted text.
pub const PARSE_MODE: &str = "HTML";

/// Render `text` as Bot API HTML.
pub fn to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('`') {
            if let Some(end) = after.find('`') {
                out.push_str("<code>");
                push_escaped(&mut out, &after[..end]);
                out.push_str("</code>");
                rest = &after[end + 1..];
                continue;
            }
        }
        if let Some(after) = rest.strip_prefix("**") {
            if let Some(end) = after.find("**") {
                out.push_str("<b>");
                out.push_str(&to_html(&after[..end]));
                out.push_str("</b>");
                rest = &after[end + 2..];
                continue;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            push_escaped_char(&mut out, c);
        }
        rest = chars.as_str();
    }
    out
}

fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        push_escaped_char(out, c);
    }
}

fn push_escaped_char(out: &mut String, c: char) {
    match c {
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '&' => out.push_str("&amp;"),
        _ => out.push(c),
    }
}
