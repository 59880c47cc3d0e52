// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Rendering of the child agent's markdown-ish output into the HTML subset
//! Telegram (and similar transports) understand: `<b>`, `<i>`, `<s>`,
//! `<code>`, `<pre>`, `<a href="...">`. Smiley-to-emoji substitution and
//! markdown-header-to-bold both need a negative-lookahead guard the `regex`
//! crate doesn't support, so both are hand-scanned instead of regex-driven.
use std::sync::LazyLock;

use regex::Regex;

const MAX_CHUNK_LEN: usize = 4090;

/// One fenced/inline code span pulled out before markdown conversion so its
/// contents are never mistaken for formatting syntax, restored verbatim
/// (HTML-escaped) afterwards.
struct CodeSpan {
    placeholder: String,
    html: String,
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

static FENCED_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```(?:[A-Za-z0-9_+-]*\n)?(.*?)```").unwrap());
static INLINE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\n]+)`").unwrap());

fn protect_code(text: &str) -> (String, Vec<CodeSpan>) {
    let mut spans = Vec::new();
    let mut out = FENCED_CODE_RE
        .replace_all(text, |caps: &regex::Captures| {
            let idx = spans.len();
            let placeholder = format!("\u{0}FENCED{idx}\u{0}");
            spans.push(CodeSpan { placeholder: placeholder.clone(), html: format!("<pre>{}</pre>", escape_html(&caps[1])) });
            placeholder
        })
        .into_owned();
    out = INLINE_CODE_RE
        .replace_all(&out, |caps: &regex::Captures| {
            let idx = spans.len();
            let placeholder = format!("\u{0}INLINE{idx}\u{0}");
            spans.push(CodeSpan { placeholder: placeholder.clone(), html: format!("<code>{}</code>", escape_html(&caps[1])) });
            placeholder
        })
        .into_owned();
    (out, spans)
}

fn restore_code(mut text: String, spans: &[CodeSpan]) -> String {
    for span in spans {
        text = text.replace(&span.placeholder, &span.html);
    }
    text
}

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+(.+)$").unwrap());
static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*\n]+)\*\*").unwrap());
static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\*([^*\n]+)\*)|(?:_([^_\n]+)_)").unwrap());
static STRIKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~([^~\n]+)~~").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").unwrap());

fn convert_headers(text: &str) -> String {
    HEADER_RE.replace_all(text, "<b>$1</b>").into_owned()
}

fn convert_bold(text: &str) -> String {
    BOLD_RE.replace_all(text, "<b>$1</b>").into_owned()
}

fn convert_italic(text: &str) -> String {
    ITALIC_RE
        .replace_all(text, |caps: &regex::Captures| {
            let inner = caps.get(1).or_else(|| caps.get(2)).unwrap().as_str();
            format!("<i>{inner}</i>")
        })
        .into_owned()
}

fn convert_strike(text: &str) -> String {
    STRIKE_RE.replace_all(text, "<s>$1</s>").into_owned()
}

fn convert_links(text: &str) -> String {
    LINK_RE.replace_all(text, r#"<a href="$2">$1</a>"#).into_owned()
}

/// `(pattern, replacement emoji)` pairs tried in order at each scan
/// position; longer patterns are listed first so `:D` isn't shadowed by a
/// hypothetical shorter prefix.
const SMILEYS: &[(&str, &str)] = &[
    (":)", "\u{1F642}"),
    (":-)", "\u{1F642}"),
    (":(", "\u{1F622}"),
    (":-(", "\u{1F622}"),
    (":D", "\u{1F603}"),
    (":P", "\u{1F61B}"),
    (":p", "\u{1F61B}"),
    (":*", "\u{1F618}"),
    (";)", "\u{1F609}"),
];

/// Scan `text` for smiley patterns, substituting emoji, while guarding two
/// false positives the source formatter must not trip on:
/// - `:/` (the `:(` family's sad-face prefix) must never match inside a URL
///   scheme `://`.
/// - `:*` (the kiss-face) must never match the leading `:` of a stray/
///   unconverted `:**bold**` sequence.
fn convert_smileys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    'outer: while i < chars.len() {
        if chars[i] == ':' {
            // Guard: `://` is a URL scheme, never a sad-face.
            if chars.get(i + 1) == Some(&'/') && chars.get(i + 2) == Some(&'/') {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            // Guard: `:**` is a stray bold marker, never a kiss-face.
            if chars.get(i + 1) == Some(&'*') && chars.get(i + 2) == Some(&'*') {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            for (pattern, emoji) in SMILEYS {
                let plen = pattern.chars().count();
                if chars[i..].iter().take(plen).collect::<String>() == *pattern {
                    out.push_str(emoji);
                    i += plen;
                    continue 'outer;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Render child-agent markdown-ish text into Telegram-flavored HTML.
pub fn render_html(text: &str) -> String {
    let (protected, spans) = protect_code(text);
    let mut html = convert_headers(&protected);
    html = convert_bold(&html);
    html = convert_italic(&html);
    html = convert_strike(&html);
    html = convert_links(&html);
    html = convert_smileys(&html);
    restore_code(html, &spans)
}

const ALLOWED_TAGS: &[&str] = &["b", "i", "s", "code", "pre", "a"];

/// `true` if every opening tag among [`ALLOWED_TAGS`] has a matching close
/// in the right order (a simple stack walk; attributes are ignored).
fn tags_balanced(html: &str) -> bool {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?([a-zA-Z]+)[^>]*>").unwrap());
    let mut stack = Vec::new();
    for caps in TAG_RE.captures_iter(html) {
        let full = caps.get(0).unwrap().as_str();
        let name = caps[1].to_ascii_lowercase();
        if !ALLOWED_TAGS.contains(&name.as_str()) {
            continue;
        }
        if full.starts_with("</") {
            match stack.pop() {
                Some(open) if open == name => {}
                _ => return false,
            }
        } else {
            stack.push(name);
        }
    }
    stack.is_empty()
}

/// Strip all markdown/HTML decoration, leaving safe plain text.
fn plain_text_fallback(text: &str) -> String {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z]+[^>]*>").unwrap());
    let stripped = TAG_RE.replace_all(text, "");
    escape_html(stripped.trim())
}

/// Render `text`, falling back to a sanitized plain-text form if the
/// rendered HTML ends up with unbalanced tags (malformed input markdown).
pub fn render_html_or_plain(text: &str) -> String {
    let html = render_html(text);
    if tags_balanced(&html) {
        html
    } else {
        plain_text_fallback(text)
    }
}

/// Split `html` into chunks under [`MAX_CHUNK_LEN`] chars, splitting only
/// right after a closing tag (`>`) or a newline so a chunk boundary never
/// lands inside a tag or a surrogate-pair-unsafe position.
pub fn chunk_message(html: &str) -> Vec<String> {
    if html.chars().count() <= MAX_CHUNK_LEN {
        return vec![html.to_string()];
    }
    let chars: Vec<char> = html.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= MAX_CHUNK_LEN {
            chunks.push(chars[start..].iter().collect());
            break;
        }
        let window_end = start + MAX_CHUNK_LEN;
        let mut split_at = None;
        for idx in (start..window_end).rev() {
            if chars[idx] == '>' || chars[idx] == '\n' {
                split_at = Some(idx + 1);
                break;
            }
        }
        let split_at = split_at.unwrap_or(window_end);
        chunks.push(chars[start..split_at].iter().collect());
        start = split_at;
    }
    chunks
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_bold_italic_strike() {
        assert_eq!(render_html("**bold** *italic* ~~gone~~"), "<b>bold</b> <i>italic</i> <s>gone</s>");
    }

    #[test]
    fn converts_header_to_bold() {
        assert_eq!(render_html("# Title\ntext"), "<b>Title</b>\ntext");
    }

    #[test]
    fn converts_link() {
        assert_eq!(render_html("[docs](https://example.com)"), r#"<a href="https://example.com">docs</a>"#);
    }

    #[test]
    fn url_scheme_is_never_read_as_sad_smiley() {
        let out = render_html("see https://example.com/path for details");
        assert!(out.contains("https://example.com"));
        assert!(!out.contains('\u{1F622}'));
    }

    #[test]
    fn stray_bold_marker_is_never_read_as_kiss_smiley() {
        let out = render_html(":**not actually bold");
        assert!(!out.contains('\u{1F618}'));
    }

    #[test]
    fn plain_smiley_converts() {
        let out = render_html("thanks :) see you");
        assert!(out.contains('\u{1F642}'));
    }

    #[test]
    fn code_spans_are_protected_from_markdown_conversion() {
        let out = render_html("`*not bold*`");
        assert_eq!(out, "<code>*not bold*</code>");
    }

    #[test]
    fn fenced_code_block_is_escaped_and_wrapped() {
        let out = render_html("```\nlet x = 1 < 2;\n```");
        assert_eq!(out, "<pre>let x = 1 &lt; 2;\n</pre>");
    }

    #[test]
    fn balanced_html_passes_through() {
        let html = "<b>hi</b> there";
        assert_eq!(render_html_or_plain("**hi** there"), html);
    }

    #[test]
    fn unbalanced_html_falls_back_to_plain_text() {
        // A literal, unclosed pseudo-tag typed by the child agent passes
        // through `render_html` unescaped and breaks tag balance.
        let out = render_html_or_plain("<b>never closed");
        assert!(!out.contains('<'));
    }

    #[test]
    fn short_message_is_a_single_chunk() {
        let chunks = chunk_message("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn long_message_splits_under_the_limit() {
        let long = "a".repeat(5000);
        let chunks = chunk_message(&long);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_LEN));
        assert_eq!(chunks.concat(), long);
    }

    #[test]
    fn chunk_split_lands_after_newline_not_mid_tag() {
        let mut long = String::new();
        for _ in 0..200 {
            long.push_str(&"x".repeat(30));
            long.push_str("<b>y</b>\n");
        }
        let chunks = chunk_message(&long);
        for chunk in &chunks[..chunks.len() - 1] {
            let last = chunk.chars().last().unwrap();
            assert!(last == '>' || last == '\n');
        }
    }
}
