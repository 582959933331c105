//! Transport-safe reply formatting.
//!
//! The transport caps every message at [`TRANSPORT_CHAR_LIMIT`] characters.
//! Formatting quotes the user's text, appends a provider signature, and cuts
//! only the reply body when the result would not fit. Lengths are counted in
//! Unicode scalar values, not bytes.

use url::Url;

use crate::provider::Reference;

pub const TRANSPORT_CHAR_LIMIT: usize = 2000;
pub const DEFAULT_QUOTE_LIMIT: usize = 200;
pub const ELLIPSIS: &str = "…";

pub const MAX_REFERENCES: usize = 3;
pub const REFERENCE_TITLE_LIMIT: usize = 40;

/// Pure formatter for one provider's replies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseFormatter {
    char_limit: usize,
    quote_limit: usize,
    signature: String,
}

impl ResponseFormatter {
    pub fn new(provider: &str, model: &str) -> Self {
        Self {
            char_limit: TRANSPORT_CHAR_LIMIT,
            quote_limit: DEFAULT_QUOTE_LIMIT,
            signature: format!("\n-# {provider} · {model}"),
        }
    }

    pub fn with_limits(mut self, char_limit: usize, quote_limit: usize) -> Self {
        self.char_limit = char_limit;
        self.quote_limit = quote_limit;
        self
    }

    /// The attribution suffix every formatted reply ends with.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn char_limit(&self) -> usize {
        self.char_limit
    }

    pub fn format(&self, original_text: &str, reply_text: &str) -> String {
        let suffix_len = char_len(&self.signature);
        if suffix_len >= self.char_limit {
            return take_chars(&self.signature, self.char_limit).to_string();
        }

        let mut header = quote(original_text, self.quote_limit);
        let ellipsis_len = char_len(ELLIPSIS);
        if char_len(&header) + suffix_len + ellipsis_len >= self.char_limit {
            header.clear();
        }

        let budget = self.char_limit - char_len(&header) - suffix_len;
        let body = if char_len(reply_text) <= budget {
            reply_text.to_string()
        } else {
            let cut = budget.saturating_sub(ellipsis_len);
            format!("{}{ELLIPSIS}", take_chars(reply_text, cut))
        };

        format!("{header}{body}{}", self.signature)
    }
}

/// Quote block for the user's text, each line prefixed with `> `.
fn quote(text: &str, limit: usize) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    let clipped = if char_len(text) > limit {
        format!("{}{ELLIPSIS}", take_chars(text, limit.saturating_sub(1)))
    } else {
        text.to_string()
    };
    let mut out = String::with_capacity(clipped.len() + 8);
    for line in clipped.lines() {
        out.push_str("> ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Append up to [`MAX_REFERENCES`] reference lines after a blank line.
pub fn append_references(body: &str, references: &[Reference]) -> String {
    if references.is_empty() {
        return body.to_string();
    }
    let lines: Vec<String> = references
        .iter()
        .take(MAX_REFERENCES)
        .map(reference_line)
        .collect();
    format!("{body}\n\n{}", lines.join("\n"))
}

/// `- [title](<url>)`; angle brackets keep the transport from unfurling links.
fn reference_line(reference: &Reference) -> String {
    let title = reference
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.replace(['\n', '\r'], " ").replace('[', "(").replace(']', ")"))
        .unwrap_or_else(|| url_host(&reference.url));
    format!("- [{}](<{}>)", elide(&title, REFERENCE_TITLE_LIMIT), reference.url)
}

fn elide(text: &str, limit: usize) -> String {
    if char_len(text) > limit {
        format!("{}{ELLIPSIS}", take_chars(text, limit))
    } else {
        text.to_string()
    }
}

/// Host of `url` for display. User info, port and path never leak into the title.
fn url_host(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn take_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> ResponseFormatter {
        ResponseFormatter::new("gemini", "gemini-flash-latest")
    }

    #[test]
    fn short_reply_is_untouched() {
        let out = formatter().format("hi", "hello there");
        assert_eq!(out, "> hi\n\nhello there\n-# gemini · gemini-flash-latest");
    }

    #[test]
    fn long_reply_is_cut_and_signature_survives() {
        let f = formatter();
        let out = f.format("hi", &"x".repeat(3000));
        assert!(char_len(&out) <= 2000);
        assert_eq!(char_len(&out), 2000);
        assert!(out.ends_with(f.signature()));
        assert!(out.contains(&format!("x{ELLIPSIS}{}", f.signature())));
        assert!(out.starts_with("> hi\n\n"));
    }

    #[test]
    fn exact_fit_is_not_cut() {
        let f = formatter();
        let header = "> hi\n\n";
        let room = 2000 - char_len(header) - char_len(f.signature());
        let out = f.format("hi", &"y".repeat(room));
        assert_eq!(char_len(&out), 2000);
        assert!(!out.contains(ELLIPSIS));
    }

    #[test]
    fn multibyte_reply_counts_characters() {
        let f = formatter();
        let out = f.format("質問", &"ずんだ".repeat(1000));
        assert_eq!(char_len(&out), 2000);
        assert!(out.ends_with(f.signature()));
    }

    #[test]
    fn multiline_quote_prefixes_every_line() {
        let out = formatter().format("line one\nline two", "ok");
        assert!(out.starts_with("> line one\n> line two\n\nok"));
    }

    #[test]
    fn long_quote_is_clipped() {
        let f = formatter().with_limits(2000, 10);
        let out = f.format(&"q".repeat(50), "ok");
        assert!(out.starts_with(&format!("> {}{ELLIPSIS}\n\nok", "q".repeat(9))));
    }

    #[test]
    fn quote_dropped_when_it_cannot_fit() {
        let f = ResponseFormatter::new("p", "m").with_limits(30, 200);
        let out = f.format(&"a".repeat(100), "reply");
        assert!(char_len(&out) <= 30);
        assert!(!out.starts_with('>'));
        assert!(out.ends_with(f.signature()));
    }

    #[test]
    fn empty_original_has_no_quote() {
        let out = formatter().format("   ", "reply");
        assert!(out.starts_with("reply"));
    }

    #[test]
    fn references_are_capped_and_elided() {
        let refs: Vec<Reference> = (0..5)
            .map(|i| Reference {
                title: Some(format!("{i} {}", "t".repeat(60))),
                url: format!("https://example.com/{i}"),
            })
            .collect();
        let out = append_references("answer", &refs);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "answer");
        assert_eq!(lines[1], "");
        assert_eq!(lines.len(), 2 + MAX_REFERENCES);
        assert!(lines[2].starts_with("- [0 ttt"));
        assert!(lines[2].contains(&format!("{ELLIPSIS}](<https://example.com/0>)")));
    }

    #[test]
    fn url_only_reference_uses_host() {
        let refs = vec![Reference {
            title: None,
            url: "https://news.example.org/a/b?c=d".into(),
        }];
        let out = append_references("a", &refs);
        assert!(out.ends_with("- [news.example.org](<https://news.example.org/a/b?c=d>)"));
    }

    #[test]
    fn reference_host_drops_credentials_and_port() {
        let refs = vec![Reference {
            title: None,
            url: "https://user:pw@Example.com:8443/x".into(),
        }];
        let out = append_references("a", &refs);
        assert!(out.ends_with("- [example.com](<https://user:pw@Example.com:8443/x>)"));
        assert!(!out.contains("[user"));
    }

    #[test]
    fn unparseable_reference_url_is_shown_raw() {
        assert_eq!(url_host("not a url"), "not a url");
        assert_eq!(url_host("https://docs.rs/url"), "docs.rs");
    }

    #[test]
    fn no_references_leaves_body() {
        assert_eq!(append_references("body", &[]), "body");
    }
}
