//! HTML-embedded URL extractor (C5).
//!
//! A candidate whose decoded text looks like HTML is additionally parsed to
//! pull URLs out of known URL-bearing attributes. The backend is a small
//! trait (`HtmlBackend`) so the concrete parser can be swapped without
//! touching the driver; this crate's default backend parses with
//! `html5ever` into an `markup5ever_rcdom::RcDom` and walks the resulting
//! tree, the same approach the pack's HTML rewriter uses for attribute
//! rewriting (distilled-spec §4.5, SPEC_FULL §4.5).

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::config::HtmlParserKind;

/// Attributes known to carry URLs, checked on every element regardless of
/// tag (the `data`-on-`<object>` case is handled separately since it only
/// applies to that one tag).
const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "poster",
    "background",
];

/// Returns true if `text`, trimmed, looks like an HTML fragment.
pub fn looks_like_html(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('<') || trimmed.to_ascii_uppercase().contains("<!DOCTYPE")
}

/// Extract URL-bearing attribute values from an HTML fragment. Returns an
/// empty vector (not an error) if the backend fails to parse it at all —
/// per distilled-spec §7, an HTML parse failure leaves the original
/// candidate string to be considered for emission unexpanded, it does not
/// abort the extraction.
pub fn extract_urls(html: &str, backend: HtmlParserKind) -> Vec<String> {
    match backend {
        HtmlParserKind::Html5Ever => extract_with_html5ever(html),
    }
}

fn extract_with_html5ever(html: &str) -> Vec<String> {
    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
    {
        Ok(dom) => dom,
        Err(_) => return Vec::new(),
    };

    let mut out = Vec::new();
    walk_and_collect(&dom.document, &mut out);
    out
}

/// Recurse through the DOM, pulling URL-bearing attribute values off every
/// element node.
fn walk_and_collect(handle: &Handle, out: &mut Vec<String>) {
    if let NodeData::Element { name, attrs, .. } = &handle.data {
        let attrs = attrs.borrow();

        for attr_name in URL_ATTRIBUTES {
            if let Some(attr) = attrs.iter().find(|a| a.name.local.as_ref() == *attr_name) {
                push_nonempty(out, &attr.value);
            }
        }

        if name.local == local_name!("object") {
            if let Some(attr) = attrs.iter().find(|a| a.name.local == local_name!("data")) {
                push_nonempty(out, &attr.value);
            }
        }

        if let Some(attr) = attrs.iter().find(|a| a.name.local == local_name!("srcset")) {
            for descriptor in attr.value.split(',') {
                if let Some(url) = descriptor.trim().split_whitespace().next() {
                    push_nonempty(out, url);
                }
            }
        }

        for attr in attrs.iter() {
            if attr.name.local.starts_with("data-") && looks_url_like(&attr.value) {
                push_nonempty(out, &attr.value);
            }
        }
    }

    for child in handle.children.borrow().iter() {
        walk_and_collect(child, out);
    }
}

fn push_nonempty(out: &mut Vec<String>, value: &str) {
    let v = value.trim();
    if !v.is_empty() {
        out.push(v.to_string());
    }
}

/// A `data-*` attribute's value "looks URL-like" if it has a scheme, starts
/// with `/`, or contains a dotted host-shaped component — the same
/// structural signal the candidate filter (C6) applies, kept intentionally
/// loose here since C6 re-validates every value this extractor emits.
fn looks_url_like(value: &str) -> bool {
    let v = value.trim();
    v.starts_with("http://")
        || v.starts_with("https://")
        || v.starts_with("//")
        || v.starts_with('/')
        || (v.contains('.') && !v.contains(' ') && v.len() > 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_html_fragments() {
        assert!(looks_like_html("<a href=\"/x\">y</a>"));
        assert!(looks_like_html("  <!DOCTYPE html><html></html>"));
        assert!(!looks_like_html("/api/v2/users"));
    }

    #[test]
    fn extracts_href_and_src() {
        let html = r#"<div><a href="/users/1">u</a><img src="https://cdn.example.com/a.png"></div>"#;
        let urls = extract_urls(html, HtmlParserKind::Html5Ever);
        assert!(urls.contains(&"/users/1".to_string()));
        assert!(urls.contains(&"https://cdn.example.com/a.png".to_string()));
    }

    #[test]
    fn extracts_srcset_descriptors() {
        let html = r#"<img srcset="/a.png 1x, /b.png 2x">"#;
        let urls = extract_urls(html, HtmlParserKind::Html5Ever);
        assert!(urls.contains(&"/a.png".to_string()));
        assert!(urls.contains(&"/b.png".to_string()));
    }

    #[test]
    fn extracts_object_data_attribute() {
        let html = r#"<object data="/embed/1"></object>"#;
        let urls = extract_urls(html, HtmlParserKind::Html5Ever);
        assert!(urls.contains(&"/embed/1".to_string()));
    }

    #[test]
    fn extracts_url_like_data_attributes() {
        let html = r#"<div data-endpoint="/api/v2/profile" data-label="not a url"></div>"#;
        let urls = extract_urls(html, HtmlParserKind::Html5Ever);
        assert!(urls.contains(&"/api/v2/profile".to_string()));
        assert!(!urls.contains(&"not a url".to_string()));
    }
}
