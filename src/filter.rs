//! Candidate filter (C6).
//!
//! Classifies and rejects junk: MIME types, dotted property paths, W3C/XML
//! namespaces, placeholders, date-format placeholders, timezone identifiers,
//! and anything with no structural URL signal. Survivors are full URLs,
//! absolute paths, protocol-relative URLs, or bare domains
//! (distilled-spec §4.6).

use std::sync::OnceLock;

use regex::Regex;

use crate::config::Filtering;

const DEFAULT_EXTENSIONS: &[&str] = &[
    "html", "htm", "json", "js", "css", "png", "jpg", "jpeg", "gif", "svg", "ico", "woff",
    "woff2", "ttf", "eot", "map", "xml", "pdf", "txt", "csv", "mp4", "webp", "webm", "wasm",
];

/// The W3C/XML-namespace prefixes this filter always allowlists (rejected as
/// junk, not retained).
const NAMESPACE_PREFIXES: &[&str] = &[
    "http://www.w3.org/",
    "https://www.w3.org/",
    "http://schemas.xmlsoap.org/",
    "http://schemas.microsoft.com/",
    "http://purl.org/",
    "http://xmlns.com/",
];

/// A handful of well-known two-segment IANA timezone identifiers. Exhaustive
/// enumeration of the tz database is out of scope; this catches the common
/// cases the distilled spec calls out (`America/New_York` and similar).
const TIMEZONE_REGIONS: &[&str] = &[
    "America", "Europe", "Asia", "Africa", "Australia", "Pacific", "Atlantic", "Indian",
    "Antarctica", "Arctic",
];

/// A dotted string ending in one of these is treated as a hostname (a bare
/// domain), not a dotted property-access path, even though both shapes match
/// the same `a.b.c` regex (distilled-spec §4.6, "Bare domains... pass if
/// they contain a dot and a known TLD pattern").
const KNOWN_TLDS: &[&str] = &[
    "com", "net", "org", "io", "dev", "app", "co", "ai", "gov", "edu", "info", "biz", "me",
    "tv", "us", "uk", "de", "fr", "jp", "cn", "ru", "in", "cloud", "api", "xyz", "tech",
];

fn mime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]+/[a-z0-9.+-]+(;.*)?$").unwrap())
}

fn scheme_stub_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]+://$").unwrap())
}

fn dotted_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)+$").unwrap())
}

fn date_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^/?(yyyy|YYYY)/(mm|MM)/(dd|DD)(/.*)?$").unwrap())
}

fn timezone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][a-zA-Z_]+/[A-Z][a-zA-Z_]+$").unwrap())
}

fn placeholder_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\{[A-Za-z_][A-Za-z0-9_]*\}|FUZZ|/)+$").unwrap())
}

fn bare_domain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$").unwrap()
    })
}

/// Decide whether `candidate` should be retained. `placeholder` is the
/// configured placeholder token (default `FUZZ`), so generic
/// placeholder-only strings built from it are rejected regardless of what it
/// was configured to.
pub fn accept(candidate: &str, placeholder: &str, filtering: &Filtering) -> bool {
    let trimmed = trim_unbalanced_brackets(candidate);
    if trimmed.is_empty() {
        return false;
    }
    !is_rejected(&trimmed, placeholder) || has_allowlisted_extension(&trimmed, filtering)
}

fn is_rejected(s: &str, placeholder: &str) -> bool {
    if is_scheme_stub(s) {
        return true;
    }
    // MIME shapes have exactly one slash and no further path components; a
    // real path candidate would have more than one segment or a leading
    // slash.
    if mime_re().is_match(s) && s.matches('/').count() == 1 && !s.starts_with('/') {
        return true;
    }
    if dotted_path_re().is_match(s) && !looks_like_hostname(s) {
        return true;
    }
    if NAMESPACE_PREFIXES.iter().any(|p| s.starts_with(p)) {
        return true;
    }
    if is_generic_test_url(s) {
        return true;
    }
    if is_placeholder_only(s, placeholder) {
        return true;
    }
    if date_placeholder_re().is_match(s) {
        return true;
    }
    if is_timezone_identifier(s) {
        return true;
    }
    if !has_structural_url_signal(s) {
        return true;
    }
    false
}

fn is_scheme_stub(s: &str) -> bool {
    matches!(s, "https://" | "http://" | "//" | "http:") || scheme_stub_re().is_match(s)
}

fn is_generic_test_url(s: &str) -> bool {
    matches!(
        s,
        "http://localhost" | "http://a" | "http://b" | "https://localhost" | "https://a" | "https://b"
    )
}

fn is_placeholder_only(s: &str, placeholder: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if placeholder_only_re().is_match(s) {
        return true;
    }
    // Also reject strings built solely from the configured placeholder and
    // path separators, e.g. "FUZZ/FUZZ" with a non-default placeholder.
    let stripped: String = s
        .split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if stripped.is_empty() {
        return false;
    }
    stripped
        .split('/')
        .all(|seg| seg == placeholder || is_braced_token(seg))
}

fn is_braced_token(seg: &str) -> bool {
    seg.starts_with('{') && seg.ends_with('}') && seg.len() > 2
}

fn looks_like_hostname(s: &str) -> bool {
    s.rsplit('.')
        .next()
        .map(|tld| KNOWN_TLDS.contains(&tld.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_timezone_identifier(s: &str) -> bool {
    if !timezone_re().is_match(s) {
        return false;
    }
    let Some((region, _)) = s.split_once('/') else {
        return false;
    };
    TIMEZONE_REGIONS.contains(&region)
}

/// No scheme, no leading `/`, no dotted host component: there is nothing
/// URL-shaped about the string at all.
fn has_structural_url_signal(s: &str) -> bool {
    if s.starts_with("http://") || s.starts_with("https://") || s.starts_with("//") {
        return true;
    }
    if s.starts_with('/') {
        return true;
    }
    if bare_domain_re().is_match(s) && s.contains('.') {
        return true;
    }
    false
}

fn has_allowlisted_extension(s: &str, filtering: &Filtering) -> bool {
    let path_part = s.split(['?', '#']).next().unwrap_or(s);
    let Some(last_segment) = path_part.rsplit('/').next() else {
        return false;
    };
    let Some((_, ext)) = last_segment.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    DEFAULT_EXTENSIONS.contains(&ext.as_str())
        || filtering.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
}

/// Trim unbalanced trailing `)`, `]`, `}` when the corresponding opener does
/// not appear earlier in the candidate (distilled-spec §4.6).
fn trim_unbalanced_brackets(s: &str) -> String {
    let mut end = s.len();
    let bytes = s.as_bytes();
    loop {
        if end == 0 {
            break;
        }
        let last = bytes[end - 1];
        let opener = match last {
            b')' => b'(',
            b']' => b'[',
            b'}' => b'{',
            _ => break,
        };
        let prefix = &s[..end - 1];
        if prefix.as_bytes().contains(&opener) {
            break;
        }
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Filtering {
        Filtering::default()
    }

    #[test]
    fn rejects_scheme_stubs() {
        assert!(!accept("https://", "FUZZ", &cfg()));
        assert!(!accept("http://", "FUZZ", &cfg()));
        assert!(!accept("//", "FUZZ", &cfg()));
        assert!(!accept("ftp://", "FUZZ", &cfg()));
    }

    #[test]
    fn rejects_mime_types() {
        assert!(!accept("application/json", "FUZZ", &cfg()));
        assert!(!accept("text/html; charset=utf-8", "FUZZ", &cfg()));
    }

    #[test]
    fn rejects_dotted_identifier_paths() {
        assert!(!accept("user.profile.name", "FUZZ", &cfg()));
    }

    #[test]
    fn rejects_w3c_namespace() {
        assert!(!accept("http://www.w3.org/2000/svg", "FUZZ", &cfg()));
    }

    #[test]
    fn rejects_generic_test_urls() {
        assert!(!accept("http://localhost", "FUZZ", &cfg()));
        assert!(!accept("http://a", "FUZZ", &cfg()));
    }

    #[test]
    fn rejects_placeholder_only() {
        assert!(!accept("FUZZ/FUZZ", "FUZZ", &cfg()));
        assert!(!accept("{x}/{y}", "FUZZ", &cfg()));
    }

    #[test]
    fn rejects_date_placeholder() {
        assert!(!accept("/yyyy/mm/dd/posts", "FUZZ", &cfg()));
    }

    #[test]
    fn rejects_timezone_identifiers() {
        assert!(!accept("America/New_York", "FUZZ", &cfg()));
    }

    #[test]
    fn accepts_real_paths_and_domains() {
        assert!(accept("/api/v2/users", "FUZZ", &cfg()));
        assert!(accept("https://api.example.com/v1", "FUZZ", &cfg()));
        assert!(accept("api.example.com", "FUZZ", &cfg()));
    }

    #[test]
    fn trims_unbalanced_trailing_bracket() {
        assert!(accept("/api/v2/users)", "FUZZ", &cfg()));
    }

    #[test]
    fn rejects_bare_identifier_with_no_slash_no_dot() {
        assert!(!accept("users", "FUZZ", &cfg()));
    }
}
