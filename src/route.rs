//! Route-param normalizer (C4).
//!
//! Rewrites `:name` and `[NAME]` route-parameter syntax into `{name}` form.
//! Applied to every candidate after evaluation, before the filter (C6); only
//! the normalized form is retained (distilled-spec §4.4).

/// Normalize route-parameter syntax in `text`, returning the rewritten string.
pub fn normalize(text: &str) -> String {
    let bracketed = normalize_brackets(text);
    normalize_colon_params(&bracketed)
}

/// `[NAME]` -> `{NAME}`, where `NAME` matches `[A-Za-z_][A-Za-z0-9_]*`.
fn normalize_brackets(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some(end) = find_ident_close(text, i + 1, b']') {
                out.push('{');
                out.push_str(&text[i + 1..end]);
                out.push('}');
                i = end + 1;
                continue;
            }
        }
        let ch_len = next_char_len(text, i);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// `:name` -> `{name}`, only where the preceding character is `/` or the
/// candidate start.
fn normalize_colon_params(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' && (i == 0 || bytes[i - 1] == b'/') {
            if let Some(end) = find_ident_close_unterminated(text, i + 1) {
                out.push('{');
                out.push_str(&text[i + 1..end]);
                out.push('}');
                i = end;
                continue;
            }
        }
        let ch_len = next_char_len(text, i);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

fn is_ident_start(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphanumeric()
}

/// Matches `[A-Za-z_][A-Za-z0-9_]*` starting at `start`, requiring the
/// identifier to be immediately followed by `closer`. Returns the byte index
/// of the identifier's end (exclusive) on success.
fn find_ident_close(text: &str, start: usize, closer: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    if start >= bytes.len() || !is_ident_start(bytes[start]) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && is_ident_continue(bytes[end]) {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == closer {
        Some(end)
    } else {
        None
    }
}

/// Matches `[A-Za-z_][A-Za-z0-9_]*` starting at `start`, with no required
/// terminator (the `:name` form ends wherever the identifier characters end).
fn find_ident_close_unterminated(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if start >= bytes.len() || !is_ident_start(bytes[start]) {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && is_ident_continue(bytes[end]) {
        end += 1;
    }
    Some(end)
}

fn next_char_len(text: &str, at: usize) -> usize {
    text[at..].chars().next().map(|c| c.len_utf8()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_param_after_slash() {
        assert_eq!(normalize("/users/:id/profile"), "/users/{id}/profile");
    }

    #[test]
    fn colon_param_at_start() {
        assert_eq!(normalize(":id/profile"), "{id}/profile");
    }

    #[test]
    fn colon_not_preceded_by_slash_untouched() {
        assert_eq!(normalize("scheme:foo"), "scheme:foo");
    }

    #[test]
    fn bracket_param() {
        assert_eq!(normalize("/api/[id]/edit"), "/api/{id}/edit");
    }

    #[test]
    fn mixed_params() {
        assert_eq!(normalize("/api/:version/[id]"), "/api/{version}/{id}");
    }

    #[test]
    fn no_remaining_route_syntax() {
        let out = normalize("/a/:b/[C]/d");
        assert!(!out.contains(":b"));
        assert!(!out.contains("[C]"));
        assert_eq!(out, "/a/{b}/{C}/d");
    }
}
