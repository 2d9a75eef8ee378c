//! Visible-text normalization

/// Lower-case, drop punctuation and symbols, collapse whitespace.
///
/// Letters and digits of every script survive, so Hebrew labels compare the
/// same way Latin ones do.
pub fn normalize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else if ch.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Containment in either direction after normalization. Handles both
/// truncated and padded label variants. Empty strings never match.
pub fn texts_match(actual: &str, wanted: &str) -> bool {
    let actual = normalize_text(actual);
    let wanted = normalize_text(wanted);
    if actual.is_empty() || wanted.is_empty() {
        return false;
    }
    actual.contains(&wanted) || wanted.contains(&actual)
}
