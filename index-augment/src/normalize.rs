//! Text normalization applied before encoding.

/// Collapses every run of whitespace into one ASCII space and trims both ends.
///
/// Pure and total: any input yields a (possibly empty) string.
///
/// # Example
/// ```
/// use index_augment::normalize::normalize_whitespace;
/// assert_eq!(normalize_whitespace("  a \t\n  b "), "a b");
/// ```
pub fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_trims() {
        assert_eq!(normalize_whitespace("  a   b "), "a b");
        assert_eq!(normalize_whitespace("x  y"), "x y");
        assert_eq!(normalize_whitespace("line\r\n\tnext"), "line next");
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(normalize_whitespace(""), "");
        assert_eq!(normalize_whitespace(" \n\t "), "");
        assert_eq!(normalize_whitespace("solo"), "solo");
    }

    #[test]
    fn unicode_whitespace_counts() {
        // U+00A0 NO-BREAK SPACE and U+3000 IDEOGRAPHIC SPACE
        assert_eq!(normalize_whitespace("a\u{00A0}\u{3000}b"), "a b");
    }
}
