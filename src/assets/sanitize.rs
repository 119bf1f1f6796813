//! Title to folder-name tokens.

/// Longest token produced by [`sanitize`], in characters.
pub const MAX_TOKEN_LEN: usize = 50;

/// Map a free-text title to a filesystem-safe, lowercase folder token.
///
/// Every character outside `[A-Za-z0-9-]` becomes `_`, runs of `_` collapse
/// to one, leading and trailing `_` are stripped, and the result is cut to
/// [`MAX_TOKEN_LEN`] characters. Distinct titles can share a token.
pub fn sanitize(title: &str) -> String {
    let mut token = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            token.push(c);
        } else if !token.ends_with('_') {
            token.push('_');
        }
    }

    token
        .trim_matches('_')
        .chars()
        .take(MAX_TOKEN_LEN)
        .collect::<String>()
        .to_lowercase()
}
