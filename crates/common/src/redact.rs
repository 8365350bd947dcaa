//! Display helpers for secrets

/// Characters of a token shown before truncation.
pub const PREVIEW_LEN: usize = 50;

/// First [`PREVIEW_LEN`] characters of `token`, with `...` when truncated.
#[must_use]
pub fn token_preview(token: &str) -> String {
    match token.char_indices().nth(PREVIEW_LEN) {
        Some((idx, _)) => format!("{}...", &token[..idx]),
        None => token.to_string(),
    }
}
