//! Splitting long replies to fit Discord's message size.

/// Maximum characters in one Discord message.
pub const MESSAGE_LIMIT: usize = 2000;

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Cuts fall on character boundaries only, so concatenating the chunks gives
/// back the original text.
pub fn split_response(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let split_at = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(index, _)| index)
            .unwrap_or(remaining.len());
        let (chunk, rest) = remaining.split_at(split_at);
        chunks.push(chunk.to_string());
        remaining = rest;
    }

    chunks
}
