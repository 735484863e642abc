//! Token estimation for rendered preambles.
//!
//! Character heuristic: about 4 characters per token, rounded up.

pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}
