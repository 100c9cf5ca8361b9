//! Word counts and reading-time estimates for post bodies.
//!
//! Words are counted by splitting on a single space, exactly: runs of spaces
//! produce empty tokens that still count, and empty text counts as one
//! token. The estimates on already-published pages depend on this, so it
//! must not be "fixed" into whitespace-collapsing tokenization.

use crate::document::ContentBlock;

/// The assumed reading speed.
pub const WORDS_PER_MINUTE: usize = 200;

/// Counts the words of every heading and every body block's text.
pub fn word_count(content: &[ContentBlock]) -> usize {
    content
        .iter()
        .map(|block| {
            let body: usize =
                block.body.iter().map(|span| tokens(&span.text)).sum();
            tokens(&block.heading) + body
        })
        .sum()
}

/// Estimates the minutes needed to read `content`, rounding up. Empty
/// content takes 0 minutes; the estimate is not floored at 1.
pub fn reading_time(content: &[ContentBlock]) -> usize {
    minutes(word_count(content))
}

/// Converts a word count into minutes at [`WORDS_PER_MINUTE`], rounding up.
pub fn minutes(words: usize) -> usize {
    (words + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE
}

fn tokens(text: &str) -> usize {
    text.split(' ').count()
}
