//! Grapheme/word-boundary-aware tokenization (§4.3), used by phrase matching against donation
//! example phrases (the `intents` crate) and by the NLU recognizer.

use unicode_segmentation::UnicodeSegmentation;

/// Lowercased Unicode words, in order. Matches the donor's use of `unicode-segmentation` for
/// locale-aware word splitting rather than ASCII `split_whitespace`.
pub fn tokenize_words(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Extended grapheme clusters, for contexts that need to count or slice "characters" as a user
/// would perceive them rather than by Unicode scalar value.
pub fn tokenize_graphemes(text: &str) -> Vec<&str> {
    text.graphemes(true).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_word_boundaries_and_lowercases() {
        assert_eq!(
            tokenize_words("Set a Timer!"),
            vec!["set", "a", "timer"]
        );
    }

    #[test]
    fn grapheme_count_handles_combining_marks() {
        // "é" as a single combining grapheme (e + combining acute) is still one grapheme.
        let text = "e\u{0301}";
        assert_eq!(tokenize_graphemes(text).len(), 1);
    }
}
