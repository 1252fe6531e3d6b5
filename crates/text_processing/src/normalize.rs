//! Number expansion and whitespace normalization (§4.3 "Text processing").
//!
//! Grounded on the donor's `AbbreviationExpander`: a `Lazy`-compiled dictionary plus a single
//! regex pass, here repurposed for digit sequences instead of acronyms.

use once_cell::sync::Lazy;
use regex::Regex;

static DIGIT_SEQUENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];
const SCALES: [(u64, &str); 4] = [
    (1_000_000_000, "billion"),
    (1_000_000, "million"),
    (1_000, "thousand"),
    (100, "hundred"),
];

/// Spell out an integer as English words. Numbers beyond `u64` range are passed through
/// digit-by-digit rather than failing the whole utterance.
pub fn number_to_words(n: u64) -> String {
    if n < 20 {
        return ONES[n as usize].to_string();
    }
    if n < 100 {
        let tens = TENS[(n / 10) as usize];
        let rest = n % 10;
        return if rest == 0 {
            tens.to_string()
        } else {
            format!("{tens}-{}", ONES[rest as usize])
        };
    }
    for (scale, name) in SCALES {
        if n >= scale {
            let count = n / scale;
            let rest = n % scale;
            let head = format!("{} {name}", number_to_words(count));
            return if rest == 0 {
                head
            } else {
                format!("{head} {}", number_to_words(rest))
            };
        }
    }
    n.to_string()
}

/// Expand every run of digits in `text` into spoken words, for feeding natural-language output
/// through TTS (e.g. a timer duration or a recognized quantity).
pub fn expand_numbers(text: &str) -> String {
    DIGIT_SEQUENCE
        .replace_all(text, |caps: &regex::Captures| {
            match caps[0].parse::<u64>() {
                Ok(n) => number_to_words(n),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Collapse runs of whitespace and trim the ends. Idempotent.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The text_processing stage's single entry point: whitespace collapse then number expansion.
/// Pure, no side effects, safe to re-run (§4.3's "idempotent-ish").
pub fn normalize(text: &str) -> String {
    expand_numbers(&collapse_whitespace(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spells_out_small_numbers() {
        assert_eq!(number_to_words(0), "zero");
        assert_eq!(number_to_words(15), "fifteen");
        assert_eq!(number_to_words(42), "forty-two");
    }

    #[test]
    fn spells_out_large_numbers() {
        assert_eq!(number_to_words(100), "one hundred");
        assert_eq!(number_to_words(305), "three hundred five");
        assert_eq!(number_to_words(1_250), "one thousand two hundred fifty");
    }

    #[test]
    fn expands_digit_runs_within_a_sentence() {
        assert_eq!(expand_numbers("set a timer for 5 minutes"), "set a timer for five minutes");
        assert_eq!(expand_numbers("wait 120 seconds"), "wait one hundred twenty seconds");
    }

    #[test]
    fn collapses_excess_whitespace() {
        assert_eq!(collapse_whitespace("  set   a   timer  "), "set a timer");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("set a timer for  10   minutes");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }
}
