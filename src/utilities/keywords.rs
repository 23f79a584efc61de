//! Keyword matching shared by the reply classifier and the poll selector.

use regex::Regex;

/// Keywords this short must match a whole word.
pub const WHOLE_WORD_MAX_LEN: usize = 4;

/// Longer keywords that also start unrelated words ("nevertheless").
pub const WHOLE_WORD_KEYWORDS: &[&str] = &["never", "refuse"];

/// Case-insensitive pattern matching any of `keywords` at a word start.
/// Short keywords ("no", "ai") and [`WHOLE_WORD_KEYWORDS`] must match the
/// whole word.
pub fn keyword_pattern(keywords: &[&str]) -> String {
    let alternatives = keywords
        .iter()
        .map(|k| {
            let escaped = regex::escape(k);
            let whole_word = k.chars().count() <= WHOLE_WORD_MAX_LEN
                || WHOLE_WORD_KEYWORDS.iter().any(|w| w.eq_ignore_ascii_case(k));
            if whole_word {
                format!(r"{}\b", escaped)
            } else {
                escaped
            }
        })
        .collect::<Vec<_>>()
        .join("|");
    format!(r"(?i)\b(?:{})", alternatives)
}

/// Compile [`keyword_pattern`].
pub fn keyword_regex(keywords: &[&str]) -> Result<Regex, regex::Error> {
    Regex::new(&keyword_pattern(keywords))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_start_and_whole_word() {
        let re = keyword_regex(&["support", "no"]).unwrap();
        assert!(re.is_match("Supporting it"));
        assert!(re.is_match("no way"));
        assert!(!re.is_match("unsupported"));
        assert!(!re.is_match("nothing"));
    }

    #[test]
    fn test_negations_match_whole_words() {
        let re = keyword_regex(&["never", "refuse"]).unwrap();
        assert!(re.is_match("Never again"));
        assert!(re.is_match("I refuse."));
        assert!(!re.is_match("Nevertheless, fine"));
        assert!(!re.is_match("They refused to comment"));
    }

    #[test]
    fn test_phrases_are_escaped() {
        assert_eq!(keyword_pattern(&["wouldn't buy", "a.i"]), r"(?i)\b(?:wouldn't buy|a\.i\b)");
    }
}
