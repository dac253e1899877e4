//! Text preparation for narration: sentence segmentation of podcast scripts.
//!
//! Pure functions, no I/O.

use regex::Regex;
use std::sync::LazyLock;

// A sentence is any text up to a run of terminators, optionally closed by one
// quote mark. Whatever trails the last terminator is its own sentence.
static RE_SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^.!?]*[.!?]+["'”’»]?|[^.!?]+$"#).expect("sentence regex is valid")
});

/// Split a narration script into utterances.
///
/// Breaks after every run of `.`, `!` or `?` (plus an optional closing quote)
/// and keeps an unterminated tail as the final utterance. Each utterance is
/// trimmed; whitespace-only pieces are dropped.
///
/// Never returns an empty vector: a script that yields no pieces (empty or
/// whitespace-only) comes back as a single utterance equal to the script.
pub fn split_utterances(script: &str) -> Vec<String> {
    let utterances: Vec<String> = RE_SENTENCE
        .find_iter(script)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if utterances.is_empty() {
        return vec![script.to_string()];
    }
    utterances
}

/// Strip all whitespace, for comparing a script against its rejoined pieces.
pub fn squash_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejoins(script: &str) {
        let joined: String = split_utterances(script).concat();
        assert_eq!(squash_whitespace(&joined), squash_whitespace(script), "script: {script:?}");
    }

    #[test]
    fn single_sentence() {
        assert_eq!(split_utterances("Hello world."), vec!["Hello world."]);
    }

    #[test]
    fn mixed_terminators_keep_order() {
        assert_eq!(
            split_utterances("One. Two! Three?"),
            vec!["One.", "Two!", "Three?"]
        );
    }

    #[test]
    fn no_terminator_is_whole_script() {
        assert_eq!(
            split_utterances("No terminator here"),
            vec!["No terminator here"]
        );
    }

    #[test]
    fn trailing_remainder_is_kept() {
        assert_eq!(
            split_utterances("Host A: Welcome. Host B: Thanks for having me"),
            vec!["Host A: Welcome.", "Host B: Thanks for having me"]
        );
    }

    #[test]
    fn terminator_runs_stay_together() {
        assert_eq!(
            split_utterances("Wait... what?! Really"),
            vec!["Wait...", "what?!", "Really"]
        );
    }

    #[test]
    fn closing_quote_stays_with_sentence() {
        assert_eq!(
            split_utterances(r#"She said "go." Then left."#),
            vec![r#"She said "go.""#, "Then left."]
        );
        assert_eq!(
            split_utterances("Dijo «vamos.» Y se fue."),
            vec!["Dijo «vamos.»", "Y se fue."]
        );
    }

    #[test]
    fn leading_punctuation_is_not_lost() {
        let s = split_utterances("...and then. Done");
        assert_eq!(s, vec!["...", "and then.", "Done"]);
        rejoins("...and then. Done");
    }

    #[test]
    fn empty_script_is_single_utterance() {
        assert_eq!(split_utterances(""), vec![""]);
    }

    #[test]
    fn whitespace_script_is_single_utterance() {
        assert_eq!(split_utterances("   \n "), vec!["   \n "]);
    }

    #[test]
    fn multibyte_text() {
        assert_eq!(
            split_utterances("¿Qué tal? ¡Muy bien! Adiós."),
            vec!["¿Qué tal?", "¡Muy bien!", "Adiós."]
        );
    }

    #[test]
    fn rejoined_pieces_match_script() {
        for script in [
            "Hello world.",
            "One. Two! Three?",
            "No terminator here",
            "  spaced   out.  text ",
            "Line one.\n\nLine two!\nTrailing",
            "?!.",
            "a.b.c",
            r#"Quote "this." 'And that!' ok"#,
        ] {
            assert!(!split_utterances(script).is_empty());
            rejoins(script);
        }
    }
}
