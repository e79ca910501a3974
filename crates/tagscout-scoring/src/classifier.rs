//! Substantive-comment classifier behind the audience-quality score.
//!
//! A comment is substantive when, after `@mentions` and links are removed,
//! it
//! - is at least `min_chars` characters long (trimmed),
//! - contains at least two words with letters in them,
//! - uses more than three distinct letters or digits (rules out
//!   `hahahahaha`, `!!!!!!!!!!!!`, emoji runs),
//! - and matches none of the engagement-bait patterns.

use std::collections::HashSet;
use std::sync::LazyLock;

static MENTION_OR_LINK: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)@[\w.]+|https?://\S+|www\.\S+").expect("valid mention regex")
});

/// Follow-for-follow, self-promotion, and giveaway bait.
static SPAM_PATTERNS: LazyLock<Vec<regex::Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bfollow\s*(me|back|4\s*follow)\b",
        r"(?i)\b(f4f|l4l|s4s|sub4sub|like4like)\b",
        r"(?i)\bcheck\s+(out\s+)?my\s+(page|profile|bio|channel|account)\b",
        r"(?i)\blink\s+in\s+(my\s+)?bio\b",
        r"(?i)\b(dm|message)\s+(me\s+)?(for|to)\s+(collab|promo|business|more)\b",
        r"(?i)\b(free|win)\s+(followers|giveaway|gift\s*card)\b",
    ]
    .iter()
    .map(|p| regex::Regex::new(p).expect("valid spam regex"))
    .collect()
});

const MIN_WORDS: usize = 2;
const MIN_DISTINCT_ALNUM: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentClassifier {
    min_chars: usize,
}

impl CommentClassifier {
    #[must_use]
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    #[must_use]
    pub fn is_substantive(&self, text: &str) -> bool {
        let stripped = MENTION_OR_LINK.replace_all(text, " ");
        let body = stripped.trim();

        if body.chars().count() < self.min_chars {
            return false;
        }
        let words = body
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphabetic))
            .count();
        if words < MIN_WORDS {
            return false;
        }
        let distinct: HashSet<char> = body
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        if distinct.len() < MIN_DISTINCT_ALNUM {
            return false;
        }
        !SPAM_PATTERNS.iter().any(|re| re.is_match(body))
    }
}

impl Default for CommentClassifier {
    fn default() -> Self {
        Self::new(12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substantive(text: &str) -> bool {
        CommentClassifier::default().is_substantive(text)
    }

    #[test]
    fn real_questions_and_reactions_count() {
        assert!(substantive("which sunscreen do you use for oily skin?"));
        assert!(substantive("tried the toner tip and it really works"));
        assert!(substantive("Ce sérum a changé ma peau"));
    }

    #[test]
    fn short_comments_do_not_count() {
        assert!(!substantive("so cute"));
        assert!(!substantive("first!!!!!!!!!!!"));
    }

    #[test]
    fn emoji_and_laughter_runs_do_not_count() {
        assert!(!substantive("😍😍😍😍😍😍😍😍😍😍😍😍"));
        assert!(!substantive("hahahahaha hahahaha"));
        assert!(!substantive("lol lol lol lol lol"));
    }

    #[test]
    fn mentions_and_links_are_not_content() {
        assert!(!substantive("@bestie @skinqueen @glowgirl"));
        assert!(!substantive("omg https://shop.example.com/deal?id=123"));
    }

    #[test]
    fn engagement_bait_is_spam() {
        assert!(!substantive("great video!! follow me back please"));
        assert!(!substantive("check out my page for skincare tips"));
        assert!(!substantive("f4f anyone? let's grow together"));
        assert!(!substantive("dm me for collab opportunities babe"));
    }

    #[test]
    fn threshold_is_configurable() {
        let strict = CommentClassifier::new(40);
        assert!(!strict.is_substantive("love how gentle the cleanser feels"));
        assert!(CommentClassifier::new(5).is_substantive("love it so much"));
    }
}
