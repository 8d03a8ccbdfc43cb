use crate::text::tokenize;

/// How a keyword term is compared against post text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordPattern {
    /// `"quoted phrase"`: exact, case-insensitive substring.
    Phrase(String),
    /// Unquoted: every term token must start some token of the text, so
    /// "crm" also matches "crms".
    Tokens(Vec<String>),
}

impl KeywordPattern {
    pub fn parse(term: &str) -> Self {
        let trimmed = term.trim();
        let quoted = trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"');
        if quoted {
            let inner = trimmed[1..trimmed.len() - 1].trim().to_lowercase();
            KeywordPattern::Phrase(inner)
        } else {
            KeywordPattern::Tokens(tokenize(trimmed))
        }
    }

    pub fn matches(&self, text: &PreparedText) -> bool {
        match self {
            KeywordPattern::Phrase(phrase) => !phrase.is_empty() && text.lowered.contains(phrase),
            KeywordPattern::Tokens(tokens) => {
                !tokens.is_empty()
                    && tokens
                        .iter()
                        .all(|needle| text.tokens.iter().any(|t| t.starts_with(needle.as_str())))
            }
        }
    }
}

/// Text lowercased and tokenized once per candidate.
#[derive(Debug, Clone)]
pub struct PreparedText {
    pub lowered: String,
    pub tokens: Vec<String>,
}

impl PreparedText {
    pub fn new(text: &str) -> Self {
        Self {
            lowered: text.to_lowercase(),
            tokens: tokenize(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLocation {
    Title,
    Body,
}

/// Where a pattern hits, title taking precedence.
pub fn locate(pattern: &KeywordPattern, title: &PreparedText, body: &PreparedText) -> Option<MatchLocation> {
    if pattern.matches(title) {
        Some(MatchLocation::Title)
    } else if pattern.matches(body) {
        Some(MatchLocation::Body)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquoted_terms_match_tokens_in_any_order() {
        let pattern = KeywordPattern::parse("best CRM");
        assert!(pattern.matches(&PreparedText::new("What's the best CRM for solopreneurs?")));
        assert!(pattern.matches(&PreparedText::new("CRM tools: which is best?")));
        assert!(pattern.matches(&PreparedText::new("Best CRMs of 2024")));
        assert!(!pattern.matches(&PreparedText::new("The best spreadsheet")));
    }

    #[test]
    fn test_unquoted_terms_do_not_match_inside_words() {
        let pattern = KeywordPattern::parse("crm");
        assert!(!pattern.matches(&PreparedText::new("the acrm toolkit")));
    }

    #[test]
    fn test_quoted_phrase_requires_exact_substring() {
        let pattern = KeywordPattern::parse("\"best CRM\"");
        assert_eq!(pattern, KeywordPattern::Phrase("best crm".to_string()));
        assert!(pattern.matches(&PreparedText::new("Looking for the BEST CRM today")));
        assert!(!pattern.matches(&PreparedText::new("CRM that is best")));
    }

    #[test]
    fn test_empty_patterns_never_match() {
        assert!(!KeywordPattern::parse("\"\"").matches(&PreparedText::new("anything")));
        assert!(!KeywordPattern::parse("!!!").matches(&PreparedText::new("!!!")));
    }

    #[test]
    fn test_title_takes_precedence() {
        let pattern = KeywordPattern::parse("invoicing");
        let title = PreparedText::new("Invoicing software?");
        let body = PreparedText::new("I need invoicing");
        assert_eq!(locate(&pattern, &title, &body), Some(MatchLocation::Title));

        let title = PreparedText::new("Need advice");
        assert_eq!(locate(&pattern, &title, &body), Some(MatchLocation::Body));
    }
}
