use crate::text::contains_sequence;

pub const TYPE_HOW_TO: &str = "how_to";
pub const TYPE_COMPARISON: &str = "comparison";
pub const TYPE_RECOMMENDATION_REQUEST: &str = "recommendation_request";
pub const TYPE_PROBLEM: &str = "problem";
pub const TYPE_QUESTION: &str = "question";
pub const TYPE_GENERAL_DISCUSSION: &str = "general_discussion";

struct Rule {
    opportunity_type: &'static str,
    phrases: &'static [&'static [&'static str]],
}

const RULES: &[Rule] = &[
    Rule {
        opportunity_type: TYPE_HOW_TO,
        phrases: &[
            &["how", "to"],
            &["how", "do", "i"],
            &["how", "can", "i"],
            &["how", "do", "you"],
            &["tutorial"],
            &["step", "by", "step"],
            &["guide"],
        ],
    },
    Rule {
        opportunity_type: TYPE_COMPARISON,
        phrases: &[
            &["vs"],
            &["versus"],
            &["compared", "to"],
            &["comparison"],
            &["better", "than"],
            &["switch", "from"],
            &["switching", "from"],
        ],
    },
    Rule {
        opportunity_type: TYPE_RECOMMENDATION_REQUEST,
        phrases: &[
            &["recommend"],
            &["recommendation"],
            &["recommendations"],
            &["suggest"],
            &["suggestions"],
            &["looking", "for"],
            &["best"],
            &["alternative"],
            &["alternatives"],
            &["any", "good"],
        ],
    },
    Rule {
        opportunity_type: TYPE_PROBLEM,
        phrases: &[
            &["problem"],
            &["issue"],
            &["issues"],
            &["error"],
            &["bug"],
            &["broken"],
            &["not", "working"],
            &["doesn't", "work"],
            &["struggling"],
            &["frustrated"],
        ],
    },
];

/// Best-effort categorisation of a post. The category with strictly the most
/// rule hits wins; ties fall back to general discussion. A post with no rule
/// hits whose title is a question is tagged as a plain question.
pub fn classify(title: &str, tokens: &[String]) -> &'static str {
    let mut best: Option<(&'static str, usize)> = None;
    let mut tied = false;

    for rule in RULES {
        let hits = rule
            .phrases
            .iter()
            .filter(|phrase| contains_sequence(tokens, phrase))
            .count();
        if hits == 0 {
            continue;
        }
        match best {
            Some((_, top)) if hits < top => {}
            Some((_, top)) if hits == top => tied = true,
            _ => {
                best = Some((rule.opportunity_type, hits));
                tied = false;
            }
        }
    }

    match best {
        Some(_) if tied => TYPE_GENERAL_DISCUSSION,
        Some((opportunity_type, _)) => opportunity_type,
        None if title.trim_end().ends_with('?') => TYPE_QUESTION,
        None => TYPE_GENERAL_DISCUSSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::tokenize;

    fn classify_text(title: &str, body: &str) -> &'static str {
        let tokens = tokenize(&format!("{} {}", title, body));
        classify(title, &tokens)
    }

    #[test]
    fn test_single_category() {
        assert_eq!(
            classify_text("What's the best CRM for solopreneurs?", ""),
            TYPE_RECOMMENDATION_REQUEST
        );
        assert_eq!(
            classify_text("How to import contacts into a CRM", ""),
            TYPE_HOW_TO
        );
        assert_eq!(classify_text("HubSpot vs Pipedrive", ""), TYPE_COMPARISON);
        assert_eq!(
            classify_text("Sync is broken again", "The error shows up every morning"),
            TYPE_PROBLEM
        );
    }

    #[test]
    fn test_question_fallback() {
        assert_eq!(classify_text("Anyone at the expo this week?", ""), TYPE_QUESTION);
        assert_eq!(
            classify_text("Our quarter in review", "Sharing some numbers"),
            TYPE_GENERAL_DISCUSSION
        );
    }

    #[test]
    fn test_tie_is_general_discussion() {
        // one comparison hit, one recommendation hit
        assert_eq!(classify_text("Notion vs the best wiki", ""), TYPE_GENERAL_DISCUSSION);
    }

    #[test]
    fn test_strictly_higher_count_wins() {
        assert_eq!(
            classify_text(
                "HubSpot vs Salesforce",
                "Which is better than the other? Looking for a comparison"
            ),
            TYPE_COMPARISON
        );
    }
}
