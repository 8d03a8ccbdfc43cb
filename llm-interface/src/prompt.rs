use crate::{GenerationConstraints, GenerationRequest};
use brandscout_core::{truncate_chars, CommentTone, Opportunity, Settings};

/// Longest post body excerpt placed into a prompt.
const PROMPT_BODY_CHARS: usize = 1500;

fn tone_guidance(tone: CommentTone) -> &'static str {
    match tone {
        CommentTone::Helpful => "Be genuinely helpful and practical; answer the question first.",
        CommentTone::Informative => "Be factual and explanatory; share concrete details.",
        CommentTone::Casual => "Write like a friendly community member, relaxed and conversational.",
        CommentTone::Professional => "Be concise, polished and courteous.",
        CommentTone::Enthusiastic => "Be upbeat and encouraging without sounding like an advert.",
    }
}

pub fn system_instruction(tone: CommentTone, constraints: &GenerationConstraints) -> String {
    let mut instruction = format!(
        "You write a single reply to a Reddit post. {} Keep it under {} words. \
         Do not use hashtags, do not sign the reply, and reply with the comment text only.",
        tone_guidance(tone),
        constraints.max_words
    );

    match (&constraints.brand_name, constraints.include_brand_mention) {
        (Some(brand), true) => {
            instruction.push_str(&format!(
                " You may mention {} once, naturally and only where it helps the poster, \
                 and disclose that you are affiliated with it.",
                brand
            ));
            if let Some(description) = &constraints.brand_description {
                instruction.push_str(&format!(" About {}: {}", brand, description));
            }
        }
        (_, true) => {
            instruction.push_str(" You may mention a relevant product if it genuinely helps.")
        }
        (_, false) => instruction.push_str(" Do not mention or promote any brand or product."),
    }

    instruction
}

/// Composes the generation request for one stored opportunity.
pub fn build_reply_request(
    opportunity: &Opportunity,
    settings: &Settings,
    max_words: u32,
) -> GenerationRequest {
    let mut prompt = format!(
        "Subreddit: r/{}\nTitle: {}\n",
        opportunity.subreddit, opportunity.title
    );
    if let Some(body) = opportunity.body_snippet.as_deref().filter(|b| !b.trim().is_empty()) {
        prompt.push_str(&format!("Post:\n{}\n", truncate_chars(body, PROMPT_BODY_CHARS)));
    }
    if !opportunity.matched_keywords.is_empty() {
        prompt.push_str(&format!(
            "Topics of interest: {}\n",
            opportunity.matched_keywords.join(", ")
        ));
    }
    prompt.push_str("\nWrite the reply.");

    GenerationRequest {
        prompt,
        tone: settings.comment_tone,
        constraints: GenerationConstraints {
            max_words,
            include_brand_mention: settings.include_brand_mention,
            brand_name: settings.brand_name.clone(),
            brand_description: settings.brand_description.clone(),
        },
    }
}

/// Trims provider output, drops wrapping quotes and enforces the word limit.
/// Returns `None` when nothing usable is left.
pub fn clean_reply(raw: &str, max_words: u32) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim();
    if unquoted.is_empty() {
        return None;
    }

    let words: Vec<&str> = unquoted.split_whitespace().collect();
    if max_words > 0 && words.len() > max_words as usize {
        let mut shortened = words[..max_words as usize].join(" ");
        shortened.push('…');
        return Some(shortened);
    }
    Some(unquoted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_mention_rules() {
        let mut constraints = GenerationConstraints {
            include_brand_mention: true,
            brand_name: Some("Acme CRM".to_string()),
            brand_description: Some("a CRM for one-person businesses".to_string()),
            ..Default::default()
        };
        let instruction = system_instruction(CommentTone::Casual, &constraints);
        assert!(instruction.contains("Acme CRM"));
        assert!(instruction.contains("one-person businesses"));
        assert!(instruction.contains("conversational"));

        constraints.include_brand_mention = false;
        let instruction = system_instruction(CommentTone::Casual, &constraints);
        assert!(!instruction.contains("Acme CRM"));
        assert!(instruction.contains("Do not mention"));
    }

    #[test]
    fn test_clean_reply() {
        assert_eq!(
            clean_reply("  \"Try a spreadsheet first.\" ", 50).as_deref(),
            Some("Try a spreadsheet first.")
        );
        assert_eq!(clean_reply("   ", 50), None);
        assert_eq!(clean_reply("\"\"", 50), None);
        assert_eq!(clean_reply("one two three four", 2).as_deref(), Some("one two…"));
    }
}
