use crate::server_config::SafetyConfig;

/// Returns the reason an auto reply must be suppressed, or none when the
/// sender looks like a real correspondent. Keeps the engine from replying to
/// bounce addresses, newsletters and other machine-generated mail.
pub fn suppression_reason(safety: &SafetyConfig, sender: &str, subject: &str) -> Option<String> {
    let sender_lower = sender.to_lowercase();
    let subject_lower = subject.to_lowercase();

    if let Some(keyword) = safety
        .blocked_sender_keywords
        .iter()
        .find(|keyword| sender_lower.contains(keyword.as_str()))
    {
        return Some(format!("sender matches blocked keyword '{}'", keyword));
    }

    let sender_domain = sender_lower
        .rsplit('@')
        .next()
        .unwrap_or("")
        .trim_end_matches('>');
    if let Some(domain) = safety
        .blocked_sender_domains
        .iter()
        .find(|domain| sender_domain.ends_with(domain.as_str()))
    {
        return Some(format!("sender domain matches '{}'", domain));
    }

    if let Some(phrase) = safety
        .auto_generated_subject_phrases
        .iter()
        .find(|phrase| subject_lower.contains(phrase.as_str()))
    {
        return Some(format!("subject looks auto-generated ('{}')", phrase));
    }

    None
}
