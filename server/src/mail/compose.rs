use lettre::{message::Mailbox, Message};

use crate::error::AppError;

/// Headers carried over from the inbound message so replies thread correctly.
#[derive(Debug, Default)]
pub struct ReplyContext {
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub thread_id: Option<String>,
}

fn parse_mailbox(addr: &str, role: &str) -> Result<Mailbox, AppError> {
    addr.parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid '{}' address '{}': {}", role, addr, e)))
}

pub fn build_reply(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
    reply_context: &ReplyContext,
) -> Result<Message, AppError> {
    let subject = if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    };

    let mut builder = Message::builder()
        .from(parse_mailbox(from, "from")?)
        .to(parse_mailbox(to, "to")?)
        .subject(subject);

    if let Some(ref in_reply_to) = reply_context.in_reply_to {
        builder = builder.in_reply_to(in_reply_to.clone());
    }
    if let Some(ref references) = reply_context.references {
        builder = builder.references(references.clone());
    }

    builder
        .body(body.to_string())
        .map_err(|e| AppError::BadRequest(format!("Failed to build email: {}", e)))
}

pub fn build_follow_up(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, AppError> {
    Message::builder()
        .from(parse_mailbox(from, "from")?)
        .to(parse_mailbox(to, "to")?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| AppError::BadRequest(format!("Failed to build email: {}", e)))
}
