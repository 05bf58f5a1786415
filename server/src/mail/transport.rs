use async_trait::async_trait;
use derive_more::derive::Display;
use lettre::Message;

/// Delivery failures split into retryable and terminal classes. Timeouts,
/// rate limits and 5xx responses are transient; everything else is permanent.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum SendError {
    #[display("transient delivery failure: {_0}")]
    Transient(String),
    #[display("permanent delivery failure: {_0}")]
    Permanent(String),
}

impl std::error::Error for SendError {}

#[derive(Debug, Clone, Default)]
pub struct SendReceipt {
    pub message_id: Option<String>,
    pub thread_id: Option<String>,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        access_token: &str,
        message: &Message,
        thread_id: Option<&str>,
    ) -> Result<SendReceipt, SendError>;
}
