use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use lettre::Message;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::{rate_limiters::RateLimiters, HttpClient};

use super::transport::{MailTransport, SendError, SendReceipt};

const GMAIL_SEND_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailSendResponse {
    id: Option<String>,
    thread_id: Option<String>,
}

/// Sends RFC 822 messages through the Gmail REST API on behalf of a user.
#[derive(Clone)]
pub struct GmailTransport {
    http_client: HttpClient,
    rate_limiters: RateLimiters,
}

impl GmailTransport {
    pub fn new(http_client: HttpClient, rate_limiters: RateLimiters) -> Self {
        Self {
            http_client,
            rate_limiters,
        }
    }
}

#[async_trait]
impl MailTransport for GmailTransport {
    async fn send(
        &self,
        access_token: &str,
        message: &Message,
        thread_id: Option<&str>,
    ) -> Result<SendReceipt, SendError> {
        let raw = URL_SAFE_NO_PAD.encode(message.formatted());
        let body = match thread_id {
            Some(thread_id) => json!({ "raw": raw, "threadId": thread_id }),
            None => json!({ "raw": raw }),
        };

        let resp = self
            .http_client
            .post(GMAIL_SEND_ENDPOINT)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Transient(format!("gmail send request failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            let sent: GmailSendResponse = resp
                .json()
                .await
                .map_err(|e| SendError::Transient(format!("gmail send response invalid: {e}")))?;
            return Ok(SendReceipt {
                message_id: sent.id,
                thread_id: sent.thread_id,
            });
        }

        let detail = resp.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS {
            self.rate_limiters.trigger_backoff();
        }
        if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            Err(SendError::Transient(format!(
                "gmail send returned {status}: {detail}"
            )))
        } else {
            Err(SendError::Permanent(format!(
                "gmail send returned {status}: {detail}"
            )))
        }
    }
}
