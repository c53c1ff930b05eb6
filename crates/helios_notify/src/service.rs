// --- File: crates/helios_notify/src/service.rs ---

use helios_common::services::{BoxFuture, EmailService, NotificationResult};
use helios_common::SchedulingError;
use helios_config::EmailConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Serialize, Debug)]
struct OutboundEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_body: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct DispatchResponse {
    #[serde(default)]
    message_id: Option<String>,
}

/// Mail dispatcher backed by an HTTP transactional-email API.
pub struct HttpEmailService {
    http: Client,
    config: EmailConfig,
}

impl HttpEmailService {
    pub fn new(config: EmailConfig, timeout: Duration) -> Result<Self, SchedulingError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SchedulingError::Config(format!("Mail client init failed: {e}")))?;
        Ok(Self { http, config })
    }
}

impl EmailService for HttpEmailService {
    fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> BoxFuture<'_, NotificationResult, SchedulingError> {
        let to = to.to_string();
        let subject = subject.to_string();
        let body = body.to_string();
        Box::pin(async move {
            let payload = OutboundEmail {
                from: &self.config.from_address,
                to: &to,
                subject: &subject,
                html_body: is_html.then_some(body.as_str()),
                text_body: (!is_html).then_some(body.as_str()),
            };

            info!("Dispatching mail to {}: {}", to, subject);
            let response = self
                .http
                .post(&self.config.api_url)
                .bearer_auth(&self.config.api_token)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    SchedulingError::NotificationDispatchFailed(format!(
                        "Mail transport error: {e}"
                    ))
                })?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                error!("Mail API returned {}: {}", status, detail);
                return Err(SchedulingError::NotificationDispatchFailed(format!(
                    "Mail API rejected send ({status})"
                )));
            }

            let parsed: DispatchResponse = response.json().await.unwrap_or(DispatchResponse {
                message_id: None,
            });
            Ok(NotificationResult {
                id: parsed
                    .message_id
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                status: "sent".to_string(),
            })
        })
    }
}

/// Dispatcher used when no mail API is configured: logs the send and reports
/// success so bookings complete in environments without outbound mail.
pub struct LogOnlyEmailService;

impl EmailService for LogOnlyEmailService {
    fn send_email(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
        _is_html: bool,
    ) -> BoxFuture<'_, NotificationResult, SchedulingError> {
        info!("Mail dispatch disabled; would send to {}: {}", to, subject);
        Box::pin(async {
            Ok(NotificationResult {
                id: Uuid::new_v4().to_string(),
                status: "skipped".to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_common::services::EmailService;

    #[tokio::test]
    async fn log_only_dispatch_reports_skipped() {
        let service = LogOnlyEmailService;
        let result = service
            .send_email("dana@example.com", "Interview scheduled", "<p>Hi</p>", true)
            .await
            .unwrap();
        assert_eq!(result.status, "skipped");
        assert!(!result.id.is_empty());
    }
}
