use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::Email;
use crate::config::MailConfig;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

/// SendGrid v3 transport.
pub struct SendGridMailer {
    http: reqwest::Client,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl SendGridMailer {
    pub fn new(api_key: String, cfg: &MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from_email: cfg.from_email.clone(),
            from_name: cfg.from_name.clone(),
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        let body = json!({
            "personalizations": [{
                "to": [{ "email": email.to_email, "name": email.to_name }]
            }],
            "from": { "email": self.from_email, "name": self.from_name },
            "subject": email.subject,
            "content": [
                { "type": "text/plain", "value": email.text },
                { "type": "text/html", "value": email.html }
            ]
        });

        let res = self
            .http
            .post(SENDGRID_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("sendgrid request failed")?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            anyhow::bail!("sendgrid returned {status}: {detail}");
        }
        info!(to = %email.to_email, "email sent");
        Ok(())
    }
}

/// Used when no SendGrid key is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        info!(to = %email.to_email, subject = %email.subject, "email delivery disabled; logged only");
        Ok(())
    }
}
