//! Report delivery over the Mailgun messages API.

use thiserror::Error;
use tracing::info;

pub const CRATE_NAME: &str = "pdw-notify";

#[derive(Debug, Clone)]
pub struct MailgunConfig {
    /// Full messages endpoint, e.g.
    /// `https://api.mailgun.net/v3/<domain>/messages`.
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("delivery rejected with http status {0}")]
    Rejected(u16),
}

/// Delivery is all-or-nothing: anything but a success status from the
/// channel is an error the caller decides how to surface.
#[derive(Debug)]
pub struct MailgunNotifier {
    config: MailgunConfig,
    client: reqwest::Client,
}

impl MailgunNotifier {
    pub fn new(config: MailgunConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub async fn send(
        &self,
        subject: &str,
        html: &str,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        let mut form: Vec<(&str, &str)> = vec![("from", self.config.from.as_str())];
        for recipient in recipients {
            form.push(("to", recipient));
        }
        form.push(("subject", subject));
        form.push(("html", html));

        info!(recipients = recipients.len(), subject, "sending report");
        let response = self
            .client
            .post(&self.config.api_url)
            .basic_auth("api", Some(&self.config.api_key))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
