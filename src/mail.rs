//! Outbound email dispatch.
//!
//! The rest of the application only ever sees the narrow
//! `send(to, subject, body)` contract; delivery goes through an HTTP
//! mail-relay API. A failed send is surfaced to the caller but never
//! rolls back state that was already committed.

use chrono::Duration;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    model::{api::email::Email, otp::Code},
};

/// Client for the mail-relay API.
pub struct Mailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

/// One outbound message, as the relay expects it.
#[derive(Serialize)]
struct OutboundMessage<'m> {
    from: &'m str,
    to: &'m str,
    subject: &'m str,
    text: &'m str,
}

impl Mailer {
    pub fn new(api_url: String, api_key: String, sender: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            sender,
        }
    }

    /// Deliver one message. Failure means the relay refused or was
    /// unreachable; nothing is retried here.
    pub async fn send(&self, to: &Email, subject: &str, body: &str) -> Result<()> {
        let message = OutboundMessage {
            from: &self.sender,
            to: to.as_str(),
            subject,
            text: body,
        };
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .map_err(|err| Error::Dispatch(format!("Mail relay unreachable: {err}")))?;
        if !response.status().is_success() {
            return Err(Error::Dispatch(format!(
                "Mail relay refused message: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Deliver a verification code to a registrant, quoting the configured
    /// validity window.
    pub async fn send_otp(&self, to: &Email, code: &Code, ttl: Duration) -> Result<()> {
        self.send(to, "E-Voting OTP Verification", &otp_body(code, ttl))
            .await
    }
}

fn otp_body(code: &Code, ttl: Duration) -> String {
    format!(
        "Welcome to the e-voting system!\n\n\
         Your verification code is: {code}\n\n\
         This code will expire in {} minutes.\n\n\
         If you didn't request this, please ignore this email.\n",
        ttl.num_minutes()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_body_quotes_code_and_configured_expiry() {
        let code = "246810".parse::<Code>().unwrap();

        let body = otp_body(&code, Duration::seconds(600));
        assert!(body.contains("246810"));
        assert!(body.contains("expire in 10 minutes"));

        let body = otp_body(&code, Duration::minutes(5));
        assert!(body.contains("expire in 5 minutes"));
    }
}
