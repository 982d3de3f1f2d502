use serde::Serialize;

use crate::{
    bounded,
    brevo::{BrevoClient, Result},
};

#[derive(Debug, Clone, Serialize)]
pub struct Mailbox<'a> {
    pub email: &'a str,
    pub name: &'a str,
}

/// Message ready to be sent, the sender is filled in from configuration.
#[derive(Debug, Clone)]
pub struct Email<'a> {
    pub to: Mailbox<'a>,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Mailbox<'a>,
    to: [Mailbox<'a>; 1],
    subject: &'a str,
    html_content: &'a str,
}

impl BrevoClient {
    pub async fn send_email(&self, email: &Email<'_>) -> Result<()> {
        let request = SendEmailRequest {
            sender: Mailbox {
                email: &self.config.sender_email,
                name: &self.config.sender_name,
            },
            to: [email.to.clone()],
            subject: &email.subject,
            html_content: &email.html,
        };
        let response =
            bounded::call("brevo_send_email", self.timeout, self.post("smtp/email", &request))
                .await?;
        tracing::info!(
            message_id = response.get("messageId").and_then(|v| v.as_str()).unwrap_or_default(),
            subject = %email.subject,
            "Sent transactional email"
        );
        Ok(())
    }
}
