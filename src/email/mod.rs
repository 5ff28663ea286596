use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::info;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("failed to send email: {0}")]
    Send(#[from] lettre::transport::smtp::Error),
}

/// Composes the reply notification for a ticket. Kept free of the transport
/// so message construction is testable without an SMTP relay.
pub fn ticket_reply_message(
    from: &str,
    to: &str,
    ticket_id: i32,
    body: &str,
) -> Result<Message, EmailError> {
    let message = Message::builder()
        .from(from.parse::<Mailbox>()?)
        .to(to.parse::<Mailbox>()?)
        .subject(format!("Re: support ticket #{ticket_id}"))
        .body(body.to_string())?;
    Ok(message)
}

/// Outbound mail sender over a STARTTLS SMTP relay. Sends are blocking;
/// callers run them on a blocking thread off the request path.
pub struct Mailer {
    transport: SmtpTransport,
    from: String,
}

impl Mailer {
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = SmtpTransport::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();
        Ok(Self {
            transport,
            from: config.username.clone(),
        })
    }

    pub fn send_ticket_reply(&self, to: &str, ticket_id: i32, body: &str) -> Result<(), EmailError> {
        let message = ticket_reply_message(&self.from, to, ticket_id, body)?;
        self.transport.send(&message)?;
        info!("ticket {ticket_id}: reply email submitted to {to}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_message_carries_the_ticket_number() {
        let message =
            ticket_reply_message("support@example.com", "client@example.com", 17, "All fixed.")
                .unwrap();
        let headers = format!("{:?}", message.headers());
        assert!(headers.contains("Re: support ticket #17"));
    }

    #[test]
    fn reply_message_rejects_invalid_recipients() {
        let err = ticket_reply_message("support@example.com", "not-an-address", 1, "body")
            .unwrap_err();
        assert!(matches!(err, EmailError::Address(_)));
    }
}
