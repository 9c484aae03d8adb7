//! Admin notification transport. Batch persistence is conditional on the
//! email being accepted, so this is a trait rather than a bare function:
//! tests exercise an in-memory sender, the real binary wires up SMTP
//! behind the `smtp` feature.
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("smtp transport error: {0}")]
    #[cfg(feature = "smtp")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("malformed message: {0}")]
    #[cfg(feature = "smtp")]
    Message(#[from] lettre::error::Error),
    #[error("no recipient configured")]
    NoRecipient,
}

pub trait EmailSender: Send + Sync {
    fn send_signed_link(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError>;
}

/// Records every accepted send; used by the test suite and by `--dry-run`
/// style invocations that never want to touch a real mail server.
#[derive(Default)]
pub struct InMemorySender {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl InMemorySender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().expect("email log mutex poisoned").clone()
    }
}

impl EmailSender for InMemorySender {
    fn send_signed_link(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        if to.trim().is_empty() {
            return Err(EmailError::NoRecipient);
        }
        self.sent
            .lock()
            .expect("email log mutex poisoned")
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

#[cfg(feature = "smtp")]
pub struct SmtpSender {
    transport: lettre::SmtpTransport,
    from: lettre::message::Mailbox,
}

#[cfg(feature = "smtp")]
impl SmtpSender {
    pub fn new(
        relay: &str,
        username: String,
        password: String,
        from: lettre::message::Mailbox,
    ) -> Result<Self, EmailError> {
        use lettre::transport::smtp::authentication::Credentials;
        let transport = lettre::SmtpTransport::relay(relay)?
            .credentials(Credentials::new(username, password))
            .build();
        Ok(Self { transport, from })
    }
}

#[cfg(feature = "smtp")]
impl EmailSender for SmtpSender {
    fn send_signed_link(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        use lettre::Transport;
        let to: lettre::message::Mailbox = to.parse().map_err(|_| EmailError::NoRecipient)?;
        let message = lettre::Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())?;
        self.transport.send(&message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sender_records_accepted_sends() {
        let sender = InMemorySender::new();
        sender.send_signed_link("admin@example.com", "Credentials needed", "link here").unwrap();
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "admin@example.com");
    }

    #[test]
    fn empty_recipient_is_rejected() {
        let sender = InMemorySender::new();
        assert!(matches!(sender.send_signed_link("", "s", "b"), Err(EmailError::NoRecipient)));
    }
}
