use crate::error::TransportError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Message, Transport as _};
use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;

/// Outbound notification handed to a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    /// HTML body
    pub body: String,
    pub recipients: Vec<String>,
    pub sender: String,
}

/// Delivery mechanism for notifications
///
/// Implementations own their own timeout and retry policy; callers treat a
/// returned error as final for that notification.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), TransportError>;
}

/// Transport that only logs notifications, for dry runs
#[derive(Debug, Default)]
pub struct LogTransport;

impl Transport for LogTransport {
    fn send(&self, notification: &Notification) -> Result<(), TransportError> {
        info!(
            "DRY RUN NOTIFICATION - From: {}, To: {}, Subject: {}",
            notification.sender,
            notification.recipients.join(","),
            notification.subject
        );
        debug!("DRY RUN NOTIFICATION body:\n{}", notification.body);
        Ok(())
    }
}

/// Transport that hands an HTML message to a sendmail-compatible binary
#[derive(Debug, Clone)]
pub struct SendmailTransport {
    command: PathBuf,
}

impl Default for SendmailTransport {
    fn default() -> Self {
        Self::new(PathBuf::from("/usr/sbin/sendmail"))
    }
}

impl SendmailTransport {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }

    /// Build the MIME message for a notification
    ///
    /// Addresses may carry a display name, e.g. `Security <alerts@example.com>`.
    fn build_message(notification: &Notification) -> Result<Message, TransportError> {
        if notification.recipients.is_empty() {
            return Err(TransportError::InvalidNotification(
                "no recipients".to_string(),
            ));
        }
        if notification.sender.trim().is_empty() {
            return Err(TransportError::InvalidNotification(
                "no sender".to_string(),
            ));
        }

        // Line breaks in the subject would start a new header
        let subject: String = notification
            .subject
            .chars()
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .collect();

        let mut builder = Message::builder()
            .from(notification.sender.trim().parse::<Mailbox>()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML);
        for recipient in &notification.recipients {
            builder = builder.to(recipient.trim().parse::<Mailbox>()?);
        }

        Ok(builder.body(notification.body.clone())?)
    }
}

impl Transport for SendmailTransport {
    fn send(&self, notification: &Notification) -> Result<(), TransportError> {
        let message = Self::build_message(notification)?;

        debug!("Sending email through {}", self.command.display());
        lettre::SendmailTransport::new_with_command(self.command.as_os_str()).send(&message)?;

        info!("dispatched email: {}", notification.subject);
        Ok(())
    }
}
