//! The unit of work accepted by the dispatch core.
//!
//! A [`Message`] is identified by its `id` alone; the remaining fields are
//! opaque payload carried through to the provider transport. Field presence
//! is enforced at the submission boundary via [`Message::new`] so the core
//! can assume well-formed input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures raised at the submission boundary.
///
/// These never reach the dispatch core: a submission layer rejects the
/// request with a client error before a [`Message`] exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The message id is empty or absent.
    #[error("message id must not be empty")]
    MissingId,

    /// The destination address is empty or absent.
    #[error("message destination must not be empty")]
    MissingDestination,

    /// The subject is empty or absent.
    #[error("message subject must not be empty")]
    MissingSubject,

    /// The body is empty or absent.
    #[error("message body must not be empty")]
    MissingBody,
}

/// A message queued for delivery through a provider chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque unique identifier. Identity for idempotency purposes.
    pub id: String,
    /// Destination address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
}

impl Message {
    /// Construct a message, validating that every field is present.
    ///
    /// # Errors
    ///
    /// Returns a [`MessageError`] naming the first empty field.
    pub fn new(
        id: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, MessageError> {
        let message = Self {
            id: id.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        };

        if message.id.is_empty() {
            return Err(MessageError::MissingId);
        }
        if message.to.is_empty() {
            return Err(MessageError::MissingDestination);
        }
        if message.subject.is_empty() {
            return Err(MessageError::MissingSubject);
        }
        if message.body.is_empty() {
            return Err(MessageError::MissingBody);
        }

        Ok(message)
    }
}
