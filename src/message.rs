//! Event records consumed by the persistence pipeline.
//!
//! Both record types are created once per observed chat event by the
//! chat-event layer, handed to the [`Dispatcher`](crate::dispatcher::Dispatcher),
//! and discarded after a successful write. They are never mutated.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// One chat message or whisper, ready to be persisted.
#[derive(Debug, Clone)]
pub struct LoggableMessage {
    sender: String,
    sender_id: String,
    text: String,
    full_text: String,
    subscribed: bool,
    whisper: bool,
    sent_at: DateTime<Utc>,
    uuid: Uuid,
}

impl LoggableMessage {
    /// Build a message record from a parsed chat event.
    ///
    /// The event id is a UUIDv5 over the raw message line, so the same
    /// observed line maps to the same id across reconnects and restarts.
    /// The search index dedupes on it.
    pub fn new(
        sender: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
        subscribed: bool,
        whisper: bool,
        full_text: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        let full_text = full_text.into();
        let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, full_text.as_bytes());
        Self {
            sender: sender.into(),
            sender_id: sender_id.into(),
            text: text.into(),
            full_text,
            subscribed,
            whisper,
            sent_at,
            uuid,
        }
    }

    /// Display name of the sender.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Chat-server user id of the sender. Kept as text; stores that want a
    /// numeric id parse it at write time.
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Rendered message text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The raw message line as received from the chat server.
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn is_whisper(&self) -> bool {
        self.whisper
    }

    /// Server-side timestamp of the message.
    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    /// Globally unique event id.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Timestamp in RFC3339 with millisecond precision, the shape the
    /// search index expects in its `time` field.
    pub fn time_iso(&self) -> String {
        self.sent_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

impl fmt::Display for LoggableMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sender, self.text)
    }
}

/// A moderation timeout observed in chat.
#[derive(Debug, Clone)]
pub struct TimeoutMessage {
    username: String,
    user_id: String,
    duration_secs: i32,
}

impl TimeoutMessage {
    pub fn new(
        username: impl Into<String>,
        user_id: impl Into<String>,
        duration_secs: i32,
    ) -> Self {
        Self {
            username: username.into(),
            user_id: user_id.into(),
            duration_secs,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Timeout duration in seconds.
    pub fn duration_secs(&self) -> i32 {
        self.duration_secs
    }
}

impl fmt::Display for TimeoutMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timeout{{username='{}', length={}}}",
            self.username, self.duration_secs
        )
    }
}
