//! MariaDB stats sink.
//!
//! The stats store takes everything: messages, whispers and both timeout
//! variants. Whispers and timeouts go through stored procedures owned by
//! the schema; their exact shapes are the store's contract, not ours.

use crate::config::MariaConfig;
use crate::message::{LoggableMessage, TimeoutMessage};
use crate::sink::worker::{RelationalSink, StoreWriter};
use crate::sink::{SinkEvent, WriteError};
use crate::state::SharedState;
use async_trait::async_trait;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;
use tracing::info;

/// Stats sink backed by [`MariaWriter`].
pub type MariaSink = RelationalSink<MariaWriter>;

/// Write half of the stats sink.
pub struct MariaWriter {
    pool: MySqlPool,
    state: SharedState,
}

impl MariaWriter {
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    pub async fn connect(config: &MariaConfig, state: SharedState) -> Result<Self, sqlx::Error> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        info!(store = "maria", "Stats database connected");
        Ok(Self { pool, state })
    }

    async fn log_message(&self, message: &LoggableMessage) -> Result<(), WriteError> {
        sqlx::query(
            "INSERT INTO chat_stats.messages (time, username, userid, message, online_status, subscribed, full, uuid)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(message.sent_at())
        .bind(message.sender())
        .bind(message.sender_id())
        .bind(message.text())
        .bind(self.state.is_online())
        .bind(message.is_subscribed())
        .bind(message.full_text())
        .bind(message.uuid().to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_whisper(&self, message: &LoggableMessage) -> Result<(), WriteError> {
        sqlx::query("CALL chat_stats.sp_log_whisper(?, ?, ?)")
            .bind(message.sent_at())
            .bind(message.sender())
            .bind(message.text())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn log_timeout(&self, timeout: &TimeoutMessage) -> Result<(), WriteError> {
        sqlx::query("CALL chat_stats.sp_log_timeout(?, ?, ?, ?)")
            .bind(timeout.username())
            .bind(timeout.user_id())
            .bind(timeout.duration_secs())
            .bind(self.state.is_online())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_nam_list_timeout(&self, timeout: &TimeoutMessage) -> Result<(), WriteError> {
        sqlx::query("CALL chat_stats.sp_add_timeout(?, ?)")
            .bind(timeout.username())
            .bind(timeout.duration_secs())
            .execute(&self.pool)
            .await?;
        info!(
            username = %timeout.username(),
            seconds = timeout.duration_secs(),
            "Added timeout to name list"
        );
        Ok(())
    }
}

impl MariaSink {
    /// Connect to the stats database and build the sink.
    pub async fn connect(config: &MariaConfig, state: SharedState) -> Result<Self, sqlx::Error> {
        let writer = MariaWriter::connect(config, state.clone()).await?;
        Ok(RelationalSink::new(writer, state))
    }
}

#[async_trait]
impl StoreWriter for MariaWriter {
    type Record = SinkEvent;

    fn store(&self) -> &'static str {
        "maria"
    }

    fn map(&self, event: SinkEvent) -> Option<SinkEvent> {
        Some(event)
    }

    async fn write(&self, record: &SinkEvent) -> Result<(), WriteError> {
        tracing::trace!(kind = record.kind(), "Writing stats record");
        match record {
            SinkEvent::Message(message) => self.log_message(message).await,
            SinkEvent::Whisper(message) => self.log_whisper(message).await,
            SinkEvent::Timeout(timeout) => self.log_timeout(timeout).await,
            SinkEvent::NamListTimeout(timeout) => self.add_nam_list_timeout(timeout).await,
        }
    }
}
