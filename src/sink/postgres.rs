//! Postgres archive sink.
//!
//! Long-term message archive: every chat message lands in
//! `chat_logs.messages`, with the raw line kept alongside in
//! `chat_logs.full_messages`. Whispers and timeouts are not archived here
//! (the stats store owns those).

use crate::config::PostgresConfig;
use crate::message::LoggableMessage;
use crate::sink::worker::{RelationalSink, StoreWriter};
use crate::sink::{SinkEvent, WriteError};
use crate::state::SharedState;
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

/// Archive sink backed by [`PostgresWriter`].
pub type PostgresSink = RelationalSink<PostgresWriter>;

/// Write half of the archive sink.
pub struct PostgresWriter {
    pool: PgPool,
    state: SharedState,
}

impl PostgresWriter {
    /// Connection acquire timeout - prevents a degraded pool from blocking
    /// the worker indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    pub async fn connect(
        config: &PostgresConfig,
        state: SharedState,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        info!(store = "postgres", "Archive database connected");
        Ok(Self { pool, state })
    }
}

impl PostgresSink {
    /// Connect to the archive database and build the sink.
    pub async fn connect(
        config: &PostgresConfig,
        state: SharedState,
    ) -> Result<Self, sqlx::Error> {
        let writer = PostgresWriter::connect(config, state.clone()).await?;
        Ok(RelationalSink::new(writer, state))
    }
}

#[async_trait]
impl StoreWriter for PostgresWriter {
    type Record = LoggableMessage;

    fn store(&self) -> &'static str {
        "postgres"
    }

    fn map(&self, event: SinkEvent) -> Option<LoggableMessage> {
        match event {
            SinkEvent::Message(message) => Some(message),
            // Whispers and timeouts are not archived.
            _ => None,
        }
    }

    async fn write(&self, message: &LoggableMessage) -> Result<(), WriteError> {
        let userid: i32 = message
            .sender_id()
            .parse()
            .map_err(|_| WriteError::Invalid(format!("non-numeric userid {}", message.sender_id())))?;

        // Both rows or neither: a retry after a partial failure must not
        // duplicate the message row.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO chat_logs.messages (time, username, userid, message, online_status, subscribed, uuid)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(message.sent_at())
        .bind(message.sender())
        .bind(userid)
        .bind(message.text())
        .bind(self.state.is_online())
        .bind(message.is_subscribed())
        .bind(message.uuid())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO chat_logs.full_messages (uuid, full_message) VALUES ($1, $2)",
        )
        .bind(message.uuid())
        .bind(message.full_text())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
