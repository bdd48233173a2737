//! chatsink - write-behind persistence tier for a chat bot.
//!
//! Chat messages, whispers and moderation timeouts are fanned out by the
//! [`Dispatcher`] to independent [`Sink`](sink::Sink)s - a Postgres
//! archive, a MariaDB stats store and a batched Solr search index. Each
//! sink owns an unbounded queue and an autonomous worker that retries
//! failed writes with head-of-line ordering, so a degraded store never
//! blocks the bot's event loop and never affects the other stores.
//!
//! ```no_run
//! use chatsink::{Config, Dispatcher, SharedState};
//!
//! # async fn wire() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("chatsink.toml")?;
//! let state = SharedState::new();
//! let dispatcher = Dispatcher::connect(&config, state.clone()).await?;
//! // hand `dispatcher` to the chat-event layer; on exit:
//! dispatcher.destroy().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod message;
pub mod metrics;
pub mod sink;
pub mod state;
pub mod telemetry;

pub use config::Config;
pub use dispatcher::{Dispatcher, SetupError};
pub use message::{LoggableMessage, TimeoutMessage};
pub use state::SharedState;
