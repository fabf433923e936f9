//! X-Ray "now playing" client for PMOMusic
//!
//! This crate subscribes to the `/xray` server-sent event stream, which
//! pushes a snapshot of the currently playing Spotify track enriched with an
//! interpretive annotation and a list of short facts, and keeps a display in
//! sync with it.
//!
//! # Features
//!
//! - **Event Stream**: `text/event-stream` decoding with reconnection,
//!   `Last-Event-ID` and server-driven retry delay
//! - **Authentication**: session cookie or query-string access token,
//!   chosen by configuration
//! - **Last Known Good**: paused snapshots never blank the display
//! - **Fact Carousel**: one rotation timer per display, restarted only when
//!   the fact list changes
//! - **Configuration**: embedded YAML defaults, optional file, environment
//!   overrides
//!
//! # Example
//!
//! ```no_run
//! use pmoxray::{LogDisplay, LogRedirect, XrayConfig, XraySession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = XrayConfig::load(None)?;
//!     let redirect = LogRedirect::new(config.login_url.clone());
//!
//!     let mut session = XraySession::connect(&config, LogDisplay, LogDisplay, redirect)?;
//!     session.run().await;
//!     Ok(())
//! }
//! ```
//!
//! # Error Signals
//!
//! - a `message` that is not a valid snapshot is logged and dropped
//! - an `error` event with `status_code` 401 calls the [`LoginRedirect`]
//!   collaborator; the subscription keeps running
//! - any other error is reported to [`StreamHandler::on_transport_error`]
//!   for diagnostics only

pub mod carousel;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod models;
pub mod session;
pub mod sse;

// Re-exports
pub use carousel::{CarouselController, CarouselState, DEFAULT_ROTATION_INTERVAL};
pub use client::{ClientBuilder, StreamClient, Subscription};
pub use config::{AuthMode, CarouselConfig, TransportConfig, XrayConfig};
pub use display::{FactDisplay, LogDisplay, MemoryDisplay, NowPlayingDisplay};
pub use error::{Error, Result};
pub use events::{
    LogRedirect, LoginRedirect, StreamError, StreamErrorKind, StreamEvent, StreamHandler,
};
pub use models::{ErrorPayload, FactList, Snapshot, SnapshotPayload, Track};
pub use session::{Reconciler, XraySession};
pub use sse::{SseDecoder, SseEvent};
