//! HTTP client for the X-Ray event stream
//!
//! [`StreamClient::start`] opens the `/xray` endpoint in a background task
//! and returns a [`Subscription`] yielding typed [`StreamEvent`]s in the
//! order the server sent them.
//!
//! # Example
//!
//! ```no_run
//! use pmoxray::{AuthMode, StreamClient, StreamEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StreamClient::builder()
//!         .endpoint("http://127.0.0.1:5173/xray")
//!         .auth(AuthMode::query_token("BQBH98uX"))
//!         .build()?;
//!
//!     let mut subscription = client.start();
//!     while let Some(event) = subscription.next_event().await {
//!         if let StreamEvent::Snapshot(snapshot) = event {
//!             println!("playing: {}", snapshot.is_playing);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use crate::config::{AuthMode, XrayConfig};
use crate::error::{Error, Result};
use crate::events::{StreamError, StreamEvent};
use crate::sse::SseDecoder;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, COOKIE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Default X-Ray endpoint
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5173/xray";

/// Default timeout for establishing the connection (30 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default delay before reconnecting (3 seconds, as browsers do)
pub const DEFAULT_RETRY_MS: u64 = 3000;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "pmoxray/0.1.0";

const LAST_EVENT_ID: &str = "Last-Event-ID";

/// X-Ray stream client
///
/// The client holds connection settings only; every call to
/// [`start`](Self::start) opens an independent subscription.
#[derive(Debug, Clone)]
pub struct StreamClient {
    client: Client,
    endpoint: String,
    auth: AuthMode,
    reconnect: bool,
    retry: Duration,
}

impl StreamClient {
    /// Create a client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client from the `endpoint`, `auth` and `transport` sections
    pub fn from_config(config: &XrayConfig) -> Result<Self> {
        Self::builder()
            .endpoint(config.endpoint.clone())
            .auth(config.auth.clone())
            .connect_timeout(config.transport.connect_timeout())
            .user_agent(config.transport.user_agent.clone())
            .reconnect(config.transport.reconnect)
            .retry(config.transport.retry())
            .build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn auth(&self) -> &AuthMode {
        &self.auth
    }

    /// URL actually requested, query token included
    pub fn request_url(&self) -> Result<Url> {
        self.auth.request_url(&self.endpoint)
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Open a subscription
    ///
    /// Returns immediately. Connection failures are reported through the
    /// subscription as `StreamEvent::Error`, never here. Must be called
    /// from within a Tokio runtime.
    pub fn start(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let transport = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { transport.run(tx, token).await });

        Subscription {
            events: rx,
            cancel,
            task: Some(task),
        }
    }

    /// Connection loop: one request per iteration, reconnecting as an
    /// EventSource would until cancelled
    async fn run(self, tx: mpsc::UnboundedSender<StreamEvent>, cancel: CancellationToken) {
        let mut cursor = StreamCursor {
            last_event_id: None,
            retry: self.retry,
        };

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                outcome = self.pump(&tx, &mut cursor) => outcome,
            };

            // A rejected request is final, like an EventSource failing the
            // connection; only dropped or ended streams are retried.
            let fatal = match outcome {
                Ok(()) => {
                    tracing::debug!("X-Ray stream ended");
                    let ended = StreamError::transport("X-Ray stream ended");
                    if tx.send(StreamEvent::Error(ended)).is_err() {
                        return;
                    }
                    false
                }
                Err(err) => {
                    tracing::warn!("X-Ray stream failed: {}", err);
                    let fatal = matches!(err, Error::Unauthorized(_) | Error::ApiError(_));
                    if tx.send(StreamEvent::Error(StreamError::from(err))).is_err() {
                        return;
                    }
                    fatal
                }
            };

            if fatal || !self.reconnect || tx.is_closed() {
                return;
            }

            tracing::debug!("Reconnecting to X-Ray stream in {:?}", cursor.retry);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(cursor.retry) => {}
            }
        }
    }

    /// Read one connection to its end
    async fn pump(
        &self,
        tx: &mpsc::UnboundedSender<StreamEvent>,
        cursor: &mut StreamCursor,
    ) -> Result<()> {
        let url = self.request_url()?;
        tracing::debug!("Connecting to X-Ray stream: {}", self.endpoint);

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        if let Some(cookie) = self.auth.cookie_header() {
            request = request.header(COOKIE, cookie);
        }
        if let Some(id) = &cursor.last_event_id {
            request = request.header(LAST_EVENT_ID, id.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(Error::api_error(format!(
                "X-Ray endpoint returned error status: {}",
                status
            )));
        }

        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;

            for event in decoder.feed(&chunk) {
                if let Some(decoded) = StreamEvent::decode(&event) {
                    if tx.send(decoded).is_err() {
                        return Ok(());
                    }
                }
            }

            if let Some(retry) = decoder.retry() {
                cursor.retry = retry;
            }
            if let Some(id) = decoder.last_event_id() {
                cursor.last_event_id = Some(id.to_string());
            }
        }

        Ok(())
    }
}

/// Reconnection state carried across connections
#[derive(Debug)]
struct StreamCursor {
    last_event_id: Option<String>,
    retry: Duration,
}

/// A live subscription to the X-Ray stream
///
/// Dropping the subscription stops it.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<StreamEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Subscription replaying events pushed by the caller, without any
    /// connection behind it
    pub fn from_receiver(events: mpsc::UnboundedReceiver<StreamEvent>) -> Self {
        Self {
            events,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Next event, in delivery order
    ///
    /// Returns `None` once the subscription is stopped or the transport
    /// gave up (reconnection disabled). Cancel-safe.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Release the connection; safe to call more than once
    pub fn stop(&mut self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Stopping X-Ray subscription");
            self.cancel.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.events.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builder for configuring a StreamClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    endpoint: String,
    auth: AuthMode,
    connect_timeout: Duration,
    user_agent: String,
    reconnect: bool,
    retry: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth: AuthMode::Anonymous,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            reconnect: true,
            retry: Duration::from_millis(DEFAULT_RETRY_MS),
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the endpoint URL
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    /// Set how the access token is sent
    pub fn auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// Set the connection timeout
    ///
    /// There is no overall request timeout: the stream stays open.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable reconnection after the stream ends
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the initial reconnection delay
    pub fn retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Build the client
    pub fn build(self) -> Result<StreamClient> {
        // Fail early on a bad endpoint rather than on first connect.
        self.auth.request_url(&self.endpoint)?;

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .connect_timeout(self.connect_timeout)
                .build()?,
        };

        Ok(StreamClient {
            client,
            endpoint: self.endpoint,
            auth: self.auth,
            reconnect: self.reconnect,
            retry: self.retry,
        })
    }
}
