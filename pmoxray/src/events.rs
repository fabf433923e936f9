//! Typed stream events and the callbacks they are delivered to
//!
//! The transport turns every dispatched SSE event into at most one
//! [`StreamEvent`]. A `message` that does not parse is logged and dropped;
//! an `error` event becomes a [`StreamError`], tagged `Unauthorized` when its
//! body is a structured payload with `status_code == 401`.

use crate::error::Error;
use crate::models::{ErrorPayload, Snapshot};
use crate::sse::SseEvent;

/// Classification of an error signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// Connection failure or unstructured error event
    Transport,
    /// The server rejected the credentials
    Unauthorized(u16),
}

/// Error signal received from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    pub kind: StreamErrorKind,
    /// Raw event body, or the transport error message
    pub payload: String,
}

impl StreamError {
    pub fn transport(payload: impl Into<String>) -> Self {
        Self {
            kind: StreamErrorKind::Transport,
            payload: payload.into(),
        }
    }

    /// Classify the body of an `error` event
    ///
    /// Structured payloads with another status than 401 are reported as
    /// transport errors, keeping the raw body for diagnostics.
    pub fn from_payload(raw: &str) -> Self {
        let kind = match ErrorPayload::from_json(raw) {
            Some(payload) if payload.is_unauthorized() => {
                StreamErrorKind::Unauthorized(payload.status_code)
            }
            _ => StreamErrorKind::Transport,
        };

        Self {
            kind,
            payload: raw.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.kind, StreamErrorKind::Unauthorized(_))
    }
}

impl From<Error> for StreamError {
    fn from(err: Error) -> Self {
        match err {
            Error::Unauthorized(code) => Self {
                kind: StreamErrorKind::Unauthorized(code),
                payload: err.to_string(),
            },
            other => Self::transport(other.to_string()),
        }
    }
}

/// One decoded event of the subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Snapshot(Snapshot),
    Error(StreamError),
}

impl StreamEvent {
    /// Decode a dispatched SSE event
    ///
    /// Returns `None` for unparsable snapshots and unknown event types.
    pub fn decode(event: &SseEvent) -> Option<Self> {
        match event.event.as_str() {
            "error" => Some(Self::Error(StreamError::from_payload(&event.data))),
            "message" => match Snapshot::from_json(&event.data) {
                Ok(snapshot) => Some(Self::Snapshot(snapshot)),
                Err(err) => {
                    tracing::warn!("Dropping malformed snapshot: {}", err);
                    None
                }
            },
            other => {
                tracing::debug!("Ignoring event of type {:?}", other);
                None
            }
        }
    }

    /// Deliver this event to the matching callback
    pub fn dispatch<H: StreamHandler + ?Sized>(self, handler: &mut H) {
        match self {
            Self::Snapshot(snapshot) => handler.on_snapshot(snapshot),
            Self::Error(error) if error.is_unauthorized() => handler.on_unauthorized(),
            Self::Error(error) => handler.on_transport_error(&error),
        }
    }
}

/// Receiver of decoded stream events
pub trait StreamHandler {
    /// Called once per decoded snapshot, in delivery order
    fn on_snapshot(&mut self, snapshot: Snapshot);

    /// Called once per 401 error event
    fn on_unauthorized(&mut self);

    /// Called for transport failures and each end of stream; diagnostics
    /// only
    fn on_transport_error(&mut self, error: &StreamError) {
        tracing::warn!("Transport error on X-Ray stream: {}", error.payload);
    }
}

/// Collaborator sending the user to the login surface
pub trait LoginRedirect {
    fn redirect_to_login(&mut self);
}

impl<F: FnMut()> LoginRedirect for F {
    fn redirect_to_login(&mut self) {
        self()
    }
}

/// Redirect that only logs where the user should go
///
/// Used by headless frontends that have no navigation of their own.
#[derive(Debug, Clone)]
pub struct LogRedirect {
    login_url: String,
}

impl LogRedirect {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
        }
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }
}

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&mut self) {
        tracing::warn!("Not authorized, please log in at {}", self.login_url);
    }
}
