//! Transport engine and capture device seams.
//!
//! The real-time transport (signaling, ICE, data and file channels, media
//! tracks) is an external library consumed as a black box. These traits are
//! the whole contract the orchestrator relies on. Production wires them to
//! the real engine; tests use scripted implementations that record calls.
//!
//! Engine events do not flow through these traits. The engine pushes
//! [`RawEngineEvent`](crate::event::RawEngineEvent)s into the channel it was
//! given at construction, and the runtime drains that channel in arrival
//! order.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::{
    media::{LocalStream, MediaKind, MediaSelection, StreamId, TrackId},
    session::PeerId,
};

/// Engine construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Our identifier.
    pub local_id: PeerId,
    /// Peer to connect to, if known at construction.
    pub peer_id: Option<PeerId>,
    /// Signaling endpoint URL.
    pub signaling_url: String,
    /// Enable the engine's secure-code exchange.
    pub secure: bool,
    /// Authentication key for the signaling service.
    pub auth_key: Option<String>,
}

/// Options for [`TransportEngine::start_connection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Secure code we want the engine to use, if any.
    pub secure_code: Option<String>,
}

/// Result of a successful connection start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOutcome {
    /// Secure code chosen by the engine, in secure mode.
    pub secure_code: Option<String>,
}

/// A file handed to the engine for sending.
#[derive(Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    /// File name shown to the peer.
    pub name: String,
    /// Content type.
    pub mime_type: String,
    /// File content.
    pub data: Bytes,
}

impl fmt::Debug for OutgoingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Failure reported by an engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct EngineError {
    /// Reason string from the engine.
    pub reason: String,
}

impl EngineError {
    /// Error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// The external real-time transport.
///
/// Calls are awaited one at a time by the runtime; implementations never see
/// concurrent calls on the same engine.
#[async_trait]
pub trait TransportEngine: Send + 'static {
    /// Open a connection to `peer_id`.
    ///
    /// Completion only means signaling started. Progress is reported through
    /// connectivity events.
    async fn start_connection(
        &mut self,
        peer_id: &PeerId,
        options: ConnectOptions,
    ) -> Result<ConnectionOutcome, EngineError>;

    /// Send bytes on the data channel.
    async fn send_data(&mut self, payload: Bytes) -> Result<(), EngineError>;

    /// Send a file on the file channel. Progress arrives as events.
    async fn send_file(&mut self, file: OutgoingFile) -> Result<(), EngineError>;

    /// Start transmitting a local track.
    async fn set_media_track(
        &mut self,
        kind: MediaKind,
        track: TrackId,
        stream: StreamId,
    ) -> Result<(), EngineError>;

    /// Change whether a transmitted track carries data.
    async fn set_track_enabled(&mut self, kind: MediaKind, enabled: bool)
    -> Result<(), EngineError>;

    /// Stop transmitting a local track.
    async fn remove_media_track(&mut self, kind: MediaKind) -> Result<(), EngineError>;

    /// Tear the connection down immediately.
    async fn close_connection(&mut self) -> Result<(), EngineError>;
}

/// Local capture hardware.
#[async_trait]
pub trait MediaDevices: Send + 'static {
    /// Acquire capture for `selection`.
    ///
    /// The returned stream is handed to the media track controller, which
    /// becomes its exclusive owner.
    async fn acquire(&mut self, selection: MediaSelection) -> Result<LocalStream, EngineError>;
}
