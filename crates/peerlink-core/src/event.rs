//! Engine events.
//!
//! The transport engine reports everything through loosely shaped callbacks:
//! string-typed levels and roles, fractional percentages, optional file
//! fields. [`RawEngineEvent`] mirrors that shape. The event bridge validates
//! each raw event into the closed [`EngineEvent`] union, which is the only
//! event type the orchestrator accepts.

use std::sync::Arc;

use bytes::Bytes;

use crate::{
    media::{MediaKind, RemoteStream, StreamRole},
    message::DataPayload,
    session::Connectivity,
    transfer::FileProgress,
};

/// Event as delivered by the engine callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEngineEvent {
    /// Bytes received on the data channel.
    Data(Bytes),

    /// Progress of an incoming file.
    File {
        /// File name, if the engine attached one.
        file_name: Option<String>,
        /// Completion as reported by the engine.
        percentage: f64,
        /// Content type and bytes, normally only at completion.
        file: Option<(String, Bytes)>,
    },

    /// Progress of a file we are sending.
    SendProgress {
        /// File name.
        file_name: String,
        /// Completion as reported by the engine.
        percentage: f64,
    },

    /// A media stream became available.
    MediaStream {
        /// `host` or `remote`.
        role: String,
        /// The stream, owned by the engine.
        stream: Arc<RemoteStream>,
    },

    /// A remote track stopped delivering media.
    TrackMuted {
        /// `audio` or `video`.
        kind: String,
    },

    /// Connectivity level changed.
    CommunicationState(String),

    /// The peer's secure code arrived through the engine.
    SecureCode(String),

    /// Unrecoverable engine error.
    Error(String),
}

/// Validated engine event.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Payload received on the data channel.
    DataReceived(DataPayload),

    /// Progress of an incoming file.
    FileProgress(FileProgress),

    /// Progress of an outgoing file.
    OutgoingProgress {
        /// File name.
        file_name: String,
        /// Completion, 0 to 100.
        percentage: u8,
    },

    /// A media stream became available.
    MediaStreamReceived {
        /// Whose stream it is.
        role: StreamRole,
        /// The stream, owned by the engine.
        stream: Arc<RemoteStream>,
    },

    /// A remote track stopped delivering media.
    TrackMuted {
        /// Muted kind.
        kind: MediaKind,
    },

    /// Connectivity level changed.
    ConnectivityChanged(Connectivity),

    /// The peer's secure code.
    PeerSecureCode(String),

    /// Unrecoverable engine failure.
    Fatal {
        /// Reason reported by the engine.
        reason: String,
    },
}

impl EngineEvent {
    /// Short name used in logs and stale-event errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DataReceived(_) => "data",
            Self::FileProgress(_) => "file",
            Self::OutgoingProgress { .. } => "send progress",
            Self::MediaStreamReceived { .. } => "media stream",
            Self::TrackMuted { .. } => "track muted",
            Self::ConnectivityChanged(_) => "connectivity",
            Self::PeerSecureCode(_) => "secure code",
            Self::Fatal { .. } => "fatal",
        }
    }
}
