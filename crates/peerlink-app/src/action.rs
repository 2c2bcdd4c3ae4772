//! Orchestrator actions
//!
//! Engine and device calls requested by the orchestrator for the runtime to
//! execute.

use bytes::Bytes;
use peerlink_core::{
    media::{MediaAction, MediaSelection},
    session::PeerId,
    transport::{ConnectOptions, OutgoingFile},
};

/// Effects produced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorAction {
    /// Start connecting to the peer. The result is fed back through
    /// `Orchestrator::connection_started`.
    StartConnection {
        /// Peer to connect to.
        peer_id: PeerId,
        /// Connection options.
        options: ConnectOptions,
    },

    /// Send an encoded payload on the data channel.
    SendData(Bytes),

    /// Send a file on the file channel.
    SendFile(OutgoingFile),

    /// Acquire local capture. The result is fed back through
    /// `Orchestrator::media_acquired`.
    AcquireMedia(MediaSelection),

    /// Apply a media track change on the engine.
    Media(MediaAction),

    /// Tear the engine connection down.
    CloseConnection,
}

impl OrchestratorAction {
    /// Whether the action is part of tearing a session down.
    ///
    /// Teardown failures are reported but never abort the remaining actions.
    pub fn is_teardown(&self) -> bool {
        matches!(self, Self::CloseConnection | Self::Media(MediaAction::RemoveTrack { .. }))
    }
}
