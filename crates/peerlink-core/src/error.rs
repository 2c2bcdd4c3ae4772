//! Session error types.
//!
//! Errors fall in two groups. Operation-local errors (bad input, a rejected
//! send, a malformed transfer) are returned to the caller and leave the
//! session where it was. Integrity errors (handshake failure, engine failure)
//! force the session into `Failed` and trigger full cleanup. The split is
//! exposed through [`SessionError::properties`].

use thiserror::Error;

use crate::{
    media::{MediaKind, MediaSelection},
    session::SessionState,
};

/// Errors produced by the session state machines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Login or handshake failure.
    #[error("connection failed: {reason}")]
    Connection {
        /// Human-readable reason surfaced to the user.
        reason: String,
    },

    /// Local capture was denied or is unavailable.
    #[error("could not acquire {kind} media: {cause}")]
    MediaAcquisition {
        /// Requested media kinds.
        kind: MediaSelection,
        /// Platform-provided cause.
        cause: String,
    },

    /// Non-monotonic or malformed progress report for a single transfer.
    #[error("transfer of '{file_name}' aborted: {violation}")]
    TransferProtocol {
        /// File the report belonged to.
        file_name: String,
        /// What was wrong with the report.
        violation: TransferViolation,
    },

    /// Unrecoverable engine failure.
    #[error("transport failure: {reason}")]
    TransportFatal {
        /// Reason reported by the engine.
        reason: String,
    },

    /// The engine rejected a single operation.
    #[error("engine rejected {operation}: {reason}")]
    Engine {
        /// Operation that failed.
        operation: &'static str,
        /// Reason reported by the engine.
        reason: String,
    },

    /// Operation is not permitted in the current session state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// State at the time of the request.
        state: SessionState,
        /// Rejected operation.
        operation: &'static str,
    },

    /// An engine event arrived for a session that can no longer use it.
    #[error("stale {event} event while {state}")]
    StaleEvent {
        /// State at the time the event was handled.
        state: SessionState,
        /// Kind of event that was dropped.
        event: &'static str,
    },

    /// Identifier failed validation.
    #[error("invalid identifier '{value}': {reason}")]
    InvalidIdentifier {
        /// Offending identifier.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Text message was empty after trimming.
    #[error("message is empty")]
    EmptyMessage,

    /// Text message exceeds the configured limit.
    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong {
        /// Length of the rejected message in characters.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// No local track of the given kind is held.
    #[error("no local {kind} track")]
    NoTrack {
        /// Requested kind.
        kind: MediaKind,
    },

    /// Data channel payload could not be encoded or decoded.
    #[error("malformed data payload: {0}")]
    Payload(String),

    /// Raw engine event could not be normalized.
    #[error("malformed engine event: {reason}")]
    MalformedEvent {
        /// What was wrong with the event.
        reason: String,
    },
}

/// Why a transfer progress report was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransferViolation {
    /// Percentage went backwards.
    #[error("progress went from {previous}% to {reported}%")]
    NonMonotonic {
        /// Last accepted percentage.
        previous: u8,
        /// Offending percentage.
        reported: u8,
    },

    /// Percentage above 100.
    #[error("progress {0}% is out of range")]
    OutOfRange(u8),

    /// Completion reported without an artifact.
    #[error("completed without an artifact")]
    MissingArtifact,

    /// Artifact delivered before completion.
    #[error("artifact delivered at {0}%")]
    PrematureArtifact(u8),
}

/// Classification used to decide how an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorProperties {
    /// Error forces the session into `Failed` with full cleanup.
    pub is_fatal: bool,
    /// Retrying the same operation later may succeed.
    pub is_retryable: bool,
}

impl SessionError {
    /// Propagation properties of this error.
    pub fn properties(&self) -> ErrorProperties {
        match self {
            Self::Connection { .. } | Self::TransportFatal { .. } => {
                ErrorProperties { is_fatal: true, is_retryable: false }
            },
            Self::MediaAcquisition { .. } | Self::Engine { .. } => {
                ErrorProperties { is_fatal: false, is_retryable: true }
            },
            Self::TransferProtocol { .. }
            | Self::InvalidState { .. }
            | Self::StaleEvent { .. }
            | Self::InvalidIdentifier { .. }
            | Self::EmptyMessage
            | Self::MessageTooLong { .. }
            | Self::NoTrack { .. }
            | Self::Payload(_)
            | Self::MalformedEvent { .. } => ErrorProperties { is_fatal: false, is_retryable: false },
        }
    }

    /// Shorthand for `properties().is_fatal`.
    pub fn is_fatal(&self) -> bool {
        self.properties().is_fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_errors_are_fatal() {
        assert!(SessionError::Connection { reason: "rejected".into() }.is_fatal());
        assert!(SessionError::TransportFatal { reason: "ice failed".into() }.is_fatal());
    }

    #[test]
    fn operation_errors_are_not_fatal() {
        let transfer = SessionError::TransferProtocol {
            file_name: "f.png".into(),
            violation: TransferViolation::NonMonotonic { previous: 60, reported: 30 },
        };
        assert!(!transfer.is_fatal());

        let media = SessionError::MediaAcquisition {
            kind: MediaSelection::Both,
            cause: "permission denied".into(),
        };
        assert!(!media.is_fatal());
        assert!(media.properties().is_retryable);

        assert!(!SessionError::EmptyMessage.is_fatal());
    }

    #[test]
    fn messages_are_readable() {
        let err = SessionError::InvalidState { state: SessionState::Idle, operation: "send message" };
        assert_eq!(err.to_string(), "cannot send message while idle");

        let err = SessionError::TransferProtocol {
            file_name: "f.png".into(),
            violation: TransferViolation::NonMonotonic { previous: 60, reported: 30 },
        };
        assert_eq!(err.to_string(), "transfer of 'f.png' aborted: progress went from 60% to 30%");
    }
}
