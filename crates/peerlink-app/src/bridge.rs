//! Event bridge.
//!
//! Validates raw engine callbacks into the closed [`EngineEvent`] union.
//! Anything that does not fit (an unknown connectivity level, a fractional
//! or out-of-range percentage, a file report without a name, an undecodable
//! data payload) is rejected here with a [`BridgeError`] and never reaches
//! the state machines.

use peerlink_core::{
    SessionError,
    event::{EngineEvent, RawEngineEvent},
    media::{MediaKind, StreamRole},
    message::DataPayload,
    session::Connectivity,
    transfer::{Artifact, FileProgress},
};
use thiserror::Error;

/// Why a raw event was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Connectivity level is not one of none, connecting, weak, full.
    #[error("unknown connectivity level '{0}'")]
    UnknownConnectivity(String),

    /// Stream role is not host or remote.
    #[error("unknown stream role '{0}'")]
    UnknownRole(String),

    /// Track kind is not audio or video.
    #[error("unknown track kind '{0}'")]
    UnknownKind(String),

    /// Percentage is not a number between 0 and 100.
    #[error("invalid percentage {0}")]
    InvalidPercentage(f64),

    /// File report carried no file name.
    #[error("file report without a file name")]
    MissingFileName,

    /// Data channel bytes did not decode.
    #[error("undecodable data payload: {0}")]
    Payload(String),
}

impl From<BridgeError> for SessionError {
    fn from(err: BridgeError) -> Self {
        SessionError::MalformedEvent { reason: err.to_string() }
    }
}

/// Stateless normalizer for raw engine events.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bridge;

impl Bridge {
    /// Validate one raw event.
    ///
    /// # Errors
    /// Returns the first validation failure.
    pub fn normalize(raw: RawEngineEvent) -> Result<EngineEvent, BridgeError> {
        match raw {
            RawEngineEvent::Data(bytes) => DataPayload::decode(&bytes)
                .map(EngineEvent::DataReceived)
                .map_err(|e| BridgeError::Payload(e.to_string())),
            RawEngineEvent::File { file_name, percentage, file } => {
                let file_name = file_name
                    .filter(|name| !name.trim().is_empty())
                    .ok_or(BridgeError::MissingFileName)?;
                let percentage = Self::percentage(percentage)?;
                let artifact = file.map(|(mime_type, data)| Artifact { mime_type, data });
                Ok(EngineEvent::FileProgress(FileProgress { file_name, percentage, artifact }))
            },
            RawEngineEvent::SendProgress { file_name, percentage } => {
                Ok(EngineEvent::OutgoingProgress {
                    file_name,
                    percentage: Self::percentage(percentage)?,
                })
            },
            RawEngineEvent::MediaStream { role, stream } => {
                let role = StreamRole::parse(&role).ok_or(BridgeError::UnknownRole(role))?;
                Ok(EngineEvent::MediaStreamReceived { role, stream })
            },
            RawEngineEvent::TrackMuted { kind } => {
                let kind = MediaKind::parse(&kind).ok_or(BridgeError::UnknownKind(kind))?;
                Ok(EngineEvent::TrackMuted { kind })
            },
            RawEngineEvent::CommunicationState(level) => Connectivity::parse(&level)
                .map(EngineEvent::ConnectivityChanged)
                .ok_or(BridgeError::UnknownConnectivity(level)),
            RawEngineEvent::SecureCode(code) => Ok(EngineEvent::PeerSecureCode(code)),
            RawEngineEvent::Error(reason) => Ok(EngineEvent::Fatal { reason }),
        }
    }

    fn percentage(value: f64) -> Result<u8, BridgeError> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(BridgeError::InvalidPercentage(value));
        }
        // Truncate so that only an exact 100 reads as complete
        Ok(value.floor() as u8)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use peerlink_core::media::{RemoteStream, StreamId};

    use super::*;

    #[test]
    fn connectivity_levels() {
        assert_eq!(
            Bridge::normalize(RawEngineEvent::CommunicationState("weak".into())),
            Ok(EngineEvent::ConnectivityChanged(Connectivity::Weak))
        );
        assert_eq!(
            Bridge::normalize(RawEngineEvent::CommunicationState("strong".into())),
            Err(BridgeError::UnknownConnectivity("strong".into()))
        );
    }

    #[test]
    fn file_progress_is_truncated() {
        let raw = RawEngineEvent::File {
            file_name: Some("f.png".into()),
            percentage: 99.9,
            file: None,
        };
        assert_eq!(
            Bridge::normalize(raw),
            Ok(EngineEvent::FileProgress(FileProgress {
                file_name: "f.png".into(),
                percentage: 99,
                artifact: None,
            }))
        );
    }

    #[test]
    fn completed_file_carries_artifact() {
        let raw = RawEngineEvent::File {
            file_name: Some("f.png".into()),
            percentage: 100.0,
            file: Some(("image/png".into(), Bytes::from_static(b"png"))),
        };
        let Ok(EngineEvent::FileProgress(progress)) = Bridge::normalize(raw) else {
            panic!("expected file progress");
        };
        assert_eq!(progress.percentage, 100);
        assert_eq!(progress.artifact.map(|a| a.mime_type), Some("image/png".into()));
    }

    #[test]
    fn malformed_file_reports_are_rejected() {
        let nameless = RawEngineEvent::File { file_name: None, percentage: 10.0, file: None };
        assert_eq!(Bridge::normalize(nameless), Err(BridgeError::MissingFileName));

        let negative =
            RawEngineEvent::File { file_name: Some("f".into()), percentage: -1.0, file: None };
        assert!(matches!(Bridge::normalize(negative), Err(BridgeError::InvalidPercentage(_))));

        let nan = RawEngineEvent::SendProgress { file_name: "f".into(), percentage: f64::NAN };
        assert!(matches!(Bridge::normalize(nan), Err(BridgeError::InvalidPercentage(_))));
    }

    #[test]
    fn data_payloads_are_decoded() {
        let bytes = DataPayload::Counter { count: 3 }.encode().unwrap();
        assert_eq!(
            Bridge::normalize(RawEngineEvent::Data(bytes)),
            Ok(EngineEvent::DataReceived(DataPayload::Counter { count: 3 }))
        );

        let garbage = RawEngineEvent::Data(Bytes::from_static(b"\xff"));
        let err = Bridge::normalize(garbage).unwrap_err();
        assert!(matches!(SessionError::from(err), SessionError::MalformedEvent { .. }));
    }

    #[test]
    fn media_roles_and_kinds() {
        let stream = Arc::new(RemoteStream { id: StreamId(1), kinds: vec![MediaKind::Audio] });
        let raw = RawEngineEvent::MediaStream { role: "host".into(), stream: Arc::clone(&stream) };
        assert_eq!(
            Bridge::normalize(raw),
            Ok(EngineEvent::MediaStreamReceived { role: StreamRole::Host, stream })
        );

        let raw = RawEngineEvent::TrackMuted { kind: "screen".into() };
        assert_eq!(Bridge::normalize(raw), Err(BridgeError::UnknownKind("screen".into())));
    }
}
