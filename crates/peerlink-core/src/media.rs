//! Media track ownership.
//!
//! The controller is the exclusive owner of local capture. It decides when
//! capture tracks are handed to the engine, when their `enabled` flag flips,
//! and when hardware capture stops. Nothing outside the controller touches a
//! track handle; engine-side effects are returned as [`MediaAction`]s.
//!
//! Remote streams belong to the engine. The controller keeps only a weak
//! reference for rendering and drops it as soon as the engine reports that
//! a remote track muted.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Weak},
};

use tracing::{debug, info};

use crate::error::SessionError;

/// Kind of media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MediaKind {
    /// Microphone.
    Audio,
    /// Camera.
    Video,
}

impl MediaKind {
    /// Parse the engine's kind name.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Video => "video",
        })
    }
}

/// Kinds requested in one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSelection {
    /// Audio only.
    Audio,
    /// Video only.
    Video,
    /// Audio and video.
    Both,
}

impl MediaSelection {
    /// Kinds covered by this selection.
    pub fn kinds(self) -> &'static [MediaKind] {
        match self {
            Self::Audio => &[MediaKind::Audio],
            Self::Video => &[MediaKind::Video],
            Self::Both => &[MediaKind::Audio, MediaKind::Video],
        }
    }
}

impl fmt::Display for MediaSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Both => "audio and video",
        })
    }
}

/// Which side of the session a stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRole {
    /// Our own stream, echoed back by the engine.
    Host,
    /// The peer's stream.
    Remote,
}

impl StreamRole {
    /// Parse the engine's role name.
    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "host" => Some(Self::Host),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Stream identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub u64);

/// Track identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(pub u64);

/// Handle on running hardware capture.
pub trait Capture: Send + fmt::Debug {
    /// Stop capturing. Must be idempotent.
    fn stop(&mut self);
}

/// One captured track.
#[derive(Debug)]
pub struct CaptureTrack {
    /// Track identifier.
    pub id: TrackId,
    /// Track kind.
    pub kind: MediaKind,
    capture: Box<dyn Capture>,
}

impl CaptureTrack {
    /// Wrap a running capture.
    pub fn new(id: TrackId, kind: MediaKind, capture: Box<dyn Capture>) -> Self {
        Self { id, kind, capture }
    }

    fn stop(&mut self) {
        self.capture.stop();
    }
}

/// Freshly acquired local stream.
#[derive(Debug)]
pub struct LocalStream {
    /// Stream identifier.
    pub id: StreamId,
    /// Captured tracks.
    pub tracks: Vec<CaptureTrack>,
}

impl LocalStream {
    /// Stop every track in the stream.
    pub fn stop_all(mut self) {
        for track in &mut self.tracks {
            track.stop();
        }
    }
}

/// Peer stream, owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    /// Stream identifier.
    pub id: StreamId,
    /// Kinds carried by the stream.
    pub kinds: Vec<MediaKind>,
}

/// Observable state of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaTrackState {
    /// Track kind.
    pub kind: MediaKind,
    /// Track role.
    pub role: StreamRole,
    /// Data is transmitted (local) or rendered (remote).
    pub enabled: bool,
}

/// Engine-side effects requested by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaAction {
    /// Hand a track to the engine for transmission.
    SetTrack {
        /// Track kind.
        kind: MediaKind,
        /// Track to transmit.
        track: TrackId,
        /// Stream the track belongs to.
        stream: StreamId,
    },

    /// Change whether the engine transmits the track.
    SetEnabled {
        /// Track kind.
        kind: MediaKind,
        /// New flag.
        enabled: bool,
    },

    /// Stop transmitting and drop the track.
    RemoveTrack {
        /// Track kind.
        kind: MediaKind,
    },
}

#[derive(Debug)]
struct LocalTrack {
    track: CaptureTrack,
    stream: StreamId,
    enabled: bool,
}

/// Owner of local capture and the weak remote stream reference.
#[derive(Debug, Default)]
pub struct MediaTrackController {
    local: BTreeMap<MediaKind, LocalTrack>,
    remote: Option<Weak<RemoteStream>>,
}

impl MediaTrackController {
    /// Controller holding no media.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an acquired stream and hand its tracks to the engine.
    ///
    /// Tracks of kinds not in `selection` are stopped immediately. An existing
    /// local track of the same kind is released first.
    ///
    /// # Errors
    /// Returns `MediaAcquisition` if the stream lacks a requested kind; the
    /// whole stream is stopped in that case.
    pub fn install(
        &mut self,
        stream: LocalStream,
        selection: MediaSelection,
    ) -> Result<Vec<MediaAction>, SessionError> {
        if let Some(missing) =
            selection.kinds().iter().find(|kind| !stream.tracks.iter().any(|t| t.kind == **kind))
        {
            let cause = format!("stream has no {missing} track");
            stream.stop_all();
            return Err(SessionError::MediaAcquisition { kind: selection, cause });
        }

        let LocalStream { id: stream_id, tracks } = stream;
        let mut actions = Vec::new();
        for mut track in tracks {
            let kind = track.kind;
            if !selection.kinds().contains(&kind) {
                track.stop();
                continue;
            }
            actions.extend(self.release(kind));

            info!(%kind, track = track.id.0, stream = stream_id.0, "local track installed");
            actions.push(MediaAction::SetTrack { kind, track: track.id, stream: stream_id });
            self.local.insert(kind, LocalTrack { track, stream: stream_id, enabled: true });
        }
        Ok(actions)
    }

    /// Flip `enabled` for a local track without stopping capture.
    ///
    /// # Errors
    /// Returns `NoTrack` if no local track of that kind exists.
    pub fn toggle(&mut self, kind: MediaKind) -> Result<(bool, MediaAction), SessionError> {
        let local = self.local.get_mut(&kind).ok_or(SessionError::NoTrack { kind })?;
        local.enabled = !local.enabled;
        debug!(%kind, enabled = local.enabled, "local track toggled");
        Ok((local.enabled, MediaAction::SetEnabled { kind, enabled: local.enabled }))
    }

    /// Set `enabled` for a local track, undoing a toggle the engine refused.
    ///
    /// # Errors
    /// Returns `NoTrack` if no local track of that kind exists.
    pub fn set_enabled(&mut self, kind: MediaKind, enabled: bool) -> Result<(), SessionError> {
        let local = self.local.get_mut(&kind).ok_or(SessionError::NoTrack { kind })?;
        local.enabled = enabled;
        debug!(%kind, enabled, "local track flag restored");
        Ok(())
    }

    /// `enabled` flag of the local track, if one exists.
    pub fn is_enabled(&self, kind: MediaKind) -> Option<bool> {
        self.local.get(&kind).map(|local| local.enabled)
    }

    /// Stop capture for `kind` and remove the track from the engine.
    pub fn release(&mut self, kind: MediaKind) -> Vec<MediaAction> {
        match self.local.remove(&kind) {
            Some(mut local) => {
                local.track.stop();
                info!(%kind, "local track released");
                vec![MediaAction::RemoveTrack { kind }]
            },
            None => vec![],
        }
    }

    /// Release the local tracks captured from `stream`.
    pub fn release_stream(&mut self, stream: StreamId) -> Vec<MediaAction> {
        let kinds: Vec<MediaKind> = self
            .local
            .iter()
            .filter(|(_, local)| local.stream == stream)
            .map(|(kind, _)| *kind)
            .collect();
        kinds.into_iter().flat_map(|kind| self.release(kind)).collect()
    }

    /// Release every local track.
    pub fn release_all(&mut self) -> Vec<MediaAction> {
        let kinds: Vec<MediaKind> = self.local.keys().copied().collect();
        kinds.into_iter().flat_map(|kind| self.release(kind)).collect()
    }

    /// Any local track is held.
    pub fn has_local(&self) -> bool {
        !self.local.is_empty()
    }

    /// Stream the local tracks came from.
    pub fn local_stream(&self) -> Option<StreamId> {
        self.local.values().next().map(|local| local.stream)
    }

    /// Observable local track states, ordered by kind.
    pub fn local_tracks(&self) -> Vec<MediaTrackState> {
        self.local
            .iter()
            .map(|(kind, local)| MediaTrackState {
                kind: *kind,
                role: StreamRole::Host,
                enabled: local.enabled,
            })
            .collect()
    }

    /// Remember the peer's stream without taking ownership.
    pub fn attach_remote(&mut self, stream: &Arc<RemoteStream>) {
        debug!(stream = stream.id.0, "remote stream attached");
        self.remote = Some(Arc::downgrade(stream));
    }

    /// Drop the remote reference if the muted kind belongs to it.
    ///
    /// Returns whether a reference was cleared.
    pub fn on_remote_muted(&mut self, kind: MediaKind) -> bool {
        let carries_kind = match self.remote.as_ref().and_then(Weak::upgrade) {
            Some(stream) => stream.kinds.contains(&kind),
            // Engine already dropped it; clear the dangling reference
            None => self.remote.is_some(),
        };
        if carries_kind {
            debug!(%kind, "remote track muted, reference cleared");
            self.remote = None;
        }
        carries_kind
    }

    /// Peer's stream while the engine still holds it.
    pub fn remote_stream(&self) -> Option<Arc<RemoteStream>> {
        self.remote.as_ref().and_then(Weak::upgrade)
    }

    /// Forget the remote reference.
    pub fn clear_remote(&mut self) {
        self.remote = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Debug)]
    struct FakeCapture(Arc<AtomicBool>);

    impl Capture for FakeCapture {
        fn stop(&mut self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    fn stream(kinds: &[MediaKind]) -> (LocalStream, Vec<Arc<AtomicBool>>) {
        let mut live = Vec::new();
        let tracks = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let flag = Arc::new(AtomicBool::new(true));
                live.push(Arc::clone(&flag));
                CaptureTrack::new(TrackId(i as u64), *kind, Box::new(FakeCapture(flag)))
            })
            .collect();
        (LocalStream { id: StreamId(7), tracks }, live)
    }

    #[test]
    fn install_hands_tracks_to_engine() {
        let mut controller = MediaTrackController::new();
        let (local, _live) = stream(&[MediaKind::Audio, MediaKind::Video]);

        let actions = controller.install(local, MediaSelection::Both).unwrap();
        assert_eq!(actions, vec![
            MediaAction::SetTrack { kind: MediaKind::Audio, track: TrackId(0), stream: StreamId(7) },
            MediaAction::SetTrack { kind: MediaKind::Video, track: TrackId(1), stream: StreamId(7) },
        ]);
        assert_eq!(controller.is_enabled(MediaKind::Audio), Some(true));
        assert_eq!(controller.local_stream(), Some(StreamId(7)));
    }

    #[test]
    fn missing_kind_fails_and_stops_capture() {
        let mut controller = MediaTrackController::new();
        let (local, live) = stream(&[MediaKind::Audio]);

        let err = controller.install(local, MediaSelection::Both).unwrap_err();
        assert!(matches!(err, SessionError::MediaAcquisition { kind: MediaSelection::Both, .. }));
        assert!(!live[0].load(Ordering::SeqCst));
        assert!(!controller.has_local());
    }

    #[test]
    fn unrequested_tracks_are_stopped() {
        let mut controller = MediaTrackController::new();
        let (local, live) = stream(&[MediaKind::Audio, MediaKind::Video]);

        let actions = controller.install(local, MediaSelection::Video).unwrap();
        assert_eq!(actions.len(), 1);
        assert!(!live[0].load(Ordering::SeqCst));
        assert!(live[1].load(Ordering::SeqCst));
    }

    #[test]
    fn toggle_keeps_capture_running() {
        let mut controller = MediaTrackController::new();
        let (local, live) = stream(&[MediaKind::Video]);
        controller.install(local, MediaSelection::Video).unwrap();

        let (enabled, action) = controller.toggle(MediaKind::Video).unwrap();
        assert!(!enabled);
        assert_eq!(action, MediaAction::SetEnabled { kind: MediaKind::Video, enabled: false });
        assert!(live[0].load(Ordering::SeqCst));

        let (enabled, _) = controller.toggle(MediaKind::Video).unwrap();
        assert!(enabled);
    }

    #[test]
    fn refused_toggle_is_restored() {
        let mut controller = MediaTrackController::new();
        let (local, _live) = stream(&[MediaKind::Audio]);
        controller.install(local, MediaSelection::Audio).unwrap();

        let (enabled, _) = controller.toggle(MediaKind::Audio).unwrap();
        controller.set_enabled(MediaKind::Audio, !enabled).unwrap();
        assert_eq!(controller.is_enabled(MediaKind::Audio), Some(true));
        assert_eq!(
            controller.set_enabled(MediaKind::Video, true),
            Err(SessionError::NoTrack { kind: MediaKind::Video })
        );
    }

    #[test]
    fn release_stream_keeps_other_streams() {
        let mut controller = MediaTrackController::new();
        let (audio, audio_live) = stream(&[MediaKind::Audio]);
        controller.install(audio, MediaSelection::Audio).unwrap();
        let (mut video, video_live) = stream(&[MediaKind::Video]);
        video.id = StreamId(8);
        controller.install(video, MediaSelection::Video).unwrap();

        let actions = controller.release_stream(StreamId(8));
        assert_eq!(actions, vec![MediaAction::RemoveTrack { kind: MediaKind::Video }]);
        assert!(!video_live[0].load(Ordering::SeqCst));
        assert!(audio_live[0].load(Ordering::SeqCst));
        assert_eq!(controller.is_enabled(MediaKind::Audio), Some(true));
        assert!(controller.release_stream(StreamId(8)).is_empty());
    }

    #[test]
    fn toggle_without_track_fails() {
        let mut controller = MediaTrackController::new();
        assert_eq!(
            controller.toggle(MediaKind::Audio),
            Err(SessionError::NoTrack { kind: MediaKind::Audio })
        );
    }

    #[test]
    fn release_stops_capture() {
        let mut controller = MediaTrackController::new();
        let (local, live) = stream(&[MediaKind::Audio, MediaKind::Video]);
        controller.install(local, MediaSelection::Both).unwrap();

        let actions = controller.release_all();
        assert_eq!(actions, vec![
            MediaAction::RemoveTrack { kind: MediaKind::Audio },
            MediaAction::RemoveTrack { kind: MediaKind::Video },
        ]);
        assert!(live.iter().all(|flag| !flag.load(Ordering::SeqCst)));
        assert!(!controller.has_local());
        assert!(controller.release_all().is_empty());
    }

    #[test]
    fn reinstall_replaces_existing_track() {
        let mut controller = MediaTrackController::new();
        let (first, first_live) = stream(&[MediaKind::Audio]);
        controller.install(first, MediaSelection::Audio).unwrap();

        let (second, _) = stream(&[MediaKind::Audio]);
        let actions = controller.install(second, MediaSelection::Audio).unwrap();
        assert_eq!(actions[0], MediaAction::RemoveTrack { kind: MediaKind::Audio });
        assert!(!first_live[0].load(Ordering::SeqCst));
    }

    #[test]
    fn remote_reference_is_weak() {
        let mut controller = MediaTrackController::new();
        let remote = Arc::new(RemoteStream { id: StreamId(9), kinds: vec![MediaKind::Video] });
        controller.attach_remote(&remote);
        assert_eq!(controller.remote_stream().map(|s| s.id), Some(StreamId(9)));

        drop(remote);
        assert!(controller.remote_stream().is_none());
    }

    #[test]
    fn remote_mute_clears_reference() {
        let mut controller = MediaTrackController::new();
        let remote = Arc::new(RemoteStream { id: StreamId(9), kinds: vec![MediaKind::Video] });
        controller.attach_remote(&remote);

        // Audio is not part of this stream
        assert!(!controller.on_remote_muted(MediaKind::Audio));
        assert!(controller.remote_stream().is_some());

        assert!(controller.on_remote_muted(MediaKind::Video));
        assert!(controller.remote_stream().is_none());
    }
}
