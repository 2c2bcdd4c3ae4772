//! In-process loopback engine and capture devices.
//!
//! Stands in for the real-time engine when running the shell without one.
//! The "peer" lives inside the engine:
//!
//! ```text
//!   start_connection ──► connecting, full (and our secure code read back)
//!   send_data(text)  ──► data "echo: <text>"
//!   send_data(count) ──► data count (acknowledged as-is)
//!   send_file        ──► outgoing progress, then the same file as incoming
//!   set_media_track  ──► host echo, remote stream mirroring our kinds
//!   remove_media_track ► remote track muted
//! ```
//!
//! Events go through the runtime's event sink exactly like a real engine's
//! callbacks would.

use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use peerlink_app::EventSink;
use peerlink_core::{
    event::RawEngineEvent,
    media::{
        Capture, CaptureTrack, LocalStream, MediaKind, MediaSelection, RemoteStream, StreamId,
        TrackId,
    },
    message::DataPayload,
    session::PeerId,
    transport::{
        ConnectOptions, ConnectionOutcome, EngineConfig, EngineError, MediaDevices, OutgoingFile,
        TransportEngine,
    },
};
use tracing::{debug, info};

/// Offset separating mirrored remote stream ids from local ones.
const REMOTE_STREAM_BASE: u64 = 1 << 32;

/// Loopback [`TransportEngine`].
#[derive(Debug)]
pub struct LoopbackEngine {
    config: EngineConfig,
    sink: EventSink,
    peer: Option<PeerId>,
    remote: Option<Arc<RemoteStream>>,
    remote_kinds: BTreeSet<MediaKind>,
    mirrors: u64,
}

impl LoopbackEngine {
    /// Engine pushing events into `sink`.
    pub fn new(config: EngineConfig, sink: EventSink) -> Self {
        Self {
            config,
            sink,
            peer: None,
            remote: None,
            remote_kinds: BTreeSet::new(),
            mirrors: 0,
        }
    }

    /// Peer currently connected.
    pub fn peer(&self) -> Option<&PeerId> {
        self.peer.as_ref()
    }

    fn emit(&self, event: RawEngineEvent) {
        if self.sink.send(event).is_err() {
            debug!("runtime gone, loopback event dropped");
        }
    }

    fn require_peer(&self) -> Result<(), EngineError> {
        if self.peer.is_some() { Ok(()) } else { Err(EngineError::new("not connected")) }
    }

    fn mirror_remote(&mut self) {
        if self.remote_kinds.is_empty() {
            self.remote = None;
            return;
        }
        self.mirrors += 1;
        let stream = Arc::new(RemoteStream {
            id: StreamId(REMOTE_STREAM_BASE + self.mirrors),
            kinds: self.remote_kinds.iter().copied().collect(),
        });
        self.remote = Some(Arc::clone(&stream));
        self.emit(RawEngineEvent::MediaStream { role: "remote".into(), stream });
    }
}

#[async_trait]
impl TransportEngine for LoopbackEngine {
    async fn start_connection(
        &mut self,
        peer_id: &PeerId,
        options: ConnectOptions,
    ) -> Result<ConnectionOutcome, EngineError> {
        if peer_id == &self.config.local_id {
            return Err(EngineError::new("cannot connect to ourselves"));
        }
        info!(
            signaling_url = %self.config.signaling_url,
            local = %self.config.local_id,
            peer = %peer_id,
            authenticated = self.config.auth_key.is_some(),
            "loopback connection"
        );
        self.peer = Some(peer_id.clone());
        self.emit(RawEngineEvent::CommunicationState("connecting".into()));
        self.emit(RawEngineEvent::CommunicationState("full".into()));
        if self.config.secure
            && let Some(code) = options.secure_code
        {
            self.emit(RawEngineEvent::SecureCode(code));
        }
        Ok(ConnectionOutcome::default())
    }

    async fn send_data(&mut self, payload: Bytes) -> Result<(), EngineError> {
        self.require_peer()?;
        let reply = match DataPayload::decode(&payload) {
            Ok(DataPayload::Text { message }) => {
                DataPayload::Text { message: format!("echo: {message}") }
            },
            Ok(counter @ DataPayload::Counter { .. }) => counter,
            Err(err) => return Err(EngineError::new(err.to_string())),
        };
        let bytes = reply.encode().map_err(|err| EngineError::new(err.to_string()))?;
        self.emit(RawEngineEvent::Data(bytes));
        Ok(())
    }

    async fn send_file(&mut self, file: OutgoingFile) -> Result<(), EngineError> {
        self.require_peer()?;
        for percentage in [50.0, 100.0] {
            self.emit(RawEngineEvent::SendProgress { file_name: file.name.clone(), percentage });
        }
        self.emit(RawEngineEvent::File {
            file_name: Some(file.name.clone()),
            percentage: 50.0,
            file: None,
        });
        self.emit(RawEngineEvent::File {
            file_name: Some(file.name),
            percentage: 100.0,
            file: Some((file.mime_type, file.data)),
        });
        Ok(())
    }

    async fn set_media_track(
        &mut self,
        kind: MediaKind,
        track: TrackId,
        stream: StreamId,
    ) -> Result<(), EngineError> {
        self.require_peer()?;
        debug!(%kind, track = track.0, stream = stream.0, "loopback track added");
        self.emit(RawEngineEvent::MediaStream {
            role: "host".into(),
            stream: Arc::new(RemoteStream { id: stream, kinds: vec![kind] }),
        });
        self.remote_kinds.insert(kind);
        self.mirror_remote();
        Ok(())
    }

    async fn set_track_enabled(
        &mut self,
        kind: MediaKind,
        enabled: bool,
    ) -> Result<(), EngineError> {
        self.require_peer()?;
        debug!(%kind, enabled, "loopback track flag changed");
        Ok(())
    }

    async fn remove_media_track(&mut self, kind: MediaKind) -> Result<(), EngineError> {
        if self.remote_kinds.remove(&kind) {
            self.emit(RawEngineEvent::TrackMuted { kind: kind.to_string() });
        }
        if self.remote_kinds.is_empty() {
            self.remote = None;
        }
        Ok(())
    }

    async fn close_connection(&mut self) -> Result<(), EngineError> {
        if let Some(peer) = self.peer.take() {
            info!(%peer, "loopback connection closed");
        }
        self.remote = None;
        self.remote_kinds.clear();
        Ok(())
    }
}

/// Capture that only logs when stopped.
#[derive(Debug)]
struct LoggedCapture {
    track: TrackId,
    kind: MediaKind,
}

impl Capture for LoggedCapture {
    fn stop(&mut self) {
        debug!(track = self.track.0, kind = %self.kind, "capture stopped");
    }
}

/// Loopback [`MediaDevices`] handing out placeholder tracks.
#[derive(Debug, Default)]
pub struct LoopbackDevices {
    next_id: AtomicU64,
}

impl LoopbackDevices {
    /// Devices that grant every request.
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl MediaDevices for LoopbackDevices {
    async fn acquire(&mut self, selection: MediaSelection) -> Result<LocalStream, EngineError> {
        let id = StreamId(self.next());
        let tracks = selection
            .kinds()
            .iter()
            .map(|kind| {
                let track = TrackId(self.next());
                CaptureTrack::new(track, *kind, Box::new(LoggedCapture { track, kind: *kind }))
            })
            .collect();
        info!(%selection, stream = id.0, "loopback capture started");
        Ok(LocalStream { id, tracks })
    }
}

#[cfg(test)]
mod tests {
    use peerlink_app::event_channel;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    fn engine() -> (LoopbackEngine, UnboundedReceiver<RawEngineEvent>) {
        let (sink, events) = event_channel();
        let config = EngineConfig {
            local_id: PeerId::parse("A", 10).unwrap(),
            peer_id: None,
            signaling_url: "wss://localhost".into(),
            secure: true,
            auth_key: None,
        };
        (LoopbackEngine::new(config, sink), events)
    }

    fn drain(events: &mut UnboundedReceiver<RawEngineEvent>) -> Vec<RawEngineEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn connect_reaches_full_and_reads_code_back() {
        let (mut engine, mut events) = engine();
        let peer = PeerId::parse("B", 10).unwrap();
        let options = ConnectOptions { secure_code: Some("K7P2QX".into()) };

        engine.start_connection(&peer, options).await.unwrap();

        assert_eq!(drain(&mut events), vec![
            RawEngineEvent::CommunicationState("connecting".into()),
            RawEngineEvent::CommunicationState("full".into()),
            RawEngineEvent::SecureCode("K7P2QX".into()),
        ]);
    }

    #[tokio::test]
    async fn refuses_self_connection() {
        let (mut engine, _events) = engine();
        let me = PeerId::parse("A", 10).unwrap();
        assert!(engine.start_connection(&me, ConnectOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn text_is_echoed() {
        let (mut engine, mut events) = engine();
        let peer = PeerId::parse("B", 10).unwrap();
        engine.start_connection(&peer, ConnectOptions::default()).await.unwrap();
        drain(&mut events);

        let hi = DataPayload::Text { message: "hi".into() }.encode().unwrap();
        engine.send_data(hi).await.unwrap();

        let echoed = match drain(&mut events).pop() {
            Some(RawEngineEvent::Data(bytes)) => DataPayload::decode(&bytes).unwrap(),
            other => panic!("unexpected event {other:?}"),
        };
        assert_eq!(echoed, DataPayload::Text { message: "echo: hi".into() });
    }

    #[tokio::test]
    async fn send_requires_connection() {
        let (mut engine, _events) = engine();
        let hi = DataPayload::Text { message: "hi".into() }.encode().unwrap();
        assert!(engine.send_data(hi).await.is_err());
    }

    #[tokio::test]
    async fn tracks_are_mirrored() {
        let (mut engine, mut events) = engine();
        let peer = PeerId::parse("B", 10).unwrap();
        engine.start_connection(&peer, ConnectOptions::default()).await.unwrap();
        drain(&mut events);

        engine.set_media_track(MediaKind::Audio, TrackId(2), StreamId(1)).await.unwrap();
        engine.set_media_track(MediaKind::Video, TrackId(3), StreamId(1)).await.unwrap();
        let remote = engine.remote.clone().unwrap();
        assert_eq!(remote.kinds, vec![MediaKind::Audio, MediaKind::Video]);

        engine.remove_media_track(MediaKind::Audio).await.unwrap();
        engine.remove_media_track(MediaKind::Video).await.unwrap();
        assert!(engine.remote.is_none());
        let muted = drain(&mut events)
            .into_iter()
            .filter(|event| matches!(event, RawEngineEvent::TrackMuted { .. }))
            .count();
        assert_eq!(muted, 2);
    }

    #[tokio::test]
    async fn devices_hand_out_requested_kinds() {
        let mut devices = LoopbackDevices::new();
        let stream = devices.acquire(MediaSelection::Both).await.unwrap();
        let kinds: Vec<MediaKind> = stream.tracks.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![MediaKind::Audio, MediaKind::Video]);
    }
}
