//! Scripted transport engine and capture devices.
//!
//! Both record every call and can be told to fail. Clones share state, so a
//! test keeps one clone as a handle while the runtime owns the other.
//! Engine events are injected by the test through [`SimEngine::emit`] and
//! friends; the engine never produces events on its own.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
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
        ConnectOptions, ConnectionOutcome, EngineError, MediaDevices, OutgoingFile,
        TransportEngine,
    },
};
use tracing::debug;

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `start_connection`.
    StartConnection {
        /// Peer identifier.
        peer_id: String,
        /// Secure code passed in the options.
        secure_code: Option<String>,
    },
    /// `send_data`.
    SendData(Bytes),
    /// `send_file`.
    SendFile {
        /// File name.
        name: String,
        /// Content type.
        mime_type: String,
    },
    /// `set_media_track`.
    SetMediaTrack {
        /// Track kind.
        kind: MediaKind,
        /// Track identifier.
        track: TrackId,
        /// Stream identifier.
        stream: StreamId,
    },
    /// `set_track_enabled`.
    SetTrackEnabled {
        /// Track kind.
        kind: MediaKind,
        /// New flag.
        enabled: bool,
    },
    /// `remove_media_track`.
    RemoveMediaTrack {
        /// Track kind.
        kind: MediaKind,
    },
    /// `close_connection`.
    CloseConnection,
}

impl EngineCall {
    /// Whether this call acquires or releases a media track.
    pub fn changes_tracks(&self) -> bool {
        matches!(self, Self::SetMediaTrack { .. } | Self::RemoveMediaTrack { .. })
    }
}

#[derive(Debug, Default)]
struct EngineScript {
    calls: Vec<EngineCall>,
    connect_code: Option<String>,
    refusal: Option<String>,
    failures: HashMap<&'static str, String>,
}

/// Scripted [`TransportEngine`].
#[derive(Debug, Clone)]
pub struct SimEngine {
    script: Arc<Mutex<EngineScript>>,
    sink: EventSink,
}

impl SimEngine {
    /// Engine pushing events into `sink`.
    pub fn new(sink: EventSink) -> Self {
        Self { script: Arc::new(Mutex::new(EngineScript::default())), sink }
    }

    fn script(&self) -> MutexGuard<'_, EngineScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.script().calls.clone()
    }

    /// Payloads sent on the data channel, decoded.
    pub fn sent_payloads(&self) -> Vec<DataPayload> {
        self.script()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::SendData(bytes) => DataPayload::decode(bytes).ok(),
                _ => None,
            })
            .collect()
    }

    /// Return `code` from the next successful `start_connection`.
    pub fn hand_out_code(&self, code: impl Into<String>) {
        self.script().connect_code = Some(code.into());
    }

    /// Make `start_connection` fail with `reason`.
    pub fn refuse_connection(&self, reason: impl Into<String>) {
        self.script().refusal = Some(reason.into());
    }

    /// Make the next call named `operation` fail with `reason`.
    ///
    /// Names: `send_data`, `send_file`, `set_media_track`,
    /// `set_track_enabled`, `remove_media_track`, `close_connection`.
    pub fn fail_next(&self, operation: &'static str, reason: impl Into<String>) {
        self.script().failures.insert(operation, reason.into());
    }

    /// Inject a raw engine event. Returns `false` once the runtime is gone.
    pub fn emit(&self, event: RawEngineEvent) -> bool {
        self.sink.send(event).is_ok()
    }

    /// Inject a connectivity change.
    pub fn connectivity(&self, level: &str) -> bool {
        self.emit(RawEngineEvent::CommunicationState(level.to_string()))
    }

    /// Inject a data channel payload from the peer.
    pub fn peer_sends(&self, payload: &DataPayload) -> bool {
        payload.encode().is_ok_and(|bytes| self.emit(RawEngineEvent::Data(bytes)))
    }

    /// Inject an incoming file progress report.
    pub fn file_progress(&self, name: &str, percentage: f64, file: Option<(&str, &[u8])>) -> bool {
        self.emit(RawEngineEvent::File {
            file_name: Some(name.to_string()),
            percentage,
            file: file.map(|(mime, data)| (mime.to_string(), Bytes::copy_from_slice(data))),
        })
    }

    /// Inject a media stream event and return the stream so the test can
    /// control its lifetime.
    pub fn stream(&self, role: &str, id: u64, kinds: Vec<MediaKind>) -> Arc<RemoteStream> {
        let stream = Arc::new(RemoteStream { id: StreamId(id), kinds });
        self.emit(RawEngineEvent::MediaStream {
            role: role.to_string(),
            stream: Arc::clone(&stream),
        });
        stream
    }

    fn record(&self, call: EngineCall, operation: &'static str) -> Result<(), EngineError> {
        let mut script = self.script();
        script.calls.push(call);
        match script.failures.remove(operation) {
            Some(reason) => {
                debug!(operation, %reason, "scripted engine failure");
                Err(EngineError::new(reason))
            },
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TransportEngine for SimEngine {
    async fn start_connection(
        &mut self,
        peer_id: &PeerId,
        options: ConnectOptions,
    ) -> Result<ConnectionOutcome, EngineError> {
        let mut script = self.script();
        script.calls.push(EngineCall::StartConnection {
            peer_id: peer_id.as_str().to_string(),
            secure_code: options.secure_code,
        });
        if let Some(reason) = script.refusal.take() {
            debug!(%reason, "scripted connection refusal");
            return Err(EngineError::new(reason));
        }
        Ok(ConnectionOutcome { secure_code: script.connect_code.take() })
    }

    async fn send_data(&mut self, payload: Bytes) -> Result<(), EngineError> {
        self.record(EngineCall::SendData(payload), "send_data")
    }

    async fn send_file(&mut self, file: OutgoingFile) -> Result<(), EngineError> {
        self.record(EngineCall::SendFile { name: file.name, mime_type: file.mime_type }, "send_file")
    }

    async fn set_media_track(
        &mut self,
        kind: MediaKind,
        track: TrackId,
        stream: StreamId,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::SetMediaTrack { kind, track, stream }, "set_media_track")
    }

    async fn set_track_enabled(
        &mut self,
        kind: MediaKind,
        enabled: bool,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::SetTrackEnabled { kind, enabled }, "set_track_enabled")
    }

    async fn remove_media_track(&mut self, kind: MediaKind) -> Result<(), EngineError> {
        self.record(EngineCall::RemoveMediaTrack { kind }, "remove_media_track")
    }

    async fn close_connection(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::CloseConnection, "close_connection")
    }
}

/// Capture handle that flips a shared flag when stopped.
#[derive(Debug)]
pub struct SimCapture {
    live: Arc<AtomicBool>,
}

impl Capture for SimCapture {
    fn stop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    acquisitions: Vec<MediaSelection>,
    denial: Option<String>,
    live: Vec<Arc<AtomicBool>>,
    next_id: u64,
}

/// Scripted [`MediaDevices`].
#[derive(Debug, Clone, Default)]
pub struct SimMediaDevices {
    state: Arc<Mutex<DeviceState>>,
}

impl SimMediaDevices {
    /// Devices that grant every request.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deny every later request with `cause`.
    pub fn deny(&self, cause: impl Into<String>) {
        self.state().denial = Some(cause.into());
    }

    /// Grant requests again.
    pub fn allow(&self) {
        self.state().denial = None;
    }

    /// Selections requested so far.
    pub fn acquisitions(&self) -> Vec<MediaSelection> {
        self.state().acquisitions.clone()
    }

    /// Tracks whose capture is still running.
    pub fn live_tracks(&self) -> usize {
        self.state().live.iter().filter(|flag| flag.load(Ordering::SeqCst)).count()
    }

    /// Build a stream directly, bypassing the async seam.
    pub fn capture(&self, selection: MediaSelection) -> LocalStream {
        let mut state = self.state();
        state.next_id += 1;
        let stream = StreamId(state.next_id);
        let mut tracks = Vec::new();
        for kind in selection.kinds() {
            state.next_id += 1;
            let live = Arc::new(AtomicBool::new(true));
            state.live.push(Arc::clone(&live));
            tracks.push(CaptureTrack::new(TrackId(state.next_id), *kind, Box::new(SimCapture {
                live,
            })));
        }
        LocalStream { id: stream, tracks }
    }
}

#[async_trait]
impl MediaDevices for SimMediaDevices {
    async fn acquire(&mut self, selection: MediaSelection) -> Result<LocalStream, EngineError> {
        let denial = {
            let mut state = self.state();
            state.acquisitions.push(selection);
            state.denial.clone()
        };
        match denial {
            Some(cause) => {
                debug!(%selection, %cause, "scripted capture denial");
                Err(EngineError::new(cause))
            },
            None => Ok(self.capture(selection)),
        }
    }
}
