//! Session orchestrator.
//!
//! Composes the session state machine, secure handshake, message log, file
//! transfer assembler, media track controller and counter timer behind the
//! operations a UI calls.
//!
//! # Architecture
//!
//! ```text
//!   UI intents                         engine events (via Bridge)
//!       │                                         │
//!       ▼                                         ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                       Orchestrator                        │
//! │  Session ── SecureHandshake    MessageLog                 │
//! │  FileTransferAssembler   MediaTrackController   Timer     │
//! └───────────────────────────────────────────────────────────┘
//!       │                                         │
//!       ▼                                         ▼
//!  Vec<OrchestratorAction>               OrchestratorEvent
//!  (runtime executes)                    (observers notified)
//! ```
//!
//! Every method runs to completion without awaiting. Deferred work (starting
//! the connection, acquiring capture) is requested as an action and its
//! result is fed back through [`Orchestrator::connection_started`] and
//! [`Orchestrator::media_acquired`].
//!
//! Operation-local errors are returned and leave the session untouched. An
//! engine call that fails after local state already changed is undone
//! through [`Orchestrator::action_failed`]. A refused connection is closed,
//! cleaned up and reset to `Idle`. Integrity failures (handshake mismatch or
//! a fatal engine error) move the session to `Failed` and run cleanup. Both
//! publish [`OrchestratorEvent::Error`] and return the teardown actions.

use std::{sync::Arc, time::Instant};

use peerlink_core::{
    SessionError,
    env::Environment,
    event::EngineEvent,
    handshake::{SecureHandshake, Verdict},
    media::{
        LocalStream, MediaAction, MediaKind, MediaSelection, MediaTrackController, MediaTrackState,
        RemoteStream, StreamId, StreamRole,
    },
    message::{DataPayload, ImageRef, Message, MessageLog, MessagePayload, Origin},
    session::{Connectivity, PeerId, Session, SessionAction, SessionState},
    transfer::{FileProgress, FileTransferAssembler, TransferOutcome},
    transport::{ConnectOptions, ConnectionOutcome, EngineError, OutgoingFile},
};
use tracing::{debug, info, warn};

use crate::{
    action::OrchestratorAction,
    config::OrchestratorConfig,
    notify::{Observer, OrchestratorEvent, Subscribers, SubscriptionId, TransferDirection},
    timer::CounterTimer,
};

/// Result of an orchestrator step.
pub type Step = Result<Vec<OrchestratorAction>, SessionError>;

/// Comparable view of everything the orchestrator holds for a session.
///
/// A disconnected orchestrator and a freshly constructed one produce equal
/// snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSnapshot {
    /// Session state machine.
    pub session: Session,
    /// Secure handshake, in secure mode.
    pub handshake: Option<SecureHandshake>,
    /// Buffered peer code awaiting verification.
    pub peer_code: Option<String>,
    /// Message log contents.
    pub messages: Vec<Message>,
    /// Transfers in flight.
    pub pending_transfers: usize,
    /// Local tracks held.
    pub local_tracks: Vec<MediaTrackState>,
    /// Remote stream still held by the engine.
    pub remote_stream: Option<StreamId>,
    /// Echoed host stream.
    pub host_stream: Option<StreamId>,
    /// Capture acquisition in flight.
    pub acquiring: Option<MediaSelection>,
    /// Counter timer running.
    pub counter_running: bool,
    /// Last counter value sent.
    pub local_count: u64,
    /// Last counter value received.
    pub remote_count: u64,
}

/// Orchestrates one peer session.
#[derive(Debug)]
pub struct Orchestrator<E: Environment> {
    env: E,
    config: OrchestratorConfig,
    epoch: Instant,
    session: Session,
    handshake: Option<SecureHandshake>,
    peer_code: Option<String>,
    log: MessageLog,
    transfers: FileTransferAssembler,
    media: MediaTrackController,
    acquiring: Option<MediaSelection>,
    host_stream: Option<StreamId>,
    counter: CounterTimer,
    local_count: u64,
    remote_count: u64,
    subscribers: Subscribers,
}

impl<E: Environment> Orchestrator<E> {
    /// Orchestrator with an `Idle` session.
    pub fn new(env: E, config: OrchestratorConfig) -> Self {
        let epoch = env.now();
        let transfers = FileTransferAssembler::new(config.image_mime_prefix.clone());
        Self {
            env,
            config,
            epoch,
            session: Session::new(),
            handshake: None,
            peer_code: None,
            log: MessageLog::new(),
            transfers,
            media: MediaTrackController::new(),
            acquiring: None,
            host_stream: None,
            counter: CounterTimer::new(),
            local_count: 0,
            remote_count: 0,
            subscribers: Subscribers::default(),
        }
    }

    /// Register a change observer.
    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        self.subscribers.subscribe(observer)
    }

    /// Remove a change observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Configuration in use.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Session state machine.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Last connectivity level reported by the engine.
    pub fn connectivity(&self) -> Connectivity {
        self.session.connectivity()
    }

    /// Local secure code, in secure mode.
    pub fn secure_code(&self) -> Option<&str> {
        self.session.secure_code()
    }

    /// Ordered message log.
    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    /// Owned copy of the message log.
    pub fn message_snapshot(&self) -> Vec<Message> {
        self.log.snapshot()
    }

    /// Stream our local tracks belong to.
    pub fn local_stream(&self) -> Option<StreamId> {
        self.media.local_stream()
    }

    /// Local track states.
    pub fn local_tracks(&self) -> Vec<MediaTrackState> {
        self.media.local_tracks()
    }

    /// Peer's stream while the engine still holds it.
    pub fn remote_stream(&self) -> Option<Arc<RemoteStream>> {
        self.media.remote_stream()
    }

    /// Our own stream as echoed by the engine.
    pub fn host_stream(&self) -> Option<StreamId> {
        self.host_stream
    }

    /// Transfers in flight.
    pub fn pending_transfers(&self) -> usize {
        self.transfers.pending_count()
    }

    /// Last counter value sent and last value received.
    pub fn counters(&self) -> (u64, u64) {
        (self.local_count, self.remote_count)
    }

    /// Next time [`Orchestrator::on_timer`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.counter.deadline()
    }

    /// Comparable view of the session state.
    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            session: self.session.clone(),
            handshake: self.handshake.clone(),
            peer_code: self.peer_code.clone(),
            messages: self.log.snapshot(),
            pending_transfers: self.transfers.pending_count(),
            local_tracks: self.media.local_tracks(),
            remote_stream: self.media.remote_stream().map(|stream| stream.id),
            host_stream: self.host_stream,
            acquiring: self.acquiring,
            counter_running: self.counter.is_running(),
            local_count: self.local_count,
            remote_count: self.remote_count,
        }
    }

    /// Start a session with `peer_id`.
    ///
    /// An active session is torn down first; a closed or failed one is reset.
    /// In secure mode `secure_code` becomes the local code, otherwise one is
    /// generated.
    pub fn login(&mut self, local_id: &str, peer_id: &str, secure_code: Option<String>) -> Step {
        let local_id = PeerId::parse(local_id, self.config.max_id_len)?;
        let peer_id = PeerId::parse(peer_id, self.config.max_id_len)?;
        if secure_code.is_some() && !self.config.secure_mode {
            return Err(self.invalid("use a secure code outside secure mode"));
        }

        let mut actions = Vec::new();
        if self.session.state().is_active() {
            info!("tearing down active session before login");
            let transition = self.session.disconnect()?;
            actions.extend(self.apply(transition));
        }
        let transition = self.session.reset()?;
        self.apply(transition);

        let secure = self.config.secure_mode;
        let transition = self.session.login(local_id, peer_id.clone(), secure)?;
        actions.extend(self.apply(transition));

        let mut options = ConnectOptions::default();
        if secure {
            let handshake = SecureHandshake::new(&self.env, secure_code);
            let code = handshake.local_code().to_string();
            self.session.set_secure_code(code.clone())?;
            self.handshake = Some(handshake);
            self.publish(OrchestratorEvent::SecureCode(code.clone()));
            options.secure_code = Some(code);
        }

        actions.push(OrchestratorAction::StartConnection { peer_id, options });
        Ok(actions)
    }

    /// Feed back the result of [`OrchestratorAction::StartConnection`].
    pub fn connection_started(&mut self, result: Result<ConnectionOutcome, EngineError>) -> Step {
        let state = self.session.state();
        if !matches!(state, SessionState::Connecting | SessionState::AwaitingSecureCode) {
            return Err(SessionError::StaleEvent { state, event: "connection result" });
        }

        match result {
            Ok(outcome) => {
                if let (Some(code), Some(handshake)) = (outcome.secure_code, self.handshake.as_mut())
                {
                    handshake.adopt_engine_code(code);
                    let code = handshake.local_code().to_string();
                    if self.session.secure_code() != Some(code.as_str()) {
                        self.session.set_secure_code(code.clone())?;
                        self.publish(OrchestratorEvent::SecureCode(code));
                    }
                }
                Ok(vec![])
            },
            Err(err) => self.refuse_connection(err.reason),
        }
    }

    /// Undo the local effects of an action the engine rejected.
    ///
    /// Returns the actions that release what the failed call left behind.
    /// Actions without local effects need no undo.
    pub fn action_failed(
        &mut self,
        action: &OrchestratorAction,
        error: &SessionError,
    ) -> Vec<OrchestratorAction> {
        let undo = match (action, error) {
            (OrchestratorAction::StartConnection { .. }, SessionError::Connection { reason }) => {
                self.refuse_connection(reason.clone())
            },
            (OrchestratorAction::Media(MediaAction::SetEnabled { kind, enabled }), _) => {
                self.media.set_enabled(*kind, !enabled).map(|()| {
                    self.publish(OrchestratorEvent::TrackToggled { kind: *kind, enabled: !enabled });
                    vec![]
                })
            },
            (OrchestratorAction::Media(MediaAction::SetTrack { stream, .. }), _) => {
                self.abandon_stream(*stream)
            },
            _ => Ok(vec![]),
        };
        undo.unwrap_or_else(|err| {
            debug!(%err, "nothing to undo");
            vec![]
        })
    }

    /// Submit the peer's secure code, as read out by the user.
    ///
    /// Before the engine reaches the peer the code is held and verified on
    /// entering `AwaitingSecureCode`.
    pub fn submit_secure_code(&mut self, code: &str) -> Step {
        if !self.session.is_secure() {
            return Err(self.invalid("submit a secure code"));
        }
        match self.session.state() {
            SessionState::Connecting => {
                self.peer_code = Some(code.trim().to_string());
                Ok(vec![])
            },
            SessionState::AwaitingSecureCode => self.verify_peer_code(code),
            _ => Err(self.invalid("submit a secure code")),
        }
    }

    /// Send a text message. It is logged before the engine acknowledges it.
    pub fn send_message(&mut self, text: &str) -> Step {
        self.require_channels("send a message")?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let len = text.chars().count();
        if len > self.config.max_message_len {
            return Err(SessionError::MessageTooLong { len, max: self.config.max_message_len });
        }

        let payload = DataPayload::Text { message: text.to_string() }.encode()?;
        self.append(Origin::Local, MessagePayload::Text(text.to_string()));
        Ok(vec![OrchestratorAction::SendData(payload)])
    }

    /// Send a file. Images are logged as local image messages.
    pub fn send_file(&mut self, file: OutgoingFile) -> Step {
        self.require_channels("send a file")?;
        if file.mime_type.starts_with(&self.config.image_mime_prefix) {
            let image = ImageRef {
                file_name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                data: file.data.clone(),
            };
            self.append(Origin::Local, MessagePayload::Image(image));
        }
        Ok(vec![OrchestratorAction::SendFile(file)])
    }

    /// Start a call with audio and video.
    pub fn start_call(&mut self) -> Step {
        if !self.session.is_call_eligible() {
            return Err(self.invalid("start a call"));
        }
        self.acquire_local(MediaSelection::Both)
    }

    /// Acquire local capture for `selection`.
    ///
    /// Allowed when call eligible, or in a call to add or replace tracks.
    pub fn acquire_local(&mut self, selection: MediaSelection) -> Step {
        let in_call = self.session.state() == SessionState::InCall;
        if !(self.session.is_call_eligible() || in_call) {
            return Err(self.invalid("acquire media"));
        }
        if self.acquiring.is_some() {
            return Err(self.invalid("acquire media twice"));
        }
        debug!(%selection, "acquiring local media");
        self.acquiring = Some(selection);
        Ok(vec![OrchestratorAction::AcquireMedia(selection)])
    }

    /// Feed back the result of [`OrchestratorAction::AcquireMedia`].
    ///
    /// A stream arriving after the session moved on is stopped immediately.
    pub fn media_acquired(&mut self, result: Result<LocalStream, EngineError>) -> Step {
        let state = self.session.state();
        let usable = self.session.is_call_eligible() || state == SessionState::InCall;
        let selection = match self.acquiring.take() {
            Some(selection) if usable => selection,
            _ => {
                if let Ok(stream) = result {
                    stream.stop_all();
                }
                return Err(SessionError::StaleEvent { state, event: "media acquisition" });
            },
        };

        let stream = result.map_err(|err| {
            let error = SessionError::MediaAcquisition { kind: selection, cause: err.reason };
            warn!(%error, "media acquisition failed");
            error
        })?;

        let mut actions: Vec<OrchestratorAction> = self
            .media
            .install(stream, selection)?
            .into_iter()
            .map(OrchestratorAction::Media)
            .collect();
        if state == SessionState::Connected {
            let transition = self.session.enter_call()?;
            actions.extend(self.apply(transition));
        }
        Ok(actions)
    }

    /// End the call, releasing local capture. Channels stay open.
    pub fn hang_up(&mut self) -> Step {
        if self.session.state() != SessionState::InCall {
            return Err(self.invalid("hang up"));
        }
        let mut actions = self.release_media();
        self.acquiring = None;
        let transition = self.session.leave_call()?;
        actions.extend(self.apply(transition));
        Ok(actions)
    }

    /// Flip the local audio track.
    pub fn toggle_audio(&mut self) -> Step {
        self.toggle(MediaKind::Audio)
    }

    /// Flip the local video track.
    pub fn toggle_video(&mut self) -> Step {
        self.toggle(MediaKind::Video)
    }

    /// Close the session and return to a fresh `Idle` state.
    pub fn disconnect(&mut self) -> Step {
        let transition = self.session.disconnect()?;
        let actions = self.apply(transition);
        let transition = self.session.reset()?;
        self.apply(transition);
        Ok(actions)
    }

    /// Start sending the counter every configured interval.
    pub fn start_counter(&mut self) -> Result<(), SessionError> {
        self.require_channels("start the counter")?;
        self.counter.start(self.env.now(), self.config.counter_interval);
        debug!(interval = ?self.config.counter_interval, "counter started");
        Ok(())
    }

    /// Stop the counter. Returns whether it was running.
    pub fn stop_counter(&mut self) -> bool {
        self.counter.cancel()
    }

    /// Send the next counter value if the timer is due.
    pub fn on_timer(&mut self) -> Step {
        if !self.counter.fire(self.env.now()) {
            return Ok(vec![]);
        }
        self.local_count += 1;
        let payload = DataPayload::Counter { count: self.local_count }.encode()?;
        self.publish(OrchestratorEvent::CounterChanged {
            local: self.local_count,
            remote: self.remote_count,
        });
        Ok(vec![OrchestratorAction::SendData(payload)])
    }

    /// Apply one normalized engine event.
    ///
    /// Errors are returned and also published to observers.
    pub fn handle_event(&mut self, event: EngineEvent) -> Step {
        let result = self.route(event);
        if let Err(error) = &result {
            self.publish(OrchestratorEvent::Error(error.clone()));
        }
        result
    }

    /// Publish an error raised outside the orchestrator (engine call
    /// failures, rejected raw events).
    pub fn report(&mut self, error: SessionError) {
        self.publish(OrchestratorEvent::Error(error));
    }

    fn route(&mut self, event: EngineEvent) -> Step {
        let state = self.session.state();
        if !state.is_active() {
            debug!(event = event.name(), %state, "stale engine event dropped");
            return Err(SessionError::StaleEvent { state, event: event.name() });
        }

        match event {
            EngineEvent::ConnectivityChanged(level) => self.on_connectivity(level),
            EngineEvent::PeerSecureCode(code) => self.on_peer_code(&code),
            EngineEvent::DataReceived(payload) => self.on_data(payload),
            EngineEvent::FileProgress(progress) => self.on_file(progress),
            EngineEvent::OutgoingProgress { file_name, percentage } => {
                self.publish(OrchestratorEvent::TransferProgress {
                    file_name,
                    percentage,
                    direction: TransferDirection::Outgoing,
                });
                Ok(vec![])
            },
            EngineEvent::MediaStreamReceived { role, stream } => {
                self.on_stream(role, &stream);
                Ok(vec![])
            },
            EngineEvent::TrackMuted { kind } => {
                if self.media.on_remote_muted(kind) {
                    self.publish(OrchestratorEvent::RemoteStreamChanged(None));
                }
                Ok(vec![])
            },
            EngineEvent::Fatal { reason } => {
                self.fail_session(&reason.clone(), SessionError::TransportFatal { reason })
            },
        }
    }

    fn on_connectivity(&mut self, level: Connectivity) -> Step {
        let transition = self.session.on_connectivity(level)?;
        self.publish(OrchestratorEvent::ConnectivityChanged(level));
        let mut actions = self.apply(transition);

        if self.session.state() == SessionState::AwaitingSecureCode
            && let Some(code) = self.peer_code.take()
        {
            actions.extend(self.verify_peer_code(&code)?);
        }
        Ok(actions)
    }

    fn on_peer_code(&mut self, code: &str) -> Step {
        if !self.session.is_secure() {
            return Err(self.invalid("accept a peer secure code"));
        }
        match self.session.state() {
            SessionState::AwaitingSecureCode => self.verify_peer_code(code),
            SessionState::Connecting => {
                self.peer_code = Some(code.trim().to_string());
                Ok(vec![])
            },
            state => {
                debug!(%state, "peer secure code after verification ignored");
                Ok(vec![])
            },
        }
    }

    fn verify_peer_code(&mut self, code: &str) -> Step {
        let Some(handshake) = self.handshake.as_mut() else {
            return Err(self.invalid("verify a secure code"));
        };

        match handshake.verify(code) {
            Verdict::Match => {
                info!("secure code verified");
                let transition = self.session.secure_verified()?;
                Ok(self.apply(transition))
            },
            Verdict::Mismatch => {
                let reason = "secure code mismatch";
                warn!(reason, "secure handshake rejected");
                let transition = self.session.secure_rejected(reason)?;
                let actions = self.apply(transition);
                self.publish(OrchestratorEvent::Error(SessionError::Connection {
                    reason: reason.to_string(),
                }));
                Ok(actions)
            },
            Verdict::AlreadyConcluded(state) => {
                debug!(?state, "secure handshake already concluded");
                Ok(vec![])
            },
        }
    }

    fn on_data(&mut self, payload: DataPayload) -> Step {
        self.require_channels("accept data")?;
        match payload {
            DataPayload::Text { message } => {
                self.append(Origin::Remote, MessagePayload::Text(message));
            },
            DataPayload::Counter { count } => {
                self.remote_count = count;
                self.publish(OrchestratorEvent::CounterChanged {
                    local: self.local_count,
                    remote: self.remote_count,
                });
            },
        }
        Ok(vec![])
    }

    fn on_file(&mut self, progress: FileProgress) -> Step {
        self.require_channels("accept a file")?;
        let now_ms = self.env.now().saturating_duration_since(self.epoch).as_millis() as u64;

        match self.transfers.on_progress(progress, now_ms)? {
            TransferOutcome::Progress { id, percentage } => {
                self.publish(OrchestratorEvent::TransferProgress {
                    file_name: id.file_name,
                    percentage,
                    direction: TransferDirection::Incoming,
                });
            },
            TransferOutcome::Image { id, image } => {
                debug!(file_name = %id.file_name, started_at_ms = id.started_at_ms, "image received");
                self.append(Origin::Remote, MessagePayload::Image(image));
            },
            TransferOutcome::Discarded { id, mime_type } => {
                self.publish(OrchestratorEvent::FileReceived { file_name: id.file_name, mime_type });
            },
            TransferOutcome::Duplicate { file_name } => {
                debug!(%file_name, "repeated completion produced no message");
                self.publish(OrchestratorEvent::DuplicateFile { file_name });
            },
        }
        Ok(vec![])
    }

    fn on_stream(&mut self, role: StreamRole, stream: &Arc<RemoteStream>) {
        match role {
            StreamRole::Remote => {
                self.media.attach_remote(stream);
                self.publish(OrchestratorEvent::RemoteStreamChanged(Some(stream.id)));
            },
            StreamRole::Host => {
                debug!(stream = stream.id.0, "host stream echoed");
                self.host_stream = Some(stream.id);
                self.publish(OrchestratorEvent::HostStream(stream.id));
            },
        }
    }

    fn toggle(&mut self, kind: MediaKind) -> Step {
        let (enabled, action) = self.media.toggle(kind)?;
        self.publish(OrchestratorEvent::TrackToggled { kind, enabled });
        Ok(vec![OrchestratorAction::Media(action)])
    }

    /// Close a connection attempt the engine refused and return to `Idle`.
    fn refuse_connection(&mut self, reason: String) -> Step {
        let state = self.session.state();
        if !matches!(state, SessionState::Connecting | SessionState::AwaitingSecureCode) {
            return Err(SessionError::StaleEvent { state, event: "connection result" });
        }
        let error = SessionError::Connection { reason };
        warn!(%error, "connection refused");
        let transition = self.session.disconnect()?;
        let actions = self.apply(transition);
        let transition = self.session.reset()?;
        self.apply(transition);
        self.publish(OrchestratorEvent::Error(error));
        Ok(actions)
    }

    /// Release tracks the engine never took; a call left without local
    /// media falls back to `Connected`.
    fn abandon_stream(&mut self, stream: StreamId) -> Step {
        let mut actions: Vec<OrchestratorAction> =
            self.media.release_stream(stream).into_iter().map(OrchestratorAction::Media).collect();
        if self.session.state() == SessionState::InCall && !self.media.has_local() {
            let transition = self.session.leave_call()?;
            actions.extend(self.apply(transition));
        }
        Ok(actions)
    }

    fn fail_session(&mut self, reason: &str, error: SessionError) -> Step {
        let transition = self.session.fail(reason)?;
        warn!(%error, "session failed");
        let actions = self.apply(transition);
        self.publish(OrchestratorEvent::Error(error));
        Ok(actions)
    }

    /// Execute session actions locally and translate the rest.
    ///
    /// The engine connection is closed after local tracks are removed.
    fn apply(&mut self, transition: Vec<SessionAction>) -> Vec<OrchestratorAction> {
        let mut actions = Vec::new();
        let mut close = false;
        for action in transition {
            match action {
                SessionAction::StateChanged { from, to } => {
                    self.publish(OrchestratorEvent::StateChanged { from, to });
                },
                SessionAction::CloseTransport => close = true,
                SessionAction::Cleanup => actions.extend(self.cleanup()),
            }
        }
        if close {
            actions.push(OrchestratorAction::CloseConnection);
        }
        actions
    }

    fn cleanup(&mut self) -> Vec<OrchestratorAction> {
        let actions = self.release_media();
        self.media.clear_remote();
        self.log.reset();
        let aborted = self.transfers.abort_all();
        self.handshake = None;
        self.peer_code = None;
        self.acquiring = None;
        self.host_stream = None;
        self.counter.cancel();
        self.local_count = 0;
        self.remote_count = 0;
        debug!(aborted, released = actions.len(), "session resources released");
        actions
    }

    fn release_media(&mut self) -> Vec<OrchestratorAction> {
        self.media.release_all().into_iter().map(OrchestratorAction::Media).collect()
    }

    fn append(&mut self, origin: Origin, payload: MessagePayload) {
        let message = self.log.append(origin, payload).clone();
        self.publish(OrchestratorEvent::MessageAppended(message));
    }

    fn publish(&mut self, event: OrchestratorEvent) {
        self.subscribers.publish(&event);
    }

    fn require_channels(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.session.state().has_channels() {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState { state: self.session.state(), operation }
    }
}
