//! Reference model for model-based testing.
//!
//! A deliberately naive re-statement of the orchestrator's observable
//! behaviour: plain collections, no actions, no engine. Property tests run
//! the same random operation sequence against the model and the real
//! orchestrator and require identical results and observable state.

use std::collections::{BTreeMap, BTreeSet};

use peerlink_core::{
    SessionError,
    error::ErrorProperties,
    media::MediaKind,
    message::{MessageKind, Origin},
    session::{Connectivity, SessionState},
};

/// Compact text generator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmallText {
    /// Letter selector.
    pub seed: u8,
    /// Length class: empty, short, medium, over the limit.
    pub size_class: u8,
}

impl SmallText {
    /// Longest text the model accepts.
    pub const LIMIT: usize = 200;

    /// Render the text.
    pub fn render(&self) -> String {
        let letter = char::from(b'a' + self.seed % 26);
        let len = match self.size_class % 4 {
            0 => 0,
            1 => 5,
            2 => 50,
            _ => Self::LIMIT + 1,
        };
        std::iter::repeat_n(letter, len).collect()
    }
}

/// Files the model knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelFile {
    /// `photo.png`, an image.
    Photo,
    /// `cat.jpg`, an image.
    Cat,
    /// `notes.pdf`, not an image.
    Notes,
}

impl ModelFile {
    /// File name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Photo => "photo.png",
            Self::Cat => "cat.jpg",
            Self::Notes => "notes.pdf",
        }
    }

    /// Content type.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Photo => "image/png",
            Self::Cat => "image/jpeg",
            Self::Notes => "application/pdf",
        }
    }

    /// Completion yields an image message.
    pub fn is_image(self) -> bool {
        !matches!(self, Self::Notes)
    }
}

/// Operations applied to both worlds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// User logs in.
    Login,
    /// Engine reports a connectivity level.
    Connectivity(Connectivity),
    /// User submits the peer's code.
    SubmitCode {
        /// Code equals the local code.
        matching: bool,
    },
    /// Engine delivers the peer's code.
    PeerCode {
        /// Code equals the local code.
        matching: bool,
    },
    /// User sends a message.
    SendMessage(SmallText),
    /// Peer sends a message.
    ReceiveMessage(SmallText),
    /// Engine reports incoming file progress; 100 carries the artifact.
    FileProgress {
        /// Which file.
        file: ModelFile,
        /// Completion, 0 to 100.
        percentage: u8,
    },
    /// User starts a call; capture is granted or denied.
    StartCall {
        /// Capture devices grant the request.
        granted: bool,
    },
    /// User hangs up.
    HangUp,
    /// User toggles a track.
    Toggle(MediaKind),
    /// User disconnects.
    Disconnect,
    /// Engine reports an unrecoverable error.
    Fatal,
}

/// Error classes compared between model and real world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Not permitted in the current state.
    InvalidState,
    /// Event arrived for a session that is gone.
    Stale,
    /// Message or identifier rejected.
    InvalidInput,
    /// Non-monotonic or malformed transfer.
    TransferProtocol,
    /// No local track of that kind.
    NoTrack,
    /// Capture denied.
    MediaDenied,
    /// Login or handshake failure.
    Connection,
    /// Unrecoverable engine failure.
    Fatal,
    /// Engine rejected one call.
    Engine,
    /// Payload or raw event could not be decoded.
    Malformed,
}

impl OperationError {
    /// Classify a real error.
    pub fn from_session(error: &SessionError) -> Self {
        match error {
            SessionError::InvalidState { .. } => Self::InvalidState,
            SessionError::StaleEvent { .. } => Self::Stale,
            SessionError::EmptyMessage
            | SessionError::MessageTooLong { .. }
            | SessionError::InvalidIdentifier { .. } => Self::InvalidInput,
            SessionError::TransferProtocol { .. } => Self::TransferProtocol,
            SessionError::NoTrack { .. } => Self::NoTrack,
            SessionError::MediaAcquisition { .. } => Self::MediaDenied,
            SessionError::Connection { .. } => Self::Connection,
            SessionError::TransportFatal { .. } => Self::Fatal,
            SessionError::Engine { .. } => Self::Engine,
            SessionError::Payload(_) | SessionError::MalformedEvent { .. } => Self::Malformed,
        }
    }

    /// Propagation properties, matching [`SessionError::properties`].
    pub fn properties(self) -> ErrorProperties {
        match self {
            Self::Connection | Self::Fatal => {
                ErrorProperties { is_fatal: true, is_retryable: false }
            },
            Self::MediaDenied | Self::Engine => {
                ErrorProperties { is_fatal: false, is_retryable: true }
            },
            Self::InvalidState
            | Self::Stale
            | Self::InvalidInput
            | Self::TransferProtocol
            | Self::NoTrack
            | Self::Malformed => ErrorProperties { is_fatal: false, is_retryable: false },
        }
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Accepted.
    Ok,
    /// Rejected.
    Error(OperationError),
}

impl OperationResult {
    /// Accepted.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Rejected.
    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }
}

impl From<Result<(), OperationError>> for OperationResult {
    fn from(result: Result<(), OperationError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(error) => Self::Error(error),
        }
    }
}

/// State compared between model and real world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Session state.
    pub state: SessionState,
    /// Message log as (origin, kind) pairs.
    pub log: Vec<(Origin, MessageKind)>,
    /// Transfers in flight.
    pub pending_transfers: usize,
    /// Local tracks and their `enabled` flags, ordered by kind.
    pub tracks: Vec<(MediaKind, bool)>,
}

/// Reference model of one orchestrator.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    secure: bool,
    state: SessionState,
    connectivity: Connectivity,
    buffered_code: Option<bool>,
    log: Vec<(Origin, MessageKind)>,
    transfers: BTreeMap<ModelFile, u8>,
    completed: BTreeSet<ModelFile>,
    tracks: BTreeMap<MediaKind, bool>,
}

impl ModelWorld {
    /// Model of an idle orchestrator.
    pub fn new(secure: bool) -> Self {
        Self {
            secure,
            state: SessionState::Idle,
            connectivity: Connectivity::None,
            buffered_code: None,
            log: Vec::new(),
            transfers: BTreeMap::new(),
            completed: BTreeSet::new(),
            tracks: BTreeMap::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Observable state.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            state: self.state,
            log: self.log.clone(),
            pending_transfers: self.transfers.len(),
            tracks: self.tracks.iter().map(|(kind, enabled)| (*kind, *enabled)).collect(),
        }
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match op {
            Operation::Login => {
                self.login();
                Ok(())
            },
            Operation::Connectivity(level) => self.on_connectivity(*level),
            Operation::SubmitCode { matching } => self.submit_code(*matching),
            Operation::PeerCode { matching } => self.peer_code(*matching),
            Operation::SendMessage(text) => self.send_message(text),
            Operation::ReceiveMessage(_) => self.receive(),
            Operation::FileProgress { file, percentage } => self.file(*file, *percentage),
            Operation::StartCall { granted } => self.start_call(*granted),
            Operation::HangUp => self.hang_up(),
            Operation::Toggle(kind) => match self.tracks.get_mut(kind) {
                Some(enabled) => {
                    *enabled = !*enabled;
                    Ok(())
                },
                None => Err(OperationError::NoTrack),
            },
            Operation::Disconnect => self.disconnect(),
            Operation::Fatal => self.require_active().map(|()| self.terminate(SessionState::Failed)),
        };
        result.into()
    }

    fn login(&mut self) {
        if self.state.is_active() {
            self.terminate(SessionState::Closed);
        }
        self.state = SessionState::Connecting;
        self.connectivity = Connectivity::None;
    }

    fn on_connectivity(&mut self, level: Connectivity) -> Result<(), OperationError> {
        self.require_active()?;
        self.connectivity = level;
        match (self.state, level) {
            (SessionState::Connecting, Connectivity::Weak | Connectivity::Full) => {
                if self.secure {
                    self.state = SessionState::AwaitingSecureCode;
                    if let Some(matching) = self.buffered_code.take() {
                        self.verify(matching);
                    }
                } else {
                    self.state = SessionState::Connected;
                }
            },
            (SessionState::Connecting, _) => {},
            (_, Connectivity::None) => self.terminate(SessionState::Closed),
            _ => {},
        }
        Ok(())
    }

    fn submit_code(&mut self, matching: bool) -> Result<(), OperationError> {
        match self.state {
            SessionState::Connecting if self.secure => {
                self.buffered_code = Some(matching);
                Ok(())
            },
            SessionState::AwaitingSecureCode => {
                self.verify(matching);
                Ok(())
            },
            _ => Err(OperationError::InvalidState),
        }
    }

    fn peer_code(&mut self, matching: bool) -> Result<(), OperationError> {
        self.require_active()?;
        if !self.secure {
            return Err(OperationError::InvalidState);
        }
        match self.state {
            SessionState::Connecting => self.buffered_code = Some(matching),
            SessionState::AwaitingSecureCode => self.verify(matching),
            _ => {},
        }
        Ok(())
    }

    fn verify(&mut self, matching: bool) {
        if matching {
            self.state = SessionState::Connected;
        } else {
            self.terminate(SessionState::Failed);
        }
    }

    fn send_message(&mut self, text: &SmallText) -> Result<(), OperationError> {
        self.require_channels()?;
        let len = text.render().chars().count();
        if len == 0 || len > SmallText::LIMIT {
            return Err(OperationError::InvalidInput);
        }
        self.log.push((Origin::Local, MessageKind::Text));
        Ok(())
    }

    fn receive(&mut self) -> Result<(), OperationError> {
        self.require_active()?;
        self.require_channels()?;
        self.log.push((Origin::Remote, MessageKind::Text));
        Ok(())
    }

    fn file(&mut self, file: ModelFile, percentage: u8) -> Result<(), OperationError> {
        self.require_active()?;
        self.require_channels()?;

        match self.transfers.get(&file).copied() {
            Some(previous) if percentage < previous => {
                self.transfers.remove(&file);
                return Err(OperationError::TransferProtocol);
            },
            Some(_) => {},
            None if percentage == 100 && self.completed.contains(&file) => return Ok(()),
            None => {
                self.completed.remove(&file);
            },
        }

        if percentage == 100 {
            self.transfers.remove(&file);
            self.completed.insert(file);
            if file.is_image() {
                self.log.push((Origin::Remote, MessageKind::Image));
            }
        } else {
            self.transfers.insert(file, percentage);
        }
        Ok(())
    }

    fn start_call(&mut self, granted: bool) -> Result<(), OperationError> {
        if self.state != SessionState::Connected || self.connectivity != Connectivity::Full {
            return Err(OperationError::InvalidState);
        }
        if !granted {
            return Err(OperationError::MediaDenied);
        }
        self.tracks.insert(MediaKind::Audio, true);
        self.tracks.insert(MediaKind::Video, true);
        self.state = SessionState::InCall;
        Ok(())
    }

    fn hang_up(&mut self) -> Result<(), OperationError> {
        if self.state != SessionState::InCall {
            return Err(OperationError::InvalidState);
        }
        self.tracks.clear();
        self.state = SessionState::Connected;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), OperationError> {
        if !self.state.is_active() {
            return Err(OperationError::InvalidState);
        }
        self.terminate(SessionState::Closed);
        self.state = SessionState::Idle;
        Ok(())
    }

    fn terminate(&mut self, to: SessionState) {
        self.state = to;
        self.connectivity = Connectivity::None;
        self.buffered_code = None;
        self.log.clear();
        self.transfers.clear();
        self.completed.clear();
        self.tracks.clear();
    }

    fn require_active(&self) -> Result<(), OperationError> {
        if self.state.is_active() { Ok(()) } else { Err(OperationError::Stale) }
    }

    fn require_channels(&self) -> Result<(), OperationError> {
        if self.state.has_channels() { Ok(()) } else { Err(OperationError::InvalidState) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_classes() {
        assert_eq!(SmallText { seed: 0, size_class: 0 }.render(), "");
        assert_eq!(SmallText { seed: 1, size_class: 1 }.render(), "bbbbb");
        assert_eq!(SmallText { seed: 2, size_class: 3 }.render().len(), 201);
    }

    #[test]
    fn secure_flow() {
        let mut model = ModelWorld::new(true);
        assert!(model.apply(&Operation::Login).is_ok());
        assert!(model.apply(&Operation::Connectivity(Connectivity::Weak)).is_ok());
        assert_eq!(model.state(), SessionState::AwaitingSecureCode);
        assert!(model.apply(&Operation::SubmitCode { matching: true }).is_ok());
        assert_eq!(model.state(), SessionState::Connected);
    }

    #[test]
    fn stale_after_close() {
        let mut model = ModelWorld::new(false);
        model.apply(&Operation::Login);
        model.apply(&Operation::Connectivity(Connectivity::Weak));
        model.apply(&Operation::Connectivity(Connectivity::None));
        assert_eq!(model.state(), SessionState::Closed);
        assert_eq!(
            model.apply(&Operation::ReceiveMessage(SmallText { seed: 0, size_class: 1 })),
            OperationResult::Error(OperationError::Stale)
        );
    }
}
