//! Connection lifecycle state machine.
//!
//! Owns the session state and is the only component allowed to change it.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods take the triggering input (login, connectivity level, handshake
//!   verdict) and return `Result<Vec<SessionAction>, SessionError>`
//! - The orchestrator executes the actions (publish the change, tear down the
//!   engine connection, run cleanup)
//! - Nothing here touches the engine, the clock, or other components
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ login ┌────────────┐ weak/full ┌───────────┐  call   ┌────────┐
//! │ Idle │──────>│ Connecting │──────────>│ Connected │────────>│ InCall │
//! └──────┘       └────────────┘           └───────────┘<────────└────────┘
//!                      │ weak/full (secure)     ↑         hang up
//!                      ↓                        │ verified
//!              ┌────────────────────┐           │
//!              │ AwaitingSecureCode │───────────┘
//!              └────────────────────┘
//!                      │ mismatch                    none / disconnect
//!                      ↓                                    ↓
//!                 ┌────────┐                           ┌────────┐
//!                 │ Failed │                           │ Closed │
//!                 └────────┘                           └────────┘
//! ```
//!
//! `Closed` and `Failed` are terminal. The only way out is [`Session::reset`],
//! which yields a session indistinguishable from [`Session::new`].

use std::fmt;

use tracing::{debug, info};

use crate::error::SessionError;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No connection attempted.
    #[default]
    Idle,
    /// Login submitted, waiting for the engine to report connectivity.
    Connecting,
    /// Engine connected in secure mode, waiting for code verification.
    AwaitingSecureCode,
    /// Data and file channels usable.
    Connected,
    /// Local media is being transmitted.
    InCall,
    /// Session ended by either side.
    Closed,
    /// Session ended by an unrecoverable error.
    Failed,
}

impl SessionState {
    /// `Closed` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// A connection attempt or established connection exists.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::AwaitingSecureCode | Self::Connected | Self::InCall)
    }

    /// Data and file channels may be used.
    pub fn has_channels(self) -> bool {
        matches!(self, Self::Connected | Self::InCall)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingSecureCode => "awaiting secure code",
            Self::Connected => "connected",
            Self::InCall => "in call",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Connectivity level reported by the transport engine.
///
/// Ordered: `None < Connecting < Weak < Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Connectivity {
    /// No connection.
    #[default]
    None,
    /// Negotiation in progress.
    Connecting,
    /// Data channel up, media not yet possible.
    Weak,
    /// Fully connected, media possible.
    Full,
}

impl Connectivity {
    /// Parse the engine's level name.
    pub fn parse(level: &str) -> Option<Self> {
        match level {
            "none" => Some(Self::None),
            "connecting" => Some(Self::Connecting),
            "weak" => Some(Self::Weak),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    /// Data channel is usable at this level.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Weak | Self::Full)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Connecting => "connecting",
            Self::Weak => "weak",
            Self::Full => "full",
        };
        f.write_str(name)
    }
}

/// Validated peer identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Validate `value` as an identifier of at most `max_len` characters.
    pub fn parse(value: &str, max_len: usize) -> Result<Self, SessionError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SessionError::InvalidIdentifier {
                value: value.to_string(),
                reason: "identifier is required",
            });
        }
        if trimmed.chars().count() > max_len {
            return Err(SessionError::InvalidIdentifier {
                value: value.to_string(),
                reason: "identifier is too long",
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Actions returned by the session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// State changed; publish to observers.
    StateChanged {
        /// Previous state.
        from: SessionState,
        /// New state.
        to: SessionState,
    },

    /// Tear down the engine connection.
    CloseTransport,

    /// Release media, clear the message log, and discard transfers.
    Cleanup,
}

/// Session lifecycle state machine.
///
/// A freshly constructed session and a reset session compare equal, which is
/// what "structurally identical to a fresh Idle session" means in tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    state: SessionState,
    local_id: Option<PeerId>,
    peer_id: Option<PeerId>,
    secure: bool,
    secure_code: Option<String>,
    connectivity: Connectivity,
    failure: Option<String>,
}

impl Session {
    /// Create a session in `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Local identifier, set at login.
    pub fn local_id(&self) -> Option<&PeerId> {
        self.local_id.as_ref()
    }

    /// Peer identifier, set at login.
    pub fn peer_id(&self) -> Option<&PeerId> {
        self.peer_id.as_ref()
    }

    /// Secure mode was requested at login.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Local secure code, present only in secure mode.
    pub fn secure_code(&self) -> Option<&str> {
        self.secure_code.as_deref()
    }

    /// Last connectivity level reported by the engine.
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Reason for entering `Failed`.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Media can be started: connected at `Full` connectivity.
    pub fn is_call_eligible(&self) -> bool {
        self.state == SessionState::Connected && self.connectivity == Connectivity::Full
    }

    /// Start connecting (Idle → Connecting).
    ///
    /// # Errors
    /// Returns `InvalidState` unless the session is `Idle`.
    pub fn login(
        &mut self,
        local_id: PeerId,
        peer_id: PeerId,
        secure: bool,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("log in"));
        }

        info!(local = %local_id, peer = %peer_id, secure, "login");
        self.local_id = Some(local_id);
        self.peer_id = Some(peer_id);
        self.secure = secure;
        Ok(vec![self.transition(SessionState::Connecting)])
    }

    /// Record the local secure code (generated locally or by the engine).
    ///
    /// # Errors
    /// Returns `InvalidState` if secure mode is off or the handshake is over.
    pub fn set_secure_code(&mut self, code: String) -> Result<(), SessionError> {
        let awaiting =
            matches!(self.state, SessionState::Connecting | SessionState::AwaitingSecureCode);
        if !self.secure || !awaiting {
            return Err(self.invalid("set secure code"));
        }
        self.secure_code = Some(code);
        Ok(())
    }

    /// Apply a connectivity change reported by the engine.
    ///
    /// # Errors
    /// Returns `StaleEvent` when no connection is active.
    pub fn on_connectivity(
        &mut self,
        level: Connectivity,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if !self.state.is_active() {
            return Err(SessionError::StaleEvent { state: self.state, event: "connectivity" });
        }

        let previous = self.connectivity;
        self.connectivity = level;
        debug!(%previous, %level, state = %self.state, "connectivity changed");

        match (self.state, level) {
            // The engine reports `none` before negotiation starts.
            (SessionState::Connecting, Connectivity::None | Connectivity::Connecting) => {
                Ok(vec![])
            },
            (SessionState::Connecting, Connectivity::Weak | Connectivity::Full) => {
                let next = if self.secure {
                    SessionState::AwaitingSecureCode
                } else {
                    SessionState::Connected
                };
                Ok(vec![self.transition(next)])
            },
            (
                SessionState::AwaitingSecureCode | SessionState::Connected | SessionState::InCall,
                Connectivity::None,
            ) => Ok(self.terminate(SessionState::Closed, None, false)),
            _ => Ok(vec![]),
        }
    }

    /// Secure code matched (AwaitingSecureCode → Connected).
    ///
    /// # Errors
    /// Returns `InvalidState` unless awaiting a secure code.
    pub fn secure_verified(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::AwaitingSecureCode {
            return Err(self.invalid("verify secure code"));
        }
        Ok(vec![self.transition(SessionState::Connected)])
    }

    /// Secure code mismatch or rejection (→ Failed, engine torn down).
    ///
    /// # Errors
    /// Returns `InvalidState` unless a handshake can still be pending.
    pub fn secure_rejected(&mut self, reason: &str) -> Result<Vec<SessionAction>, SessionError> {
        if !matches!(self.state, SessionState::Connecting | SessionState::AwaitingSecureCode) {
            return Err(self.invalid("reject secure code"));
        }
        Ok(self.terminate(SessionState::Failed, Some(reason), true))
    }

    /// Local media started (Connected → InCall).
    ///
    /// # Errors
    /// Returns `InvalidState` unless connected at `Full` connectivity.
    pub fn enter_call(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if !self.is_call_eligible() {
            return Err(self.invalid("start a call"));
        }
        Ok(vec![self.transition(SessionState::InCall)])
    }

    /// Local media stopped (InCall → Connected).
    ///
    /// # Errors
    /// Returns `InvalidState` unless in a call.
    pub fn leave_call(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::InCall {
            return Err(self.invalid("hang up"));
        }
        Ok(vec![self.transition(SessionState::Connected)])
    }

    /// User disconnect (→ Closed, engine torn down).
    ///
    /// # Errors
    /// Returns `InvalidState` when no connection is active.
    pub fn disconnect(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if !self.state.is_active() {
            return Err(self.invalid("disconnect"));
        }
        Ok(self.terminate(SessionState::Closed, None, true))
    }

    /// Unrecoverable error (→ Failed, engine torn down).
    ///
    /// # Errors
    /// Returns `StaleEvent` when no connection is active.
    pub fn fail(&mut self, reason: &str) -> Result<Vec<SessionAction>, SessionError> {
        if !self.state.is_active() {
            return Err(SessionError::StaleEvent { state: self.state, event: "failure" });
        }
        Ok(self.terminate(SessionState::Failed, Some(reason), true))
    }

    /// Return to a fresh `Idle` session.
    ///
    /// # Errors
    /// Returns `InvalidState` while a connection is active.
    pub fn reset(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state.is_active() {
            return Err(self.invalid("reset"));
        }
        let from = self.state;
        *self = Self::new();
        if from == SessionState::Idle {
            return Ok(vec![]);
        }
        Ok(vec![SessionAction::StateChanged { from, to: SessionState::Idle }])
    }

    fn transition(&mut self, to: SessionState) -> SessionAction {
        let from = self.state;
        self.state = to;
        info!(%from, %to, "session state changed");
        SessionAction::StateChanged { from, to }
    }

    fn terminate(
        &mut self,
        to: SessionState,
        reason: Option<&str>,
        close_transport: bool,
    ) -> Vec<SessionAction> {
        let mut actions = vec![self.transition(to)];
        self.failure = reason.map(str::to_string);
        self.secure_code = None;
        self.connectivity = Connectivity::None;
        if close_transport {
            actions.push(SessionAction::CloseTransport);
        }
        actions.push(SessionAction::Cleanup);
        actions
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState { state: self.state, operation }
    }
}
