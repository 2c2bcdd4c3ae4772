//! Secure handshake.
//!
//! Optional per-session code verification. The local side owns a short code
//! (supplied at login, generated locally, or handed back by the engine when
//! the connection starts) and the peer's code must match it exactly before
//! the session may enter `Connected`. No cryptography happens here: the
//! engine is responsible for carrying the codes, this module only compares.

use crate::env::Environment;

/// Length of generated codes.
pub const CODE_LEN: usize = 6;

/// Alphabet for generated codes (no 0/O or 1/I look-alikes).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Outcome of the handshake so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the peer's code.
    Pending,
    /// Peer's code matched.
    Verified,
    /// Peer's code did not match.
    Rejected,
}

/// Why a verification attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Codes match.
    Match,
    /// Codes differ.
    Mismatch,
    /// Verification already concluded; the attempt was ignored.
    AlreadyConcluded(HandshakeState),
}

/// Secure handshake for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureHandshake {
    local_code: String,
    state: HandshakeState,
}

impl SecureHandshake {
    /// Start a handshake with `supplied` as the local code, or a freshly
    /// generated one when none was supplied.
    pub fn new<E: Environment>(env: &E, supplied: Option<String>) -> Self {
        let local_code = supplied
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| generate_code(env));
        Self { local_code, state: HandshakeState::Pending }
    }

    /// Local code to share with the peer out of band.
    pub fn local_code(&self) -> &str {
        &self.local_code
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Replace the local code with the one the engine handed back.
    ///
    /// Ignored once verification has concluded.
    pub fn adopt_engine_code(&mut self, code: String) {
        if self.state == HandshakeState::Pending && !code.trim().is_empty() {
            self.local_code = code.trim().to_string();
        }
    }

    /// Compare the peer's code against the local one (exact equality).
    pub fn verify(&mut self, peer_code: &str) -> Verdict {
        if self.state != HandshakeState::Pending {
            return Verdict::AlreadyConcluded(self.state);
        }
        if peer_code.trim() == self.local_code {
            self.state = HandshakeState::Verified;
            Verdict::Match
        } else {
            self.state = HandshakeState::Rejected;
            Verdict::Mismatch
        }
    }
}

/// Generate a [`CODE_LEN`]-character code from the environment's RNG.
pub fn generate_code<E: Environment>(env: &E) -> String {
    let mut bytes = [0u8; CODE_LEN];
    env.random_bytes(&mut bytes);
    bytes.iter().map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char).collect()
}
