//! Peerlink session core logic
//!
//! Pure state machine logic for orchestrating a peer session on top of an
//! external real-time transport engine, completely decoupled from I/O.
//!
//! # Architecture
//!
//! Every component in this crate is a deterministic state machine isolated
//! from I/O, time, randomness, and scheduling. Time and randomness are
//! supplied by the caller through [`env::Environment`]; engine effects are
//! described by returned actions rather than executed directly.
//!
//! A runtime (see `peerlink-app`) interprets those actions against a
//! [`transport::TransportEngine`]. Tests drive the same state machines with a
//! scripted engine and virtual time.
//!
//! # Components
//!
//! - [`session`]: Connection lifecycle state machine
//! - [`handshake`]: Optional secure-code verification
//! - [`message`]: Ordered, append-only message log
//! - [`transfer`]: File transfer reassembly
//! - [`media`]: Local and remote media track ownership
//! - [`event`]: Raw and normalized engine events
//! - [`mod@env`]: Environment abstraction (time, RNG)
//! - [`transport`]: Transport engine and capture device seams
//! - [`error`]: Session error taxonomy

pub mod env;
pub mod error;
pub mod event;
pub mod handshake;
pub mod media;
pub mod message;
pub mod session;
pub mod transfer;
pub mod transport;

pub use error::{ErrorProperties, SessionError};
pub use event::{EngineEvent, RawEngineEvent};
pub use session::{Connectivity, PeerId, Session, SessionAction, SessionState};
