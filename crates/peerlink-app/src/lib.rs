//! Application layer for Peerlink
//!
//! The session orchestrator and a generic runtime that drives it against a
//! transport engine. The orchestrator is a pure state machine, so the same
//! code runs in production and in deterministic simulation.
//!
//! # Components
//!
//! - [`Orchestrator`]: Session orchestration (the UI-facing operations)
//! - [`Bridge`]: Event bridge (raw engine callbacks to [`peerlink_core::EngineEvent`])
//! - [`Runtime`]: Control loop executing orchestrator actions on the engine
//! - [`SessionRegistry`]: Several orchestrators indexed by slot
//! - [`CounterTimer`]: Cancellable periodic timer owned by a session

mod action;
mod bridge;
mod config;
mod notify;
mod orchestrator;
mod registry;
mod runtime;
mod timer;

pub use action::OrchestratorAction;
pub use bridge::{Bridge, BridgeError};
pub use config::OrchestratorConfig;
pub use notify::{Observer, OrchestratorEvent, Subscribers, SubscriptionId, TransferDirection};
pub use orchestrator::{Orchestrator, OrchestratorSnapshot, Step};
pub use registry::{RegistryError, SessionRegistry};
pub use runtime::{EventSink, Runtime, Wakeup, event_channel};
pub use timer::CounterTimer;
