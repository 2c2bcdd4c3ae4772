//! Deterministic simulation harness for Peerlink session testing.
//!
//! Scripted implementations of the Environment, TransportEngine and
//! MediaDevices traits, a scenario runner with mandatory oracles, and a
//! reference model for model-based testing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scenario;
pub mod sim_engine;
pub mod sim_env;

pub use model::{
    ModelFile, ModelWorld, ObservableState, Operation, OperationError, OperationResult, SmallText,
};
pub use sim_engine::{EngineCall, SimCapture, SimEngine, SimMediaDevices};
pub use sim_env::SimEnv;
