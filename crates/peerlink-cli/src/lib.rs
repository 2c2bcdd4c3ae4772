//! Line-oriented shell for a peer session
//!
//! A thin frontend over [`peerlink_app::Runtime`]: input lines are parsed
//! into [`Command`]s, executed by [`shell::execute`], and orchestrator
//! notifications are rendered back as text by [`shell::describe`]. The
//! [`loopback`] engine lets the shell run without a real transport.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod env;
pub mod error;
pub mod loopback;
pub mod shell;

pub use commands::Command;
pub use env::SystemEnv;
pub use error::CliError;
pub use loopback::{LoopbackDevices, LoopbackEngine};
pub use peerlink_app::{OrchestratorConfig, OrchestratorEvent, Runtime};
pub use shell::{Flow, describe, execute};
