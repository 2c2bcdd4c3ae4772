//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::time::Duration;

use peerlink_app::OrchestratorConfig;
use peerlink_core::{
    SessionError, event::RawEngineEvent, message::DataPayload, transport::OutgoingFile,
};

use crate::scenario::{OracleFn, World};

/// One scripted step.
#[derive(Debug, Clone)]
pub enum ScenarioStep {
    /// User logs in.
    Login {
        /// Local identifier.
        local_id: String,
        /// Peer identifier.
        peer_id: String,
        /// Secure code to use as the local code.
        secure_code: Option<String>,
    },
    /// User submits the peer's code.
    SubmitCode(String),
    /// User submits the code the peer was shown (the local code, read back).
    SubmitMatchingCode,
    /// User sends a text message.
    SendMessage(String),
    /// User sends a file.
    SendFile(OutgoingFile),
    /// User starts a call.
    StartCall,
    /// User hangs up.
    HangUp,
    /// User toggles audio.
    ToggleAudio,
    /// User toggles video.
    ToggleVideo,
    /// User disconnects.
    Disconnect,
    /// User starts the peer counter.
    StartCounter,
    /// Capture devices deny the next requests.
    DenyMedia(String),
    /// Engine refuses the next connection.
    RefuseConnection(String),
    /// The engine delivers an event; all queued events are then processed.
    Engine(RawEngineEvent),
    /// Virtual time passes.
    Advance(Duration),
}

/// Scenario builder.
///
/// Construct a scenario by adding steps. Must call `.oracle()` to get a
/// [`RunnableScenario`] that can be executed.
pub struct Scenario {
    name: String,
    config: OrchestratorConfig,
    seed: u64,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: OrchestratorConfig::default(),
            seed: 0,
            steps: Vec::new(),
        }
    }

    /// Use `config` for the orchestrator.
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run in secure mode.
    pub fn secure(mut self) -> Self {
        self.config.secure_mode = true;
        self
    }

    /// Seed for the simulated RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Append an arbitrary step.
    pub fn step(mut self, step: ScenarioStep) -> Self {
        self.steps.push(step);
        self
    }

    /// User logs in as `local_id` and connects to `peer_id`.
    pub fn login(self, local_id: &str, peer_id: &str) -> Self {
        self.step(ScenarioStep::Login {
            local_id: local_id.to_string(),
            peer_id: peer_id.to_string(),
            secure_code: None,
        })
    }

    /// Engine reports a connectivity level.
    pub fn connectivity(self, level: &str) -> Self {
        self.step(ScenarioStep::Engine(RawEngineEvent::CommunicationState(level.to_string())))
    }

    /// User types in the correct peer code.
    pub fn submit_matching_code(self) -> Self {
        self.step(ScenarioStep::SubmitMatchingCode)
    }

    /// User types in `code` as the peer code.
    pub fn submit_code(self, code: &str) -> Self {
        self.step(ScenarioStep::SubmitCode(code.to_string()))
    }

    /// User sends `text`.
    pub fn send_message(self, text: &str) -> Self {
        self.step(ScenarioStep::SendMessage(text.to_string()))
    }

    /// Peer sends `text`.
    pub fn peer_message(self, text: &str) -> Self {
        match (DataPayload::Text { message: text.to_string() }).encode() {
            Ok(bytes) => self.step(ScenarioStep::Engine(RawEngineEvent::Data(bytes))),
            Err(_) => self,
        }
    }

    /// Engine reports incoming file progress. `file` is attached as
    /// (content type, bytes).
    pub fn file_progress(self, name: &str, percentage: f64, file: Option<(&str, &[u8])>) -> Self {
        self.step(ScenarioStep::Engine(RawEngineEvent::File {
            file_name: Some(name.to_string()),
            percentage,
            file: file.map(|(mime, data)| (mime.to_string(), bytes::Bytes::copy_from_slice(data))),
        }))
    }

    /// User starts a call.
    pub fn start_call(self) -> Self {
        self.step(ScenarioStep::StartCall)
    }

    /// User hangs up.
    pub fn hang_up(self) -> Self {
        self.step(ScenarioStep::HangUp)
    }

    /// User toggles audio.
    pub fn toggle_audio(self) -> Self {
        self.step(ScenarioStep::ToggleAudio)
    }

    /// User toggles video.
    pub fn toggle_video(self) -> Self {
        self.step(ScenarioStep::ToggleVideo)
    }

    /// User disconnects.
    pub fn disconnect(self) -> Self {
        self.step(ScenarioStep::Disconnect)
    }

    /// Virtual time passes.
    pub fn advance(self, duration: Duration) -> Self {
        self.step(ScenarioStep::Advance(duration))
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Every step runs regardless of earlier failures; outcomes are recorded
    /// in the [`World`] for the oracle to inspect.
    pub async fn run(self) -> Result<(), String> {
        let Scenario { name, config, seed, steps } = self.scenario;
        let mut world = World::new(config, seed);

        for step in steps {
            let label = format!("{step:?}");
            let result = execute(&mut world, step).await;
            world.record(label, result);
        }

        (self.oracle)(&world).map_err(|reason| format!("Scenario '{name}': {reason}"))
    }
}

async fn execute(world: &mut World, step: ScenarioStep) -> Result<(), SessionError> {
    match step {
        ScenarioStep::Login { local_id, peer_id, secure_code } => {
            world.runtime_mut().login(&local_id, &peer_id, secure_code).await
        },
        ScenarioStep::SubmitCode(code) => world.runtime_mut().submit_secure_code(&code).await,
        ScenarioStep::SubmitMatchingCode => {
            let code = world.orchestrator().secure_code().unwrap_or_default().to_string();
            world.runtime_mut().submit_secure_code(&code).await
        },
        ScenarioStep::SendMessage(text) => world.runtime_mut().send_message(&text).await,
        ScenarioStep::SendFile(file) => world.runtime_mut().send_file(file).await,
        ScenarioStep::StartCall => world.runtime_mut().start_call().await,
        ScenarioStep::HangUp => world.runtime_mut().hang_up().await,
        ScenarioStep::ToggleAudio => world.runtime_mut().toggle_audio().await,
        ScenarioStep::ToggleVideo => world.runtime_mut().toggle_video().await,
        ScenarioStep::Disconnect => world.runtime_mut().disconnect().await,
        ScenarioStep::StartCounter => world.runtime_mut().start_counter(),
        ScenarioStep::DenyMedia(cause) => {
            world.devices().deny(cause);
            Ok(())
        },
        ScenarioStep::RefuseConnection(reason) => {
            world.engine().refuse_connection(reason);
            Ok(())
        },
        ScenarioStep::Engine(event) => {
            world.engine().emit(event);
            world.settle().await
        },
        ScenarioStep::Advance(duration) => world.advance(duration).await,
    }
}
