//! World state for scenario execution.
//!
//! The World owns the runtime under test together with handles on the
//! simulated engine, capture devices and clock, and records what every step
//! returned and every notification observers saw.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use peerlink_app::{
    Orchestrator, OrchestratorConfig, OrchestratorEvent, Runtime, Wakeup, event_channel,
};
use peerlink_core::{SessionError, session::SessionState};

use crate::{
    sim_engine::{EngineCall, SimEngine, SimMediaDevices},
    sim_env::SimEnv,
};

/// Runtime type driven by scenarios.
pub type SimRuntime = Runtime<SimEnv, SimEngine, SimMediaDevices>;

/// Result of one executed scenario step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Step description.
    pub step: String,
    /// What the step returned.
    pub result: Result<(), SessionError>,
}

/// World state containing the runtime under test and its observations.
pub struct World {
    env: SimEnv,
    engine: SimEngine,
    devices: SimMediaDevices,
    runtime: SimRuntime,
    notifications: Arc<Mutex<Vec<OrchestratorEvent>>>,
    outcomes: Vec<StepOutcome>,
}

impl World {
    /// World with a fresh runtime.
    pub fn new(config: OrchestratorConfig, seed: u64) -> Self {
        let env = SimEnv::with_seed(seed);
        let (sink, events) = event_channel();
        let engine = SimEngine::new(sink);
        let devices = SimMediaDevices::new();
        let mut runtime =
            Runtime::new(env.clone(), config, engine.clone(), devices.clone(), events);

        let notifications = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&notifications);
        runtime.orchestrator_mut().subscribe(Box::new(move |event: &OrchestratorEvent| {
            recorder.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
        }));

        Self { env, engine, devices, runtime, notifications, outcomes: Vec::new() }
    }

    /// Runtime under test.
    pub fn runtime(&self) -> &SimRuntime {
        &self.runtime
    }

    /// Mutable runtime under test.
    pub fn runtime_mut(&mut self) -> &mut SimRuntime {
        &mut self.runtime
    }

    /// Orchestrator under test.
    pub fn orchestrator(&self) -> &Orchestrator<SimEnv> {
        self.runtime.orchestrator()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.orchestrator().state()
    }

    /// Handle on the simulated engine.
    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    /// Handle on the simulated capture devices.
    pub fn devices(&self) -> &SimMediaDevices {
        &self.devices
    }

    /// Calls made to the engine so far.
    pub fn engine_calls(&self) -> Vec<EngineCall> {
        self.engine.calls()
    }

    /// Notifications published so far.
    pub fn notifications(&self) -> Vec<OrchestratorEvent> {
        self.notifications.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Session states entered, in order.
    pub fn state_history(&self) -> Vec<SessionState> {
        self.notifications()
            .iter()
            .filter_map(|event| match event {
                OrchestratorEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    /// Errors published to observers.
    pub fn published_errors(&self) -> Vec<SessionError> {
        self.notifications()
            .into_iter()
            .filter_map(|event| match event {
                OrchestratorEvent::Error(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    /// Outcome of every executed step.
    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    /// Outcome of step `index`.
    pub fn outcome(&self, index: usize) -> Option<&Result<(), SessionError>> {
        self.outcomes.get(index).map(|outcome| &outcome.result)
    }

    /// Record a step outcome.
    pub fn record(&mut self, step: String, result: Result<(), SessionError>) {
        self.outcomes.push(StepOutcome { step, result });
    }

    /// Process every queued engine event. Returns the first error raised.
    pub async fn settle(&mut self) -> Result<(), SessionError> {
        let mut errors = self.runtime.drain().await;
        if errors.is_empty() { Ok(()) } else { Err(errors.remove(0)) }
    }

    /// Advance the virtual clock and run the timer if it became due.
    pub async fn advance(&mut self, duration: Duration) -> Result<(), SessionError> {
        self.env.advance(duration);
        self.runtime.dispatch(Wakeup::Timer).await
    }
}
