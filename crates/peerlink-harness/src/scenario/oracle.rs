//! Oracle functions and reusable checks.

use peerlink_app::{Orchestrator, OrchestratorConfig};
use peerlink_core::session::SessionState;

use crate::{scenario::World, sim_env::SimEnv};

/// Verification run over the final [`World`].
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;

/// The session ended in `expected`.
pub fn expect_state(world: &World, expected: SessionState) -> Result<(), String> {
    match world.state() {
        state if state == expected => Ok(()),
        state => Err(format!("expected session {expected}, found {state}")),
    }
}

/// Step `index` succeeded.
pub fn expect_step_ok(world: &World, index: usize) -> Result<(), String> {
    match world.outcomes().get(index) {
        Some(outcome) if outcome.result.is_ok() => Ok(()),
        Some(outcome) => Err(format!("step {index} ({}) failed: {:?}", outcome.step, outcome.result)),
        None => Err(format!("step {index} was never executed")),
    }
}

/// The orchestrator is indistinguishable from a fresh one with `config`.
pub fn expect_fresh_idle(world: &World, config: OrchestratorConfig) -> Result<(), String> {
    let fresh = Orchestrator::new(SimEnv::default(), config).snapshot();
    let actual = world.orchestrator().snapshot();
    if actual == fresh {
        Ok(())
    } else {
        Err(format!("state differs from a fresh session: {actual:?}"))
    }
}

/// No capture hardware is left running.
pub fn expect_no_live_capture(world: &World) -> Result<(), String> {
    match world.devices().live_tracks() {
        0 => Ok(()),
        live => Err(format!("{live} capture tracks still running")),
    }
}
