//! Scenario testing with mandatory oracles.
//!
//! A scenario is a scripted sequence of user intents and engine events run
//! against a real runtime over the simulated engine. It cannot be executed
//! without an oracle that checks the resulting [`World`].

mod builder;
mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, ScenarioStep};
pub use oracle::{
    OracleFn, expect_fresh_idle, expect_no_live_capture, expect_state, expect_step_ok,
};
pub use world::{SimRuntime, StepOutcome, World};
