//! Session registry.
//!
//! Hosts several independent orchestrators, one per caller-chosen slot, for
//! pages that talk to more than one peer at once. The registry is an owned
//! value; there is no process-wide peer map.

use std::collections::BTreeMap;

use peerlink_core::env::Environment;
use thiserror::Error;
use tracing::info;

use crate::{action::OrchestratorAction, config::OrchestratorConfig, orchestrator::Orchestrator};

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError<K: std::fmt::Debug> {
    /// The slot already hosts an orchestrator.
    #[error("slot {0:?} is already in use")]
    SlotOccupied(K),

    /// No orchestrator at the slot.
    #[error("no session in slot {0:?}")]
    UnknownSlot(K),
}

/// Orchestrators indexed by slot.
#[derive(Debug)]
pub struct SessionRegistry<K: Ord, E: Environment> {
    env: E,
    slots: BTreeMap<K, Orchestrator<E>>,
}

impl<K, E> SessionRegistry<K, E>
where
    K: Ord + Clone + std::fmt::Debug,
    E: Environment,
{
    /// Empty registry sharing `env` across its orchestrators.
    pub fn new(env: E) -> Self {
        Self { env, slots: BTreeMap::new() }
    }

    /// Create an idle orchestrator at `slot`.
    pub fn open(
        &mut self,
        slot: K,
        config: OrchestratorConfig,
    ) -> Result<&mut Orchestrator<E>, RegistryError<K>> {
        if self.slots.contains_key(&slot) {
            return Err(RegistryError::SlotOccupied(slot));
        }
        info!(?slot, "session slot opened");
        let orchestrator = Orchestrator::new(self.env.clone(), config);
        Ok(self.slots.entry(slot).or_insert(orchestrator))
    }

    /// Orchestrator at `slot`.
    pub fn get(&self, slot: &K) -> Option<&Orchestrator<E>> {
        self.slots.get(slot)
    }

    /// Mutable orchestrator at `slot`.
    pub fn get_mut(&mut self, slot: &K) -> Option<&mut Orchestrator<E>> {
        self.slots.get_mut(slot)
    }

    /// Remove the orchestrator at `slot`, disconnecting it if a session is
    /// active. Returns the teardown actions for that slot's engine.
    pub fn close(&mut self, slot: &K) -> Result<Vec<OrchestratorAction>, RegistryError<K>> {
        let mut orchestrator =
            self.slots.remove(slot).ok_or_else(|| RegistryError::UnknownSlot(slot.clone()))?;
        info!(?slot, "session slot closed");
        if orchestrator.state().is_active() {
            // Active sessions always accept a disconnect
            return Ok(orchestrator.disconnect().unwrap_or_default());
        }
        Ok(vec![])
    }

    /// Occupied slots, in order.
    pub fn slots(&self) -> impl Iterator<Item = &K> {
        self.slots.keys()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// No slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
