//! Orchestrator configuration.

use std::time::Duration;

/// Tunables for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Gate `Connected` on secure-code verification.
    pub secure_mode: bool,
    /// Longest accepted text message, in characters.
    pub max_message_len: usize,
    /// Longest accepted local or peer identifier, in characters.
    pub max_id_len: usize,
    /// Period of the peer counter.
    pub counter_interval: Duration,
    /// Content types with this prefix become image messages.
    pub image_mime_prefix: String,
}

impl OrchestratorConfig {
    /// Default configuration with secure mode enabled.
    pub fn secure() -> Self {
        Self { secure_mode: true, ..Self::default() }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            secure_mode: false,
            max_message_len: 200,
            max_id_len: 10,
            counter_interval: Duration::from_secs(1),
            image_mime_prefix: "image/".to_string(),
        }
    }
}
