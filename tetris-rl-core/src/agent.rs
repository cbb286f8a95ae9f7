//! Agent traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Action, Observation, Transition};

/// Configuration shared by learning agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Discount factor
    pub gamma: f64,
    /// Batch size for training
    pub batch_size: usize,
    /// Buffer size for experience replay
    pub buffer_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            gamma: 0.99,
            batch_size: 32,
            buffer_size: 20_000,
        }
    }
}

/// Externally tracked results of one epoch, supplied for reporting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Lines cleared during the epoch
    pub lines: u64,
    /// Score reached during the epoch
    pub score: u64,
}

/// Core agent trait
///
/// The driver is expected to call, per step: [`Agent::act`], step the
/// environment, then [`Agent::observe`] with the recorded transition;
/// and [`Agent::finish_epoch`] once at every episode boundary.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Observation type
    type Observation: Observation;
    /// Action type
    type Action: Action;

    /// Select an action for an observation
    async fn act(&mut self, observation: &Self::Observation) -> crate::Result<Self::Action>;

    /// Record one environment transition (learning agents train here)
    async fn observe(
        &mut self,
        transition: Transition<Self::Observation, Self::Action>,
    ) -> crate::Result<()>;

    /// Finalize the current epoch with externally supplied metrics
    async fn finish_epoch(&mut self, metrics: EpochMetrics) -> crate::Result<()> {
        let _ = metrics;
        Ok(())
    }

    /// Save the agent
    async fn save(&self, path: &std::path::Path) -> crate::Result<()>;

    /// Load the agent
    async fn load(&mut self, path: &std::path::Path) -> crate::Result<()>;
}
