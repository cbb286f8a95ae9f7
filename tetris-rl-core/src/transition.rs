//! Transition records for experience replay

use serde::{Deserialize, Serialize};

use crate::Reward;

/// Single environment step as recorded for learning
///
/// Created once per step and never updated afterwards; the replay
/// buffer removes records only through capacity-based eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition<O, A> {
    /// Observation before the action
    pub observation: O,
    /// Action taken
    pub action: A,
    /// Reward received
    pub reward: Reward,
    /// Observation after the action
    pub next_observation: O,
    /// Whether the episode ended on this step
    pub terminal: bool,
}

impl<O, A> Transition<O, A> {
    /// Create a new transition record
    pub fn new(
        observation: O,
        action: A,
        reward: Reward,
        next_observation: O,
        terminal: bool,
    ) -> Self {
        Self {
            observation,
            action,
            reward,
            next_observation,
            terminal,
        }
    }
}
