//! Epsilon-greedy action selection

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;

use tetris_rl_core::{
    argmax, ActionSpace, ActionValueFunction, Observation, RLError, Result, TetrisAction,
    TetrisActionSpace,
};

/// Epsilon-greedy policy selector
///
/// Balances exploration and exploitation: with probability epsilon a
/// uniformly random action, otherwise the arg-max of the online
/// estimator's value vector. The exploration probability itself is
/// owned and decayed by the agent controller and passed per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicySelector {
    action_space: TetrisActionSpace,
}

impl PolicySelector {
    /// Create a new selector
    #[must_use]
    pub fn new() -> Self {
        Self {
            action_space: TetrisActionSpace::new(),
        }
    }

    /// Select an action for an observation
    ///
    /// The explore branch never queries the estimator, so no value
    /// vector is available there; the exploit branch returns the full
    /// vector alongside the chosen action (ties resolve to the lowest
    /// action index).
    pub async fn select<O, Q>(
        &self,
        q_network: &Q,
        observation: &O,
        epsilon: f64,
        rng: &mut StdRng,
    ) -> Result<(TetrisAction, Option<Array1<f32>>)>
    where
        O: Observation,
        Q: ActionValueFunction<O>,
    {
        if rng.gen::<f64>() < epsilon {
            // Explore: random action, no estimate to report
            return Ok((self.action_space.sample(rng), None));
        }

        // Exploit: best action under the online estimator
        let values = q_network.q_values(observation).await?;
        let index = argmax(values.as_slice().unwrap_or(&[]))
            .ok_or_else(|| RLError::Agent("empty action-value vector".to_string()))?;
        let action = TetrisAction::from_index(index)
            .ok_or_else(|| RLError::InvalidAction(format!("no action for index {index}")))?;

        Ok((action, Some(values)))
    }
}
