//! Action-value function seam

use async_trait::async_trait;
use ndarray::Array1;
use num_traits::Float;

use crate::{Observation, TetrisAction};

/// Action value function Q(s, a)
///
/// The seam between the policy layer and whatever function approximator
/// backs it. Implementations estimate one value per discrete action.
#[async_trait]
pub trait ActionValueFunction<O: Observation>: Send + Sync {
    /// Number of actions the estimator scores
    fn num_actions(&self) -> usize;

    /// Estimate the value of every action for an observation
    async fn q_values(&self, observation: &O) -> crate::Result<Array1<f32>>;

    /// Get the best action and its value
    async fn best_action(&self, observation: &O) -> crate::Result<(TetrisAction, f32)> {
        let values = self.q_values(observation).await?;
        let index = argmax(values.as_slice().unwrap_or(&[])).ok_or_else(|| {
            crate::RLError::Agent("empty action-value vector".to_string())
        })?;
        let action = TetrisAction::from_index(index).ok_or_else(|| {
            crate::RLError::InvalidAction(format!("no action for index {index}"))
        })?;
        Ok((action, values[index]))
    }
}

/// Index of the maximum entry, ties broken by the lowest index
///
/// Returns `None` on an empty slice. NaN entries never win.
#[must_use]
pub fn argmax<T: Float>(values: &[T]) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
