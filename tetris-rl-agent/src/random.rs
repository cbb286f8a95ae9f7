//! Random agent for baseline comparisons

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tetris_rl_core::{
    ActionSpace, Agent, BoardObservation, Result, TetrisAction, TetrisActionSpace, Transition,
};

/// Agent that selects actions uniformly at random and never learns
pub struct RandomAgent {
    action_space: TetrisActionSpace,
    rng: StdRng,
}

impl RandomAgent {
    /// Create a new random agent
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            action_space: TetrisActionSpace::new(),
            rng,
        }
    }
}

#[async_trait]
impl Agent for RandomAgent {
    type Observation = BoardObservation;
    type Action = TetrisAction;

    async fn act(&mut self, _observation: &Self::Observation) -> Result<Self::Action> {
        Ok(self.action_space.sample(&mut self.rng))
    }

    async fn observe(
        &mut self,
        _transition: Transition<Self::Observation, Self::Action>,
    ) -> Result<()> {
        // Random agent doesn't learn from experience
        Ok(())
    }

    async fn save(&self, _path: &std::path::Path) -> Result<()> {
        Ok(())
    }

    async fn load(&mut self, _path: &std::path::Path) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array2};
    use tetris_rl_core::ACTION_COUNT;

    #[tokio::test]
    async fn seeded_agents_replay_the_same_actions() {
        let obs = BoardObservation::new(
            Array2::zeros((BoardObservation::ROWS, BoardObservation::COLS)),
            arr1(&[0.0, 0.0, 0.0]),
        )
        .unwrap();

        let mut a = RandomAgent::new(Some(3));
        let mut b = RandomAgent::new(Some(3));

        let mut seen = [false; ACTION_COUNT];
        for _ in 0..100 {
            let action_a = a.act(&obs).await.unwrap();
            let action_b = b.act(&obs).await.unwrap();
            assert_eq!(action_a, action_b);
            seen[action_a.index()] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
