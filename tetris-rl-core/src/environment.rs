//! Environment traits and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Action, ActionSpace, Observation, ObservationSpace, Reward};

/// Result of a single environment step
#[derive(Debug, Clone)]
pub struct Step<O> {
    /// Observation from the environment
    pub observation: O,
    /// Reward signal
    pub reward: Reward,
    /// Whether the episode is done
    pub done: bool,
    /// Whether the episode was truncated (e.g. time limit)
    pub truncated: bool,
    /// Additional info from the environment
    pub info: StepInfo,
}

impl<O> Step<O> {
    /// Whether the episode ended on this step, for any reason
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.done || self.truncated
    }
}

/// Additional information from a step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepInfo {
    /// Custom fields
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StepInfo {
    /// Read a numeric field, if present
    #[must_use]
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(serde_json::Value::as_u64)
    }
}

/// Episode information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Episode ID
    pub id: String,
    /// Total reward
    pub total_reward: f64,
    /// Number of steps
    pub steps: usize,
    /// Whether episode was truncated
    pub truncated: bool,
    /// Start time
    pub start_time: chrono::DateTime<chrono::Utc>,
    /// End time
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Configuration for environments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Random seed
    pub seed: Option<u64>,
    /// Maximum episode steps
    pub max_steps: Option<usize>,
    /// Additional parameters
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Core environment trait
#[async_trait]
pub trait Environment: Send + Sync {
    /// Observation type
    type Observation: Observation;
    /// Action type
    type Action: Action;

    /// Get the observation space
    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>>;

    /// Get the action space
    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>>;

    /// Reset the environment
    async fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)>;

    /// Take a step in the environment
    async fn step(&mut self, action: Self::Action) -> crate::Result<Step<Self::Observation>>;

    /// Close the environment
    async fn close(&mut self) -> crate::Result<()> {
        Ok(())
    }

    /// Get current episode info
    fn episode_info(&self) -> Option<Episode> {
        None
    }
}

/// Wrapper for environments that tracks episodes
pub struct TrackedEnvironment<E> {
    /// Inner environment
    pub env: E,
    /// Current episode
    pub episode: Option<Episode>,
    /// Step counter
    pub step_count: usize,
}

impl<E> TrackedEnvironment<E> {
    /// Create a new tracked environment
    pub fn new(env: E) -> Self {
        Self {
            env,
            episode: None,
            step_count: 0,
        }
    }
}

#[async_trait]
impl<E> Environment for TrackedEnvironment<E>
where
    E: Environment,
{
    type Observation = E::Observation;
    type Action = E::Action;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        self.env.observation_space()
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        self.env.action_space()
    }

    async fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)> {
        // End current episode if exists
        if let Some(ref mut episode) = self.episode {
            episode.end_time = Some(chrono::Utc::now());
        }

        // Start new episode
        self.episode = Some(Episode {
            id: uuid::Uuid::new_v4().to_string(),
            total_reward: 0.0,
            steps: 0,
            truncated: false,
            start_time: chrono::Utc::now(),
            end_time: None,
        });
        self.step_count = 0;

        self.env.reset().await
    }

    async fn step(&mut self, action: Self::Action) -> crate::Result<Step<Self::Observation>> {
        let step = self.env.step(action).await?;

        self.step_count += 1;
        if let Some(ref mut episode) = self.episode {
            episode.total_reward += step.reward.0;
            episode.steps = self.step_count;

            if step.is_terminal() {
                episode.truncated = step.truncated;
                episode.end_time = Some(chrono::Utc::now());
            }
        }

        Ok(step)
    }

    async fn close(&mut self) -> crate::Result<()> {
        self.env.close().await
    }

    fn episode_info(&self) -> Option<Episode> {
        self.episode.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoardObservation, BoardObservationSpace, TetrisAction, TetrisActionSpace};
    use ndarray::{arr1, Array2};

    /// Minimal environment that ends after three steps
    struct CountdownEnv {
        remaining: usize,
    }

    impl CountdownEnv {
        fn observation() -> BoardObservation {
            BoardObservation::new(
                Array2::zeros((BoardObservation::ROWS, BoardObservation::COLS)),
                arr1(&[0.0, 0.0, 0.0]),
            )
            .unwrap()
        }
    }

    #[async_trait]
    impl Environment for CountdownEnv {
        type Observation = BoardObservation;
        type Action = TetrisAction;

        fn observation_space(
            &self,
        ) -> Box<dyn crate::ObservationSpace<Observation = Self::Observation>> {
            Box::new(BoardObservationSpace::new())
        }

        fn action_space(&self) -> Box<dyn crate::ActionSpace<Action = Self::Action>> {
            Box::new(TetrisActionSpace::new())
        }

        async fn reset(&mut self) -> crate::Result<(Self::Observation, StepInfo)> {
            self.remaining = 3;
            Ok((Self::observation(), StepInfo::default()))
        }

        async fn step(&mut self, _action: Self::Action) -> crate::Result<Step<Self::Observation>> {
            self.remaining -= 1;
            Ok(Step {
                observation: Self::observation(),
                reward: Reward(1.0),
                done: self.remaining == 0,
                truncated: false,
                info: StepInfo::default(),
            })
        }
    }

    #[tokio::test]
    async fn tracked_environment_accumulates_episode_stats() {
        let mut env = TrackedEnvironment::new(CountdownEnv { remaining: 0 });

        env.reset().await.unwrap();
        let first_id = env.episode_info().unwrap().id;

        let mut last_done = false;
        while !last_done {
            let step = env.step(TetrisAction::HardDrop).await.unwrap();
            last_done = step.done;
        }

        let episode = env.episode_info().unwrap();
        assert_eq!(episode.steps, 3);
        assert!((episode.total_reward - 3.0).abs() < f64::EPSILON);
        assert!(episode.end_time.is_some());

        // a fresh reset starts a distinct episode
        env.reset().await.unwrap();
        let second = env.episode_info().unwrap();
        assert_ne!(second.id, first_id);
        assert_eq!(second.steps, 0);
    }

    #[test]
    fn step_info_exposes_numeric_fields() {
        let mut info = StepInfo::default();
        info.fields
            .insert("score".to_string(), serde_json::json!(42));
        assert_eq!(info.get_u64("score"), Some(42));
        assert_eq!(info.get_u64("lines"), None);
    }
}
