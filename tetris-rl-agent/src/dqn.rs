//! Deep Q-Network (DQN) agent implementation
//!
//! The agent controller ties the pieces together: it records every
//! transition into the replay buffer, trains the online network on a
//! sampled mini-batch after each recorded step, hard-syncs the target
//! network at every epoch boundary, and owns the decaying exploration
//! probability.

use async_trait::async_trait;
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use tetris_rl_core::{
    Agent, AgentConfig, BoardObservation, EpochMetrics, Observation, Result, Reward,
    TetrisAction, Transition, ACTION_COUNT,
};

use crate::buffer::ReplayBuffer;
use crate::network::{QNetwork, QNetworkConfig};
use crate::policy::PolicySelector;
use crate::utils::decayed_epsilon;

/// DQN-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DQNConfig {
    /// Base agent configuration
    #[serde(flatten)]
    pub base: AgentConfig,
    /// Initial exploration probability
    pub epsilon_start: f64,
    /// Linear epsilon decrement applied at every epoch boundary
    pub epsilon_decay: f64,
    /// Flattened observation length fed to the networks
    pub input_dim: usize,
    /// Seed for all random choices (weights, sampling, exploration)
    pub seed: Option<u64>,
}

impl Default for DQNConfig {
    fn default() -> Self {
        Self {
            base: AgentConfig::default(),
            epsilon_start: 1.0,
            epsilon_decay: 0.01,
            input_dim: BoardObservation::FLAT_DIM,
            seed: None,
        }
    }
}

/// Deep Q-Learning agent
///
/// Implements the textbook loop: an online prediction network, a
/// periodically synchronized target network, uniform experience
/// replay, and an epsilon-greedy policy.
pub struct DQNAgent {
    config: DQNConfig,
    /// Online network, updated on every training step
    q_network: QNetwork,
    /// Target network, refreshed only at epoch boundaries
    target_network: QNetwork,
    replay: ReplayBuffer<BoardObservation, TetrisAction>,
    selector: PolicySelector,
    /// Exploration probability, non-increasing, floored at 0.0
    epsilon: f64,
    /// Epoch counter, monotonically increasing
    epoch: u64,
    /// Action counter, monotonically increasing
    actions_taken: u64,
    /// Action count at the last epoch boundary
    epoch_actions_mark: u64,
    rng: StdRng,
}

impl DQNAgent {
    /// Create a new agent from the given configuration
    #[must_use]
    pub fn new(config: DQNConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let network_config = QNetworkConfig {
            input_dim: config.input_dim,
            hidden_dims: vec![64, 64],
            output_dim: ACTION_COUNT,
            learning_rate: config.base.learning_rate as f32,
            seed: config.seed,
        };

        // Two independent instances; the target starts as an exact copy
        // and afterwards diverges until the next synchronization point
        let q_network = QNetwork::new(network_config.clone());
        let mut target_network = QNetwork::new(network_config);
        target_network.sync_from(&q_network);

        let replay = ReplayBuffer::new(config.base.buffer_size);
        let epsilon = config.epsilon_start;

        Self {
            config,
            q_network,
            target_network,
            replay,
            selector: PolicySelector::new(),
            epsilon,
            epoch: 1,
            actions_taken: 0,
            epoch_actions_mark: 0,
            rng,
        }
    }

    /// Current exploration probability
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Current epoch number
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Total actions selected over the lifetime of the run
    #[must_use]
    pub fn actions_taken(&self) -> u64 {
        self.actions_taken
    }

    /// Number of transitions currently held for replay
    #[must_use]
    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    /// The online network
    #[must_use]
    pub fn q_network(&self) -> &QNetwork {
        &self.q_network
    }

    /// The target network
    #[must_use]
    pub fn target_network(&self) -> &QNetwork {
        &self.target_network
    }

    /// Select an action for the current observation
    ///
    /// Returns the chosen action and, on the exploit branch, the online
    /// network's value vector for the observation.
    pub async fn select_action(
        &mut self,
        observation: &BoardObservation,
    ) -> Result<(TetrisAction, Option<Array1<f32>>)> {
        self.actions_taken += 1;
        self.selector
            .select(&self.q_network, observation, self.epsilon, &mut self.rng)
            .await
    }

    /// Record a transition and run one training step over a mini-batch
    ///
    /// Returns the mean training loss of the step.
    pub async fn insert_experience(
        &mut self,
        transition: Transition<BoardObservation, TetrisAction>,
    ) -> Result<f32> {
        self.replay.push(transition);
        self.learn_from_replay().await
    }

    /// Train the online network on a batch sampled from the replay store
    async fn learn_from_replay(&mut self) -> Result<f32> {
        if self.replay.is_empty() {
            return Ok(0.0);
        }

        let batch_size = self.config.base.batch_size.min(self.replay.len());
        let batch = self.replay.sample(&mut self.rng, batch_size);

        let gamma = self.config.base.gamma;
        let mut total_loss = 0.0_f32;

        for transition in &batch {
            let input = transition.observation.to_tensor();
            let prediction = self.q_network.predict(&input.view())?;

            let max_future = if transition.terminal {
                None
            } else {
                let next = transition.next_observation.to_tensor();
                let future = self.target_network.predict(&next.view())?;
                Some(future.iter().copied().fold(f32::NEG_INFINITY, f32::max))
            };

            let target = td_target(
                &prediction,
                transition.action,
                transition.reward,
                max_future,
                gamma,
            );

            // Exactly one gradient pass per sampled transition
            total_loss += self.q_network.fit(&input.view(), &target.view())?;
        }

        let mean_loss = total_loss / batch.len() as f32;
        metrics::gauge!("tetris_dqn_loss", f64::from(mean_loss));
        metrics::counter!("tetris_dqn_training_steps", 1);
        tracing::debug!(batch_size, mean_loss, "trained from replay");

        Ok(mean_loss)
    }

    /// Finalize the current epoch
    ///
    /// In order: one extra training step covering the epoch's final
    /// transition, an unconditional hard sync of the target network,
    /// linear epsilon decay floored at 0.0, and the epoch summary.
    pub async fn finalize_epoch(&mut self, metrics: EpochMetrics) -> Result<()> {
        self.learn_from_replay().await?;
        self.target_network.sync_from(&self.q_network);
        self.epsilon = decayed_epsilon(self.epsilon, self.config.epsilon_decay);

        let epoch_actions = self.actions_taken - self.epoch_actions_mark;
        tracing::info!(
            epoch = self.epoch,
            lines = metrics.lines,
            score = metrics.score,
            actions = epoch_actions,
            epsilon = self.epsilon,
            "epoch finished"
        );

        self.epoch_actions_mark = self.actions_taken;
        self.epoch += 1;
        Ok(())
    }

    /// Persist the online network's parameters as JSON
    pub async fn save_weights(&self, path: &std::path::Path) -> Result<()> {
        let json = serde_json::to_string(&self.q_network)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Restore previously saved parameters into both networks
    pub async fn load_weights(&mut self, path: &std::path::Path) -> Result<()> {
        let json = tokio::fs::read_to_string(path).await?;
        self.q_network = serde_json::from_str(&json)?;
        self.target_network.sync_from(&self.q_network);
        tracing::info!(path = %path.display(), "weights loaded");
        Ok(())
    }
}

/// Build the training target for one sampled transition
///
/// A new vector equal to the online prediction everywhere except at
/// the taken action's index: the reward alone for terminal
/// transitions, the one-step TD target otherwise.
fn td_target(
    prediction: &Array1<f32>,
    action: TetrisAction,
    reward: Reward,
    max_future: Option<f32>,
    gamma: f64,
) -> Array1<f32> {
    let index = action.index();
    let value = match max_future {
        // No bootstrapping past the end of the episode
        None => reward.0 as f32,
        Some(max) => (reward.0 + gamma * f64::from(max)) as f32,
    };

    Array1::from_shape_fn(prediction.len(), |i| {
        if i == index {
            value
        } else {
            prediction[i]
        }
    })
}

#[async_trait]
impl Agent for DQNAgent {
    type Observation = BoardObservation;
    type Action = TetrisAction;

    async fn act(&mut self, observation: &Self::Observation) -> Result<Self::Action> {
        let (action, _) = self.select_action(observation).await?;
        Ok(action)
    }

    async fn observe(
        &mut self,
        transition: Transition<Self::Observation, Self::Action>,
    ) -> Result<()> {
        self.insert_experience(transition).await?;
        Ok(())
    }

    async fn finish_epoch(&mut self, metrics: EpochMetrics) -> Result<()> {
        self.finalize_epoch(metrics).await
    }

    async fn save(&self, path: &std::path::Path) -> Result<()> {
        self.save_weights(path).await
    }

    async fn load(&mut self, path: &std::path::Path) -> Result<()> {
        self.load_weights(path).await
    }
}
