//! Deep Q-Learning agent for the Tetris DQN workspace
//!
//! This crate provides the learning side of the system:
//! - A DQN agent with experience replay and a target network
//! - The Q-network function approximator backing it
//! - An epsilon-greedy policy selector
//! - A random baseline agent

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod dqn;
pub mod network;
pub mod policy;
pub mod random;
pub mod utils;

// Re-export agents
pub use dqn::{DQNAgent, DQNConfig};
pub use random::RandomAgent;

// Re-export components
pub use buffer::ReplayBuffer;
pub use network::{QNetwork, QNetworkConfig};
pub use policy::PolicySelector;
pub use utils::decayed_epsilon;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{DQNAgent, DQNConfig, QNetwork, QNetworkConfig, RandomAgent, ReplayBuffer};
    pub use tetris_rl_core::prelude::*;
}
