//! Reinforcement learning environments for the Tetris DQN workspace
//!
//! This crate provides the game side of the system:
//! - The turn-based Tetris playfield environment
//! - Environment wrappers (time limits)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod tetris;
pub mod wrappers;

// Re-export environments
pub use tetris::{PieceKind, TetrisEnv};
pub use wrappers::TimeLimit;

// Re-export core types
pub use tetris_rl_core::{
    Action, ActionSpace, BoardObservation, Environment, EnvironmentConfig, Episode, Observation,
    ObservationSpace, Reward, Step, StepInfo,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{TetrisEnv, TimeLimit};
    pub use tetris_rl_core::prelude::*;
}
