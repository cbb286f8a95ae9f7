//! Action representations and action spaces

use rand::Rng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for actions in an RL environment
pub trait Action: Clone + Debug + Send + Sync {
    /// Convert action to a vector representation
    fn to_vec(&self) -> Vec<f64>;
}

/// Trait for defining action spaces
///
/// Sampling takes the caller's random source so that runs stay
/// reproducible and composable without ambient global state.
pub trait ActionSpace: Send + Sync {
    /// The type of actions in this space
    type Action: Action;

    /// Sample a random action from the space
    fn sample(&self, rng: &mut dyn RngCore) -> Self::Action;

    /// Check if an action is valid within this space
    fn contains(&self, action: &Self::Action) -> bool;

    /// Get the number of distinct actions, for discrete spaces
    fn len(&self) -> Option<usize>;

    /// Whether the space holds no actions
    fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

/// Player input for the Tetris playfield
///
/// The four inputs the original game accepts. Each variant maps
/// bidirectionally to a network output index and to the label the
/// environment understands; both conversions are total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TetrisAction {
    /// Move the active piece one column to the right
    ShiftRight,
    /// Move the active piece one column to the left
    ShiftLeft,
    /// Rotate the active piece clockwise
    Rotate,
    /// Drop the active piece to its final resting position
    HardDrop,
}

/// Number of distinct actions
pub const ACTION_COUNT: usize = 4;

impl TetrisAction {
    /// All actions, ordered by network output index
    pub const ALL: [TetrisAction; ACTION_COUNT] = [
        TetrisAction::ShiftRight,
        TetrisAction::ShiftLeft,
        TetrisAction::Rotate,
        TetrisAction::HardDrop,
    ];

    /// Network output index of this action
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            TetrisAction::ShiftRight => 0,
            TetrisAction::ShiftLeft => 1,
            TetrisAction::Rotate => 2,
            TetrisAction::HardDrop => 3,
        }
    }

    /// Action for a network output index, if in range
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Semantic label understood by the environment
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TetrisAction::ShiftRight => "right",
            TetrisAction::ShiftLeft => "left",
            TetrisAction::Rotate => "rotate",
            TetrisAction::HardDrop => "hard_drop",
        }
    }

    /// Action for a semantic label, if known
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "right" => Some(TetrisAction::ShiftRight),
            "left" => Some(TetrisAction::ShiftLeft),
            "rotate" => Some(TetrisAction::Rotate),
            "hard_drop" => Some(TetrisAction::HardDrop),
            _ => None,
        }
    }
}

impl Action for TetrisAction {
    fn to_vec(&self) -> Vec<f64> {
        vec![self.index() as f64]
    }
}

impl std::fmt::Display for TetrisAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The action space of the Tetris playfield
#[derive(Debug, Clone, Copy, Default)]
pub struct TetrisActionSpace;

impl TetrisActionSpace {
    /// Create the action space
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ActionSpace for TetrisActionSpace {
    type Action = TetrisAction;

    fn sample(&self, rng: &mut dyn RngCore) -> Self::Action {
        let index = rng.gen_range(0..ACTION_COUNT);
        TetrisAction::from_index(index).unwrap_or(TetrisAction::ShiftRight)
    }

    fn contains(&self, _action: &Self::Action) -> bool {
        true
    }

    fn len(&self) -> Option<usize> {
        Some(ACTION_COUNT)
    }
}
