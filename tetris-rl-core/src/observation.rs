//! Observation representations and observation spaces

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for observations from an environment
pub trait Observation: Clone + Debug + Send + Sync {
    /// Serialize the observation into a fixed-length input tensor
    fn to_tensor(&self) -> Array1<f32>;

    /// Get the logical shape of the observation
    fn shape(&self) -> Vec<usize>;

    /// Length of the tensor produced by [`Observation::to_tensor`]
    fn flat_dim(&self) -> usize {
        self.to_tensor().len()
    }
}

/// Trait for defining observation spaces
pub trait ObservationSpace: Send + Sync {
    /// The type of observations in this space
    type Observation: Observation;

    /// Check if an observation is valid within this space
    fn contains(&self, obs: &Self::Observation) -> bool;

    /// Get the logical shape of observations in this space
    fn shape(&self) -> Vec<usize>;

    /// Length of the input tensor observations in this space produce
    fn flat_dim(&self) -> usize;
}

/// Cell value for an empty playfield position
pub const CELL_EMPTY: f32 = 0.0;
/// Cell value for a locked block
pub const CELL_LOCKED: f32 = 1.0;
/// Cell value for a block of the active piece
pub const CELL_ACTIVE: f32 = 2.0;

/// Snapshot of the Tetris playfield as seen by the agent
///
/// A 20x10 grid where every cell is empty, locked, or part of the
/// active piece, plus a few auxiliary scalar features (piece identity
/// and rotation). Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardObservation {
    /// Playfield grid, row 0 at the top
    board: Array2<f32>,
    /// Auxiliary scalar features, already normalized
    extras: Array1<f32>,
}

impl BoardObservation {
    /// Playfield height in rows
    pub const ROWS: usize = 20;
    /// Playfield width in columns
    pub const COLS: usize = 10;
    /// Number of auxiliary scalar features
    pub const EXTRA_FEATURES: usize = 3;
    /// Length of the flattened input tensor
    pub const FLAT_DIM: usize = Self::ROWS * Self::COLS + Self::EXTRA_FEATURES;

    /// Create an observation from a grid and its auxiliary features
    ///
    /// Fails fast on a grid or feature vector of the wrong shape; a
    /// malformed snapshot is a caller bug, not something to coerce.
    pub fn new(board: Array2<f32>, extras: Array1<f32>) -> crate::Result<Self> {
        if board.shape() != [Self::ROWS, Self::COLS] {
            return Err(crate::RLError::DimensionMismatch {
                expected: Self::ROWS * Self::COLS,
                actual: board.len(),
            });
        }
        if extras.len() != Self::EXTRA_FEATURES {
            return Err(crate::RLError::DimensionMismatch {
                expected: Self::EXTRA_FEATURES,
                actual: extras.len(),
            });
        }
        Ok(Self { board, extras })
    }

    /// The playfield grid
    #[must_use]
    pub fn board(&self) -> &Array2<f32> {
        &self.board
    }

    /// The auxiliary scalar features
    #[must_use]
    pub fn extras(&self) -> &Array1<f32> {
        &self.extras
    }
}

impl Observation for BoardObservation {
    fn to_tensor(&self) -> Array1<f32> {
        let mut data = Vec::with_capacity(Self::FLAT_DIM);
        data.extend(self.board.iter().copied());
        data.extend(self.extras.iter().copied());
        Array1::from_vec(data)
    }

    fn shape(&self) -> Vec<usize> {
        vec![Self::ROWS, Self::COLS]
    }

    fn flat_dim(&self) -> usize {
        Self::FLAT_DIM
    }
}

/// The observation space of the Tetris playfield
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardObservationSpace;

impl BoardObservationSpace {
    /// Create the observation space
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ObservationSpace for BoardObservationSpace {
    type Observation = BoardObservation;

    fn contains(&self, obs: &Self::Observation) -> bool {
        obs.board()
            .iter()
            .all(|&c| c == CELL_EMPTY || c == CELL_LOCKED || c == CELL_ACTIVE)
    }

    fn shape(&self) -> Vec<usize> {
        vec![BoardObservation::ROWS, BoardObservation::COLS]
    }

    fn flat_dim(&self) -> usize {
        BoardObservation::FLAT_DIM
    }
}
