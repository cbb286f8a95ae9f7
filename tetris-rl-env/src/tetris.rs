//! Tetris environment
//!
//! A turn-based rendition of the classic 20x10 playfield: every call
//! to [`Environment::step`] applies one player input and one row of
//! gravity. Pieces are dealt with a 7-bag randomizer; locking a piece
//! clears full rows and updates lines, level and score.

use async_trait::async_trait;
use lazy_static::lazy_static;
use ndarray::{arr1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use tetris_rl_core::{
    ActionSpace, BoardObservation, BoardObservationSpace, Environment, EnvironmentConfig,
    ObservationSpace, RLError, Result, Reward, Step, StepInfo, TetrisAction, TetrisActionSpace,
};

/// Playfield height in rows
pub const ROWS: usize = BoardObservation::ROWS;
/// Playfield width in columns
pub const COLS: usize = BoardObservation::COLS;

/// Flat reward penalty applied when a step ends the game
const DEFEAT_PENALTY: f64 = 10.0;

/// Spawn position of every new piece
const SPAWN_X: i32 = 5;
const SPAWN_Y: i32 = 0;

/// The seven tetrominoes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    /// S piece
    S,
    /// Z piece
    Z,
    /// I piece
    I,
    /// O piece
    O,
    /// J piece
    J,
    /// L piece
    L,
    /// T piece
    T,
}

impl PieceKind {
    /// All kinds, in the original's deal order
    pub const ALL: [PieceKind; 7] = [
        PieceKind::S,
        PieceKind::Z,
        PieceKind::I,
        PieceKind::O,
        PieceKind::J,
        PieceKind::L,
        PieceKind::T,
    ];

    fn index(self) -> usize {
        match self {
            PieceKind::S => 0,
            PieceKind::Z => 1,
            PieceKind::I => 2,
            PieceKind::O => 3,
            PieceKind::J => 4,
            PieceKind::L => 5,
            PieceKind::T => 6,
        }
    }

    fn rotations(self) -> &'static [Vec<(i32, i32)>] {
        &SHAPES[self.index()]
    }
}

// Rotation encodings on a 5x5 grid; a block sits wherever a '0' is.
// The (column - 2, row - 4) offset places spawned pieces partly above
// the visible playfield, exactly like the original game.
const SHAPE_GRIDS: [&[[&str; 5]]; 7] = [
    // S
    &[
        [".....", ".....", "..00.", ".00..", "....."],
        [".....", "..0..", "..00.", "...0.", "....."],
    ],
    // Z
    &[
        [".....", ".....", ".00..", "..00.", "....."],
        [".....", "..0..", ".00..", ".0...", "....."],
    ],
    // I
    &[
        ["..0..", "..0..", "..0..", "..0..", "....."],
        [".....", ".....", "0000.", ".....", "....."],
    ],
    // O
    &[[".....", ".....", ".00..", ".00..", "....."]],
    // J
    &[
        [".....", ".0...", ".000.", ".....", "....."],
        [".....", "..00.", "..0..", "..0..", "....."],
        [".....", ".....", ".000.", "...0.", "....."],
        [".....", "..0..", "..0..", ".00..", "....."],
    ],
    // L
    &[
        [".....", "...0.", ".000.", ".....", "....."],
        [".....", "..0..", "..0..", "..00.", "....."],
        [".....", ".....", ".000.", ".0...", "....."],
        [".....", ".00..", "..0..", "..0..", "....."],
    ],
    // T
    &[
        [".....", "..0..", ".000.", ".....", "....."],
        [".....", "..0..", "..00.", "..0..", "....."],
        [".....", ".....", ".000.", "..0..", "....."],
        [".....", "..0..", ".00..", "..0..", "....."],
    ],
];

lazy_static! {
    /// Block offsets per kind and rotation, parsed from the grids once
    static ref SHAPES: Vec<Vec<Vec<(i32, i32)>>> = SHAPE_GRIDS
        .iter()
        .map(|rotations| {
            rotations
                .iter()
                .map(|grid| {
                    let mut blocks = Vec::with_capacity(4);
                    for (row, line) in grid.iter().enumerate() {
                        for (col, cell) in line.chars().enumerate() {
                            if cell == '0' {
                                blocks.push((col as i32 - 2, row as i32 - 4));
                            }
                        }
                    }
                    blocks
                })
                .collect()
        })
        .collect();
}

/// Active piece state
#[derive(Debug, Clone)]
struct Piece {
    kind: PieceKind,
    rotation: usize,
    x: i32,
    y: i32,
}

impl Piece {
    fn spawn(kind: PieceKind) -> Self {
        Self {
            kind,
            rotation: 0,
            x: SPAWN_X,
            y: SPAWN_Y,
        }
    }

    fn rotation_count(&self) -> usize {
        self.kind.rotations().len()
    }

    /// Absolute block coordinates, (x, y) with y growing downwards
    fn blocks(&self) -> Vec<(i32, i32)> {
        let rotations = self.kind.rotations();
        rotations[self.rotation % rotations.len()]
            .iter()
            .map(|&(dx, dy)| (self.x + dx, self.y + dy))
            .collect()
    }
}

/// Score gained for clearing `cleared` rows at once on `level`
fn line_clear_score(level: u64, cleared: usize) -> u64 {
    // 1 + 2 + ... + n, times 100, scaled by the level
    let multiplier = (cleared * (cleared + 1) / 2) as u64;
    (level + 1) * multiplier * 100
}

/// The Tetris playfield environment
pub struct TetrisEnv {
    /// Locked blocks; 0 empty, 1 occupied
    grid: Array2<u8>,
    piece: Piece,
    next_piece: PieceKind,
    bag: Vec<PieceKind>,
    score: u64,
    lines: u64,
    level: u64,
    game_over: bool,
    rng: StdRng,
}

impl TetrisEnv {
    /// Create a new environment
    pub fn new(config: EnvironmentConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut bag = Self::refill_bag(&mut rng);
        let piece = Piece::spawn(bag.remove(0));
        let next_piece = bag.remove(0);

        Ok(Self {
            grid: Array2::zeros((ROWS, COLS)),
            piece,
            next_piece,
            bag,
            score: 0,
            lines: 0,
            level: 0,
            game_over: false,
            rng,
        })
    }

    /// All seven pieces in a random order
    fn refill_bag(rng: &mut StdRng) -> Vec<PieceKind> {
        let mut bag = PieceKind::ALL.to_vec();
        bag.shuffle(rng);
        bag
    }

    fn deal_piece(&mut self) -> PieceKind {
        if self.bag.is_empty() {
            self.bag = Self::refill_bag(&mut self.rng);
        }
        self.bag.remove(0)
    }

    /// Current score
    #[must_use]
    pub fn score(&self) -> u64 {
        self.score
    }

    /// Total lines cleared this episode
    #[must_use]
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Current level
    #[must_use]
    pub fn level(&self) -> u64 {
        self.level
    }

    /// Whether a piece position is legal on the current grid
    ///
    /// Blocks above the visible playfield are allowed; freshly spawned
    /// pieces start there.
    fn piece_fits(&self, piece: &Piece) -> bool {
        piece.blocks().iter().all(|&(x, y)| {
            if x < 0 || x >= COLS as i32 || y >= ROWS as i32 {
                return false;
            }
            y < 0 || self.grid[[y as usize, x as usize]] == 0
        })
    }

    /// Lock the active piece, clear rows, update the score and deal
    /// the next piece. Returns true when the game ends.
    fn lock_piece(&mut self) -> bool {
        let blocks = self.piece.blocks();
        let mut defeat = false;
        let mut final_row = -1_i32;

        for &(x, y) in &blocks {
            final_row = final_row.max(y);
            if y < 0 {
                // locked above the visible playfield
                defeat = true;
            } else {
                self.grid[[y as usize, x as usize]] = 1;
            }
        }

        let cleared = self.clear_rows();
        self.lines += cleared as u64;
        self.level = self.lines / 10;

        if cleared == 0 {
            // deeper placements pay more
            self.score += (final_row + 1).max(0) as u64;
        } else {
            self.score += line_clear_score(self.level, cleared);
        }

        // top row occupied means the stack has reached the ceiling
        if (0..COLS).any(|col| self.grid[[0, col]] != 0) {
            defeat = true;
        }

        self.piece = Piece::spawn(self.next_piece);
        self.next_piece = self.deal_piece();

        defeat
    }

    /// Remove full rows, shifting everything above them down
    fn clear_rows(&mut self) -> usize {
        let full: Vec<usize> = (0..ROWS)
            .filter(|&row| (0..COLS).all(|col| self.grid[[row, col]] != 0))
            .collect();

        if full.is_empty() {
            return 0;
        }

        let mut compacted = Array2::zeros((ROWS, COLS));
        let mut write_row = ROWS;
        for row in (0..ROWS).rev() {
            if full.contains(&row) {
                continue;
            }
            write_row -= 1;
            for col in 0..COLS {
                compacted[[write_row, col]] = self.grid[[row, col]];
            }
        }
        self.grid = compacted;

        full.len()
    }

    fn observation(&self) -> Result<BoardObservation> {
        let mut board = self.grid.mapv(f32::from);
        for (x, y) in self.piece.blocks() {
            if (0..ROWS as i32).contains(&y) && (0..COLS as i32).contains(&x) {
                board[[y as usize, x as usize]] = tetris_rl_core::CELL_ACTIVE;
            }
        }

        let rotation = (self.piece.rotation % self.piece.rotation_count()) as f32;
        let extras = arr1(&[
            self.piece.kind.index() as f32 / 6.0,
            rotation / 3.0,
            self.next_piece.index() as f32 / 6.0,
        ]);

        BoardObservation::new(board, extras)
    }

    fn step_info(&self) -> StepInfo {
        let mut info = StepInfo::default();
        info.fields
            .insert("score".to_string(), serde_json::json!(self.score));
        info.fields
            .insert("lines".to_string(), serde_json::json!(self.lines));
        info.fields
            .insert("level".to_string(), serde_json::json!(self.level));
        info
    }
}

#[async_trait]
impl Environment for TetrisEnv {
    type Observation = BoardObservation;
    type Action = TetrisAction;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        Box::new(BoardObservationSpace::new())
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        Box::new(TetrisActionSpace::new())
    }

    async fn reset(&mut self) -> Result<(Self::Observation, StepInfo)> {
        self.grid = Array2::zeros((ROWS, COLS));
        self.score = 0;
        self.lines = 0;
        self.level = 0;
        self.game_over = false;

        self.bag = Self::refill_bag(&mut self.rng);
        self.piece = Piece::spawn(self.bag.remove(0));
        self.next_piece = self.bag.remove(0);

        Ok((self.observation()?, self.step_info()))
    }

    async fn step(&mut self, action: Self::Action) -> Result<Step<Self::Observation>> {
        if self.game_over {
            return Err(RLError::Environment(
                "episode is over; call reset before stepping again".to_string(),
            ));
        }

        let score_before = self.score;
        let mut lock = false;

        match action {
            TetrisAction::ShiftRight => {
                self.piece.x += 1;
                if !self.piece_fits(&self.piece) {
                    self.piece.x -= 1;
                }
            }
            TetrisAction::ShiftLeft => {
                self.piece.x -= 1;
                if !self.piece_fits(&self.piece) {
                    self.piece.x += 1;
                }
            }
            TetrisAction::Rotate => {
                self.piece.rotation += 1;
                if !self.piece_fits(&self.piece) {
                    self.piece.rotation -= 1;
                }
            }
            TetrisAction::HardDrop => {
                while self.piece_fits(&self.piece) {
                    self.piece.y += 1;
                }
                self.piece.y -= 1;
                lock = true;
            }
        }

        // one row of gravity per step
        if !lock {
            self.piece.y += 1;
            if !self.piece_fits(&self.piece) {
                self.piece.y -= 1;
                if self.piece.y > 0 {
                    lock = true;
                }
            }
        }

        let mut done = false;
        if lock {
            done = self.lock_piece();
        }

        let mut reward = (self.score - score_before) as f64;
        if done {
            self.game_over = true;
            reward -= DEFEAT_PENALTY;
            tracing::debug!(score = self.score, lines = self.lines, "game over");
        }

        Ok(Step {
            observation: self.observation()?,
            reward: Reward(reward),
            done,
            truncated: false,
            info: self.step_info(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tetris_rl_core::{Observation, CELL_ACTIVE, CELL_LOCKED};

    fn seeded_env(seed: u64) -> TetrisEnv {
        TetrisEnv::new(EnvironmentConfig {
            seed: Some(seed),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn every_rotation_has_four_blocks() {
        for kind in PieceKind::ALL {
            for rotation in kind.rotations() {
                assert_eq!(rotation.len(), 4, "{kind:?}");
            }
        }
    }

    #[test]
    fn line_clear_scoring_matches_the_original_formula() {
        assert_eq!(line_clear_score(0, 1), 100);
        assert_eq!(line_clear_score(0, 2), 300);
        assert_eq!(line_clear_score(0, 3), 600);
        assert_eq!(line_clear_score(0, 4), 1000);
        assert_eq!(line_clear_score(2, 1), 300);
    }

    #[tokio::test]
    async fn seeded_runs_are_identical() {
        let mut a = seeded_env(42);
        let mut b = seeded_env(42);

        let (obs_a, _) = a.reset().await.unwrap();
        let (obs_b, _) = b.reset().await.unwrap();
        assert_eq!(obs_a.to_tensor(), obs_b.to_tensor());

        let actions = [
            TetrisAction::ShiftLeft,
            TetrisAction::Rotate,
            TetrisAction::ShiftRight,
            TetrisAction::HardDrop,
            TetrisAction::ShiftLeft,
        ];
        for action in actions {
            let step_a = a.step(action).await.unwrap();
            let step_b = b.step(action).await.unwrap();
            assert_eq!(step_a.observation.to_tensor(), step_b.observation.to_tensor());
            assert_eq!(step_a.reward, step_b.reward);
        }
    }

    #[tokio::test]
    async fn observations_show_the_active_piece() {
        let mut env = seeded_env(7);
        let (_, _) = env.reset().await.unwrap();

        // a couple of gravity ticks bring the piece into view
        let mut step = env.step(TetrisAction::ShiftLeft).await.unwrap();
        for _ in 0..3 {
            step = env.step(TetrisAction::Rotate).await.unwrap();
        }

        let active = step
            .observation
            .board()
            .iter()
            .filter(|&&c| c == CELL_ACTIVE)
            .count();
        assert!(active > 0);
    }

    #[tokio::test]
    async fn hard_drop_locks_and_scores_by_depth() {
        let mut env = seeded_env(3);
        env.reset().await.unwrap();

        let step = env.step(TetrisAction::HardDrop).await.unwrap();
        assert!(!step.done);

        // the piece is locked near the floor and the drop paid out
        let locked = step
            .observation
            .board()
            .iter()
            .filter(|&&c| c == CELL_LOCKED)
            .count();
        assert_eq!(locked, 4);
        assert!(step.reward.0 > 0.0);
        assert_eq!(step.info.get_u64("score"), Some(env.score()));
    }

    #[tokio::test]
    async fn stacking_in_one_column_ends_the_game() {
        let mut env = seeded_env(11);
        env.reset().await.unwrap();

        let mut done = false;
        for _ in 0..200 {
            let step = env.step(TetrisAction::HardDrop).await.unwrap();
            if step.done {
                assert!(step.reward.0 <= 0.0);
                done = true;
                break;
            }
        }
        assert!(done, "repeated drops in one column must top out");

        // stepping a finished episode is a caller error
        assert!(env.step(TetrisAction::ShiftLeft).await.is_err());
    }

    #[tokio::test]
    async fn reset_clears_the_board_and_counters() {
        let mut env = seeded_env(5);
        env.reset().await.unwrap();
        for _ in 0..10 {
            let step = env.step(TetrisAction::HardDrop).await.unwrap();
            if step.done {
                break;
            }
        }
        assert!(env.score() > 0);

        let (obs, info) = env.reset().await.unwrap();
        assert_eq!(env.score(), 0);
        assert_eq!(env.lines(), 0);
        assert_eq!(info.get_u64("score"), Some(0));
        let locked = obs
            .board()
            .iter()
            .filter(|&&c| c == CELL_LOCKED)
            .count();
        assert_eq!(locked, 0);
    }
}
