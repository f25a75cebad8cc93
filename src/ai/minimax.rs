use serde::{Deserialize, Serialize};

use crate::game::{
    outcome, Board, Cell, CellIndex, GameState, IntegrityError, Mark, RuleError, BOARD_SIZE,
};
use crate::utils::{self, Stopwatch};

/// `O` 胜的叶子分值；`X` 胜为其相反数，平局为 0。
pub const WIN_SCORE: i32 = 10;

/// One search result. `index` is `None` at a terminal position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Move {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<CellIndex>,
    pub score: i32,
}

impl Move {
    fn leaf(score: i32) -> Self {
        Self { index: None, score }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
}

/// Exhaustive minimax: `O` maximizes, `X` minimizes.
///
/// Candidates are scanned in ascending cell order and only a strictly better
/// score replaces the current best, so the lowest index wins ties. The
/// caller's board is copied once and the copy is searched with place/undo.
pub fn search(board: &Board, to_move: Mark) -> Move {
    let mut stats = SearchStats::default();
    search_with_stats(board, to_move, &mut stats)
}

pub fn search_with_stats(board: &Board, to_move: Mark, stats: &mut SearchStats) -> Move {
    let mut scratch = *board;
    minimax_rec(&mut scratch, to_move, stats)
}

fn terminal_score(board: &Board) -> Option<i32> {
    if outcome::has_won(board, Mark::O) {
        Some(WIN_SCORE)
    } else if outcome::has_won(board, Mark::X) {
        Some(-WIN_SCORE)
    } else if board.is_full() {
        Some(0)
    } else {
        None
    }
}

fn improves(to_move: Mark, score: i32, best: i32) -> bool {
    match to_move {
        Mark::O => score > best,
        Mark::X => score < best,
    }
}

fn minimax_rec(board: &mut Board, to_move: Mark, stats: &mut SearchStats) -> Move {
    stats.nodes += 1;

    if let Some(score) = terminal_score(board) {
        return Move::leaf(score);
    }

    let mut best: Option<Move> = None;
    for index in 0..BOARD_SIZE {
        if !board.is_empty_at(index) {
            continue;
        }

        board.set(index, to_move.as_cell());
        let score = minimax_rec(board, to_move.opponent(), stats).score;
        board.set(index, Cell::Empty);

        let replace = match best {
            None => true,
            Some(current) => improves(to_move, score, current.score),
        };
        if replace {
            best = Some(Move {
                index: Some(index),
                score,
            });
        }
    }

    // terminal_score already covered the full board
    best.unwrap_or(Move::leaf(0))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub mark: Mark,
}

impl AiConfig {
    pub fn for_human(human: Mark) -> Self {
        Self {
            mark: human.opponent(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self { mark: Mark::O }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiDecision {
    pub mark: Mark,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<CellIndex>,
    pub score: i32,
    pub nodes: u64,
    pub duration_ms: u64,
}

pub struct AiAgent {
    config: AiConfig,
}

impl AiAgent {
    pub fn new(config: AiConfig) -> Self {
        Self { config }
    }

    pub fn mark(&self) -> Mark {
        self.config.mark
    }

    /// Searches `board` for `to_move`.
    ///
    /// A full board without a winner yields a decision with no index and
    /// score 0. A board that is already won, or on which `to_move` is
    /// already a mark ahead, is rejected.
    pub fn decide(&self, board: &Board, to_move: Mark) -> Result<AiDecision, RuleError> {
        board
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })?;
        if board.count(to_move) > board.count(to_move.opponent()) {
            return Err(RuleError::IntegrityViolation {
                error: IntegrityError::MoverOutOfTurn { mark: to_move },
            });
        }
        if outcome::winner(board).is_some() {
            return Err(RuleError::GameFinished);
        }

        let start = Stopwatch::start();
        let mut stats = SearchStats::default();
        let best = search_with_stats(board, to_move, &mut stats);
        let decision = AiDecision {
            mark: to_move,
            index: best.index,
            score: best.score,
            nodes: stats.nodes,
            duration_ms: start.elapsed_ms(),
        };

        match decision.index {
            Some(index) => utils::log(&format!(
                "AI {} -> {index} (score {}, {} nodes, {} ms)",
                decision.mark, decision.score, decision.nodes, decision.duration_ms
            )),
            None => utils::warn("AI asked to move on a full board"),
        }
        Ok(decision)
    }

    /// Decides the AI's move in a running game.
    pub fn decide_move(&self, state: &GameState) -> Result<AiDecision, RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if state.current != self.config.mark {
            return Err(RuleError::NotPlayerTurn {
                expected: state.current,
                actual: self.config.mark,
            });
        }
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })?;
        if state.board.is_full() {
            return Err(RuleError::NoMovesAvailable);
        }
        self.decide(&state.board, self.config.mark)
    }
}

impl Default for AiAgent {
    fn default() -> Self {
        Self::new(AiConfig::default())
    }
}
