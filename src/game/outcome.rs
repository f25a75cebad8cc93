//! 胜负与平局判定。
//!
//! 调用顺序约定：先判胜，再判平。满盘且成线的局面是胜局，不是平局。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::state::{Board, CellIndex, Mark, WINNING_LINES};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Outcome {
    Won { winner: Mark },
    Draw,
}

impl Outcome {
    /// End-of-game text from the point of view of the human player.
    pub fn banner(&self, human: Mark) -> &'static str {
        match self {
            Outcome::Draw => "Draw!",
            Outcome::Won { winner } if *winner == human => "You won!",
            Outcome::Won { .. } => "You lose!",
        }
    }
}

/// True iff `occupied` contains every index of at least one winning line.
pub fn completes_line(occupied: &BTreeSet<CellIndex>) -> bool {
    WINNING_LINES
        .iter()
        .any(|line| line.iter().all(|index| occupied.contains(index)))
}

pub fn has_won(board: &Board, mark: Mark) -> bool {
    let target = mark.as_cell();
    let cells = board.cells();
    WINNING_LINES
        .iter()
        .any(|line| line.iter().all(|&index| cells[index] == target))
}

pub fn winner(board: &Board) -> Option<Mark> {
    [Mark::O, Mark::X]
        .into_iter()
        .find(|mark| has_won(board, *mark))
}

pub fn is_draw(board: &Board) -> bool {
    board.is_full() && winner(board).is_none()
}

pub fn evaluate(board: &Board) -> Option<Outcome> {
    if let Some(winner) = winner(board) {
        return Some(Outcome::Won { winner });
    }
    if board.is_full() {
        return Some(Outcome::Draw);
    }
    None
}

/// Outcome right after `mover` placed a mark: the mover's win, then a full board.
pub fn evaluate_after_move(board: &Board, mover: Mark) -> Option<Outcome> {
    if has_won(board, mover) {
        Some(Outcome::Won { winner: mover })
    } else if board.is_full() {
        Some(Outcome::Draw)
    } else {
        None
    }
}
