use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::outcome::{self, Outcome};

/// 棋盘格子数。
pub const BOARD_SIZE: usize = 9;

/// 格子下标，按行优先从 0 到 8。
pub type CellIndex = usize;

/// 三行、三列、两条对角线。
pub const WINNING_LINES: [[CellIndex; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// 玩家记号，序列化为前端使用的 CSS 类名。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    /// CSS class name used by the page for this mark.
    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "x",
            Mark::O => "o",
        }
    }

    pub fn as_cell(self) -> Cell {
        match self {
            Mark::X => Cell::X,
            Mark::O => Cell::O,
        }
    }
}

impl Default for Mark {
    fn default() -> Self {
        Mark::X
    }
}

impl FromStr for Mark {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Mark::X),
            "o" => Ok(Mark::O),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Empty,
    X,
    O,
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}

impl Cell {
    fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::X => 'X',
            Cell::O => 'O',
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    TurnImbalance { x: u8, o: u8 },
    MoverOutOfTurn { mark: Mark },
    BothMarksWon,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BoardParseError {
    InvalidLength { len: usize },
    InvalidSymbol { symbol: char },
}

/// 3×3 棋盘快照。按值复制，搜索在私有副本上原地落子与撤销。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct Board {
    cells: [Cell; BOARD_SIZE],
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn cells(&self) -> &[Cell; BOARD_SIZE] {
        &self.cells
    }

    pub fn get(&self, index: CellIndex) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    pub fn is_empty_at(&self, index: CellIndex) -> bool {
        matches!(self.get(index), Some(Cell::Empty))
    }

    /// Overwrites one cell. Out-of-range indices are ignored.
    pub fn set(&mut self, index: CellIndex, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(index) {
            *slot = cell;
        }
    }

    pub fn empty_cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == Cell::Empty)
            .map(|(index, _)| index)
    }

    /// Indices held by `mark`, the input shape of the win test.
    pub fn occupied_by(&self, mark: Mark) -> std::collections::BTreeSet<CellIndex> {
        let target = mark.as_cell();
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == target)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn count(&self, mark: Mark) -> u8 {
        let target = mark.as_cell();
        self.cells.iter().filter(|cell| **cell == target).count() as u8
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| *cell != Cell::Empty)
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let x = self.count(Mark::X);
        let o = self.count(Mark::O);
        if x.abs_diff(o) > 1 {
            return Err(IntegrityError::TurnImbalance { x, o });
        }
        if outcome::has_won(self, Mark::X) && outcome::has_won(self, Mark::O) {
            return Err(IntegrityError::BothMarksWon);
        }
        Ok(())
    }
}

impl FromStr for Board {
    type Err = BoardParseError;

    /// Reads nine symbols (`X`, `O`, and `.`, `-` or `_` for empty), ignoring whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbols: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
        if symbols.len() != BOARD_SIZE {
            return Err(BoardParseError::InvalidLength { len: symbols.len() });
        }

        let mut cells = [Cell::Empty; BOARD_SIZE];
        for (slot, symbol) in cells.iter_mut().zip(symbols) {
            *slot = match symbol {
                'x' | 'X' => Cell::X,
                'o' | 'O' => Cell::O,
                '.' | '-' | '_' => Cell::Empty,
                other => return Err(BoardParseError::InvalidSymbol { symbol: other }),
            };
        }
        Ok(Self { cells })
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.cells.chunks(3).enumerate() {
            if row > 0 {
                writeln!(f)?;
            }
            for cell in chunk {
                write!(f, "{}", cell.symbol())?;
            }
        }
        Ok(())
    }
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    GameStarted { first: Mark },
    MarkPlaced { mark: Mark, index: CellIndex },
    TurnPassed { next: Mark },
    GameWon { winner: Mark },
    GameDrawn,
}

/// 一局游戏的完整状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    #[serde(default)]
    pub board: Board,
    pub current: Mark,
    #[serde(default)]
    pub human: Mark,
    pub turn: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl GameState {
    pub fn new(human: Mark, first: Mark) -> Self {
        Self {
            board: Board::empty(),
            current: first,
            human,
            turn: 1,
            event_log: Vec::new(),
            outcome: None,
        }
    }

    pub fn ai_mark(&self) -> Mark {
        self.human.opponent()
    }

    pub fn is_ai_turn(&self) -> bool {
        !self.is_finished() && self.current == self.ai_mark()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn pass_turn(&mut self) -> GameEvent {
        self.current = self.current.opponent();
        self.turn += 1;
        let event = GameEvent::TurnPassed { next: self.current };
        self.record_event(event.clone());
        event
    }

    pub fn declare_outcome(&mut self, outcome: Outcome) -> GameEvent {
        let event = match outcome {
            Outcome::Won { winner } => GameEvent::GameWon { winner },
            Outcome::Draw => GameEvent::GameDrawn,
        };
        if self.outcome.is_none() {
            self.record_event(event.clone());
            self.outcome = Some(outcome);
        }
        event
    }

    /// Board balance plus, while the game runs, that the mover is not ahead.
    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        self.board.integrity_check()?;
        if self.is_finished() {
            return Ok(());
        }
        let mover = self.board.count(self.current);
        let other = self.board.count(self.current.opponent());
        if mover > other {
            return Err(IntegrityError::MoverOutOfTurn { mark: self.current });
        }
        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(Mark::X, Mark::X)
    }
}
