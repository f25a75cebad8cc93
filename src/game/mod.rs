//! 游戏核心逻辑模块（棋盘、胜负判定、规则引擎）。

pub mod outcome;
pub mod rules;
pub mod state;

pub use outcome::{
    completes_line,
    evaluate,
    evaluate_after_move,
    has_won,
    is_draw,
    winner,
    Outcome,
};
pub use rules::{FirstPlayer, GameConfig, RuleEngine, RuleError, RuleResolution};
pub use state::{
    Board,
    BoardParseError,
    Cell,
    CellIndex,
    GameEvent,
    GameState,
    IntegrityError,
    Mark,
    BOARD_SIZE,
    WINNING_LINES,
};
