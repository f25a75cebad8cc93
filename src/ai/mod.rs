//! AI 算法模块（穷举极小化极大搜索）。

pub mod minimax;

pub use minimax::{search, search_with_stats, AiAgent, AiConfig, AiDecision, Move, SearchStats, WIN_SCORE};
