use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{
    outcome::{self, Outcome},
    state::{CellIndex, GameEvent, GameState, IntegrityError, Mark, BOARD_SIZE},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FirstPlayer {
    Random,
    Human,
    Ai,
}

impl Default for FirstPlayer {
    fn default() -> Self {
        FirstPlayer::Random
    }
}

/// 对局配置，前端以 JSON 传入，缺省字段取默认值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    pub human: Mark,
    pub first_player: FirstPlayer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// AI answers in the same call once the turn passes to it.
    pub auto_play: bool,
    pub think_delay_ms: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            human: Mark::X,
            first_player: FirstPlayer::Random,
            seed: None,
            auto_play: true,
            think_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    GameFinished,
    NotPlayerTurn { expected: Mark, actual: Mark },
    CellOutOfRange { index: CellIndex },
    CellOccupied { index: CellIndex },
    NoMovesAvailable,
    IntegrityViolation { error: IntegrityError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>) -> Self {
        let outcome = state.outcome;
        Self {
            state,
            events,
            outcome,
        }
    }
}

pub struct RuleEngine {
    rng: SmallRng,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        match config.seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn choose_first(&mut self, config: &GameConfig) -> Mark {
        match config.first_player {
            FirstPlayer::Human => config.human,
            FirstPlayer::Ai => config.human.opponent(),
            FirstPlayer::Random => {
                if self.rng.gen_bool(0.5) {
                    config.human.opponent()
                } else {
                    config.human
                }
            }
        }
    }

    /// Fresh board, first mover per `config`. Also used for restart.
    pub fn start_game(&mut self, config: &GameConfig) -> RuleResolution {
        let first = self.choose_first(config);
        let mut state = GameState::new(config.human, first);
        let event = GameEvent::GameStarted { first };
        state.record_event(event.clone());
        RuleResolution::new(state, vec![event])
    }

    pub fn place_mark(
        state: &mut GameState,
        mark: Mark,
        index: CellIndex,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        Self::ensure_integrity(state)?;
        if state.current != mark {
            return Err(RuleError::NotPlayerTurn {
                expected: state.current,
                actual: mark,
            });
        }
        if index >= BOARD_SIZE {
            return Err(RuleError::CellOutOfRange { index });
        }
        if !state.board.is_empty_at(index) {
            return Err(RuleError::CellOccupied { index });
        }

        let mut events = Vec::new();
        state.board.set(index, mark.as_cell());
        let placed = GameEvent::MarkPlaced { mark, index };
        state.record_event(placed.clone());
        events.push(placed);

        // 先判胜再判平
        match outcome::evaluate_after_move(&state.board, mark) {
            Some(result) => events.push(state.declare_outcome(result)),
            None => events.push(state.pass_turn()),
        }

        Ok(events)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Board, Cell};

    fn state_from(board: &str, current: Mark) -> GameState {
        let mut state = GameState::new(Mark::X, current);
        state.board = board.parse().expect("board should parse");
        state
    }

    #[test]
    fn placement_passes_turn() {
        let mut state = GameState::new(Mark::X, Mark::X);
        let events = RuleEngine::place_mark(&mut state, Mark::X, 4).expect("move should apply");
        assert_eq!(state.board.get(4), Some(Cell::X));
        assert_eq!(state.current, Mark::O);
        assert_eq!(state.turn, 2);
        assert_eq!(
            events,
            vec![
                GameEvent::MarkPlaced {
                    mark: Mark::X,
                    index: 4
                },
                GameEvent::TurnPassed { next: Mark::O },
            ]
        );
    }

    #[test]
    fn occupied_cell_is_rejected() {
        let mut state = state_from("X........", Mark::O);
        let error = RuleEngine::place_mark(&mut state, Mark::O, 0).expect_err("cell is taken");
        assert_eq!(error, RuleError::CellOccupied { index: 0 });
        assert_eq!(state.current, Mark::O, "failed move must not swap turns");
    }

    #[test]
    fn wrong_mover_and_bad_index_are_rejected() {
        let mut state = GameState::new(Mark::X, Mark::X);
        assert_eq!(
            RuleEngine::place_mark(&mut state, Mark::O, 0),
            Err(RuleError::NotPlayerTurn {
                expected: Mark::X,
                actual: Mark::O
            })
        );
        assert_eq!(
            RuleEngine::place_mark(&mut state, Mark::X, 9),
            Err(RuleError::CellOutOfRange { index: 9 })
        );
    }

    #[test]
    fn winning_move_ends_game_without_turn_pass() {
        let mut state = state_from("XX.OO....", Mark::X);
        let events = RuleEngine::place_mark(&mut state, Mark::X, 2).expect("move should apply");
        assert_eq!(state.outcome, Some(Outcome::Won { winner: Mark::X }));
        assert_eq!(state.current, Mark::X);
        assert_eq!(events.last(), Some(&GameEvent::GameWon { winner: Mark::X }));
        assert_eq!(
            RuleEngine::place_mark(&mut state, Mark::O, 5),
            Err(RuleError::GameFinished)
        );
    }

    #[test]
    fn win_on_last_cell_beats_draw() {
        // X completes the left column on the ninth placement.
        let mut state = state_from("XOX.OOXXO", Mark::X);
        RuleEngine::place_mark(&mut state, Mark::X, 3).expect("move should apply");
        assert!(state.board.is_full());
        assert_eq!(state.outcome, Some(Outcome::Won { winner: Mark::X }));
    }

    #[test]
    fn full_board_without_line_is_drawn() {
        let mut state = state_from("XOXXOOOX.", Mark::X);
        let events = RuleEngine::place_mark(&mut state, Mark::X, 8).expect("move should apply");
        assert_eq!(state.outcome, Some(Outcome::Draw));
        assert_eq!(events.last(), Some(&GameEvent::GameDrawn));
    }

    #[test]
    fn seeded_start_is_reproducible() {
        let config = GameConfig {
            seed: Some(7),
            ..GameConfig::default()
        };
        let first_a = RuleEngine::from_config(&config).start_game(&config).state.current;
        let first_b = RuleEngine::from_config(&config).start_game(&config).state.current;
        assert_eq!(first_a, first_b);
    }

    #[test]
    fn random_start_picks_both_sides_eventually() {
        let config = GameConfig::default();
        let mut engine = RuleEngine::with_seed(42);
        let firsts: Vec<Mark> = (0..64)
            .map(|_| engine.start_game(&config).state.current)
            .collect();
        assert!(firsts.contains(&Mark::X));
        assert!(firsts.contains(&Mark::O));
    }

    #[test]
    fn fixed_first_player_is_respected() {
        let config = GameConfig {
            first_player: FirstPlayer::Ai,
            ..GameConfig::default()
        };
        let resolution = RuleEngine::with_seed(1).start_game(&config);
        assert_eq!(resolution.state.current, Mark::O);
        assert_eq!(resolution.state.board, Board::empty());
        assert_eq!(resolution.events, vec![GameEvent::GameStarted { first: Mark::O }]);
    }

    #[test]
    fn config_fills_missing_fields() {
        let config: GameConfig =
            serde_json::from_str(r#"{"first_player":"human"}"#).expect("config should parse");
        assert_eq!(config.first_player, FirstPlayer::Human);
        assert_eq!(config.human, Mark::X);
        assert!(config.auto_play);
    }
}
