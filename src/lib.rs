pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{search, AiAgent, AiConfig, AiDecision, Move, WIN_SCORE};
pub use game::{
    Board, BoardParseError, Cell, CellIndex, FirstPlayer, GameConfig, GameEvent, GameState,
    IntegrityError, Mark, Outcome, RuleEngine, RuleError, RuleResolution, WINNING_LINES,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(resolution: RuleResolution) -> Result<String, JsValue> {
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

fn parse_mark(value: &str) -> Result<Mark, JsValue> {
    Mark::from_str(value).map_err(|_| JsValue::from_str(&format!("unknown mark: {value}")))
}

fn log_outcome(state: &GameState) {
    if let Some(outcome) = state.outcome {
        utils::log(&format!("game over: {}", outcome.banner(state.human)));
    }
}

#[derive(Serialize)]
struct AiMoveResponse {
    decision: AiDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<RuleResolution>,
}

#[wasm_bindgen]
pub struct GameEngine {
    state: GameState,
    config: GameConfig,
    rules: RuleEngine,
    agent: AiAgent,
}

impl GameEngine {
    /// Starts a game; the AI opens at once when it moves first and `auto_play` is set.
    pub fn from_config(config: GameConfig) -> Result<GameEngine, RuleError> {
        let rules = RuleEngine::from_config(&config);
        let agent = AiAgent::new(AiConfig::for_human(config.human));
        let mut engine = GameEngine {
            state: GameState::default(),
            config,
            rules,
            agent,
        };
        engine.begin()?;
        Ok(engine)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Replaces the running game. The outcome is re-derived from the board and
    /// the human mark sticks for later restarts.
    pub fn load_state(&mut self, mut state: GameState) -> Result<(), RuleError> {
        state.outcome = game::evaluate(&state.board);
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })?;
        self.config.human = state.human;
        self.agent = AiAgent::new(AiConfig::for_human(state.human));
        self.state = state;
        Ok(())
    }

    fn begin(&mut self) -> Result<RuleResolution, RuleError> {
        let started = self.rules.start_game(&self.config);
        self.state = started.state;
        utils::log(&format!("new game, {} moves first", self.state.current));

        let mut events = started.events;
        if self.config.auto_play && self.state.is_ai_turn() {
            let (_, mut ai_events) = self.ai_turn()?;
            events.append(&mut ai_events);
        }
        Ok(RuleResolution::new(self.state.clone(), events))
    }

    fn ai_turn(&mut self) -> Result<(AiDecision, Vec<GameEvent>), RuleError> {
        let decision = self.agent.decide_move(&self.state)?;
        let index = decision.index.ok_or(RuleError::NoMovesAvailable)?;
        let events = RuleEngine::place_mark(&mut self.state, decision.mark, index)?;
        log_outcome(&self.state);
        Ok((decision, events))
    }

    fn human_turn(&mut self, index: CellIndex) -> Result<RuleResolution, RuleError> {
        let human = self.state.human;
        let mut events = RuleEngine::place_mark(&mut self.state, human, index)?;
        utils::log(&format!("{human} -> {index}"));
        log_outcome(&self.state);

        if self.config.auto_play && self.state.is_ai_turn() {
            let (_, mut ai_events) = self.ai_turn()?;
            events.append(&mut ai_events);
        }
        Ok(RuleResolution::new(self.state.clone(), events))
    }
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GameEngine, JsValue> {
        let config = if let Some(json) = config_json {
            serde_json::from_str(&json).map_err(serde_to_js_error)?
        } else {
            GameConfig::default()
        };
        GameEngine::from_config(config).map_err(to_js_error)
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
        self.load_state(state).map_err(to_js_error)
    }

    pub fn board_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state.board).map_err(serde_to_js_error)
    }

    pub fn current_mark(&self) -> String {
        self.state.current.as_str().to_string()
    }

    pub fn is_ai_turn(&self) -> bool {
        self.state.is_ai_turn()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// "Draw!", "You won!" or "You lose!" once the game is over.
    pub fn banner(&self) -> Option<String> {
        self.state
            .outcome
            .map(|outcome| outcome.banner(self.state.human).to_string())
    }

    pub fn play(&mut self, index: usize) -> Result<String, JsValue> {
        let resolution = self.human_turn(index).map_err(to_js_error)?;
        make_resolution_json(resolution)
    }

    pub fn apply_ai_move(&mut self) -> Result<String, JsValue> {
        let (decision, events) = self.ai_turn().map_err(to_js_error)?;
        let applied = Some(RuleResolution::new(self.state.clone(), events));
        let response = AiMoveResponse { decision, applied };
        serde_json::to_string(&response).map_err(serde_to_js_error)
    }

    /// Resolves to the AI decision JSON without touching the engine.
    pub fn think_ai(&self, delay_ms: Option<u32>) -> Promise {
        let state = self.state.clone();
        let mark = self.agent.mark();
        let delay = delay_ms.unwrap_or(self.config.think_delay_ms);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let agent = AiAgent::new(AiConfig { mark });
            let decision = agent.decide_move(&state).map_err(to_js_error)?;
            let json = serde_json::to_string(&decision).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }

    pub fn restart(&mut self) -> Result<String, JsValue> {
        let resolution = self.begin().map_err(to_js_error)?;
        make_resolution_json(resolution)
    }
}

/// 为给定棋盘计算最优落子，`mark` 缺省为 AI 的 `o`。
#[wasm_bindgen(js_name = "computeAiMove")]
pub fn compute_ai_move(board: JsValue, mark: Option<String>) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    let mark = match mark.as_deref() {
        Some(value) => parse_mark(value)?,
        None => Mark::O,
    };
    let agent = AiAgent::new(AiConfig { mark });
    let decision = agent.decide(&board, mark).map_err(to_js_error)?;
    to_value(&decision).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "checkWin")]
pub fn check_win(board: JsValue, mark: &str) -> Result<bool, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    let mark = parse_mark(mark)?;
    Ok(game::has_won(&board, mark))
}

#[wasm_bindgen(js_name = "isDraw")]
pub fn is_draw(board: JsValue) -> Result<bool, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    Ok(game::is_draw(&board))
}

/// 先判胜再判平，未结束时返回 `null`。
#[wasm_bindgen(js_name = "evaluateBoard")]
pub fn evaluate_board(board: JsValue) -> Result<JsValue, JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    to_value(&game::evaluate(&board)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateBoard")]
pub fn validate_board(board: JsValue) -> Result<(), JsValue> {
    let board: Board = from_value(board).map_err(JsValue::from)?;
    board
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}

#[wasm_bindgen(js_name = "parseBoard")]
pub fn parse_board(text: &str) -> Result<JsValue, JsValue> {
    let board: Board = text
        .parse()
        .map_err(|error: BoardParseError| to_value(&error).unwrap_or_else(JsValue::from))?;
    to_value(&board).map_err(JsValue::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(first_player: FirstPlayer, auto_play: bool) -> GameConfig {
        GameConfig {
            first_player,
            seed: Some(3),
            auto_play,
            ..GameConfig::default()
        }
    }

    #[test]
    fn ai_opens_when_it_moves_first() {
        let engine =
            GameEngine::from_config(config(FirstPlayer::Ai, true)).expect("game should start");
        let state = engine.state();
        assert_eq!(state.board.count(Mark::O), 1);
        assert_eq!(state.current, Mark::X);
        assert!(!state.is_ai_turn());
    }

    #[test]
    fn human_move_gets_an_answer() {
        let mut engine =
            GameEngine::from_config(config(FirstPlayer::Human, true)).expect("game should start");
        let resolution = engine.human_turn(4).expect("move should apply");
        let placed: Vec<&GameEvent> = resolution
            .events
            .iter()
            .filter(|event| matches!(event, GameEvent::MarkPlaced { .. }))
            .collect();
        assert_eq!(placed.len(), 2);
        assert_eq!(resolution.state.current, Mark::X);
        assert_eq!(resolution.state.turn, 3);
    }

    #[test]
    fn manual_mode_waits_for_ai_call() {
        let mut engine =
            GameEngine::from_config(config(FirstPlayer::Human, false)).expect("game should start");
        engine.human_turn(0).expect("move should apply");
        assert!(engine.state().is_ai_turn());
        assert_eq!(
            engine.human_turn(1).expect_err("not the human's turn"),
            RuleError::NotPlayerTurn {
                expected: Mark::O,
                actual: Mark::X
            }
        );

        let (decision, _) = engine.ai_turn().expect("AI should move");
        assert_eq!(decision.mark, Mark::O);
        assert!(!engine.state().is_ai_turn());
    }

    #[test]
    fn naive_human_never_beats_the_ai() {
        for first_player in [FirstPlayer::Human, FirstPlayer::Ai] {
            let mut engine =
                GameEngine::from_config(config(first_player, true)).expect("game should start");
            while !engine.state().is_finished() {
                let index = engine
                    .state()
                    .board
                    .empty_cells()
                    .next()
                    .expect("unfinished game has an empty cell");
                engine.human_turn(index).expect("move should apply");
            }
            let outcome = engine.state().outcome.expect("game should be over");
            assert_ne!(outcome, Outcome::Won { winner: Mark::X });
            assert_ne!(outcome.banner(Mark::X), "You won!");
        }
    }

    #[test]
    fn restart_clears_the_board() {
        let mut engine =
            GameEngine::from_config(config(FirstPlayer::Human, true)).expect("game should start");
        engine.human_turn(8).expect("move should apply");
        let resolution = engine.begin().expect("restart should succeed");
        assert_eq!(resolution.state.board, Board::empty());
        assert_eq!(resolution.state.turn, 1);
        assert!(resolution.outcome.is_none());
    }

    #[test]
    fn loaded_won_board_ends_the_game() {
        let mut engine =
            GameEngine::from_config(config(FirstPlayer::Human, true)).expect("game should start");
        let state: GameState = serde_json::from_str(
            r#"{"board":["x","x","x","o","o","empty","empty","empty","empty"],"current":"o","human":"o","turn":6}"#,
        )
        .expect("state should parse");
        engine.load_state(state).expect("won board should load");

        assert!(engine.state().is_finished());
        assert_eq!(engine.state().outcome, Some(Outcome::Won { winner: Mark::X }));
        assert_eq!(engine.state().outcome.map(|o| o.banner(Mark::O)), Some("You lose!"));
        assert_eq!(engine.human_turn(5).expect_err("game is over"), RuleError::GameFinished);

        let resolution = engine.begin().expect("restart should succeed");
        assert_eq!(resolution.state.human, Mark::O);
        assert_eq!(engine.agent.mark(), Mark::X);
    }

    #[test]
    fn loaded_state_drops_stale_outcome() {
        let mut engine =
            GameEngine::from_config(config(FirstPlayer::Human, false)).expect("game should start");
        let mut state = GameState::new(Mark::X, Mark::X);
        state.outcome = Some(Outcome::Draw);
        engine.load_state(state).expect("empty board should load");
        assert!(!engine.state().is_finished());
        engine.human_turn(4).expect("game should still be open");
    }

    #[test]
    fn loading_a_double_win_is_rejected() {
        let mut engine =
            GameEngine::from_config(config(FirstPlayer::Human, true)).expect("game should start");
        let mut state = GameState::new(Mark::X, Mark::X);
        state.board = "XXXOOO...".parse().expect("board should parse");
        assert_eq!(
            engine.load_state(state),
            Err(RuleError::IntegrityViolation {
                error: IntegrityError::BothMarksWon
            })
        );
        assert_eq!(engine.state().board, Board::empty());
    }
}
