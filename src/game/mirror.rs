use tracing::warn;

use crate::game::api::{Position, ServerSnapshot};

// ── Cell codes ──────────────────────────────────────────────────────────────

pub const CELL_EMPTY: u8 = 0;
pub const CELL_PLAYER: u8 = 1;
pub const CELL_ENEMY: u8 = 2;
pub const CELL_PEARL: u8 = 3;
pub const CELL_MOLD: u8 = 4;
pub const CELL_WALL: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    Empty,
    Player,
    Enemy,
    Pearl,
    Mold,
    Wall,
    Unknown(u8),
}

impl CellKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            CELL_EMPTY => CellKind::Empty,
            CELL_PLAYER => CellKind::Player,
            CELL_ENEMY => CellKind::Enemy,
            CELL_PEARL => CellKind::Pearl,
            CELL_MOLD => CellKind::Mold,
            CELL_WALL => CellKind::Wall,
            other => CellKind::Unknown(other),
        }
    }

    /// Cells the predictor refuses to walk into. Codes we don't know are
    /// left for the server to judge.
    pub fn is_obstacle(self) -> bool {
        matches!(self, CellKind::Wall | CellKind::Unknown(_))
    }
}

// ── State ───────────────────────────────────────────────────────────────────

/// Non-positional game fields carried alongside the map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameStatus {
    pub score: i64,
    pub pearl_collected: bool,
    pub completed: bool,
    pub failed: bool,
}

impl GameStatus {
    /// Overwrite only the fields the server actually sent.
    pub fn merge(&mut self, snapshot: &ServerSnapshot) {
        if let Some(score) = snapshot.score {
            self.score = score;
        }
        if let Some(pearl) = snapshot.pearl_collected {
            self.pearl_collected = pearl;
        }
        if let Some(completed) = snapshot.is_completed {
            self.completed = completed;
        }
        if let Some(failed) = snapshot.game_failed {
            self.failed = failed;
        }
    }
}

/// Everything needed to seed a mirror, produced by an initial state provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InitialState {
    pub position: Position,
    pub preferred_column: Option<usize>,
    pub game_map: Vec<Vec<u8>>,
    pub text_grid: Vec<Vec<char>>,
    pub status: GameStatus,
}

/// The client's local best-guess copy of server state. Overwritten by every
/// server response and never persisted.
#[derive(Clone, Debug, Default)]
pub struct Mirror {
    pub row: usize,
    pub col: usize,
    pub preferred_column: usize,
    pub game_map: Vec<Vec<u8>>,
    pub text_grid: Vec<Vec<char>>,
    pub status: GameStatus,
    pub initialized: bool,
}

impl Mirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, state: InitialState) {
        self.game_map = state.game_map;
        self.text_grid = state.text_grid;
        self.settle_position(Some(state.position));
        self.preferred_column = state.preferred_column.unwrap_or(self.col);
        self.status = state.status;
        self.initialized = true;
        self.normalize_player();
    }

    /// Apply an authoritative server snapshot. Grids are cloned so the mirror
    /// never aliases the response. The preferred column is sticky: it only
    /// changes when the server sends one.
    pub fn update(&mut self, snapshot: &ServerSnapshot) {
        if let Some(map) = &snapshot.game_map {
            self.game_map = map.clone();
        }
        if let Some(text) = &snapshot.text_grid {
            self.text_grid = text.clone();
        }
        if snapshot.player_pos.is_some() || snapshot.game_map.is_some() {
            self.settle_position(snapshot.player_pos);
        }
        if let Some(preferred) = snapshot.preferred_column {
            self.preferred_column = preferred;
        }
        self.status.merge(snapshot);
        self.normalize_player();
    }

    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }

    pub fn rows(&self) -> usize {
        self.game_map.len()
    }

    pub fn row_width(&self, row: usize) -> usize {
        self.game_map.get(row).map_or(0, |r| r.len())
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<CellKind> {
        self.game_map
            .get(row)
            .and_then(|r| r.get(col))
            .map(|code| CellKind::from_code(*code))
    }

    /// Letter under a cell; cells outside the text grid read as blank.
    pub fn letter(&self, row: usize, col: usize) -> char {
        self.text_grid
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(' ')
    }

    pub fn is_open(&self, row: usize, col: usize) -> bool {
        matches!(self.cell(row, col), Some(kind) if !kind.is_obstacle())
    }

    fn find_player(&self) -> Option<Position> {
        self.player_cells().into_iter().next()
    }

    pub fn player_cells(&self) -> Vec<Position> {
        let mut cells = Vec::new();
        for (r, row) in self.game_map.iter().enumerate() {
            for (c, code) in row.iter().enumerate() {
                if *code == CELL_PLAYER {
                    cells.push(Position::new(r, c));
                }
            }
        }
        cells
    }

    /// Pick the first position that lies on the map: the reported one, the
    /// player code in the map, the previous one, then the previous one
    /// clamped into the grid.
    fn settle_position(&mut self, reported: Option<Position>) {
        let previous = self.position();
        let found = [reported, self.find_player(), Some(previous)]
            .into_iter()
            .flatten()
            .find(|p| self.cell(p.row, p.col).is_some())
            .or_else(|| self.clamped(previous));
        if let Some(pos) = reported.filter(|p| Some(*p) != found) {
            warn!(row = pos.row, col = pos.col, "server position is off the map");
        }
        if let Some(pos) = found {
            self.row = pos.row;
            self.col = pos.col;
        }
    }

    fn clamped(&self, pos: Position) -> Option<Position> {
        let row = pos.row.min(self.rows().checked_sub(1)?);
        let col = pos.col.min(self.row_width(row).checked_sub(1)?);
        Some(Position::new(row, col))
    }

    /// Keep exactly one player code, at `(row, col)`.
    fn normalize_player(&mut self) {
        for row in self.game_map.iter_mut() {
            for code in row.iter_mut() {
                if *code == CELL_PLAYER {
                    *code = CELL_EMPTY;
                }
            }
        }
        if let Some(code) = self
            .game_map
            .get_mut(self.row)
            .and_then(|r| r.get_mut(self.col))
        {
            *code = CELL_PLAYER;
        }
    }
}
