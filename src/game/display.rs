use crate::game::api::Position;
use crate::game::mirror::{
    GameStatus, Mirror, CELL_EMPTY, CELL_ENEMY, CELL_MOLD, CELL_PEARL, CELL_PLAYER, CELL_WALL,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sprite {
    Player,
    Enemy,
    Pearl,
    Mold,
    Wall,
}

impl Sprite {
    pub fn for_code(code: u8) -> Option<Self> {
        match code {
            CELL_PLAYER => Some(Sprite::Player),
            CELL_ENEMY => Some(Sprite::Enemy),
            CELL_PEARL => Some(Sprite::Pearl),
            CELL_MOLD => Some(Sprite::Mold),
            CELL_WALL => Some(Sprite::Wall),
            _ => None,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Sprite::Player => '@',
            Sprite::Enemy => 'X',
            Sprite::Pearl => 'o',
            Sprite::Mold => '%',
            Sprite::Wall => '#',
        }
    }
}

/// Whatever actually shows cells to the player.
pub trait Surface {
    fn clear_cell(&mut self, row: usize, col: usize);
    fn place_sprite(&mut self, row: usize, col: usize, sprite: Sprite);
    fn place_letter(&mut self, row: usize, col: usize, letter: char);
    fn banner(&mut self, message: &str);
    fn status(&mut self, status: &GameStatus);
    /// Called after a batch of cell updates.
    fn flush(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RenderedCell {
    code: u8,
    letter: char,
}

/// Paints grids onto a surface, touching only cells whose rendered state
/// changed since the last paint.
pub struct Display<S: Surface> {
    surface: S,
    rendered: Vec<Vec<Option<RenderedCell>>>,
}

impl<S: Surface> Display<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            rendered: Vec::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Repaint from the mirror. Returns the number of cells redrawn.
    pub fn paint(&mut self, mirror: &Mirror) -> usize {
        let mut redrawn = 0;
        for row in mirror.rows()..self.rendered.len() {
            for col in 0..self.rendered[row].len() {
                self.surface.clear_cell(row, col);
                redrawn += 1;
            }
        }
        self.rendered.resize(mirror.rows(), Vec::new());
        for (row, codes) in mirror.game_map.iter().enumerate() {
            let rendered_row = &mut self.rendered[row];
            // Cells beyond the new width are cleared.
            for col in codes.len()..rendered_row.len() {
                self.surface.clear_cell(row, col);
                redrawn += 1;
            }
            rendered_row.resize(codes.len(), None);
            for (col, code) in codes.iter().enumerate() {
                let cell = RenderedCell {
                    code: *code,
                    letter: mirror.letter(row, col),
                };
                if rendered_row[col] != Some(cell) {
                    draw(&mut self.surface, row, col, cell);
                    rendered_row[col] = Some(cell);
                    redrawn += 1;
                }
            }
        }
        self.surface.flush();
        redrawn
    }

    /// Move the player sprite ahead of server confirmation.
    pub fn paint_prediction(&mut self, mirror: &Mirror, from: Position, to: Position) {
        self.set_code(mirror, from, CELL_EMPTY);
        self.set_code(mirror, to, CELL_PLAYER);
        self.surface.flush();
    }

    fn set_code(&mut self, mirror: &Mirror, pos: Position, code: u8) {
        let letter = mirror.letter(pos.row, pos.col);
        let Some(slot) = self
            .rendered
            .get_mut(pos.row)
            .and_then(|r| r.get_mut(pos.col))
        else {
            return;
        };
        let cell = RenderedCell { code, letter };
        if *slot != Some(cell) {
            draw(&mut self.surface, pos.row, pos.col, cell);
            *slot = Some(cell);
        }
    }

    /// Remove every rendered player sprite that is not at `authoritative`.
    /// Rapid prediction paints racing server paints can leave strays.
    pub fn sweep_orphans(&mut self, authoritative: Position) -> usize {
        let mut removed = 0;
        for (row, cells) in self.rendered.iter_mut().enumerate() {
            for (col, slot) in cells.iter_mut().enumerate() {
                let Some(cell) = slot else { continue };
                if cell.code == CELL_PLAYER && Position::new(row, col) != authoritative {
                    let cleared = RenderedCell {
                        code: CELL_EMPTY,
                        letter: cell.letter,
                    };
                    draw(&mut self.surface, row, col, cleared);
                    *slot = Some(cleared);
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            self.surface.flush();
        }
        removed
    }

    /// Positions currently showing a player sprite.
    pub fn player_sprites(&self) -> Vec<Position> {
        let mut found = Vec::new();
        for (row, cells) in self.rendered.iter().enumerate() {
            for (col, slot) in cells.iter().enumerate() {
                if matches!(slot, Some(cell) if cell.code == CELL_PLAYER) {
                    found.push(Position::new(row, col));
                }
            }
        }
        found
    }

    pub fn banner(&mut self, message: &str) {
        self.surface.banner(message);
        self.surface.flush();
    }

    pub fn status(&mut self, status: &GameStatus) {
        self.surface.status(status);
    }
}

fn draw<S: Surface>(surface: &mut S, row: usize, col: usize, cell: RenderedCell) {
    surface.clear_cell(row, col);
    match Sprite::for_code(cell.code) {
        Some(sprite) => surface.place_sprite(row, col, sprite),
        None => surface.place_letter(row, col, cell.letter),
    }
}

// ── In-memory surface ───────────────────────────────────────────────────────

/// Character buffer surface for headless runs.
#[derive(Clone, Debug, Default)]
pub struct BufferSurface {
    cells: Vec<Vec<char>>,
    pub banners: Vec<String>,
    pub last_status: Option<GameStatus>,
    /// Total clear operations, a proxy for DOM churn.
    pub clears: usize,
}

impl BufferSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn glyph_at(&self, row: usize, col: usize) -> Option<char> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Rows joined by newlines, trailing blanks trimmed.
    pub fn render(&self) -> String {
        self.cells
            .iter()
            .map(|r| r.iter().collect::<String>().trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn slot(&mut self, row: usize, col: usize) -> &mut char {
        if self.cells.len() <= row {
            self.cells.resize(row + 1, Vec::new());
        }
        let cells = &mut self.cells[row];
        if cells.len() <= col {
            cells.resize(col + 1, ' ');
        }
        &mut cells[col]
    }
}

impl Surface for BufferSurface {
    fn clear_cell(&mut self, row: usize, col: usize) {
        *self.slot(row, col) = ' ';
        self.clears += 1;
    }

    fn place_sprite(&mut self, row: usize, col: usize, sprite: Sprite) {
        *self.slot(row, col) = sprite.glyph();
    }

    fn place_letter(&mut self, row: usize, col: usize, letter: char) {
        *self.slot(row, col) = letter;
    }

    fn banner(&mut self, message: &str) {
        self.banners.push(message.to_string());
    }

    fn status(&mut self, status: &GameStatus) {
        self.last_status = Some(status.clone());
    }
}
