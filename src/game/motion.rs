//! Client-side movement prediction.
//!
//! `predict` mirrors the server's vim motion rules over the text grid so a
//! move can be painted before the server confirms it. It never mutates the
//! mirror.

use crate::game::api::{MoveRequest, Position};
use crate::game::mirror::Mirror;

/// Counts above this are clamped.
pub const MAX_COUNT: u32 = 999;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FindKind {
    /// `f`
    Forward,
    /// `F`
    Backward,
    /// `t`
    TillForward,
    /// `T`
    TillBackward,
}

impl FindKind {
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'f' => Some(FindKind::Forward),
            'F' => Some(FindKind::Backward),
            't' => Some(FindKind::TillForward),
            'T' => Some(FindKind::TillBackward),
            _ => None,
        }
    }

    pub fn key(self) -> char {
        match self {
            FindKind::Forward => 'f',
            FindKind::Backward => 'F',
            FindKind::TillForward => 't',
            FindKind::TillBackward => 'T',
        }
    }

    /// Direction used by `,`.
    pub fn reversed(self) -> Self {
        match self {
            FindKind::Forward => FindKind::Backward,
            FindKind::Backward => FindKind::Forward,
            FindKind::TillForward => FindKind::TillBackward,
            FindKind::TillBackward => FindKind::TillForward,
        }
    }

    fn is_forward(self) -> bool {
        matches!(self, FindKind::Forward | FindKind::TillForward)
    }

    fn is_till(self) -> bool {
        matches!(self, FindKind::TillForward | FindKind::TillBackward)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    WordForward { big: bool },
    WordBackward { big: bool },
    WordEnd { big: bool },
    WordEndBackward { big: bool },
    LineStart,
    FirstNonBlank,
    LineEnd,
    LastNonBlank,
    FileStart,
    FileEnd,
    Find { kind: FindKind, target: char },
}

impl Motion {
    /// The `direction` string the server expects for this motion.
    pub fn token(&self) -> String {
        let fixed = match self {
            Motion::Left => "h",
            Motion::Right => "l",
            Motion::Up => "k",
            Motion::Down => "j",
            Motion::WordForward { big: false } => "w",
            Motion::WordForward { big: true } => "W",
            Motion::WordBackward { big: false } => "b",
            Motion::WordBackward { big: true } => "B",
            Motion::WordEnd { big: false } => "e",
            Motion::WordEnd { big: true } => "E",
            Motion::WordEndBackward { big: false } => "ge",
            Motion::WordEndBackward { big: true } => "gE",
            Motion::LineStart => "0",
            Motion::FirstNonBlank => "^",
            Motion::LineEnd => "$",
            Motion::LastNonBlank => "g_",
            Motion::FileStart => "gg",
            Motion::FileEnd => "G",
            Motion::Find { kind, target } => return format!("{}{}", kind.key(), target),
        };
        fixed.to_string()
    }
}

/// One movement intent: a motion plus its repeat count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveIntent {
    pub motion: Motion,
    pub count: u32,
    pub explicit_count: bool,
}

impl MoveIntent {
    pub fn new(motion: Motion) -> Self {
        Self {
            motion,
            count: 1,
            explicit_count: false,
        }
    }

    pub fn with_count(motion: Motion, count: u32) -> Self {
        Self {
            motion,
            count: count.clamp(1, MAX_COUNT),
            explicit_count: true,
        }
    }

    pub fn request(&self) -> MoveRequest {
        MoveRequest {
            direction: self.motion.token(),
            count: self.count,
            has_explicit_count: self.explicit_count,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinalPosition {
    pub row: usize,
    pub col: usize,
    pub preferred_column: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prediction {
    Moved(FinalPosition),
    /// Edge, obstacle, failed search, or no displacement. The server decides.
    Blocked,
}

impl Prediction {
    pub fn position(&self) -> Option<Position> {
        match self {
            Prediction::Moved(p) => Some(Position::new(p.row, p.col)),
            Prediction::Blocked => None,
        }
    }
}

/// Compute where `intent` would take the player, without touching `mirror`.
pub fn predict(mirror: &Mirror, intent: &MoveIntent) -> Prediction {
    if !mirror.initialized || mirror.rows() == 0 {
        return Prediction::Blocked;
    }
    let count = intent.count.clamp(1, MAX_COUNT) as usize;

    let target = match intent.motion {
        Motion::Up => return step_vertical(mirror, false, count),
        Motion::Down => return step_vertical(mirror, true, count),
        Motion::Left => step_horizontal(mirror, false, count),
        Motion::Right => step_horizontal(mirror, true, count),
        Motion::WordForward { big } => {
            Flat::new(mirror).repeat(count, |flat, i| flat.word_forward(i, big))
        }
        Motion::WordBackward { big } => {
            Flat::new(mirror).repeat(count, |flat, i| flat.word_backward(i, big))
        }
        Motion::WordEnd { big } => {
            Flat::new(mirror).repeat(count, |flat, i| flat.word_end(i, big))
        }
        Motion::WordEndBackward { big } => {
            Flat::new(mirror).repeat(count, |flat, i| flat.word_end_backward(i, big))
        }
        Motion::LineStart => Some((mirror.row, 0)),
        Motion::FirstNonBlank => Some((mirror.row, first_non_blank(mirror, mirror.row))),
        Motion::LineEnd => {
            let row = (mirror.row + count - 1).min(mirror.rows() - 1);
            mirror.row_width(row).checked_sub(1).map(|col| (row, col))
        }
        Motion::LastNonBlank => {
            let row = (mirror.row + count - 1).min(mirror.rows() - 1);
            Some((row, last_non_blank(mirror, row)))
        }
        Motion::FileStart => {
            let row = if intent.explicit_count {
                (count - 1).min(mirror.rows() - 1)
            } else {
                0
            };
            Some((row, first_non_blank(mirror, row)))
        }
        Motion::FileEnd => {
            let row = if intent.explicit_count {
                (count - 1).min(mirror.rows() - 1)
            } else {
                mirror.rows() - 1
            };
            Some((row, first_non_blank(mirror, row)))
        }
        Motion::Find { kind, target } => {
            find_in_row(mirror, kind, target, count).map(|col| (mirror.row, col))
        }
    };

    match target {
        Some((row, col)) if (row, col) != (mirror.row, mirror.col) && mirror.is_open(row, col) => {
            Prediction::Moved(FinalPosition {
                row,
                col,
                preferred_column: col,
            })
        }
        _ => Prediction::Blocked,
    }
}

// ── Line motions ────────────────────────────────────────────────────────────

/// Walk `count` cells, stopping at the row edge. Any obstacle on the way
/// blocks the whole move.
fn step_horizontal(mirror: &Mirror, forward: bool, count: usize) -> Option<(usize, usize)> {
    let width = mirror.row_width(mirror.row);
    let mut col = mirror.col;
    for _ in 0..count {
        let next = if forward {
            if col + 1 >= width {
                break;
            }
            col + 1
        } else {
            match col.checked_sub(1) {
                Some(n) => n,
                None => break,
            }
        };
        if !mirror.is_open(mirror.row, next) {
            return None;
        }
        col = next;
    }
    Some((mirror.row, col))
}

fn column_for(mirror: &Mirror, row: usize) -> Option<usize> {
    let width = mirror.row_width(row);
    if width == 0 {
        return None;
    }
    Some(mirror.preferred_column.min(width - 1))
}

fn step_vertical(mirror: &Mirror, forward: bool, count: usize) -> Prediction {
    let mut row = mirror.row;
    for _ in 0..count {
        let next = if forward {
            if row + 1 >= mirror.rows() {
                break;
            }
            row + 1
        } else {
            match row.checked_sub(1) {
                Some(n) => n,
                None => break,
            }
        };
        match column_for(mirror, next) {
            Some(col) if mirror.is_open(next, col) => row = next,
            _ => return Prediction::Blocked,
        }
    }
    match column_for(mirror, row) {
        Some(col) if row != mirror.row => Prediction::Moved(FinalPosition {
            row,
            col,
            preferred_column: mirror.preferred_column,
        }),
        _ => Prediction::Blocked,
    }
}

fn first_non_blank(mirror: &Mirror, row: usize) -> usize {
    (0..mirror.row_width(row))
        .find(|&c| !mirror.letter(row, c).is_whitespace())
        .unwrap_or(0)
}

fn last_non_blank(mirror: &Mirror, row: usize) -> usize {
    (0..mirror.row_width(row))
        .rev()
        .find(|&c| !mirror.letter(row, c).is_whitespace())
        .unwrap_or(0)
}

fn find_in_row(mirror: &Mirror, kind: FindKind, target: char, count: usize) -> Option<usize> {
    let row = mirror.row;
    let col = mirror.col;
    let mut seen = 0;
    if kind.is_forward() {
        for c in col + 1..mirror.row_width(row) {
            if mirror.letter(row, c) == target {
                seen += 1;
                if seen == count {
                    return Some(if kind.is_till() { c - 1 } else { c });
                }
            }
        }
    } else {
        for c in (0..col).rev() {
            if mirror.letter(row, c) == target {
                seen += 1;
                if seen == count {
                    return Some(if kind.is_till() { c + 1 } else { c });
                }
            }
        }
    }
    None
}

// ── Word motions ────────────────────────────────────────────────────────────

const CLASS_BLANK: u8 = 0;
const CLASS_PUNCT: u8 = 1;
const CLASS_WORD: u8 = 2;

fn char_class(ch: char, big: bool) -> u8 {
    if ch.is_whitespace() {
        CLASS_BLANK
    } else if big || !(ch.is_alphanumeric() || ch == '_') {
        // Every non-blank is one class for WORD motions.
        CLASS_PUNCT
    } else {
        CLASS_WORD
    }
}

/// The text grid read in row-major order, with `None` standing for a line
/// break between rows.
struct Flat<'a> {
    mirror: &'a Mirror,
    cells: Vec<Option<(usize, usize)>>,
    start: Option<usize>,
}

impl<'a> Flat<'a> {
    fn new(mirror: &'a Mirror) -> Self {
        let mut cells = Vec::new();
        let mut start = None;
        for row in 0..mirror.rows() {
            if row > 0 {
                cells.push(None);
            }
            for col in 0..mirror.row_width(row) {
                if (row, col) == (mirror.row, mirror.col) {
                    start = Some(cells.len());
                }
                cells.push(Some((row, col)));
            }
        }
        Self {
            mirror,
            cells,
            start,
        }
    }

    fn class(&self, i: usize, big: bool) -> u8 {
        match self.cells.get(i).copied().flatten() {
            Some((r, c)) => char_class(self.mirror.letter(r, c), big),
            None => CLASS_BLANK,
        }
    }

    fn last(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }

    /// Apply `step` `count` times, stopping early once it stops moving.
    fn repeat(&self, count: usize, step: impl Fn(&Self, usize) -> usize) -> Option<(usize, usize)> {
        let mut i = self.start?;
        for _ in 0..count {
            let next = step(self, i);
            if next == i {
                break;
            }
            i = next;
        }
        self.position_at(i)
    }

    /// Nearest real cell at or after `i`, falling back to before it.
    fn position_at(&self, i: usize) -> Option<(usize, usize)> {
        self.cells[i..]
            .iter()
            .chain(self.cells[..i].iter().rev())
            .find_map(|cell| *cell)
    }

    fn word_forward(&self, mut i: usize, big: bool) -> usize {
        let n = self.cells.len();
        let cls = self.class(i, big);
        if cls != CLASS_BLANK {
            while i < n && self.class(i, big) == cls {
                i += 1;
            }
        }
        while i < n && self.class(i, big) == CLASS_BLANK {
            i += 1;
        }
        i.min(self.last())
    }

    fn word_end(&self, mut i: usize, big: bool) -> usize {
        let n = self.cells.len();
        if i + 1 >= n {
            return i;
        }
        i += 1;
        while i < n && self.class(i, big) == CLASS_BLANK {
            i += 1;
        }
        if i >= n {
            return self.last();
        }
        let cls = self.class(i, big);
        while i + 1 < n && self.class(i + 1, big) == cls {
            i += 1;
        }
        i
    }

    fn word_backward(&self, mut i: usize, big: bool) -> usize {
        if i == 0 {
            return 0;
        }
        i -= 1;
        while i > 0 && self.class(i, big) == CLASS_BLANK {
            i -= 1;
        }
        let cls = self.class(i, big);
        while i > 0 && self.class(i - 1, big) == cls {
            i -= 1;
        }
        i
    }

    fn word_end_backward(&self, mut i: usize, big: bool) -> usize {
        let cls = self.class(i, big);
        if cls != CLASS_BLANK {
            while i > 0 && self.class(i, big) == cls {
                i -= 1;
            }
        }
        while i > 0 && self.class(i, big) == CLASS_BLANK {
            i -= 1;
        }
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::api::Position;
    use crate::game::mirror::{GameStatus, InitialState, CELL_WALL};

    fn mirror_from_text(lines: &[&str], pos: (usize, usize)) -> Mirror {
        let text_grid: Vec<Vec<char>> = lines.iter().map(|l| l.chars().collect()).collect();
        let game_map = text_grid.iter().map(|r| vec![0u8; r.len()]).collect();
        let mut mirror = Mirror::new();
        mirror.initialize(InitialState {
            position: Position::new(pos.0, pos.1),
            preferred_column: None,
            game_map,
            text_grid,
            status: GameStatus::default(),
        });
        mirror
    }

    fn open_grid(pos: (usize, usize)) -> Mirror {
        mirror_from_text(&["abcde"; 5], pos)
    }

    fn moved_to(prediction: Prediction) -> (usize, usize) {
        match prediction {
            Prediction::Moved(p) => (p.row, p.col),
            Prediction::Blocked => panic!("expected a move"),
        }
    }

    #[test]
    fn test_single_step_right() {
        let mirror = open_grid((2, 2));
        let p = predict(&mirror, &MoveIntent::new(Motion::Right));
        assert_eq!(moved_to(p), (2, 3));
        // The mirror is untouched.
        assert_eq!(mirror.position(), Position::new(2, 2));
    }

    #[test]
    fn test_count_advances_exactly() {
        for (motion, expected) in [
            (Motion::Right, (2, 4)),
            (Motion::Left, (2, 0)),
            (Motion::Down, (4, 2)),
            (Motion::Up, (0, 2)),
        ] {
            let mirror = open_grid((2, 2));
            let p = predict(&mirror, &MoveIntent::with_count(motion, 2));
            assert_eq!(moved_to(p), expected, "{motion:?}");
        }
    }

    #[test]
    fn test_count_clamps_at_edges() {
        let mirror = open_grid((2, 2));
        let p = predict(&mirror, &MoveIntent::with_count(Motion::Right, 40));
        assert_eq!(moved_to(p), (2, 4));
        let p = predict(&mirror, &MoveIntent::with_count(Motion::Up, 40));
        assert_eq!(moved_to(p), (0, 2));
    }

    #[test]
    fn test_edge_without_displacement_is_blocked() {
        let mirror = open_grid((0, 0));
        assert_eq!(predict(&mirror, &MoveIntent::new(Motion::Left)), Prediction::Blocked);
        assert_eq!(predict(&mirror, &MoveIntent::new(Motion::Up)), Prediction::Blocked);
    }

    #[test]
    fn test_adjacent_wall_blocks() {
        let mut mirror = open_grid((2, 2));
        mirror.game_map[2][3] = CELL_WALL;
        mirror.game_map[1][2] = CELL_WALL;
        let before = mirror.clone();
        assert_eq!(predict(&mirror, &MoveIntent::new(Motion::Right)), Prediction::Blocked);
        assert_eq!(predict(&mirror, &MoveIntent::with_count(Motion::Right, 2)), Prediction::Blocked);
        assert_eq!(predict(&mirror, &MoveIntent::new(Motion::Up)), Prediction::Blocked);
        assert_eq!(mirror.position(), before.position());
        assert_eq!(mirror.game_map, before.game_map);
    }

    #[test]
    fn test_vertical_keeps_preferred_column() {
        let mut mirror = mirror_from_text(&["abcdefgh", "ab", "abcdefgh"], (0, 6));
        mirror.preferred_column = 6;
        let p = predict(&mirror, &MoveIntent::new(Motion::Down));
        assert_eq!(
            p,
            Prediction::Moved(FinalPosition {
                row: 1,
                col: 1,
                preferred_column: 6
            })
        );

        mirror.row = 1;
        mirror.col = 1;
        let p = predict(&mirror, &MoveIntent::new(Motion::Down));
        assert_eq!(moved_to(p), (2, 6));
    }

    #[test]
    fn test_horizontal_resets_preferred_column() {
        let mirror = mirror_from_text(&["abcdefgh"], (0, 6));
        match predict(&mirror, &MoveIntent::new(Motion::Left)) {
            Prediction::Moved(p) => assert_eq!(p.preferred_column, 5),
            Prediction::Blocked => panic!("expected a move"),
        }
    }

    #[test]
    fn test_word_motions() {
        let mirror = mirror_from_text(&["foo bar.baz", "  qux"], (0, 0));
        let w = |m: &Mirror, motion, count| moved_to(predict(m, &MoveIntent::with_count(motion, count)));
        assert_eq!(w(&mirror, Motion::WordForward { big: false }, 1), (0, 4));
        assert_eq!(w(&mirror, Motion::WordForward { big: false }, 2), (0, 7));
        assert_eq!(w(&mirror, Motion::WordForward { big: false }, 3), (0, 8));
        assert_eq!(w(&mirror, Motion::WordForward { big: true }, 2), (1, 2));
        assert_eq!(w(&mirror, Motion::WordEnd { big: false }, 1), (0, 2));
        assert_eq!(w(&mirror, Motion::WordEnd { big: true }, 2), (0, 10));

        let end = mirror_from_text(&["foo bar.baz", "  qux"], (1, 3));
        assert_eq!(w(&end, Motion::WordBackward { big: false }, 1), (1, 2));
        assert_eq!(w(&end, Motion::WordBackward { big: false }, 2), (0, 8));
        assert_eq!(w(&end, Motion::WordBackward { big: true }, 2), (0, 4));
        assert_eq!(w(&end, Motion::WordEndBackward { big: false }, 1), (0, 10));
        assert_eq!(w(&end, Motion::WordEndBackward { big: false }, 2), (0, 7));
        assert_eq!(w(&end, Motion::WordEndBackward { big: true }, 2), (0, 2));
    }

    #[test]
    fn test_word_forward_at_buffer_end_is_blocked() {
        let mirror = mirror_from_text(&["foo bar"], (0, 6));
        assert_eq!(
            predict(&mirror, &MoveIntent::new(Motion::WordForward { big: false })),
            Prediction::Blocked
        );
    }

    #[test]
    fn test_line_motions() {
        let mirror = mirror_from_text(&["  hello  ", "world"], (0, 4));
        let go = |motion| moved_to(predict(&mirror, &MoveIntent::new(motion)));
        assert_eq!(go(Motion::LineStart), (0, 0));
        assert_eq!(go(Motion::FirstNonBlank), (0, 2));
        assert_eq!(go(Motion::LineEnd), (0, 8));
        assert_eq!(go(Motion::LastNonBlank), (0, 6));
        let p = predict(&mirror, &MoveIntent::with_count(Motion::LineEnd, 2));
        assert_eq!(moved_to(p), (1, 4));
    }

    #[test]
    fn test_file_motions_respect_explicit_count() {
        let mirror = mirror_from_text(&["aaa", " bb", "  c", "ddd"], (1, 2));
        assert_eq!(moved_to(predict(&mirror, &MoveIntent::new(Motion::FileStart))), (0, 0));
        assert_eq!(moved_to(predict(&mirror, &MoveIntent::new(Motion::FileEnd))), (3, 0));
        assert_eq!(
            moved_to(predict(&mirror, &MoveIntent::with_count(Motion::FileStart, 3))),
            (2, 2)
        );
        assert_eq!(
            moved_to(predict(&mirror, &MoveIntent::with_count(Motion::FileEnd, 1))),
            (0, 0)
        );
    }

    #[test]
    fn test_find_motions() {
        let mirror = mirror_from_text(&["a-b-c-d"], (0, 2));
        let find = |kind, target, count| predict(&mirror, &MoveIntent::with_count(Motion::Find { kind, target }, count));
        assert_eq!(moved_to(find(FindKind::Forward, '-', 1)), (0, 3));
        assert_eq!(moved_to(find(FindKind::Forward, '-', 2)), (0, 5));
        assert_eq!(moved_to(find(FindKind::TillForward, 'd', 1)), (0, 5));
        assert_eq!(moved_to(find(FindKind::Backward, 'a', 1)), (0, 0));
        assert_eq!(moved_to(find(FindKind::TillBackward, 'a', 1)), (0, 1));
        assert_eq!(find(FindKind::Forward, 'z', 1), Prediction::Blocked);
        assert_eq!(find(FindKind::Forward, '-', 4), Prediction::Blocked);
        // `t` onto the adjacent char goes nowhere.
        assert_eq!(find(FindKind::TillForward, '-', 1), Prediction::Blocked);
    }

    #[test]
    fn test_jump_onto_wall_is_blocked() {
        let mut mirror = mirror_from_text(&["foo bar"], (0, 0));
        mirror.game_map[0][4] = CELL_WALL;
        assert_eq!(
            predict(&mirror, &MoveIntent::new(Motion::WordForward { big: false })),
            Prediction::Blocked
        );
    }

    #[test]
    fn test_uninitialized_mirror_is_blocked() {
        let mirror = Mirror::new();
        assert_eq!(predict(&mirror, &MoveIntent::new(Motion::Right)), Prediction::Blocked);
    }

    #[test]
    fn test_motion_tokens() {
        let cases = [
            (Motion::Left, "h"),
            (Motion::WordForward { big: false }, "w"),
            (Motion::WordEndBackward { big: true }, "gE"),
            (Motion::LastNonBlank, "g_"),
            (Motion::FileStart, "gg"),
            (Motion::LineEnd, "$"),
            (Motion::Find { kind: FindKind::Forward, target: 'x' }, "fx"),
            (Motion::Find { kind: FindKind::TillBackward, target: ';' }, "T;"),
        ];
        for (motion, token) in cases {
            assert_eq!(motion.token(), token);
        }
    }

    #[test]
    fn test_request_carries_count_flag() {
        let req = MoveIntent::with_count(Motion::FileStart, 5000).request();
        assert_eq!(req.direction, "gg");
        assert_eq!(req.count, MAX_COUNT);
        assert!(req.has_explicit_count);
        assert!(!MoveIntent::new(Motion::Right).request().has_explicit_count);
    }
}
