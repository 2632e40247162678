use crate::error::{ClientError, Result};
use crate::game::api::{Position, ServerSnapshot};
use crate::game::mirror::{GameStatus, InitialState, CELL_PLAYER};

/// Source of the state a mirror is seeded with. Callers pick the provider;
/// the mirror never decides where its first state comes from.
pub trait InitialStateProvider {
    fn initial_state(&self) -> Result<InitialState>;
}

// ── Serialized payload ──────────────────────────────────────────────────────

/// Seeds from a server snapshot, e.g. a `GET /api/game-state` reply.
pub struct PayloadProvider {
    snapshot: ServerSnapshot,
}

impl PayloadProvider {
    pub fn new(snapshot: ServerSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }
}

impl InitialStateProvider for PayloadProvider {
    fn initial_state(&self) -> Result<InitialState> {
        let game_map = self
            .snapshot
            .game_map
            .clone()
            .ok_or_else(|| ClientError::Custom("Game state payload has no game_map".into()))?;
        let position = match self.snapshot.player_pos {
            Some(pos) => pos,
            None => find_code(&game_map, CELL_PLAYER)
                .ok_or_else(|| ClientError::Custom("Game state payload has no player".into()))?,
        };
        let mut status = GameStatus::default();
        status.merge(&self.snapshot);
        Ok(InitialState {
            position,
            preferred_column: self.snapshot.preferred_column,
            game_map,
            text_grid: self.snapshot.text_grid.clone().unwrap_or_default(),
            status,
        })
    }
}

fn find_code(map: &[Vec<u8>], code: u8) -> Option<Position> {
    map.iter().enumerate().find_map(|(r, row)| {
        row.iter()
            .position(|c| *c == code)
            .map(|c| Position::new(r, c))
    })
}

// ── Rendered page ───────────────────────────────────────────────────────────

/// Page coordinates at or past this are refused rather than allocated.
const MAX_GRID_SIDE: usize = 1024;

/// Seeds from the server-rendered page: every element carrying `data-row`,
/// `data-col`, `data-map` and `data-letter` is one cell.
pub struct DomScrapeProvider {
    html: String,
}

#[derive(Debug, PartialEq, Eq)]
struct ScrapedCell {
    row: usize,
    col: usize,
    code: u8,
    letter: char,
}

impl DomScrapeProvider {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    fn cells(&self) -> Vec<ScrapedCell> {
        let mut cells = Vec::new();
        let mut rest = self.html.as_str();
        while let Some(open) = rest.find('<') {
            let tag_body = &rest[open + 1..];
            let Some(close) = tag_body.find('>') else {
                break;
            };
            if let Some(cell) = parse_cell(&tag_body[..close]) {
                cells.push(cell);
            }
            rest = &tag_body[close + 1..];
        }
        cells
    }
}

impl InitialStateProvider for DomScrapeProvider {
    fn initial_state(&self) -> Result<InitialState> {
        let cells = self.cells();
        if cells.is_empty() {
            return Err(ClientError::MissingDom("no game cells on the page".into()));
        }

        if let Some(cell) = cells
            .iter()
            .find(|c| c.row >= MAX_GRID_SIDE || c.col >= MAX_GRID_SIDE)
        {
            return Err(ClientError::MissingDom(format!(
                "cell ({}, {}) is outside a {MAX_GRID_SIDE}x{MAX_GRID_SIDE} board",
                cell.row, cell.col
            )));
        }

        let rows = cells.iter().map(|c| c.row).max().unwrap_or(0) + 1;
        let mut widths = vec![0usize; rows];
        for cell in &cells {
            widths[cell.row] = widths[cell.row].max(cell.col + 1);
        }
        let mut game_map: Vec<Vec<u8>> = widths.iter().map(|w| vec![0; *w]).collect();
        let mut text_grid: Vec<Vec<char>> = widths.iter().map(|w| vec![' '; *w]).collect();
        for cell in &cells {
            game_map[cell.row][cell.col] = cell.code;
            text_grid[cell.row][cell.col] = cell.letter;
        }

        let position = find_code(&game_map, CELL_PLAYER)
            .ok_or_else(|| ClientError::MissingDom("no player cell on the page".into()))?;
        Ok(InitialState {
            position,
            preferred_column: None,
            game_map,
            text_grid,
            status: GameStatus::default(),
        })
    }
}

fn parse_cell(tag: &str) -> Option<ScrapedCell> {
    let row = attr(tag, "data-row")?.trim().parse().ok()?;
    let col = attr(tag, "data-col")?.trim().parse().ok()?;
    let code = attr(tag, "data-map")?.trim().parse().ok()?;
    let letter = decode_entities(&attr(tag, "data-letter")?)
        .chars()
        .next()
        .unwrap_or(' ');
    Some(ScrapedCell {
        row,
        col,
        code,
        letter,
    })
}

/// Value of `name="..."` (or single-quoted) inside a tag body.
fn attr(tag: &str, name: &str) -> Option<String> {
    let mut search = tag;
    loop {
        let at = search.find(name)?;
        let preceded_ok = at == 0
            || search[..at]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_whitespace());
        let after = search[at + name.len()..].trim_start();
        if preceded_ok {
            if let Some(value) = after.strip_prefix('=') {
                let value = value.trim_start();
                let quote = value.chars().next()?;
                if quote == '"' || quote == '\'' {
                    let inner = &value[1..];
                    let end = inner.find(quote)?;
                    return Some(inner[..end].to_string());
                }
                let end = value
                    .find(|c: char| c.is_whitespace() || c == '/')
                    .unwrap_or(value.len());
                return Some(value[..end].to_string());
            }
        }
        search = &search[at + name.len()..];
    }
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div id="game-map">
          <div class="cell" data-row="0" data-col="0" data-map="0" data-letter="h"></div>
          <div class="cell" data-row="0" data-col="1" data-map="1" data-letter='i'></div>
          <div class="cell" data-row="1" data-col="0" data-map="5" data-letter="&amp;"></div>
          <div class="cell" data-row="1" data-col="1" data-map="3" data-letter="&nbsp;"></div>
          <span data-rowspan="2">ignored</span>
        </div>"#;

    #[test]
    fn test_scrape_builds_grids() {
        let state = DomScrapeProvider::new(PAGE).initial_state().unwrap();
        assert_eq!(state.position, Position::new(0, 1));
        assert_eq!(state.game_map, vec![vec![0, 1], vec![5, 3]]);
        assert_eq!(state.text_grid, vec![vec!['h', 'i'], vec!['&', ' ']]);
        assert_eq!(state.preferred_column, None);
    }

    #[test]
    fn test_scrape_without_cells_is_missing_dom() {
        let err = DomScrapeProvider::new("<html><body>loading</body></html>")
            .initial_state()
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingDom(_)));
    }

    #[test]
    fn test_scrape_without_player_is_missing_dom() {
        let page = r#"<td data-row="0" data-col="0" data-map="0" data-letter="a">"#;
        let err = DomScrapeProvider::new(page).initial_state().unwrap_err();
        assert!(matches!(err, ClientError::MissingDom(_)));
    }

    #[test]
    fn test_scrape_rejects_huge_coordinates() {
        for page in [
            r#"<td data-row="18446744073709551615" data-col="0" data-map="1" data-letter="a">"#,
            r#"<td data-row="0" data-col="18446744073709551615" data-map="1" data-letter="a">"#,
            r#"<td data-row="100000000" data-col="0" data-map="1" data-letter="a">"#,
        ] {
            let err = DomScrapeProvider::new(page).initial_state().unwrap_err();
            assert!(matches!(err, ClientError::MissingDom(_)), "{page}");
        }
        let edge = r#"<td data-row="1023" data-col="1023" data-map="1" data-letter="a">"#;
        let state = DomScrapeProvider::new(edge).initial_state().unwrap();
        assert_eq!(state.position, Position::new(1023, 1023));
    }

    #[test]
    fn test_attr_requires_word_boundary() {
        let tag = r#"span data-rowspan="2" data-row="7""#;
        assert_eq!(attr(tag, "data-row").as_deref(), Some("7"));
        assert_eq!(attr(r#"td data-col=4 data-map="1""#, "data-col").as_deref(), Some("4"));
    }

    #[test]
    fn test_payload_provider() {
        let provider = PayloadProvider::from_json(
            r#"{"success":true,"player_pos":{"row":1,"col":0},
                "game_map":[[0,0],[1,3]],"text_grid":[["a","b"],["c","d"]],
                "score":7,"preferred_column":1}"#,
        )
        .unwrap();
        let state = provider.initial_state().unwrap();
        assert_eq!(state.position, Position::new(1, 0));
        assert_eq!(state.preferred_column, Some(1));
        assert_eq!(state.status.score, 7);
        assert_eq!(state.text_grid[1], vec!['c', 'd']);
    }

    #[test]
    fn test_payload_without_position_uses_map() {
        let provider = PayloadProvider::from_json(r#"{"success":true,"game_map":[[0,0,1]]}"#).unwrap();
        assert_eq!(provider.initial_state().unwrap().position, Position::new(0, 2));
    }
}
