use std::io::{Stdout, Write};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, Print, PrintStyledContent, Stylize},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use tracing::info;

use crate::commands::config::ClientConfig;
use crate::commands::logs::{describe_outcome, logs_dir, send_log, SessionLogger};
use crate::error::Result;
use crate::game::api::{GameServer, HttpGameServer};
use crate::game::bootstrap::{DomScrapeProvider, InitialStateProvider, PayloadProvider};
use crate::game::display::{Sprite, Surface};
use crate::game::keys::{Key, KeyOutcome, KeySequencer, KeyState};
use crate::game::mirror::GameStatus;
use crate::game::poll::StatePoller;
use crate::game::reconcile::MoveController;

// ── Terminal surface ────────────────────────────────────────────────────────

/// Draws the board at the top-left of the screen with the banner and
/// status lines underneath.
pub struct TerminalSurface {
    out: Stdout,
    rows: u16,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            out: std::io::stdout(),
            rows: 0,
        }
    }

    /// Screen position of a board cell, or `None` when it can't be
    /// addressed. Rows are tracked so the banner and status sit below.
    fn locate(&mut self, row: usize, col: usize) -> Option<MoveTo> {
        let (Ok(y), Ok(x)) = (u16::try_from(row), u16::try_from(col)) else {
            return None;
        };
        self.rows = self.rows.max(y.saturating_add(1));
        Some(MoveTo(x, y))
    }

    fn line(&mut self, offset: u16, text: &str, color: Color) {
        let _ = queue!(
            self.out,
            MoveTo(0, self.rows.saturating_add(offset)),
            Clear(ClearType::CurrentLine),
            PrintStyledContent(text.with(color))
        );
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn sprite_color(sprite: Sprite) -> Color {
    match sprite {
        Sprite::Player => Color::Yellow,
        Sprite::Enemy => Color::Red,
        Sprite::Pearl => Color::Magenta,
        Sprite::Mold => Color::Green,
        Sprite::Wall => Color::DarkGrey,
    }
}

impl Surface for TerminalSurface {
    fn clear_cell(&mut self, row: usize, col: usize) {
        if let Some(at) = self.locate(row, col) {
            let _ = queue!(self.out, at, Print(' '));
        }
    }

    fn place_sprite(&mut self, row: usize, col: usize, sprite: Sprite) {
        if let Some(at) = self.locate(row, col) {
            let glyph = sprite.glyph().with(sprite_color(sprite)).bold();
            let _ = queue!(self.out, at, PrintStyledContent(glyph));
        }
    }

    fn place_letter(&mut self, row: usize, col: usize, letter: char) {
        if let Some(at) = self.locate(row, col) {
            let _ = queue!(self.out, at, Print(letter));
        }
    }

    fn banner(&mut self, message: &str) {
        self.line(1, message, Color::Cyan);
    }

    fn status(&mut self, status: &GameStatus) {
        let mut text = format!("score {}", status.score);
        if status.pearl_collected {
            text.push_str("  pearl!");
        }
        if status.completed {
            text.push_str("  completed");
        }
        if status.failed {
            text.push_str("  game over");
        }
        text.push_str("   (ctrl-c or q to quit)");
        self.line(2, &text, Color::White);
        let _ = self.out.flush();
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

// ── Input ───────────────────────────────────────────────────────────────────

fn map_key(event: &KeyEvent) -> Option<Key> {
    match event.code {
        KeyCode::Char(c) => Some(Key::Char(c)),
        KeyCode::Esc => Some(Key::Escape),
        KeyCode::Left => Some(Key::Left),
        KeyCode::Right => Some(Key::Right),
        KeyCode::Up => Some(Key::Up),
        KeyCode::Down => Some(Key::Down),
        _ => None,
    }
}

fn is_quit(event: &KeyEvent, sequencer: &KeySequencer) -> bool {
    let ctrl_c =
        event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL);
    // `q` is only a quit when no sequence is waiting for a target char.
    ctrl_c || (event.code == KeyCode::Char('q') && sequencer.state() == KeyState::Idle)
}

// ── Session ─────────────────────────────────────────────────────────────────

/// Interactive game in the terminal until the player quits.
pub async fn run_play(config: &ClientConfig, server_url: &str, from_page: bool, poll: bool) -> Result<()> {
    let server = HttpGameServer::new(server_url);
    let provider: Box<dyn InitialStateProvider> = if from_page {
        Box::new(DomScrapeProvider::new(server.fetch_page().await?))
    } else {
        Box::new(PayloadProvider::new(server.fetch_state().await?))
    };

    let journal = if config.session_log {
        match logs_dir() {
            Some(dir) => SessionLogger::new(&dir).await,
            None => None,
        }
    } else {
        None
    };
    if let Some(journal) = &journal {
        journal.log("session", &format!("server {server_url}"));
    }

    let mut stdout = std::io::stdout();
    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, Hide, Clear(ClearType::All))?;

    let result = event_loop(config, server, provider.as_ref(), poll, journal.as_ref()).await;

    let _ = execute!(stdout, Show, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    if let Some(journal) = journal {
        // In-flight moves hold sender clones; don't wait on a hung request.
        let _ = tokio::time::timeout(Duration::from_secs(2), journal.finish()).await;
    }
    result
}

async fn event_loop(
    config: &ClientConfig,
    server: HttpGameServer,
    provider: &dyn InitialStateProvider,
    poll: bool,
    journal: Option<&SessionLogger>,
) -> Result<()> {
    info!(server = %server.base_url(), "starting interactive session");
    let controller = Arc::new(MoveController::new(
        server,
        TerminalSurface::new(),
        config.controller_config(),
    ));
    controller.initialize(provider).await?;

    let poller = StatePoller::default();
    if poll {
        poller
            .start(controller.clone(), config.poll_interval())
            .await?;
    }

    let mut sequencer = KeySequencer::new();
    let mut events = EventStream::new();
    while let Some(event) = events.next().await {
        let Event::Key(key) = event? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        if is_quit(&key, &sequencer) {
            break;
        }
        let Some(key) = map_key(&key) else {
            continue;
        };
        if let KeyOutcome::Intent(intent) = sequencer.feed(key) {
            let controller = controller.clone();
            let tx = journal.map(|j| j.sender());
            // Input keeps flowing while the move is in flight; the
            // controller drops intents that arrive meanwhile.
            tokio::spawn(async move {
                let outcome = controller.submit(intent).await;
                if let Some(tx) = tx {
                    send_log(&tx, "move", &describe_outcome(&outcome));
                }
            });
        }
    }

    poller.stop().await;
    let stats = controller.stats().await;
    info!(?stats, "session finished");
    if let Some(journal) = journal {
        journal.log("stats", &format!("{stats:?}"));
    }
    Ok(())
}

/// Print the current server state as JSON.
pub async fn print_state(server_url: &str) -> Result<String> {
    let server = HttpGameServer::new(server_url);
    let snapshot = server.fetch_state().await?;
    Ok(serde_json::to_string_pretty(&snapshot)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_tracks_rows_and_skips_far_cells() {
        let mut surface = TerminalSurface::new();
        assert_eq!(surface.locate(3, 7), Some(MoveTo(7, 3)));
        assert_eq!(surface.rows, 4);
        assert_eq!(surface.locate(70_000, 0), None);
        assert_eq!(surface.locate(0, 70_000), None);
        assert_eq!(surface.locate(65_535, 0), Some(MoveTo(0, 65_535)));
        assert_eq!(surface.rows, u16::MAX);
    }

    #[test]
    fn test_q_quits_only_when_idle() {
        let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let mut sequencer = KeySequencer::new();
        assert!(is_quit(&q, &sequencer));
        sequencer.feed(Key::Char('f'));
        assert!(!is_quit(&q, &sequencer));
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(is_quit(&ctrl_c, &sequencer));
    }
}
