use tracing::info;

use crate::error::{ClientError, Result};
use crate::game::api::{GameServer, HttpGameServer};
use crate::game::bootstrap::{DomScrapeProvider, InitialStateProvider, PayloadProvider};
use crate::game::display::{BufferSurface, Surface};
use crate::game::keys::{Key, KeyOutcome, KeySequencer};
use crate::game::reconcile::{ControllerConfig, MoveController, MoveOutcome};

/// Parse a key script such as `3lgg<Esc>fx`. Named keys go in angle
/// brackets; `<lt>` is a literal `<`.
pub fn parse_key_script(script: &str) -> Result<Vec<Key>> {
    let mut keys = Vec::new();
    let mut chars = script.chars();
    while let Some(ch) = chars.next() {
        if ch != '<' {
            keys.push(Key::Char(ch));
            continue;
        }
        let mut name = String::new();
        loop {
            match chars.next() {
                Some('>') => break,
                Some(c) => name.push(c),
                None => {
                    return Err(ClientError::Custom(format!("Unclosed key name: <{name}")));
                }
            }
        }
        let key = match name.to_ascii_lowercase().as_str() {
            "esc" => Key::Escape,
            "left" => Key::Left,
            "right" => Key::Right,
            "up" => Key::Up,
            "down" => Key::Down,
            "lt" => Key::Char('<'),
            "space" => Key::Char(' '),
            _ => return Err(ClientError::Custom(format!("Unknown key name: <{name}>"))),
        };
        keys.push(key);
    }
    Ok(keys)
}

/// Feed keys one at a time, awaiting each move before the next key.
pub async fn run_keys<G: GameServer, S: Surface>(
    controller: &MoveController<G, S>,
    keys: &[Key],
) -> Vec<MoveOutcome> {
    let mut sequencer = KeySequencer::new();
    let mut outcomes = Vec::new();
    for key in keys {
        if let KeyOutcome::Intent(intent) = sequencer.feed(*key) {
            let outcome = controller.submit(intent).await;
            info!(token = %intent.motion.token(), count = intent.count, ?outcome, "scripted move");
            outcomes.push(outcome);
        }
    }
    outcomes
}

/// Headless run against a live server: bootstrap, play the script, and
/// return the final board with status and banners.
pub async fn run_script(server_url: &str, script: &str, from_page: bool) -> Result<String> {
    let keys = parse_key_script(script)?;
    let server = HttpGameServer::new(server_url);
    let provider: Box<dyn InitialStateProvider> = if from_page {
        Box::new(DomScrapeProvider::new(server.fetch_page().await?))
    } else {
        Box::new(PayloadProvider::new(server.fetch_state().await?))
    };

    // Scripted keys are sequential, so no cooldown is needed.
    let config = ControllerConfig {
        move_cooldown: std::time::Duration::ZERO,
        repeat_cooldown: std::time::Duration::ZERO,
        ..ControllerConfig::default()
    };
    let controller = MoveController::new(server, BufferSurface::new(), config);
    controller.initialize(provider.as_ref()).await?;
    run_keys(&controller, &keys).await;

    Ok(controller
        .with_context(|ctx| {
            let surface = ctx.display.surface();
            let status = &ctx.mirror.status;
            let mut out = surface.render();
            out.push_str(&format!(
                "\n\nscore {}  pearl {}  completed {}  failed {}",
                status.score, status.pearl_collected, status.completed, status.failed
            ));
            for banner in &surface.banners {
                out.push_str(&format!("\n> {banner}"));
            }
            out
        })
        .await)
}
