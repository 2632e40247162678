//! Optimistic movement: predict locally, paint, ask the server, then apply
//! whatever the server says.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::game::api::{GameServer, MoveRequest, Position, ServerSnapshot};
use crate::game::bootstrap::InitialStateProvider;
use crate::game::display::{Display, Surface};
use crate::game::mirror::{GameStatus, Mirror};
use crate::game::motion::{predict, MoveIntent, Prediction};

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Minimum gap between two unrelated single moves.
    pub move_cooldown: Duration,
    /// Shorter gap for counted moves and repeats of the previous motion.
    pub repeat_cooldown: Duration,
    /// Sweep stray player sprites every N applied server states; 0 disables.
    pub sweep_every: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            move_cooldown: Duration::from_millis(120),
            repeat_cooldown: Duration::from_millis(60),
            sweep_every: 10,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    Uninitialized,
    InFlight,
    Cooldown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MoveReport {
    pub request: MoveRequest,
    pub prediction: Prediction,
    pub server_position: Position,
    /// The server's `success` flag.
    pub accepted: bool,
    pub diverged: bool,
    /// Cells redrawn when the server state was applied.
    pub redrawn: usize,
    pub status: GameStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MoveOutcome {
    Dropped(DropReason),
    Applied(MoveReport),
    /// No answer from the server; the mirror is unchanged.
    Unreachable { request: MoveRequest },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub sent: u64,
    pub confirmed: u64,
    pub diverged: u64,
    pub blocked_predictions: u64,
    pub rejected: u64,
    pub fallbacks: u64,
    pub unreachable: u64,
    pub polls_applied: u64,
    pub polls_skipped: u64,
}

/// Everything the controller owns between moves.
pub struct GameContext<S: Surface> {
    pub mirror: Mirror,
    pub display: Display<S>,
    pub stats: ReconcileStats,
    last_move: Option<(Instant, String)>,
    applies: u32,
}

impl<S: Surface> GameContext<S> {
    /// The single path for server truth: confirmed moves, corrections,
    /// rejections and polled state all land here. `success` only means
    /// something on a move reply; the state endpoint may omit it.
    fn apply_authoritative(
        &mut self,
        snapshot: &ServerSnapshot,
        predicted: Option<Position>,
        from_move: bool,
        sweep_every: u32,
    ) -> (usize, bool) {
        let before = self.mirror.status.clone();
        self.mirror.update(snapshot);
        let redrawn = self.display.paint(&self.mirror);
        let actual = self.mirror.position();

        let diverged = predicted.is_some_and(|p| p != actual);
        if let Some(p) = predicted {
            if diverged {
                warn!(
                    predicted_row = p.row,
                    predicted_col = p.col,
                    row = actual.row,
                    col = actual.col,
                    "prediction diverged from server"
                );
                self.stats.diverged += 1;
            } else {
                self.stats.confirmed += 1;
            }
        }

        if from_move && !snapshot.success {
            self.stats.rejected += 1;
            let message = snapshot.message.as_deref().unwrap_or("Can't move there");
            self.display.banner(message);
        }
        if self.mirror.status.failed && !before.failed {
            info!(score = self.mirror.status.score, "game over");
            self.display.banner("Game over");
        } else if self.mirror.status.completed && !before.completed {
            info!(score = self.mirror.status.score, "level complete");
            self.display.banner("Level complete!");
        }

        self.applies = self.applies.wrapping_add(1);
        if sweep_every > 0 && self.applies % sweep_every == 0 {
            let removed = self.display.sweep_orphans(actual);
            if removed > 0 {
                debug!(removed, "swept stray player sprites");
            }
        }
        self.display.status(&self.mirror.status);
        (redrawn, diverged)
    }
}

/// Clears the in-flight flag on every exit path.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct MoveController<G: GameServer, S: Surface> {
    server: G,
    config: ControllerConfig,
    pending: AtomicBool,
    /// Bumped whenever a move is issued; lets the poller spot stale fetches.
    generation: AtomicU64,
    context: Mutex<GameContext<S>>,
}

impl<G: GameServer, S: Surface> MoveController<G, S> {
    pub fn new(server: G, surface: S, config: ControllerConfig) -> Self {
        Self {
            server,
            config,
            pending: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            context: Mutex::new(GameContext {
                mirror: Mirror::new(),
                display: Display::new(surface),
                stats: ReconcileStats::default(),
                last_move: None,
                applies: 0,
            }),
        }
    }

    pub fn server(&self) -> &G {
        &self.server
    }

    /// Seed the mirror and draw the first frame.
    pub async fn initialize(&self, provider: &dyn InitialStateProvider) -> Result<()> {
        let state = provider.initial_state()?;
        let mut guard = self.context.lock().await;
        let ctx = &mut *guard;
        ctx.mirror.initialize(state);
        let drawn = ctx.display.paint(&ctx.mirror);
        ctx.display.status(&ctx.mirror.status);
        let pos = ctx.mirror.position();
        info!(row = pos.row, col = pos.col, cells = drawn, "mirror initialized");
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> ReconcileStats {
        self.context.lock().await.stats
    }

    pub async fn position(&self) -> Position {
        self.context.lock().await.mirror.position()
    }

    /// Read-only access to the mirror and display.
    pub async fn with_context<R>(&self, f: impl FnOnce(&GameContext<S>) -> R) -> R {
        let guard = self.context.lock().await;
        f(&*guard)
    }

    /// Run one movement intent through predict → paint → send → apply.
    /// Intents arriving while a move is in flight or inside the cooldown
    /// are dropped, never queued.
    pub async fn submit(&self, intent: MoveIntent) -> MoveOutcome {
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("move already in flight; dropping intent");
            return MoveOutcome::Dropped(DropReason::InFlight);
        }
        let _pending = PendingGuard(&self.pending);
        let request = intent.request();

        let prediction = {
            let mut guard = self.context.lock().await;
            let ctx = &mut *guard;
            if !ctx.mirror.initialized {
                return MoveOutcome::Dropped(DropReason::Uninitialized);
            }

            let now = Instant::now();
            if let Some((at, token)) = &ctx.last_move {
                let cooldown = if intent.count > 1 || *token == request.direction {
                    self.config.repeat_cooldown
                } else {
                    self.config.move_cooldown
                };
                if now.duration_since(*at) < cooldown {
                    return MoveOutcome::Dropped(DropReason::Cooldown);
                }
            }
            ctx.last_move = Some((now, request.direction.clone()));

            let prediction = predict(&ctx.mirror, &intent);
            match prediction {
                Prediction::Moved(p) => {
                    let from = ctx.mirror.position();
                    ctx.display
                        .paint_prediction(&ctx.mirror, from, Position::new(p.row, p.col));
                    debug!(direction = %request.direction, row = p.row, col = p.col, "painted prediction");
                }
                Prediction::Blocked => {
                    ctx.stats.blocked_predictions += 1;
                    debug!(direction = %request.direction, "prediction blocked; asking server");
                }
            }
            ctx.stats.sent += 1;
            self.generation.fetch_add(1, Ordering::SeqCst);
            prediction
        };

        let (snapshot, compare) = match self.server.send_move(&request).await {
            Ok(snapshot) => (snapshot, prediction.position()),
            Err(e) if prediction.position().is_some() => {
                warn!(direction = %request.direction, err = %e, "move request failed; resending without prediction");
                self.context.lock().await.stats.fallbacks += 1;
                match self.server.send_move(&request).await {
                    Ok(snapshot) => (snapshot, None),
                    Err(e) => {
                        error!(direction = %request.direction, err = %e, "move request failed again");
                        let mut guard = self.context.lock().await;
                        let ctx = &mut *guard;
                        ctx.stats.unreachable += 1;
                        // Take back the optimistic paint.
                        ctx.display.paint(&ctx.mirror);
                        return MoveOutcome::Unreachable { request };
                    }
                }
            }
            Err(e) => {
                warn!(direction = %request.direction, err = %e, "move request failed");
                self.context.lock().await.stats.unreachable += 1;
                return MoveOutcome::Unreachable { request };
            }
        };

        let mut guard = self.context.lock().await;
        let ctx = &mut *guard;
        let (redrawn, diverged) =
            ctx.apply_authoritative(&snapshot, compare, true, self.config.sweep_every);
        MoveOutcome::Applied(MoveReport {
            request,
            prediction,
            server_position: ctx.mirror.position(),
            accepted: snapshot.success,
            diverged,
            redrawn,
            status: ctx.mirror.status.clone(),
        })
    }

    /// Apply a polled snapshot unless a move was pending or issued since
    /// the fetch started. Returns whether it was applied.
    pub async fn apply_polled(&self, snapshot: &ServerSnapshot, generation_at_fetch: u64) -> bool {
        let mut guard = self.context.lock().await;
        let ctx = &mut *guard;
        if !ctx.mirror.initialized
            || self.is_pending()
            || self.generation() != generation_at_fetch
        {
            ctx.stats.polls_skipped += 1;
            return false;
        }
        ctx.apply_authoritative(snapshot, None, false, self.config.sweep_every);
        ctx.stats.polls_applied += 1;
        true
    }

    /// Fetch game state once and apply it. Backs off while a move is pending.
    pub async fn poll_once(&self) -> Result<bool> {
        if self.is_pending() {
            self.context.lock().await.stats.polls_skipped += 1;
            return Ok(false);
        }
        let generation = self.generation();
        let snapshot = self.server.fetch_state().await?;
        Ok(self.apply_polled(&snapshot, generation).await)
    }
}
