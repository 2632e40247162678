use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::game::api::GameServer;
use crate::game::display::Surface;
use crate::game::reconcile::MoveController;

/// Background refresh of server game state (enemies move on their own).
/// Each tick backs off while a move is in flight so an optimistic paint is
/// not overwritten by a stale snapshot.
pub struct StatePoller {
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    active: Arc<AtomicBool>,
}

impl Default for StatePoller {
    fn default() -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
            active: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl StatePoller {
    pub async fn start<G, S>(
        &self,
        controller: Arc<MoveController<G, S>>,
        interval: Duration,
    ) -> Result<()>
    where
        G: GameServer + 'static,
        S: Surface + Send + 'static,
    {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(ClientError::Custom("State poller is already running".into()));
        }

        let active = self.active.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                if !active.load(Ordering::SeqCst) {
                    break;
                }

                match controller.poll_once().await {
                    Ok(true) => debug!("applied polled game state"),
                    Ok(false) => debug!("skipped poll while a move is in flight"),
                    Err(e) => warn!(err = %e, "game state poll failed"),
                }
            }
        });

        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    pub async fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
    }

    /// Stop without awaiting, for shutdown paths that can't await.
    pub fn kill_sync(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.handle.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for StatePoller {
    fn drop(&mut self) {
        self.kill_sync();
    }
}
