use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::game::reconcile::{DropReason, MoveOutcome};
use crate::util::{data_dir, unix_timestamp};

const MAX_SESSIONS: usize = 10;

/// `~/.bobavim/logs`
pub fn logs_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("logs"))
}

/// Per-session move journal written to `latest.log`.
///
/// Callers never block on disk I/O: `log()` pushes onto a channel and a
/// background task does the writing.
pub struct SessionLogger {
    tx: mpsc::UnboundedSender<String>,
    writer: JoinHandle<()>,
}

impl SessionLogger {
    /// Open a journal in `logs_dir`.
    ///
    /// - Rotates an existing `latest.log` to `session-{timestamp}.log`
    /// - Keeps at most 10 rotated sessions
    pub async fn new(logs_dir: &Path) -> Option<Self> {
        if tokio::fs::create_dir_all(logs_dir).await.is_err() {
            return None;
        }

        let latest = logs_dir.join("latest.log");
        if latest.exists() {
            let rotated = logs_dir.join(format!("session-{}.log", unix_timestamp()));
            let _ = tokio::fs::rename(&latest, &rotated).await;
        }
        cleanup_old_sessions(logs_dir).await;

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&latest)
            .await
            .ok()?;

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(writer_task(file, rx));

        let opened = format_timestamp(unix_timestamp());
        let _ = tx.send(format!("=== Boba.vim session {opened} ===\n\n"));

        Some(Self { tx, writer })
    }

    pub fn log(&self, prefix: &str, line: &str) {
        send_log(&self.tx, prefix, line);
    }

    /// Clone the sender for tasks that log after this logger moves.
    pub fn sender(&self) -> mpsc::UnboundedSender<String> {
        self.tx.clone()
    }

    /// Close the channel and wait for the footer to hit disk. Waits for any
    /// cloned senders to be dropped too.
    pub async fn finish(self) {
        drop(self.tx);
        let _ = self.writer.await;
    }
}

pub fn send_log(tx: &mpsc::UnboundedSender<String>, prefix: &str, line: &str) {
    let ts = format_timestamp(unix_timestamp());
    let _ = tx.send(format!("[{ts}] [{prefix}] {line}\n"));
}

async fn writer_task(file: tokio::fs::File, mut rx: mpsc::UnboundedReceiver<String>) {
    use tokio::io::AsyncWriteExt;
    let mut out = tokio::io::BufWriter::new(file);

    // One flush per burst of queued lines.
    while let Some(first) = rx.recv().await {
        let mut burst = vec![first];
        while let Ok(more) = rx.try_recv() {
            burst.push(more);
        }
        for line in &burst {
            if out.write_all(line.as_bytes()).await.is_err() {
                return;
            }
        }
        let _ = out.flush().await;
    }

    let closing = format!("\n=== session closed {} ===\n", format_timestamp(unix_timestamp()));
    let _ = out.write_all(closing.as_bytes()).await;
    let _ = out.flush().await;
}

/// One journal line for a move outcome.
pub fn describe_outcome(outcome: &MoveOutcome) -> String {
    match outcome {
        MoveOutcome::Dropped(reason) => {
            let why = match reason {
                DropReason::Uninitialized => "not initialized",
                DropReason::InFlight => "move in flight",
                DropReason::Cooldown => "cooldown",
            };
            format!("dropped ({why})")
        }
        MoveOutcome::Unreachable { request } => {
            format!("{} x{} -> server unreachable", request.direction, request.count)
        }
        MoveOutcome::Applied(report) => {
            let predicted = match report.prediction.position() {
                Some(p) => format!("({},{})", p.row, p.col),
                None => "blocked".to_string(),
            };
            let mut line = format!(
                "{} x{} predicted {} server ({},{}) score {}",
                report.request.direction,
                report.request.count,
                predicted,
                report.server_position.row,
                report.server_position.col,
                report.status.score,
            );
            if !report.accepted {
                line.push_str(" [rejected]");
            }
            if report.diverged {
                line.push_str(" [diverged]");
            }
            line
        }
    }
}

/// Format a Unix timestamp as ISO 8601 UTC (e.g. "2025-06-15T10:30:00Z").
fn format_timestamp(secs: u64) -> String {
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let (year, month, day) = civil_date(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        rem / 3600,
        rem / 60 % 60,
        rem % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day),
/// counting in 400-year eras that start on March 1st.
fn civil_date(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let day_of_era = z % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 {
        shifted_month + 3
    } else {
        shifted_month - 9
    };
    let year = year_of_era + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

/// Delete rotated sessions beyond the newest `MAX_SESSIONS`.
async fn cleanup_old_sessions(logs_dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(logs_dir).await else {
        return;
    };
    let mut rotated = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let is_session = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with("session-") && name.ends_with(".log"));
        if is_session {
            rotated.push(entry.path());
        }
    }

    // `session-{unix secs}.log` sorts oldest first.
    rotated.sort();
    let excess = rotated.len().saturating_sub(MAX_SESSIONS);
    for path in rotated.drain(..excess) {
        let _ = tokio::fs::remove_file(path).await;
    }
}
