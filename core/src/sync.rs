//! Debounced push of the whole snapshot to the remote store.
//!
//! One spawned task owns the pending snapshot and both deadlines. Mutations
//! reach it over a channel; status goes back out on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::models::Snapshot;
use crate::remote::RemoteStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Success => "success",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Quiet period after the last mutation before a push.
    pub debounce: Duration,
    /// How long `Success` is shown before falling back to `Idle`.
    pub status_reset: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2000),
            status_reset: Duration::from_millis(3000),
        }
    }
}

enum Command {
    Schedule(Snapshot),
    Supersede(Snapshot),
    Fetch(oneshot::Sender<Option<Snapshot>>),
    Flush(oneshot::Sender<SyncStatus>),
}

pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SyncStatus>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Start the coordinating task. Must be called inside a tokio runtime.
    pub fn spawn<R: RemoteStore>(remote: R, config: SyncConfig) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SyncStatus::Idle);
        let coordinator = Coordinator {
            remote: Arc::new(remote),
            config,
            status: status_tx,
            pending: None,
            deadline: None,
            reset_at: None,
        };
        let task = tokio::spawn(coordinator.run(rx));
        Self {
            commands,
            status,
            task,
        }
    }

    /// Queue `snapshot` for upload, restarting the debounce window. Only the
    /// latest scheduled snapshot is ever pushed.
    pub fn schedule(&self, snapshot: Snapshot) {
        if self.commands.send(Command::Schedule(snapshot)).is_err() {
            log::warn!("Sync task has stopped; change kept locally only");
        }
    }

    /// Swap the snapshot waiting on the debounce for `snapshot`, keeping its
    /// deadline. Does nothing when no push is pending.
    pub fn supersede(&self, snapshot: Snapshot) {
        if self.commands.send(Command::Supersede(snapshot)).is_err() {
            log::warn!("Sync task has stopped; change kept locally only");
        }
    }

    pub async fn fetch_remote(&self) -> Option<Snapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Fetch(tx)).ok()?;
        rx.await.ok().flatten()
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Push whatever is pending now instead of waiting out the debounce, and
    /// return the resulting status.
    pub async fn flush(&self) -> Result<SyncStatus> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Flush(tx))
            .ok()
            .context("Sync task has stopped")?;
        rx.await.context("Sync task dropped the flush request")
    }

    /// Flush, then stop the coordinating task.
    pub async fn shutdown(self) -> Result<SyncStatus> {
        let status = self.flush().await?;
        drop(self.commands);
        self.task.await.context("Sync task panicked")?;
        Ok(status)
    }
}

struct Coordinator<R> {
    remote: Arc<R>,
    config: SyncConfig,
    status: watch::Sender<SyncStatus>,
    pending: Option<Snapshot>,
    deadline: Option<Instant>,
    reset_at: Option<Instant>,
}

impl<R: RemoteStore> Coordinator<R> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            // Disabled select branches still evaluate their expressions.
            let deadline = self.deadline;
            let reset_at = self.reset_at;

            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Schedule(snapshot)) => {
                        self.pending = Some(snapshot);
                        self.deadline = Some(Instant::now() + self.config.debounce);
                    }
                    Some(Command::Supersede(snapshot)) => {
                        if let Some(pending) = self.pending.as_mut() {
                            *pending = snapshot;
                        }
                    }
                    Some(Command::Fetch(reply)) => {
                        let _ = reply.send(self.remote.fetch_remote().await);
                    }
                    Some(Command::Flush(reply)) => {
                        self.push_pending().await;
                        let _ = reply.send(*self.status.borrow());
                    }
                    None => break,
                },
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.push_pending().await;
                }
                () = sleep_until(reset_at.unwrap_or_else(Instant::now)), if reset_at.is_some() => {
                    self.reset_at = None;
                    if *self.status.borrow() == SyncStatus::Success {
                        self.status.send_replace(SyncStatus::Idle);
                    }
                }
            }
        }
        log::debug!("Sync coordinator stopped");
    }

    /// Push the pending snapshot, awaiting the result. Commands that arrive
    /// meanwhile stay queued and start a fresh debounce window afterwards.
    async fn push_pending(&mut self) {
        self.deadline = None;
        let Some(snapshot) = self.pending.take() else {
            return;
        };
        if snapshot.history.is_empty() {
            log::debug!("Skipping sync of empty history");
            return;
        }

        self.reset_at = None;
        self.status.send_replace(SyncStatus::Syncing);
        if self.remote.push_remote(&snapshot).await {
            log::info!("Synced {} day(s) to remote", snapshot.history.len());
            self.status.send_replace(SyncStatus::Success);
            self.reset_at = Some(Instant::now() + self.config.status_reset);
        } else {
            log::warn!("Sync push failed; local data kept");
            self.status.send_replace(SyncStatus::Error);
        }
    }
}
