//! Progress relay for long-running provider calls
//!
//! Provider collaborators report free-text progress on a bounded channel. A
//! detached task drains it into the log. The task is never joined: it exits
//! once every sender is dropped, or is simply abandoned when the process exits.

use tokio::sync::mpsc;
use tracing::info;

/// Capacity of the progress channel
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Sending half handed to provider collaborators
pub type ProgressSender = mpsc::Sender<String>;

/// Spawn the relay task and return the sender that feeds it
pub fn spawn_progress_relay() -> ProgressSender {
    let (tx, mut rx) = mpsc::channel::<String>(PROGRESS_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            info!("{}", msg);
        }
    });
    tx
}

/// Send a progress message without failing the caller if the relay is gone
pub async fn report(progress: &ProgressSender, msg: impl Into<String>) {
    let _ = progress.send(msg.into()).await;
}
