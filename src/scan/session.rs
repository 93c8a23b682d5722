//! Client-facing streaming session
//!
//! A session runs one request for one root path: list the root, report file
//! sizes immediately, then fan out over subdirectory children through the
//! shared cache, forwarding throttled progress as `item` events until every
//! child settles. The transport owns the receiving half of the event
//! channel; a failed send means the client is gone.

use super::{normalized_key, ScanEngine};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-session bound on concurrently tracked directory children
pub const MAX_CONCURRENT_CHILDREN: usize = 20;

/// Size state attached to an `item` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Non-final running estimate
    Pending,
    /// Final; no further updates for this name in this session
    Done,
}

/// One immediate child of the session root as reported to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileItem {
    pub name: String,
    pub size: u64,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    pub status: ItemStatus,
}

/// Event stream emitted by a session, in wire order
#[derive(Debug, Clone, PartialEq)]
pub enum UsageEvent {
    /// Resolved absolute root path; always first
    Path { path: String },
    /// Per-child size report; repeated while directories resolve
    Item(FileItem),
    /// Terminal: all children settled
    Done,
    /// Terminal: the request itself failed
    ServerError { error: String },
}

impl UsageEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            UsageEvent::Path { .. } => "path",
            UsageEvent::Item(_) => "item",
            UsageEvent::Done => "done",
            UsageEvent::ServerError { .. } => "server_error",
        }
    }

    /// JSON payload for the `data:` line
    pub fn payload(&self) -> String {
        match self {
            UsageEvent::Path { path } => serde_json::json!({ "path": path }).to_string(),
            UsageEvent::Item(item) => {
                serde_json::to_string(item).unwrap_or_else(|_| "null".to_string())
            }
            UsageEvent::Done => "null".to_string(),
            UsageEvent::ServerError { error } => {
                serde_json::json!({ "error": error }).to_string()
            }
        }
    }
}

/// Drive one usage request, writing events into `events` until terminal.
///
/// Returns once the terminal event is sent or the client has gone away.
/// Sizer tasks started on behalf of this session keep running either way;
/// their results stay in the cache for later requests.
pub async fn run_session(engine: Arc<ScanEngine>, root: PathBuf, events: mpsc::Sender<UsageEvent>) {
    let abs_root = match std::path::absolute(&root) {
        Ok(path) => path,
        Err(e) => {
            warn!(path = %root.display(), error = %e, "path resolution failed");
            let _ = events
                .send(UsageEvent::ServerError {
                    error: e.to_string(),
                })
                .await;
            return;
        }
    };
    let root_key = normalized_key(&abs_root);

    info!(path = %root_key, "usage session started");

    if events
        .send(UsageEvent::Path {
            path: root_key.clone(),
        })
        .await
        .is_err()
    {
        return;
    }

    let children = match engine.reader().list(Path::new(&root_key)).await {
        Ok(children) => children,
        Err(e) => {
            warn!(path = %root_key, error = %e, "root listing failed");
            let _ = events
                .send(UsageEvent::ServerError {
                    error: e.to_string(),
                })
                .await;
            return;
        }
    };

    // Files are final immediately; directories open at zero and resolve.
    let mut dirs = Vec::new();
    for child in &children {
        let item = if child.is_dir {
            dirs.push(child.name.clone());
            FileItem {
                name: child.name.clone(),
                size: 0,
                is_dir: true,
                status: ItemStatus::Pending,
            }
        } else {
            FileItem {
                name: child.name.clone(),
                size: child.size,
                is_dir: false,
                status: ItemStatus::Done,
            }
        };
        if events.send(UsageEvent::Item(item)).await.is_err() {
            return;
        }
    }

    // Fan out over directory children. Progress flows back through an
    // unbounded channel so entry callbacks never block inside the entry
    // lock; the 200 ms per-entry throttle bounds the actual rate.
    let (item_tx, mut item_rx) = mpsc::unbounded_channel::<FileItem>();
    let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_CHILDREN));
    let cancel = CancellationToken::new();

    for name in dirs {
        let child_key = normalized_key(&Path::new(&root_key).join(&name));
        let engine = Arc::clone(&engine);
        let permits = Arc::clone(&permits);
        let item_tx = item_tx.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let _permit = tokio::select! {
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
                _ = cancel.cancelled() => return,
            };

            let entry = engine.entry_for(&child_key);

            let progress_tx = item_tx.clone();
            let progress_name = name.clone();
            let subscription = entry.subscribe(Box::new(move |size| {
                let _ = progress_tx.send(FileItem {
                    name: progress_name.clone(),
                    size,
                    is_dir: true,
                    status: ItemStatus::Pending,
                });
            }));

            tokio::select! {
                _ = entry.wait() => {}
                // Client gone: stop forwarding; the subscription drop
                // unregisters, the sizer runs on.
                _ = cancel.cancelled() => return,
            }

            subscription.unsubscribe();
            let _ = item_tx.send(FileItem {
                name,
                size: entry.size(),
                is_dir: true,
                status: ItemStatus::Done,
            });
        });
    }
    drop(item_tx);

    // Forward until every child task has sent its terminal item and
    // dropped its sender.
    while let Some(item) = item_rx.recv().await {
        if events.send(UsageEvent::Item(item)).await.is_err() {
            cancel.cancel();
            debug!(path = %root_key, "client disconnected, session aborted");
            return;
        }
    }

    let _ = events.send(UsageEvent::Done).await;
    debug!(path = %root_key, "usage session complete");
}
