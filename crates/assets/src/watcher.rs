//! Debounced file watcher over the asset root.
//!
//! The watcher thread only feeds an mpsc channel; the frame thread drains it
//! with [`AssetWatcher::poll_changes`] and forwards the paths to the reload
//! registry. The graph itself is never touched off-thread.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use notify_debouncer_full::{
    DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
};

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches the asset root recursively and reports changed files as
/// root-relative, slash-separated paths.
pub struct AssetWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    events: Receiver<PathBuf>,
    root: PathBuf,
}

impl AssetWatcher {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, notify::Error> {
        let root = root.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel();

        let mut debouncer = new_debouncer(
            DEBOUNCE,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        match event.kind {
                            EventKind::Create(_) | EventKind::Modify(_) => {
                                for path in &event.paths {
                                    let _ = tx.send(path.clone());
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        tracing::warn!(%error, "asset watcher error");
                    }
                }
            },
        )?;
        debouncer.watch(&root, RecursiveMode::Recursive)?;
        tracing::info!(root = %root.display(), "watching assets for changes");

        Ok(Self {
            _debouncer: debouncer,
            events: rx,
            root,
        })
    }

    /// Drain pending change events, non-blocking. Paths outside the root
    /// (should not happen) are skipped.
    pub fn poll_changes(&self) -> Vec<String> {
        let mut changed = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(path) => {
                    if let Some(rel) = relative_key(&self.root, &path) {
                        changed.push(rel);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("asset watcher channel disconnected");
                    break;
                }
            }
        }
        changed
    }
}

/// Root-relative, slash-separated key for a changed file.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut key = String::new();
    for component in rel.components() {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(&component.as_os_str().to_string_lossy());
    }
    Some(key)
}
