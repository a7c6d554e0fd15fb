//! Path-keyed registry of reloadable nodes.
//!
//! The registry is an explicit object owned by the top-level application and
//! passed to whatever receives asset-change notifications. Fetch-derived
//! nodes register under their asset path; a change notification invalidates
//! exactly that node's subtree. Unknown paths are a no-op, not an error.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::node::NodeHandle;

/// Canonical form of an asset path: forward slashes, no leading `./`.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let trimmed = path.strip_prefix("./").unwrap_or(&path);
    trimmed.to_string()
}

/// Registry mapping normalized asset paths to node handles.
#[derive(Default)]
pub struct ReloadRegistry {
    entries: RefCell<HashMap<String, NodeHandle>>,
}

impl ReloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under an asset path. A later registration for the
    /// same path replaces the earlier one.
    pub fn register(&self, path: impl AsRef<str>, node: NodeHandle) {
        let key = normalize_path(path.as_ref());
        tracing::debug!(path = %key, "registered reloadable node");
        self.entries.borrow_mut().insert(key, node);
    }

    /// Invalidate the node registered for `path`. Returns `true` if a live
    /// node was invalidated. Unknown paths are silently ignored; an entry
    /// whose node has been dropped is removed.
    pub fn notify_change(&self, path: &str) -> bool {
        let key = normalize_path(path);
        let entry = self.entries.borrow().get(&key).cloned();
        match entry {
            Some(handle) => {
                if handle.invalidate() {
                    tracing::info!(path = %key, "asset changed, subtree invalidated");
                    true
                } else {
                    self.entries.borrow_mut().remove(&key);
                    tracing::debug!(path = %key, "dropped stale registry entry");
                    false
                }
            }
            None => {
                tracing::debug!(path = %key, "change for unregistered path ignored");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Provider, Source};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn normalization() {
        assert_eq!(normalize_path("./assets/x.bin"), "assets/x.bin");
        assert_eq!(normalize_path("assets\\img\\x.bin"), "assets/img/x.bin");
        assert_eq!(normalize_path("assets/x.bin"), "assets/x.bin");
    }

    #[test]
    fn change_invalidates_only_the_registered_subtree() {
        let registry = ReloadRegistry::new();

        let x_source = Source::new(1);
        let x_runs = Rc::new(Cell::new(0));
        let x = x_source.map({
            let runs = x_runs.clone();
            move |v| {
                runs.set(runs.get() + 1);
                v
            }
        });

        let y_source = Source::new(2);
        let y_runs = Rc::new(Cell::new(0));
        let y = y_source.map({
            let runs = y_runs.clone();
            move |v| {
                runs.set(runs.get() + 1);
                v
            }
        });

        registry.register("assets/x.bin", x.handle());
        registry.register("assets/y.bin", y.handle());

        x.get();
        y.get();
        assert!(registry.notify_change("assets/x.bin"));
        x.get();
        y.get();

        assert_eq!(x_runs.get(), 2, "x must recompute after its change");
        assert_eq!(y_runs.get(), 1, "y keeps its cached value");
    }

    #[test]
    fn unknown_path_is_a_noop() {
        let registry = ReloadRegistry::new();
        assert!(!registry.notify_change("assets/missing.bin"));
    }

    #[test]
    fn paths_match_after_normalization() {
        let registry = ReloadRegistry::new();
        let source = Source::new(0);
        let node = source.map(|v| v);
        registry.register("assets/shaders/draw.wgsl", node.handle());

        node.get();
        assert!(registry.notify_change("./assets\\shaders\\draw.wgsl"));
        assert!(!node.is_cached());
    }

    #[test]
    fn dead_entry_is_removed_on_notify() {
        let registry = ReloadRegistry::new();
        let source = Source::new(0);
        {
            let node = source.map(|v| v);
            registry.register("assets/tmp.bin", node.handle());
        }
        assert_eq!(registry.len(), 1);
        assert!(!registry.notify_change("assets/tmp.bin"));
        assert!(registry.is_empty());
    }

    #[test]
    fn reregistration_replaces_entry() {
        let registry = ReloadRegistry::new();
        let source = Source::new(0);
        let first = source.map(|v| v);
        let second = source.map(|v| v + 1);
        registry.register("assets/a.bin", first.handle());
        registry.register("assets/a.bin", second.handle());
        assert_eq!(registry.len(), 1);

        first.get();
        second.get();
        registry.notify_change("assets/a.bin");
        assert!(first.is_cached(), "replaced node is no longer reachable");
        assert!(!second.is_cached());
    }
}
