//! Asynchronous node values.
//!
//! An asynchronous transform produces an [`AsyncValue`]: the in-flight (or
//! completed) operation itself, stored as the node's cached value. Repeated
//! `get` calls before resolution hand out clones of the same shared future,
//! so the underlying work runs once per cache generation. Invalidation drops
//! the shared handle; a late completion resolves into the orphaned shared
//! state and is discarded rather than clobbering a recomputed cache.
//!
//! There is no cancellation: dropping interest does not abort the work.

use std::future::Future;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use crate::node::{Cached, Provider};

/// A cached, cloneable handle to an asynchronous result.
pub type AsyncValue<T> = Shared<LocalBoxFuture<'static, T>>;

/// Wrap a future into a shareable cache slot. The future is not polled here;
/// it makes progress only when awaited by a consumer.
pub fn async_value<T, Fut>(future: Fut) -> AsyncValue<T>
where
    T: Clone + 'static,
    Fut: Future<Output = T> + 'static,
{
    future.boxed_local().shared()
}

/// Asynchronous derivation, available on every provider.
pub trait AsyncProviderExt<T>: Provider<T>
where
    T: Clone + 'static,
{
    /// Derive a node whose transform is asynchronous. The node caches the
    /// shared future itself, not just its eventual output.
    fn map_async<R, Fut, F>(&self, func: F) -> Cached<AsyncValue<R>>
    where
        R: Clone + 'static,
        Fut: Future<Output = R> + 'static,
        F: Fn(T) -> Fut + 'static,
    {
        self.map(move |value| async_value(func(value)))
    }
}

impl<T, P> AsyncProviderExt<T> for P
where
    T: Clone + 'static,
    P: Provider<T>,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Source;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn shared_future_resolves_for_every_consumer() {
        let source = Source::new(21);
        let node = source.map_async(|v| async move { v * 2 });

        let first = node.get();
        let second = node.get();
        assert_eq!(pollster::block_on(first), 42);
        assert_eq!(pollster::block_on(second), 42);
    }

    #[test]
    fn work_runs_once_per_generation() {
        let runs = Rc::new(Cell::new(0));
        let probe = runs.clone();
        let source = Source::new(1);
        let node = source.map_async(move |v| {
            let runs = runs.clone();
            async move {
                runs.set(runs.get() + 1);
                v
            }
        });

        // Two gets share one future; awaiting both runs the body once.
        let a = node.get();
        let b = node.get();
        pollster::block_on(a);
        pollster::block_on(b);
        assert_eq!(probe.get(), 1);

        source.set(2);
        assert_eq!(pollster::block_on(node.get()), 2);
        assert_eq!(probe.get(), 2);
    }

    #[test]
    fn invalidated_inflight_result_is_discarded() {
        let source = Source::new(10);
        let node = source.map_async(|v| async move { v });

        // Hold the stale future across an invalidation.
        let stale = node.get();
        source.set(99);
        let fresh = node.get();

        // The stale handle still completes with the old value, but the node's
        // cache now holds an independent future over the new state.
        assert_eq!(pollster::block_on(fresh), 99);
        assert_eq!(pollster::block_on(stale), 10);
        assert_eq!(pollster::block_on(node.get()), 99);
    }

    #[test]
    fn async_errors_propagate_to_awaiters() {
        let source = Source::new(0);
        let node = source.map_async(|v| async move {
            if v == 0 {
                Err("division by zero")
            } else {
                Ok(100 / v)
            }
        });

        assert_eq!(pollster::block_on(node.get()), Err("division by zero"));
        source.set(4);
        assert_eq!(pollster::block_on(node.get()), Ok(25));
    }
}
