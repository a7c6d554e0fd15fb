use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Identifier for one invalidation event.
///
/// Every externally triggered `set`/`invalidate` opens a fresh epoch. Nodes
/// remember the last epoch that reached them and ignore repeats, so a
/// diamond-shaped graph notifies each subscriber exactly once per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u64);

thread_local! {
    static NEXT_EPOCH: Cell<u64> = const { Cell::new(0) };
}

impl Epoch {
    pub(crate) fn next() -> Self {
        NEXT_EPOCH.with(|counter| {
            let n = counter.get();
            counter.set(n + 1);
            Epoch(n)
        })
    }
}

/// Invalidation target. Implemented by node internals; consumers interact
/// through [`NodeHandle`].
pub trait Invalidate {
    /// Clear any cached value and fan out to subscribers, at most once per
    /// epoch.
    fn invalidate_for(&self, epoch: Epoch);
}

/// Type-erased weak reference to a node, used for invalidation subscriptions
/// and the reload registry.
///
/// The handle never owns the node: once every strong handle is dropped, the
/// subscription goes dead and is pruned on the next fan-out.
#[derive(Clone)]
pub struct NodeHandle(Weak<dyn Invalidate>);

impl NodeHandle {
    pub(crate) fn new(weak: Weak<dyn Invalidate>) -> Self {
        Self(weak)
    }

    /// Open a new invalidation epoch on the node, if it is still alive.
    /// Returns `false` for a dead handle.
    pub fn invalidate(&self) -> bool {
        match self.0.upgrade() {
            Some(node) => {
                node.invalidate_for(Epoch::next());
                true
            }
            None => false,
        }
    }

    /// Forward an existing epoch. Returns `false` for a dead handle.
    pub(crate) fn notify(&self, epoch: Epoch) -> bool {
        match self.0.upgrade() {
            Some(node) => {
                node.invalidate_for(epoch);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// Subscriber list held by every producing node.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: RefCell<Vec<NodeHandle>>,
}

impl Subscribers {
    pub(crate) fn attach(&self, subscriber: NodeHandle) {
        self.entries.borrow_mut().push(subscriber);
    }

    /// Fan out one invalidation event. The snapshot keeps subscriber
    /// callbacks from observing the list mid-mutation; dead entries are
    /// pruned afterwards.
    pub(crate) fn notify(&self, epoch: Epoch) {
        let snapshot = self.entries.borrow().clone();
        let mut any_dead = false;
        for subscriber in &snapshot {
            any_dead |= !subscriber.notify(epoch);
        }
        if any_dead {
            self.entries.borrow_mut().retain(NodeHandle::is_alive);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// A node in the dependency graph producing values of type `T`.
///
/// `T` is expected to be a cheap handle type (GPU resources, `Rc`, shared
/// futures); `get` hands out clones of the cached value, so identity is
/// preserved for downstream sharing.
pub trait Provider<T>: Clone + 'static
where
    T: Clone + 'static,
{
    /// Current value. Derived nodes compute it on first call per cache
    /// generation.
    fn get(&self) -> T;

    /// Subscribe a downstream node to invalidation events. Constants
    /// ignore this.
    fn attach(&self, subscriber: NodeHandle);

    /// Derive a new node through a transform. The result subscribes to this
    /// node's invalidation events; the transform runs lazily on `get`.
    fn map<R, F>(&self, func: F) -> Cached<R>
    where
        R: Clone + 'static,
        F: Fn(T) -> R + 'static,
    {
        let upstream = self.clone();
        let node = Cached::new(move || func(upstream.get()));
        self.attach(node.handle());
        node
    }

    /// Combine with another node into a pair-producing node subscribed to
    /// both. For wider tuples see [`join3`](crate::join3) and friends; for
    /// an optional upstream pass `Option<P>`, which yields `None` in its
    /// slot when absent.
    fn join<U, P>(&self, other: &P) -> Cached<(T, U)>
    where
        U: Clone + 'static,
        P: Provider<U>,
    {
        let a = self.clone();
        let b = other.clone();
        let node = Cached::new(move || (a.get(), b.get()));
        self.attach(node.handle());
        other.attach(node.handle());
        node
    }
}

/// A value source: no upstream, mutated by its owning component via [`set`].
///
/// [`set`]: Source::set
pub struct Source<T> {
    inner: Rc<SourceInner<T>>,
}

struct SourceInner<T> {
    value: RefCell<T>,
    subscribers: Subscribers,
}

impl<T: Clone + 'static> Source<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SourceInner {
                value: RefCell::new(value),
                subscribers: Subscribers::default(),
            }),
        }
    }

    /// Replace the held value and synchronously invalidate all dependents.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.invalidate();
    }

    /// Mutate the held value in place, then invalidate all dependents.
    pub fn update(&self, func: impl FnOnce(&mut T)) {
        func(&mut self.inner.value.borrow_mut());
        self.invalidate();
    }

    /// Fire an invalidation event without touching the value.
    pub fn invalidate(&self) {
        self.inner.invalidate_for(Epoch::next());
    }

    /// Type-erased weak handle, e.g. for the reload registry.
    pub fn handle(&self) -> NodeHandle {
        let weak: Weak<SourceInner<T>> = Rc::downgrade(&self.inner);
        NodeHandle::new(weak)
    }
}

impl<T: 'static> Invalidate for SourceInner<T> {
    fn invalidate_for(&self, epoch: Epoch) {
        self.subscribers.notify(epoch);
    }
}

impl<T: Clone + 'static> Provider<T> for Source<T> {
    fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    fn attach(&self, subscriber: NodeHandle) {
        self.inner.subscribers.attach(subscriber);
    }
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// A derived node: owns its transform, caches the result, and re-fires
/// invalidation downstream.
pub struct Cached<T> {
    inner: Rc<CachedInner<T>>,
}

struct CachedInner<T> {
    cache: RefCell<Option<T>>,
    /// Re-entrancy trap: set while the transform runs.
    computing: Cell<bool>,
    /// Last invalidation epoch observed, for exactly-once fan-in handling.
    seen: Cell<Option<Epoch>>,
    compute: Box<dyn Fn() -> T>,
    subscribers: Subscribers,
}

impl<T: Clone + 'static> Cached<T> {
    /// Build a derived node from a compute closure. The closure captures its
    /// upstream handles; callers are responsible for attaching the new node
    /// to them (which [`Provider::map`] and the join combinators do).
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(CachedInner {
                cache: RefCell::new(None),
                computing: Cell::new(false),
                seen: Cell::new(None),
                compute: Box::new(compute),
                subscribers: Subscribers::default(),
            }),
        }
    }

    /// Drop the cached value and fan out to subscribers.
    pub fn invalidate(&self) {
        self.inner.invalidate_for(Epoch::next());
    }

    /// Type-erased weak handle for subscriptions and the reload registry.
    pub fn handle(&self) -> NodeHandle {
        let weak: Weak<CachedInner<T>> = Rc::downgrade(&self.inner);
        NodeHandle::new(weak)
    }

    /// Whether a value is currently cached. Diagnostic only.
    pub fn is_cached(&self) -> bool {
        self.inner.cache.borrow().is_some()
    }
}

impl<T: 'static> Invalidate for CachedInner<T> {
    fn invalidate_for(&self, epoch: Epoch) {
        if self.seen.get() == Some(epoch) {
            return;
        }
        self.seen.set(Some(epoch));
        self.cache.borrow_mut().take();
        self.subscribers.notify(epoch);
    }
}

impl<T: Clone + 'static> Provider<T> for Cached<T> {
    fn get(&self) -> T {
        if let Some(value) = self.inner.cache.borrow().as_ref() {
            return value.clone();
        }
        // A node reading itself during its own transform means the graph has
        // a cycle. That is a programming error; trap it instead of blowing
        // the stack.
        if self.inner.computing.replace(true) {
            panic!("provider cycle: node read while computing its own value");
        }
        let value = (self.inner.compute)();
        self.inner.computing.set(false);
        *self.inner.cache.borrow_mut() = Some(value.clone());
        value
    }

    fn attach(&self, subscriber: NodeHandle) {
        self.inner.subscribers.attach(subscriber);
    }
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// An immutable node: set once at construction, never invalidated.
pub struct Constant<T> {
    value: T,
}

impl<T: Clone + 'static> Constant<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Clone + 'static> Provider<T> for Constant<T> {
    fn get(&self) -> T {
        self.value.clone()
    }

    fn attach(&self, _subscriber: NodeHandle) {}
}

impl<T: Clone> Clone for Constant<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let c = Rc::new(Cell::new(0));
        (c.clone(), c)
    }

    #[test]
    fn source_get_and_set() {
        let source = Source::new(1);
        assert_eq!(source.get(), 1);
        source.set(5);
        assert_eq!(source.get(), 5);
    }

    #[test]
    fn source_update_in_place() {
        let source = Source::new(10);
        source.update(|v| *v += 5);
        assert_eq!(source.get(), 15);
    }

    #[test]
    fn map_propagates_values() {
        let source = Source::new(5);
        let doubled = source.map(|v| v * 2);
        assert_eq!(doubled.get(), 10);

        source.set(7);
        assert_eq!(doubled.get(), 14);
    }

    #[test]
    fn map_memoizes_until_invalidated() {
        let (runs, probe) = counter();
        let source = Source::new(3);
        let derived = source.map(move |v| {
            runs.set(runs.get() + 1);
            v + 1
        });

        assert_eq!(derived.get(), 4);
        assert_eq!(derived.get(), 4);
        assert_eq!(probe.get(), 1, "transform must run exactly once");

        source.set(9);
        assert_eq!(derived.get(), 10);
        assert_eq!(probe.get(), 2);
    }

    #[test]
    fn transforms_are_lazy() {
        let (runs, probe) = counter();
        let source = Source::new(1);
        let a = source.map({
            let runs = runs.clone();
            move |v| {
                runs.set(runs.get() + 1);
                v
            }
        });
        let _b = a.map(move |v| {
            runs.set(runs.get() + 1);
            v
        });

        // Building the chain and mutating the source must not run anything.
        source.set(2);
        assert_eq!(probe.get(), 0);
    }

    #[test]
    fn diamond_recomputes_once() {
        let (runs, probe) = counter();
        let source = Source::new(1);
        let a = source.map(|v| v + 1);
        let b = source.map(|v| v * 10);
        let joined = a.join(&b).map(move |(x, y)| {
            runs.set(runs.get() + 1);
            x + y
        });

        assert_eq!(joined.get(), 12);
        assert_eq!(probe.get(), 1);

        source.set(2);
        assert_eq!(joined.get(), 23);
        assert_eq!(probe.get(), 2, "fan-in must not double-recompute");
    }

    #[test]
    fn diamond_notifies_join_once_per_event() {
        let source = Source::new(0);
        let a = source.map(|v| v);
        let b = source.map(|v| v);
        let joined = a.join(&b);
        let (runs, probe) = counter();
        let tail = joined.map(move |pair| {
            runs.set(runs.get() + 1);
            pair
        });

        tail.get();
        source.set(1);
        tail.get();
        // One compute per generation: initial + after the single event.
        assert_eq!(probe.get(), 2);
    }

    #[test]
    fn explicit_invalidate_clears_cache() {
        let (runs, probe) = counter();
        let source = Source::new(4);
        let derived = source.map(move |v| {
            runs.set(runs.get() + 1);
            v
        });

        derived.get();
        derived.invalidate();
        assert!(!derived.is_cached());
        derived.get();
        assert_eq!(probe.get(), 2);
    }

    #[test]
    fn source_invalidate_without_set() {
        let source = Source::new(1);
        let derived = source.map(|v| v);
        derived.get();
        assert!(derived.is_cached());

        source.invalidate();
        assert!(!derived.is_cached());
    }

    #[test]
    fn constant_never_invalidates() {
        let constant = Constant::new(42);
        let derived = constant.map(|v| v * 2);
        assert_eq!(derived.get(), 84);
        // Attach is a no-op; nothing to fire, the cache simply persists.
        assert!(derived.is_cached());
    }

    #[test]
    fn dead_subscribers_are_pruned() {
        let source = Source::new(0);
        {
            let _short_lived = source.map(|v| v);
            source.set(1);
        }
        // The dropped node's entry goes away on the next fan-out.
        source.set(2);
        assert_eq!(source.inner.subscribers.len(), 0);
    }

    #[test]
    fn handle_invalidate_reports_liveness() {
        let source = Source::new(0);
        let derived = source.map(|v| v);
        let handle = derived.handle();

        derived.get();
        assert!(handle.invalidate());
        assert!(!derived.is_cached());

        drop(derived);
        assert!(!handle.invalidate());
    }

    #[test]
    fn upstream_shared_by_many_downstreams() {
        let source = Source::new(2);
        let a = source.map(|v| v + 1);
        let b = source.map(|v| v * v);
        assert_eq!(a.get(), 3);
        assert_eq!(b.get(), 4);

        source.set(5);
        assert_eq!(a.get(), 6);
        assert_eq!(b.get(), 25);
    }

    #[test]
    fn cached_value_identity_is_preserved() {
        let source = Source::new(1);
        let derived = source.map(|v| Rc::new(v));
        let first = derived.get();
        let second = derived.get();
        assert!(Rc::ptr_eq(&first, &second));

        source.set(1);
        let third = derived.get();
        assert!(!Rc::ptr_eq(&first, &third));
    }

    #[test]
    #[should_panic(expected = "provider cycle")]
    fn reentrant_get_traps() {
        let slot: Rc<RefCell<Option<Cached<i32>>>> = Rc::new(RefCell::new(None));
        let inner = slot.clone();
        let node = Cached::new(move || {
            let node = inner.borrow().as_ref().cloned();
            node.map(|n| n.get()).unwrap_or(0)
        });
        *slot.borrow_mut() = Some(node.clone());
        node.get();
    }
}
