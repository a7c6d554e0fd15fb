//! Reactive dependency graph driving GPU resource creation and reuse.
//!
//! A [`Provider`] is a lazily computed, cached, invalidatable value holder.
//! Value sources ([`Source`]) are mutated by their owner; derived nodes
//! ([`Cached`], built with [`Provider::map`] and the join combinators)
//! recompute on demand after an upstream change. Asynchronous work is cached
//! as a shared future ([`AsyncValue`]) so an in-flight computation is awaited
//! by every consumer instead of being re-triggered.
//!
//! # Invariants
//! - A derived node computes at most once per cache generation; repeated
//!   `get` calls return the same cached value until invalidated.
//! - Invalidation propagates synchronously and reaches every transitive
//!   subscriber exactly once per event, even through diamond-shaped graphs.
//! - Transforms run only on `get`, never eagerly on invalidation.
//!
//! The graph assumes a single consumer thread; node handles are `Rc`-based
//! and deliberately not `Send`.

mod future;
mod join;
mod node;
mod registry;

pub use future::{AsyncProviderExt, AsyncValue, async_value};
pub use join::{join3, join4, join5};
pub use node::{Cached, Constant, Epoch, Invalidate, NodeHandle, Provider, Source};
pub use registry::{ReloadRegistry, normalize_path};
