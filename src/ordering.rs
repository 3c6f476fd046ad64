//! Standard memory orderings for concurrent list access.
//!
//! These constants ensure consistent ordering usage across the codebase
//! and make the intent clear at each access point.

use std::sync::atomic::Ordering;

/// Ordering for loads that traverse the structure (bucket heads, `next`
/// pointers). Pairs with the writer's Release publication stores, so a
/// reader that observes a node also observes its key and initial `next`.
pub const READ_ORD: Ordering = Ordering::Acquire;

/// Ordering for stores that publish a node into a bucket head or a
/// predecessor's `next`. Pairs with readers' Acquire loads.
pub const WRITE_ORD: Ordering = Ordering::Release;

/// Ordering for stores into a node that is not yet reachable.
/// No synchronization needed; the publishing store provides the edge.
pub const INIT_ORD: Ordering = Ordering::Relaxed;

/// Ordering for counters that carry no cross-thread invariants
/// (arena usage bookkeeping).
pub const RELAXED: Ordering = Ordering::Relaxed;
