//! # HashLinkList
//!
//! A write-optimized in-memory table representation for log-structured
//! key-value storage engines: a hash-partitioned, per-bucket sorted
//! singly linked list, keyed by a user-supplied prefix extractor.
//!
//! ## Design
//!
//! Keys are hashed by their extracted prefix into a fixed array of
//! buckets; each bucket is a sorted singly linked list of arena-allocated
//! nodes. Prefix lookups touch exactly one short list instead of a
//! table-wide ordered structure.
//!
//! - Lock-free: one writer, any number of wait-free readers, no locks
//!   anywhere on the read or write path.
//! - Acquire/release discipline: nodes are built with plain stores and
//!   published with a single release store; every traversal load is an
//!   acquire, so readers never observe a half-built node.
//! - Arena-backed: nodes, key bytes, and the bucket array live in a bump
//!   arena and are freed en masse; no per-node ownership to track.
//!
//! ## Iterators
//!
//! Prefix iterators walk one bucket forward in comparator order; a
//! dynamic variant re-selects its bucket on every seek. Cross-bucket
//! scans materialize a total-order snapshot into an internal skip list
//! on demand.
//!
//! ## Limits
//!
//! Insert-only (no deletion), fixed bucket count, no duplicate keys.
//! The enclosing memtable serializes writers and decides flush points
//! from [`Arena::memory_usage`].

pub mod arena;
pub mod key;
pub mod table;
pub mod transform;

mod ordering;
mod skiplist;
mod tracing_helpers;

pub use arena::Arena;
pub use key::{BytewiseComparator, KeyComparator};
pub use table::{HashLinkList, HashLinkListFactory, RepIterator};
pub use transform::PrefixExtractor;
