//! Filepath: src/table.rs
//!
//! Hash-partitioned sorted-list memtable representation.
//!
//! The table is a fixed array of bucket heads; each bucket is a sorted
//! singly linked list of arena-allocated nodes. A user-supplied
//! [`PrefixExtractor`] picks the bucket, so every key sharing a prefix
//! lands in the same sorted list.
//!
//! # Concurrency Model
//!
//! Single writer, any number of readers, no locks:
//!
//! - Readers: wait-free. Every traversal load (bucket head, `next`) is
//!   an acquire, pairing with the writer's release publication, so an
//!   observed node is always fully initialized.
//! - Writer: lock-free. The caller serializes writers (the enclosing
//!   memtable does); `insert` builds a node with plain stores and
//!   publishes it with a single release store.
//!
//! A reader may see a stale prefix of a bucket, never a torn one;
//! linearizability is deliberately not provided.

use std::ptr as StdPtr;
use std::sync::atomic::AtomicPtr;

use xxhash_rust::xxh32::xxh32;

use crate::arena::Arena;
use crate::key::{self, KeyComparator};
use crate::ordering::{INIT_ORD, READ_ORD, WRITE_ORD};
use crate::skiplist::SkipList;
use crate::tracing_helpers::{debug_log, trace_log};
use crate::transform::PrefixExtractor;

mod iter;

pub use iter::RepIterator;


#[cfg(test)]
mod shuttle_tests;

// ============================================================================
//  Node
// ============================================================================

/// One entry: an immutable encoded-key pointer plus the bucket link.
///
/// Never freed individually and never mutated after publication, except
/// for `next` when a successor is spliced in.
pub(crate) struct Node {
    /// Length-prefixed encoded key in the arena.
    key: *const u8,

    next: AtomicPtr<Node>,
}

impl Node {
    /// Successor in the bucket, with the acquire edge that makes the
    /// successor's fields visible.
    #[inline]
    fn next(&self) -> *mut Node {
        self.next.load(READ_ORD)
    }

    /// Publish `x` as this node's successor.
    #[inline]
    fn set_next(&self, x: *mut Node) {
        self.next.store(x, WRITE_ORD);
    }

    /// Plain store; valid only while this node is unreachable.
    #[inline]
    fn init_next(&self, x: *mut Node) {
        self.next.store(x, INIT_ORD);
    }

    /// The bare encoded key of a node.
    ///
    /// # Safety
    ///
    /// `node` must be non-null and reachable from a table whose arena is
    /// still alive.
    #[inline]
    pub(crate) unsafe fn key_of<'k>(node: *const Node) -> &'k [u8] {
        // SAFETY: per contract, `node` is live and its key was written by
        // `key::store_key`.
        unsafe { key::decode_key((*node).key) }
    }
}

// ============================================================================
//  HashLinkList
// ============================================================================

/// The hash-linklist memtable representation.
///
/// Bucket count is fixed at construction; the structure grows only by
/// [`HashLinkList::insert`] and owns nothing outside the arena.
///
/// # Example
///
/// ```rust
/// use hashlinklist::arena::Arena;
/// use hashlinklist::key::BytewiseComparator;
/// use hashlinklist::table::HashLinkList;
/// use hashlinklist::transform::PrefixExtractor;
///
/// let arena = Arena::new();
/// let table = HashLinkList::new(BytewiseComparator, &arena, PrefixExtractor::noop(), 16);
///
/// table.insert(b"apple");
/// assert!(table.contains(b"apple"));
/// assert!(!table.contains(b"banana"));
/// ```
pub struct HashLinkList<'a, C: KeyComparator> {
    bucket_count: usize,

    /// Arena-allocated array of bucket heads. The array itself is
    /// immutable after construction; each slot is updated by the writer
    /// only.
    buckets: *const AtomicPtr<Node>,

    /// Maps user keys to the prefixes that pick buckets.
    transform: PrefixExtractor,

    compare: C,

    arena: &'a Arena,
}

// SAFETY: all shared mutable state (bucket slots, node next pointers) is
// accessed through atomics with acquire/release pairing; node key bytes
// are written only before publication. The single-writer requirement on
// `insert` is a logical invariant, not a memory-safety one: racing
// writers could lose nodes but cannot tear memory.
unsafe impl<C: KeyComparator + Send> Send for HashLinkList<'_, C> {}
unsafe impl<C: KeyComparator + Sync> Sync for HashLinkList<'_, C> {}

impl<'a, C: KeyComparator> HashLinkList<'a, C> {
    /// Create an empty table with `bucket_count` buckets, all storage in
    /// `arena`.
    ///
    /// Bucket heads are initialized with plain stores: the table is not
    /// yet shared, and whoever hands it to readers provides the
    /// synchronization edge (typically a release store of the table
    /// reference itself).
    pub fn new(
        compare: C,
        arena: &'a Arena,
        transform: PrefixExtractor,
        bucket_count: usize,
    ) -> Self {
        assert!(bucket_count > 0, "bucket count must be non-zero");

        let buckets = arena
            .allocate_aligned(bucket_count * std::mem::size_of::<AtomicPtr<Node>>())
            .cast::<AtomicPtr<Node>>();
        for i in 0..bucket_count {
            // SAFETY: the allocation spans `bucket_count` slots and is
            // word-aligned, which is AtomicPtr's alignment.
            unsafe { buckets.add(i).write(AtomicPtr::new(StdPtr::null_mut())) };
        }

        debug_log!(
            bucket_count,
            transform = transform.name(),
            "hash-linklist rep created"
        );

        Self {
            bucket_count,
            buckets,
            transform,
            compare,
            arena,
        }
    }

    /// Insert an encoded key.
    ///
    /// Single-writer: the caller must guarantee no concurrent `insert`
    /// and no prior entry equal to `key` under the comparator. Both are
    /// checked in debug builds.
    ///
    /// The key bytes are copied into the arena; the new node becomes
    /// visible to readers with a single release store.
    pub fn insert(&self, key: &[u8]) {
        debug_assert!(!self.contains(key), "duplicate insertion");

        let transformed = self.transform.transform(self.compare.user_key(key));
        let index = self.bucket_index(transformed);
        // SAFETY: `index < bucket_count`, inside the bucket array.
        let bucket = unsafe { &*self.buckets.add(index) };
        let head = bucket.load(READ_ORD);

        if head.is_null() {
            let x = self.new_node(key);
            // The plain null `next` store happened in `new_node`; the
            // release below is the publication.
            bucket.store(x, WRITE_ORD);
            trace_log!(bucket = index, "inserted at empty bucket head");
            return;
        }

        let mut cur = head;
        let mut prev: *mut Node = StdPtr::null_mut();
        while !cur.is_null() {
            // SAFETY: cur was reached through published links.
            let next = unsafe { (*cur).next() };
            debug_assert!(
                cur == head || next.is_null() || self.key_is_after_node(self.node_key(next), cur),
                "bucket order violated"
            );
            if self.key_is_after_node(key, cur) {
                prev = cur;
                cur = next;
            } else {
                break;
            }
        }

        debug_assert!(
            cur.is_null() || self.compare.compare(key, self.node_key(cur)) != std::cmp::Ordering::Equal,
            "duplicate insertion"
        );

        let x = self.new_node(key);
        // SAFETY: x is unreachable until the publishing store below.
        unsafe { (*x).init_next(cur) };

        if prev.is_null() {
            bucket.store(x, WRITE_ORD);
        } else {
            // SAFETY: prev is a published node.
            unsafe { (*prev).set_next(x) };
        }
        trace_log!(bucket = index, "inserted");
    }

    /// Whether an entry equal to `key` under the comparator is present.
    ///
    /// Wait-free; may run concurrently with `insert`.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        let transformed = self.transform.transform(self.compare.user_key(key));
        let head = self.bucket_for(transformed);
        if head.is_null() {
            return false;
        }
        let x = self.find_greater_or_equal_in_bucket(head, key);
        !x.is_null() && self.compare.compare(key, self.node_key(x)) == std::cmp::Ordering::Equal
    }

    /// Always zero: the table owns no memory outside the arena, and the
    /// arena reports usage globally ([`Arena::memory_usage`]).
    #[must_use]
    pub fn approximate_memory_usage(&self) -> usize {
        0
    }

    // ========================================================================
    //  Iterator factories
    // ========================================================================

    /// Total-ordered snapshot over all buckets.
    ///
    /// Materializes every live entry into an arena-backed skip list owned
    /// by the returned iterator. Keys inserted concurrently during the
    /// build may or may not appear; what is observed is always a valid
    /// past prefix of each bucket.
    #[must_use]
    pub fn iter(&self) -> RepIterator<'_, C> {
        let list = Box::new(SkipList::new(&self.compare, self.arena));
        let mut entries = 0usize;
        for i in 0..self.bucket_count {
            let head = self.bucket_head(i);
            if head.is_null() {
                continue;
            }
            let mut cursor = iter::BucketCursor::new(self, head);
            cursor.seek_to_head();
            while cursor.valid() {
                list.insert(cursor.raw_key());
                cursor.next();
                entries += 1;
            }
        }
        debug_log!(entries, "materialized full-list snapshot");
        RepIterator::full_list(list)
    }

    /// Prefix iterator over the bucket that `slice` maps to after prefix
    /// extraction.
    #[must_use]
    pub fn iter_for(&self, slice: &[u8]) -> RepIterator<'_, C> {
        self.prefix_iter(self.transform.transform(slice))
    }

    /// Prefix iterator over the bucket of an already-extracted `prefix`.
    ///
    /// An empty bucket yields the constant-false iterator; it is cheaper
    /// than instantiating a walker over nothing.
    #[must_use]
    pub fn prefix_iter(&self, prefix: &[u8]) -> RepIterator<'_, C> {
        let head = self.bucket_for(prefix);
        if head.is_null() {
            return RepIterator::empty();
        }
        RepIterator::bucket(self, head)
    }

    /// Prefix iterator that re-selects its bucket on every `seek`.
    ///
    /// Invalid until the first `seek`.
    #[must_use]
    pub fn dynamic_prefix_iter(&self) -> RepIterator<'_, C> {
        RepIterator::dynamic(self)
    }

    // ========================================================================
    //  Bucket access
    // ========================================================================

    fn bucket_index(&self, prefix: &[u8]) -> usize {
        xxh32(prefix, 0) as usize % self.bucket_count
    }

    fn bucket_head(&self, index: usize) -> *mut Node {
        debug_assert!(index < self.bucket_count);
        // SAFETY: index is in bounds; the slot was initialized at
        // construction.
        unsafe { (*self.buckets.add(index)).load(READ_ORD) }
    }

    fn bucket_for(&self, prefix: &[u8]) -> *mut Node {
        self.bucket_head(self.bucket_index(prefix))
    }

    /// First node in the bucket with key >= `key`, or null. Accepts a
    /// null `head` (empty bucket) and returns null for it.
    pub(crate) fn find_greater_or_equal_in_bucket(&self, head: *mut Node, key: &[u8]) -> *mut Node {
        let mut x = head;
        while !x.is_null() {
            // SAFETY: x was reached through published links.
            let next = unsafe { (*x).next() };
            debug_assert!(
                x == head || next.is_null() || self.key_is_after_node(self.node_key(next), x),
                "bucket order violated"
            );
            if self.key_is_after_node(key, x) {
                x = next;
            } else {
                break;
            }
        }
        x
    }

    /// Null nodes compare as +infinity.
    fn key_is_after_node(&self, key: &[u8], n: *const Node) -> bool {
        !n.is_null() && self.compare.compare(self.node_key(n), key) == std::cmp::Ordering::Less
    }

    /// Key slice of a node known to be live.
    fn node_key(&self, node: *const Node) -> &[u8] {
        debug_assert!(!node.is_null());
        // SAFETY: callers only pass nodes reached through this table's
        // published links; the arena outlives `self`.
        unsafe { Node::key_of(node) }
    }

    fn new_node(&self, key: &[u8]) -> *mut Node {
        let stored = key::store_key(self.arena, key);
        let mem = self
            .arena
            .allocate_aligned(std::mem::size_of::<Node>())
            .cast::<Node>();
        // SAFETY: `mem` is a word-aligned allocation of the node's size.
        unsafe {
            mem.write(Node {
                key: stored,
                next: AtomicPtr::new(StdPtr::null_mut()),
            });
        }
        mem
    }
}

// ============================================================================
//  Factory
// ============================================================================

/// Builds [`HashLinkList`] reps bound to one extractor and bucket count.
///
/// The enclosing engine configures the factory once and creates a fresh
/// rep per memtable generation.
#[derive(Clone, Debug)]
pub struct HashLinkListFactory {
    transform: PrefixExtractor,
    bucket_count: usize,
}

impl HashLinkListFactory {
    #[must_use]
    pub fn new(transform: PrefixExtractor, bucket_count: usize) -> Self {
        Self {
            transform,
            bucket_count,
        }
    }

    /// Create a fresh, empty rep in `arena`.
    #[must_use]
    pub fn create_rep<'a, C: KeyComparator>(
        &self,
        compare: C,
        arena: &'a Arena,
    ) -> HashLinkList<'a, C> {
        HashLinkList::new(compare, arena, self.transform.clone(), self.bucket_count)
    }
}

// ============================================================================
//  Tests
// ============================================================================
