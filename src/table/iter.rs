//! Iterator variants over the hash-linklist rep.
//!
//! Four variants with deliberately different ordering contracts:
//!
//! - `Empty`: constant-false; returned for empty buckets.
//! - `Bucket`: forward walk of one bucket in comparator order.
//! - `Dynamic`: bucket re-selected by each `seek`'s target prefix.
//! - `FullList`: total order over a materialized skip-list snapshot.
//!
//! A bucket is not a total order over the table, so prefix iterators
//! treat `prev`/`seek_to_first`/`seek_to_last` as contract violations
//! and invalidate themselves instead of answering misleadingly.

use std::ptr as StdPtr;

use crate::key::{self, KeyComparator};
use crate::skiplist::{SkipList, SkipNode};

use super::{HashLinkList, Node};

// ============================================================================
//  Bucket cursor
// ============================================================================

/// Forward cursor over a single bucket list.
///
/// Only obtainable through the table's iterator factories; all
/// navigation goes through [`RepIterator`].
pub struct BucketCursor<'i, C: KeyComparator> {
    rep: &'i HashLinkList<'i, C>,
    head: *mut Node,
    node: *mut Node,
}

impl<'i, C: KeyComparator> BucketCursor<'i, C> {
    pub(crate) fn new(rep: &'i HashLinkList<'i, C>, head: *mut Node) -> Self {
        Self {
            rep,
            head,
            node: StdPtr::null_mut(),
        }
    }

    pub(crate) fn valid(&self) -> bool {
        !self.node.is_null()
    }

    fn key(&self) -> &'i [u8] {
        assert!(self.valid(), "key() on invalid iterator");
        // SAFETY: node is reachable from the rep, whose arena is alive
        // for 'i.
        unsafe { Node::key_of(self.node) }
    }

    /// The raw length-prefixed key pointer (snapshot build feeds these
    /// straight into the skip list).
    pub(crate) fn raw_key(&self) -> *const u8 {
        assert!(self.valid(), "raw_key() on invalid iterator");
        // SAFETY: node is live as above.
        unsafe { (*self.node).key }
    }

    pub(crate) fn next(&mut self) {
        assert!(self.valid(), "next() on invalid iterator");
        // SAFETY: node is live; its next link is published.
        self.node = unsafe { (*self.node).next() };
    }

    fn seek(&mut self, key: &[u8]) {
        self.node = self.rep.find_greater_or_equal_in_bucket(self.head, key);
    }

    /// Position at the bucket head.
    pub(crate) fn seek_to_head(&mut self) {
        self.node = self.head;
    }

    /// Drop the bucket binding; the cursor is invalid until re-homed.
    fn reset(&mut self, head: *mut Node) {
        self.head = head;
        self.node = StdPtr::null_mut();
    }
}

// ============================================================================
//  Full-list cursor
// ============================================================================

/// Cursor over the materialized total-order snapshot. Owns the skip list
/// it navigates; the snapshot dies with the iterator.
pub struct FullListCursor<'i, C: KeyComparator> {
    list: Box<SkipList<'i, C>>,
    node: *mut SkipNode,
}

impl<'i, C: KeyComparator> FullListCursor<'i, C> {
    fn valid(&self) -> bool {
        !self.node.is_null()
    }

    fn key(&self) -> &'i [u8] {
        assert!(self.valid(), "key() on invalid iterator");
        // SAFETY: node belongs to the owned list; its arena is alive
        // for 'i.
        unsafe { SkipNode::key_of(self.node) }
    }

    fn next(&mut self) {
        assert!(self.valid(), "next() on invalid iterator");
        // SAFETY: node is live; its level-0 link is published.
        self.node = unsafe { (*self.node).next(0) };
    }

    fn prev(&mut self) {
        assert!(self.valid(), "prev() on invalid iterator");
        // The skip list has no back links; retreat by searching for the
        // last node before the current key.
        // SAFETY: node is live as above.
        let current = unsafe { SkipNode::key_of(self.node) };
        self.node = self.list.find_less_than(current);
    }

    fn seek(&mut self, key: &[u8]) {
        self.node = self.list.find_greater_or_equal(key);
    }

    fn seek_to_first(&mut self) {
        self.node = self.list.first();
    }

    fn seek_to_last(&mut self) {
        self.node = self.list.find_last();
    }
}

// ============================================================================
//  RepIterator
// ============================================================================

/// An iterator over the rep; the variant fixes the ordering contract.
///
/// The variant set is closed by the factory API, so this is a tagged
/// enum with direct dispatch.
pub enum RepIterator<'i, C: KeyComparator> {
    /// Constant-false. Returned for empty buckets; cheaper than a walker
    /// over nothing.
    Empty,

    /// One bucket, forward only.
    Bucket(BucketCursor<'i, C>),

    /// Bucket chosen lazily by each `seek`'s target prefix.
    Dynamic(BucketCursor<'i, C>),

    /// Materialized total order.
    FullList(FullListCursor<'i, C>),
}

impl<'i, C: KeyComparator> RepIterator<'i, C> {
    pub(crate) fn empty() -> Self {
        Self::Empty
    }

    pub(crate) fn bucket(rep: &'i HashLinkList<'i, C>, head: *mut Node) -> Self {
        Self::Bucket(BucketCursor::new(rep, head))
    }

    pub(crate) fn dynamic(rep: &'i HashLinkList<'i, C>) -> Self {
        // Invalid until the first seek homes it to a bucket.
        Self::Dynamic(BucketCursor::new(rep, StdPtr::null_mut()))
    }

    pub(crate) fn full_list(list: Box<SkipList<'i, C>>) -> Self {
        Self::FullList(FullListCursor {
            list,
            node: StdPtr::null_mut(),
        })
    }

    /// Whether the iterator is positioned at an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        match self {
            Self::Empty => false,

            Self::Bucket(cursor) | Self::Dynamic(cursor) => cursor.valid(),

            Self::FullList(cursor) => cursor.valid(),
        }
    }

    /// The encoded key at the current position.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not [`RepIterator::valid`].
    #[must_use]
    pub fn key(&self) -> &'i [u8] {
        match self {
            Self::Empty => panic!("key() on invalid iterator"),

            Self::Bucket(cursor) | Self::Dynamic(cursor) => cursor.key(),

            Self::FullList(cursor) => cursor.key(),
        }
    }

    /// Advance to the next entry in this iterator's order.
    ///
    /// # Panics
    ///
    /// Panics if the iterator is not valid (`Empty` excepted: no-op).
    pub fn next(&mut self) {
        match self {
            Self::Empty => {}

            Self::Bucket(cursor) | Self::Dynamic(cursor) => cursor.next(),

            Self::FullList(cursor) => cursor.next(),
        }
    }

    /// Retreat to the previous entry.
    ///
    /// A bucket holds only a slice of the table's order, so on prefix
    /// iterators this invalidates instead of retreating.
    pub fn prev(&mut self) {
        match self {
            Self::Empty => {}

            Self::Bucket(cursor) | Self::Dynamic(cursor) => {
                cursor.reset(StdPtr::null_mut());
            }

            Self::FullList(cursor) => cursor.prev(),
        }
    }

    /// Position at the first entry with key >= `target`.
    ///
    /// `encoded_hint`, when present, is the already length-prefixed form
    /// of the same target (see [`crate::key::encode_key`]) and is used
    /// in its place.
    ///
    /// On a dynamic iterator this first re-homes to the bucket of
    /// `target`'s extracted prefix.
    pub fn seek(&mut self, target: &[u8], encoded_hint: Option<&[u8]>) {
        let seek_key = match encoded_hint {
            Some(encoded) => key::decode_prefixed(encoded),
            None => target,
        };
        match self {
            Self::Empty => {}

            Self::Bucket(cursor) => cursor.seek(seek_key),

            Self::Dynamic(cursor) => {
                let transformed = cursor.rep.transform.transform(target);
                let head = cursor.rep.bucket_for(transformed);
                cursor.reset(head);
                cursor.seek(seek_key);
            }

            Self::FullList(cursor) => cursor.seek(seek_key),
        }
    }

    /// Position at the first entry, or invalidate a prefix iterator.
    pub fn seek_to_first(&mut self) {
        match self {
            Self::Empty => {}

            Self::Bucket(cursor) | Self::Dynamic(cursor) => {
                cursor.reset(StdPtr::null_mut());
            }

            Self::FullList(cursor) => cursor.seek_to_first(),
        }
    }

    /// Position at the last entry, or invalidate a prefix iterator.
    ///
    /// Invalidating rather than positioning at the bucket's last node is
    /// deliberate: the answer would not be the table's last key.
    pub fn seek_to_last(&mut self) {
        match self {
            Self::Empty => {}

            Self::Bucket(cursor) | Self::Dynamic(cursor) => {
                cursor.reset(StdPtr::null_mut());
            }

            Self::FullList(cursor) => cursor.seek_to_last(),
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================
