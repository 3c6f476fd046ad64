//! Arena-backed insert-only skip list.
//!
//! Used solely to materialize a total-order snapshot for the full-list
//! iterator: every live key in the table is inserted here, then the
//! iterator navigates the result in comparator order, forward and
//! backward.
//!
//! Nodes live in the same arena as the table's nodes, so the snapshot
//! costs no separate teardown. There is no deletion and no rebalancing;
//! publication of a node follows the same acquire/release discipline as
//! the bucket lists.

use std::array as StdArray;
use std::cell::Cell;
use std::ptr as StdPtr;
use std::sync::atomic::{AtomicPtr, AtomicUsize};

use crate::arena::Arena;
use crate::key::{self, KeyComparator};
use crate::ordering::{INIT_ORD, READ_ORD, RELAXED, WRITE_ORD};

/// Tallest tower a node can have.
const MAX_HEIGHT: usize = 12;

/// Expected 1-in-N chance of growing a tower by one level.
const BRANCHING: u64 = 4;

/// A skip-list node: an encoded-key pointer plus its tower.
///
/// The tower is a fixed-size array; only `[0, height)` entries are ever
/// linked. Arena bytes are cheap enough that the simpler layout wins over
/// the C-style flexible array.
pub(crate) struct SkipNode {
    /// Length-prefixed encoded key in the arena. Null only for the head
    /// sentinel.
    key: *const u8,

    next: [AtomicPtr<SkipNode>; MAX_HEIGHT],
}

impl SkipNode {
    /// Successor at `level`, with the acquire edge that makes the
    /// successor's fields visible.
    #[inline]
    pub(crate) fn next(&self, level: usize) -> *mut SkipNode {
        self.next[level].load(READ_ORD)
    }

    /// Publish `x` as the successor at `level`.
    #[inline]
    fn set_next(&self, level: usize, x: *mut SkipNode) {
        self.next[level].store(x, WRITE_ORD);
    }

    /// Plain store for a node that is not yet reachable.
    #[inline]
    fn init_next(&self, level: usize, x: *mut SkipNode) {
        self.next[level].store(x, INIT_ORD);
    }

    /// The bare encoded key of a non-sentinel node.
    ///
    /// # Safety
    ///
    /// `node` must be a non-null, non-sentinel node of a list whose arena
    /// is still alive.
    #[inline]
    pub(crate) unsafe fn key_of<'k>(node: *const SkipNode) -> &'k [u8] {
        // SAFETY: per contract, `node` is live and its key was written by
        // `key::store_key`.
        unsafe { key::decode_key((*node).key) }
    }
}

/// Insert-only ordered set over encoded-key pointers.
///
/// Single writer (the snapshot build), any number of readers afterwards.
pub(crate) struct SkipList<'a, C: KeyComparator> {
    head: *mut SkipNode,

    /// Height of the tallest tower currently in use.
    max_height: AtomicUsize,

    arena: &'a Arena,
    cmp: &'a C,

    /// Xorshift state for tower heights. Only the writer touches it.
    rnd: Cell<u64>,
}

// SAFETY: the raw node graph is only mutated by the single writer; all
// cross-thread visibility goes through the acquire/release pairs on
// `next` towers. The rng cell is writer-only state. The comparator and
// arena are shared by reference, hence the Sync bound.
unsafe impl<C: KeyComparator + Sync> Send for SkipList<'_, C> {}

impl<'a, C: KeyComparator> SkipList<'a, C> {
    pub(crate) fn new(cmp: &'a C, arena: &'a Arena) -> Self {
        let head = Self::new_node(arena, StdPtr::null());
        Self {
            head,
            max_height: AtomicUsize::new(1),
            arena,
            cmp,
            rnd: Cell::new(0xdead_beef),
        }
    }

    /// Insert `key` (a length-prefixed arena pointer).
    ///
    /// Requires that no equal key is present; the table's no-duplicate
    /// invariant guarantees it.
    pub(crate) fn insert(&self, key: *const u8) {
        let mut prev = [StdPtr::null_mut::<SkipNode>(); MAX_HEIGHT];
        // SAFETY: `key` points at a stored key in the live arena.
        let key_slice = unsafe { key::decode_key(key) };
        let x = self.find_greater_or_equal_with_prev(key_slice, &mut prev);

        debug_assert!(
            // SAFETY: x, when non-null, is a live non-sentinel node.
            x.is_null() || self.cmp.compare(unsafe { SkipNode::key_of(x) }, key_slice) != std::cmp::Ordering::Equal,
            "duplicate insertion into snapshot skip list"
        );

        let height = self.random_height();
        let current_max = self.max_height.load(RELAXED);
        if height > current_max {
            for slot in prev.iter_mut().take(height).skip(current_max) {
                *slot = self.head;
            }
            // A plain store suffices: a concurrent reader that sees the
            // old height just skips the new levels, and one that sees the
            // new height before the links exist reads null from the head
            // tower and descends.
            self.max_height.store(height, RELAXED);
        }

        let node = Self::new_node(self.arena, key);
        for (level, &prev_node) in prev.iter().enumerate().take(height) {
            // SAFETY: prev[level] is either the head or a node found by
            // the search; both are live. `node` is unpublished at the
            // time of init_next.
            unsafe {
                (*node).init_next(level, (*prev_node).next(level));
                (*prev_node).set_next(level, node);
            }
        }
    }

    /// First node with key >= `key`, or null.
    pub(crate) fn find_greater_or_equal(&self, key: &[u8]) -> *mut SkipNode {
        let mut prev = [StdPtr::null_mut::<SkipNode>(); MAX_HEIGHT];
        self.find_greater_or_equal_with_prev(key, &mut prev)
    }

    /// Last node with key < `key`, or null if every node is >= `key`.
    pub(crate) fn find_less_than(&self, key: &[u8]) -> *mut SkipNode {
        let mut x = self.head;
        let mut level = self.max_height.load(RELAXED) - 1;
        loop {
            // SAFETY: x is the head or a node reached through published
            // links; both live in the arena.
            let next = unsafe { (*x).next(level) };
            if self.key_is_after_node(key, next) {
                x = next;
            } else if level == 0 {
                return if x == self.head { StdPtr::null_mut() } else { x };
            } else {
                level -= 1;
            }
        }
    }

    /// The greatest node, or null if the list is empty.
    pub(crate) fn find_last(&self) -> *mut SkipNode {
        let mut x = self.head;
        let mut level = self.max_height.load(RELAXED) - 1;
        loop {
            // SAFETY: as in `find_less_than`.
            let next = unsafe { (*x).next(level) };
            if !next.is_null() {
                x = next;
            } else if level == 0 {
                return if x == self.head { StdPtr::null_mut() } else { x };
            } else {
                level -= 1;
            }
        }
    }

    /// The least node, or null if the list is empty.
    pub(crate) fn first(&self) -> *mut SkipNode {
        // SAFETY: the head sentinel lives as long as the arena.
        unsafe { (*self.head).next(0) }
    }

    fn find_greater_or_equal_with_prev(
        &self,
        key: &[u8],
        prev: &mut [*mut SkipNode; MAX_HEIGHT],
    ) -> *mut SkipNode {
        let mut x = self.head;
        let mut level = self.max_height.load(RELAXED) - 1;
        loop {
            // SAFETY: as in `find_less_than`.
            let next = unsafe { (*x).next(level) };
            if self.key_is_after_node(key, next) {
                x = next;
            } else {
                prev[level] = x;
                if level == 0 {
                    return next;
                }
                level -= 1;
            }
        }
    }

    /// Null successors compare as +infinity.
    fn key_is_after_node(&self, key: &[u8], n: *mut SkipNode) -> bool {
        // SAFETY: n, when non-null, is a published node in the live arena.
        !n.is_null()
            && self.cmp.compare(unsafe { SkipNode::key_of(n) }, key) == std::cmp::Ordering::Less
    }

    fn new_node(arena: &Arena, key: *const u8) -> *mut SkipNode {
        let mem = arena
            .allocate_aligned(std::mem::size_of::<SkipNode>())
            .cast::<SkipNode>();
        // SAFETY: `mem` is a word-aligned allocation of the node's size,
        // and SkipNode's alignment is that of a pointer.
        unsafe {
            mem.write(SkipNode {
                key,
                next: StdArray::from_fn(|_| AtomicPtr::new(StdPtr::null_mut())),
            });
        }
        mem
    }

    fn random_height(&self) -> usize {
        let mut height = 1;
        while height < MAX_HEIGHT && self.next_rand() % BRANCHING == 0 {
            height += 1;
        }
        height
    }

    fn next_rand(&self) -> u64 {
        let mut x = self.rnd.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rnd.set(x);
        x
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::BytewiseComparator;

    fn build<'a>(
        cmp: &'a BytewiseComparator,
        arena: &'a Arena,
        keys: &[&[u8]],
    ) -> SkipList<'a, BytewiseComparator> {
        let list = SkipList::new(cmp, arena);
        for k in keys {
            list.insert(key::store_key(arena, k));
        }
        list
    }

    fn collect(list: &SkipList<'_, BytewiseComparator>) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut node = list.first();
        while !node.is_null() {
            // SAFETY: node came from published links of a live list.
            unsafe {
                out.push(SkipNode::key_of(node).to_vec());
                node = (*node).next(0);
            }
        }
        out
    }

    #[test]
    fn test_empty_list() {
        let cmp = BytewiseComparator;
        let arena = Arena::new();
        let list = build(&cmp, &arena, &[]);

        assert!(list.first().is_null());
        assert!(list.find_last().is_null());
        assert!(list.find_greater_or_equal(b"anything").is_null());
        assert!(list.find_less_than(b"anything").is_null());
    }

    #[test]
    fn test_insert_out_of_order_iterates_sorted() {
        let cmp = BytewiseComparator;
        let arena = Arena::new();
        let list = build(&cmp, &arena, &[b"cherry" as &[u8], b"apple", b"banana"]);

        assert_eq!(collect(&list), vec![b"apple".to_vec(), b"banana".to_vec(), b"cherry".to_vec()]);
    }

    #[test]
    fn test_find_greater_or_equal() {
        let cmp = BytewiseComparator;
        let arena = Arena::new();
        let list = build(&cmp, &arena, &[b"b" as &[u8], b"d", b"f"]);

        // SAFETY: returned nodes come from the live list.
        unsafe {
            assert_eq!(SkipNode::key_of(list.find_greater_or_equal(b"a")), b"b");
            assert_eq!(SkipNode::key_of(list.find_greater_or_equal(b"d")), b"d");
            assert_eq!(SkipNode::key_of(list.find_greater_or_equal(b"e")), b"f");
        }
        assert!(list.find_greater_or_equal(b"g").is_null());
    }

    #[test]
    fn test_find_less_than_and_last() {
        let cmp = BytewiseComparator;
        let arena = Arena::new();
        let list = build(&cmp, &arena, &[b"b" as &[u8], b"d", b"f"]);

        assert!(list.find_less_than(b"b").is_null());
        // SAFETY: as above.
        unsafe {
            assert_eq!(SkipNode::key_of(list.find_less_than(b"c")), b"b");
            assert_eq!(SkipNode::key_of(list.find_less_than(b"zzz")), b"f");
            assert_eq!(SkipNode::key_of(list.find_last()), b"f");
        }
    }

    #[test]
    fn test_many_keys_stay_sorted() {
        let cmp = BytewiseComparator;
        let arena = Arena::new();
        let list = SkipList::new(&cmp, &arena);

        // Insertion order deliberately scrambled by the multiplier walk.
        let mut inserted = Vec::new();
        let mut v: u32 = 1;
        for _ in 0..500 {
            v = v.wrapping_mul(2_654_435_761) ^ (v >> 16);
            let k = format!("key{v:010}").into_bytes();
            if !inserted.contains(&k) {
                list.insert(key::store_key(&arena, &k));
                inserted.push(k);
            }
        }
        inserted.sort();

        assert_eq!(collect(&list), inserted);
    }
}
