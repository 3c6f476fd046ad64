//! Shuttle randomized-schedule tests for the bucket protocol.
//!
//! Shuttle explores many thread schedules with a randomized scheduler.
//! Unlike loom it does not enumerate every interleaving, so it scales to
//! longer histories: here a writer drives a whole bucket through a
//! sequence of sorted splices while a reader keeps walking it.
//!
//! Run with: `cargo test --lib table::shuttle_tests`
//!
//! NOTE: shuttle schedules its own sync primitives, so the model uses
//! `shuttle::sync::atomic` on a simplified node that follows the table's
//! exact publication discipline.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

use shuttle::sync::Arc;
use shuttle::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use shuttle::thread;

struct ModelNode {
    key: u64,
    next: AtomicPtr<ModelNode>,
}

/// One bucket, driven exactly like the table drives it: acquire walk to
/// find `(prev, cur)`, plain init of the new node, release publication.
struct ModelBucket {
    head: AtomicPtr<ModelNode>,
}

impl ModelBucket {
    fn new() -> Self {
        Self {
            head: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Single-writer sorted splice.
    fn insert(&self, key: u64) {
        let node = Box::into_raw(Box::new(ModelNode {
            key,
            next: AtomicPtr::new(std::ptr::null_mut()),
        }));

        let head = self.head.load(Ordering::Acquire);
        let mut prev: *mut ModelNode = std::ptr::null_mut();
        let mut cur = head;
        // SAFETY: every traversed node was published with release.
        unsafe {
            while !cur.is_null() && (*cur).key < key {
                prev = cur;
                cur = (*cur).next.load(Ordering::Acquire);
            }
            (*node).next.store(cur, Ordering::Relaxed);
            if prev.is_null() {
                self.head.store(node, Ordering::Release);
            } else {
                (*prev).next.store(node, Ordering::Release);
            }
        }
    }

    fn contains(&self, key: u64) -> bool {
        let mut cur = self.head.load(Ordering::Acquire);
        // SAFETY: as in insert.
        unsafe {
            while !cur.is_null() && (*cur).key < key {
                cur = (*cur).next.load(Ordering::Acquire);
            }
            !cur.is_null() && (*cur).key == key
        }
    }

    fn collect(&self) -> Vec<u64> {
        let mut keys = Vec::new();
        let mut cur = self.head.load(Ordering::Acquire);
        // SAFETY: as in insert.
        unsafe {
            while !cur.is_null() {
                keys.push((*cur).key);
                cur = (*cur).next.load(Ordering::Acquire);
            }
        }
        keys
    }
}

impl Drop for ModelBucket {
    fn drop(&mut self) {
        let mut node = self.head.load(Ordering::Relaxed);
        while !node.is_null() {
            // SAFETY: drop has exclusive access; nodes came from
            // Box::into_raw.
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next.load(Ordering::Relaxed);
        }
    }
}

#[test]
fn test_shuttle_reader_sees_sorted_prefix() {
    shuttle::check_random(
        || {
            let bucket = Arc::new(ModelBucket::new());
            // Deliberately unsorted insertion order: exercises head
            // replacement and mid-list splices.
            let inserts: [u64; 5] = [7, 2, 9, 4, 1];

            let writer_bucket = Arc::clone(&bucket);
            let writer = thread::spawn(move || {
                for key in inserts {
                    writer_bucket.insert(key);
                }
            });

            let reader_bucket = Arc::clone(&bucket);
            let reader = thread::spawn(move || {
                for _ in 0..4 {
                    let keys = reader_bucket.collect();
                    assert!(keys.is_sorted(), "unsorted bucket observed: {keys:?}");
                    assert!(
                        keys.iter().all(|k| inserts.contains(k)),
                        "phantom key observed: {keys:?}"
                    );
                }
            });

            writer.join().unwrap();
            reader.join().unwrap();

            assert_eq!(bucket.collect(), vec![1, 2, 4, 7, 9]);
        },
        500,
    );
}

#[test]
fn test_shuttle_contains_after_publication() {
    shuttle::check_random(
        || {
            let bucket = Arc::new(ModelBucket::new());
            let published = Arc::new(AtomicUsize::new(0));

            let writer_bucket = Arc::clone(&bucket);
            let writer_published = Arc::clone(&published);
            let writer = thread::spawn(move || {
                for key in 1..=8u64 {
                    writer_bucket.insert(key);
                    writer_published.store(key as usize, Ordering::Release);
                }
            });

            let reader_bucket = Arc::clone(&bucket);
            let reader_published = Arc::clone(&published);
            let reader = thread::spawn(move || {
                for _ in 0..4 {
                    let upto = reader_published.load(Ordering::Acquire) as u64;
                    // Every key the writer has announced must be visible.
                    for key in 1..=upto {
                        assert!(reader_bucket.contains(key), "published key {key} missing");
                    }
                }
            });

            writer.join().unwrap();
            reader.join().unwrap();
        },
        500,
    );
}
