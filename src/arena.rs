//! Block-based bump allocator backing every node in the table.
//!
//! The arena hands out raw memory that is never individually freed: all
//! blocks are released at once when the arena is dropped. Nodes, key
//! bytes, bucket arrays, and the snapshot skip-list all live here, so a
//! single `Drop` bounds every lifetime in the structure.
//!
//! Allocation takes `&self` (the single writer allocates while readers
//! traverse) and is the only place in the crate that takes a lock; the
//! `parking_lot::Mutex` guards just the bump state and is held only for
//! the pointer arithmetic of a single allocation.

use std::sync::atomic::AtomicUsize;

use parking_lot::Mutex;

use crate::ordering::RELAXED;
use crate::tracing_helpers::trace_log;

/// Default size of a freshly allocated block in bytes.
const BLOCK_SIZE: usize = 4096;

/// Bump state, guarded by the arena mutex.
struct Core {
    /// Owned blocks, stored as words so every block starts word-aligned.
    /// Box contents never move when the vec reallocates, so handed-out
    /// pointers stay valid.
    blocks: Vec<Box<[usize]>>,

    /// Bump cursor into the current block.
    alloc_ptr: *mut u8,

    /// Bytes left in the current block.
    remaining: usize,

    /// Size of a normal block.
    block_size: usize,
}

/// A bump allocator whose contents are freed en masse on drop.
///
/// # Pointer Validity
///
/// Every pointer returned by [`Arena::allocate`] or
/// [`Arena::allocate_aligned`] is valid for reads and writes of the
/// requested length until the arena itself is dropped. Pointers never
/// move and are never reused.
///
/// # Example
///
/// ```rust
/// use hashlinklist::arena::Arena;
///
/// let arena = Arena::new();
/// let ptr = arena.allocate_aligned(64);
/// assert!(!ptr.is_null());
/// assert_eq!(ptr.addr() % std::mem::align_of::<usize>(), 0);
/// ```
pub struct Arena {
    core: Mutex<Core>,

    /// Total bytes reserved across all blocks.
    usage: AtomicUsize,
}

// SAFETY: The raw bump cursor is only read or written under the mutex.
// Memory handed out by the arena is written by the single writer before
// publication and read by readers only after an acquire edge; the arena
// itself never touches it again.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    /// Create an arena with the default block size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_block_size(BLOCK_SIZE)
    }

    /// Create an arena whose normal blocks are `block_size` bytes.
    ///
    /// Useful when the expected total footprint is known up front (e.g.
    /// a memtable flush threshold).
    #[must_use]
    pub fn with_block_size(block_size: usize) -> Self {
        assert!(block_size > 0, "block size must be non-zero");
        Self {
            core: Mutex::new(Core {
                blocks: Vec::new(),
                alloc_ptr: std::ptr::null_mut(),
                remaining: 0,
                block_size,
            }),
            usage: AtomicUsize::new(0),
        }
    }

    /// Allocate `bytes` with no alignment guarantee.
    ///
    /// Used for raw key bytes where byte alignment is enough.
    #[must_use]
    pub fn allocate(&self, bytes: usize) -> *mut u8 {
        debug_assert!(bytes > 0, "zero-length arena allocation");
        let mut core = self.core.lock();
        if bytes <= core.remaining {
            let ptr = core.alloc_ptr;
            // SAFETY: `remaining` bytes starting at `alloc_ptr` are inside
            // the current block.
            core.alloc_ptr = unsafe { core.alloc_ptr.add(bytes) };
            core.remaining -= bytes;
            return ptr;
        }
        self.allocate_fallback(&mut core, bytes)
    }

    /// Allocate `bytes` aligned to a machine word.
    ///
    /// Sufficient for every node type in this crate; all of them start
    /// with a pointer-sized field.
    #[must_use]
    pub fn allocate_aligned(&self, bytes: usize) -> *mut u8 {
        debug_assert!(bytes > 0, "zero-length arena allocation");
        let align = std::mem::align_of::<usize>();
        let mut core = self.core.lock();
        let pad = core.alloc_ptr.align_offset(align);
        if pad + bytes <= core.remaining {
            // SAFETY: `pad + bytes` fits in the current block.
            let ptr = unsafe { core.alloc_ptr.add(pad) };
            core.alloc_ptr = unsafe { ptr.add(bytes) };
            core.remaining -= pad + bytes;
            return ptr;
        }
        // A fresh block starts at a page-aligned address, which is
        // word-aligned already.
        self.allocate_fallback(&mut core, bytes)
    }

    /// Total bytes reserved by the arena across all blocks.
    ///
    /// A relaxed counter: concurrent readers may see a slightly stale
    /// value while the writer is mid-allocation.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.usage.load(RELAXED)
    }

    /// Slow path: the current block cannot satisfy the request.
    fn allocate_fallback(&self, core: &mut Core, bytes: usize) -> *mut u8 {
        if bytes > core.block_size / 4 {
            // Oversized request gets a dedicated block so the partially
            // used current block keeps serving small allocations.
            return self.new_block(core, bytes);
        }

        // Start a fresh current block and carve the request from its
        // front. The tail of the old block is abandoned.
        let block_size = core.block_size;
        let ptr = self.new_block(core, block_size);
        // SAFETY: `bytes <= block_size / 4`, well inside the new block.
        core.alloc_ptr = unsafe { ptr.add(bytes) };
        core.remaining = block_size - bytes;
        ptr
    }

    /// Reserve a fresh block of at least `size` bytes, rounded up to a
    /// whole number of words.
    fn new_block(&self, core: &mut Core, size: usize) -> *mut u8 {
        let words = size.div_ceil(std::mem::size_of::<usize>());
        let mut block = vec![0usize; words].into_boxed_slice();
        let ptr = block.as_mut_ptr().cast::<u8>();
        core.blocks.push(block);
        let reserved = words * std::mem::size_of::<usize>();
        self.usage.fetch_add(reserved, RELAXED);
        trace_log!(reserved, total = self.memory_usage(), "arena block reserved");
        ptr
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  Tests
// ============================================================================
