use std::any::type_name;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{BlockIndex, ControlBlock, Error, Handle, Link, Result};

static NEXT_ALLOCATOR_ID: AtomicU64 = AtomicU64::new(0);

/// Fixed-capacity free-list allocator of [`ControlBlock`]s.
///
/// Free blocks form a virtual stack threaded through the blocks themselves (an intrusive
/// freelist), so allocation and deallocation are O(1) and never touch the heap after
/// construction. The allocator knows nothing about the records its blocks anchor.
///
/// The allocator is shared between a pool and every handle the pool has issued, which is how
/// a handle can check its own validity without access to the pool. All mutation goes through
/// cells, so a shared reference is sufficient for every operation.
pub(crate) struct ControlBlockAllocator {
    /// Unique for the lifetime of the process, unlike the address of the allocator.
    id: u64,

    blocks: Box<[ControlBlock]>,

    /// Head of the free list. `None` if every block is allocated.
    free_head: Cell<Option<BlockIndex>>,

    /// Number of blocks on the free list.
    available: Cell<usize>,
}

impl ControlBlockAllocator {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity > 0,
            "ControlBlockAllocator must have non-zero capacity"
        );

        // Block `i` points to `i + 1`, the last block terminates the list.
        let blocks = (0..capacity)
            .map(|index| {
                let next = index
                    .checked_add(1)
                    .filter(|next| *next < capacity);
                ControlBlock::new_free(next)
            })
            .collect();

        Self {
            id: NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed),
            blocks,
            free_head: Cell::new(Some(0)),
            available: Cell::new(capacity),
        }
    }

    #[must_use]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Number of blocks that can still be allocated.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Only used for integrity checks.
    pub(crate) fn available(&self) -> usize {
        self.available.get()
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds. Indices only ever originate from this allocator,
    /// so an out of bounds index means a handle was resolved against the wrong allocator.
    #[must_use]
    pub(crate) fn block(&self, index: BlockIndex) -> &ControlBlock {
        self.blocks.get(index).unwrap_or_else(|| {
            panic!(
                "control block {index} out of bounds in allocator of capacity {}",
                self.blocks.len()
            )
        })
    }

    /// Pops a block from the free list. The returned block is detached from all lists.
    pub(crate) fn allocate(&self) -> Result<BlockIndex> {
        let index = self.free_head.get().ok_or(Error::PoolExhausted {
            capacity: self.capacity(),
        })?;

        let block = self.block(index);

        let Link::Free { next } = block.link() else {
            panic!(
                "control block {index} at the head of the free list was {:?}",
                block.link()
            );
        };

        self.free_head.set(next);
        block.set_link(Link::Detached);

        self.available.set(
            self.available
                .get()
                .checked_sub(1)
                .expect("a block was on the free list so the available count must be non-zero"),
        );

        Ok(index)
    }

    /// Pushes a detached block back onto the free list.
    ///
    /// Fails with [`Error::InvalidPointer`] if the index does not address one of this
    /// allocator's blocks or if the block is not detached (it is already free or still queued
    /// for a pending change).
    pub(crate) fn deallocate(&self, index: BlockIndex) -> Result<()> {
        let block = self
            .blocks
            .get(index)
            .ok_or(Error::InvalidPointer { index })?;

        if block.link() != Link::Detached {
            return Err(Error::InvalidPointer { index });
        }

        block.set_link(Link::Free {
            next: self.free_head.get(),
        });
        self.free_head.set(Some(index));

        self.available.set(
            self.available
                .get()
                .checked_add(1)
                .expect("guarded by the block having been allocated before"),
        );

        Ok(())
    }

    /// Binds an allocated block to the record at `slot` of the owning pool.
    pub(crate) fn construct(&self, index: BlockIndex, slot: usize) {
        self.block(index).construct(slot);
    }

    /// Destroys the block, invalidating all handles issued for it, and returns it to the free
    /// list. This is the single exit path for every block that was allocated.
    pub(crate) fn release(&self, index: BlockIndex) -> Result<()> {
        self.blocks
            .get(index)
            .ok_or(Error::InvalidPointer { index })?
            .destroy();

        self.deallocate(index)
    }

    /// Whether the handle was issued against this allocator. Ownership is decided by
    /// identity of the shared allocator, not by anything stored in the block.
    #[must_use]
    pub(crate) fn owns<T>(self: &Rc<Self>, handle: &Handle<T>) -> bool {
        handle
            .allocator()
            .is_some_and(|allocator| Rc::ptr_eq(allocator, self))
    }

    /// Checks that a handle is valid and was issued by this allocator, returning the index of
    /// its control block.
    pub(crate) fn resolve<T>(self: &Rc<Self>, handle: &Handle<T>) -> Result<BlockIndex> {
        if !handle.is_valid() {
            return Err(Error::InvalidReference);
        }

        if !self.owns(handle) {
            return Err(Error::ForeignHandle);
        }

        Ok(handle
            .index()
            .expect("a valid handle always refers to a control block"))
    }
}

impl fmt::Debug for ControlBlockAllocator {
    #[cfg_attr(test, mutants::skip)] // Debug output is not API surface.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("free_head", &self.free_head.get())
            .finish_non_exhaustive()
    }
}
