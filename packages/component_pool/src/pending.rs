use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;

use crate::{BlockIndex, ControlBlockAllocator, Handle, Link, Result};

/// The list of control blocks with structural changes waiting for the next commit.
///
/// The list is threaded through the control blocks themselves, reusing the link field that
/// forms the free list while a block is unused. Requests only annotate control blocks and link
/// them in here, they never touch record storage, which is what makes it safe to raise them
/// while the records are being iterated.
#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
    head: Cell<Option<BlockIndex>>,
}

impl PendingChanges {
    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.get().is_none()
    }

    /// Requests that the record be moved to the active (`true`) or sleeping (`false`)
    /// partition at the next commit.
    ///
    /// Asking for the state the record is already in does nothing, even if an opposite request
    /// is outstanding. Otherwise the latest request replaces any earlier one.
    pub(crate) fn request_active_state<T>(
        &self,
        allocator: &Rc<ControlBlockAllocator>,
        handle: &Handle<T>,
        desired: bool,
    ) -> Result<()> {
        let index = allocator.resolve(handle)?;
        let block = allocator.block(index);

        if block.is_active() == desired {
            trace!(index, desired, "record already in requested state");
            return Ok(());
        }

        self.enqueue(allocator, index);
        block.mark_active_state_change(desired);

        Ok(())
    }

    /// Requests that the record be deleted at the next commit. Repeated requests before the
    /// commit have no further effect.
    pub(crate) fn request_deletion<T>(
        &self,
        allocator: &Rc<ControlBlockAllocator>,
        handle: &Handle<T>,
    ) -> Result<()> {
        let index = allocator.resolve(handle)?;

        self.enqueue(allocator, index);
        allocator.block(index).mark_for_deletion();

        Ok(())
    }

    /// Pushes the block onto the list unless it is already on it.
    fn enqueue(&self, allocator: &ControlBlockAllocator, index: BlockIndex) {
        let block = allocator.block(index);

        if block.is_queued() {
            return;
        }

        assert!(
            block.link() == Link::Detached,
            "control block {index} resolved from a valid handle was on the free list"
        );

        trace!(index, "queueing control block for commit");

        block.set_link(Link::Pending {
            next: self.head.get(),
        });
        self.head.set(Some(index));
    }

    /// Pops the most recently queued block off the list, leaving it detached.
    pub(crate) fn pop(&self, allocator: &ControlBlockAllocator) -> Option<BlockIndex> {
        let index = self.head.get()?;
        let block = allocator.block(index);

        let Link::Pending { next } = block.link() else {
            panic!(
                "control block {index} at the head of the pending list was {:?}",
                block.link()
            );
        };

        self.head.set(next);
        block.set_link(Link::Detached);

        Some(index)
    }
}
