use std::cell::Cell;

/// Index of a control block in its [`ControlBlockAllocator`][crate::ControlBlockAllocator].
pub(crate) type BlockIndex = usize;

/// Which list, if any, a control block is currently threaded onto.
///
/// A control block is on the free list while unused and may be on the pending-change list
/// while in use. Both lists are singly linked through the same field, so the two memberships
/// are expressed as variants of one value and can never overlap.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Link {
    /// Allocated and not queued for any pending change.
    Detached,

    /// On the allocator's free list.
    Free { next: Option<BlockIndex> },

    /// On the pool's pending-change list.
    Pending { next: Option<BlockIndex> },
}

/// State flags of the record a control block anchors.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Flags {
    /// Whether the record is in the active partition.
    active: bool,

    /// The requested activation state to apply at the next commit, if any. Holding a single
    /// optional value means a new request always replaces the previous one.
    pending_state: Option<bool>,

    /// Whether the record is to be deleted at the next commit. Dominates `pending_state`.
    pending_delete: bool,
}

/// Per-record metadata that handles point to instead of pointing at the record itself.
///
/// The record may move around in the pool storage, the control block does not. The block
/// tracks where the record currently lives and carries the generation that handles compare
/// against to detect that the record they were issued for is gone.
///
/// All fields are cells because handles read the generation and slot without holding any
/// borrow of the pool.
#[derive(Debug)]
pub(crate) struct ControlBlock {
    link: Cell<Link>,

    /// Index of the record in the pool storage. `None` while the block is not anchoring a
    /// live record.
    slot: Cell<Option<usize>>,

    /// Incremented every time the record anchored by this block is destroyed. Survives block
    /// reuse, which is what lets a handle tell the current occupant apart from an earlier one.
    generation: Cell<u64>,

    flags: Cell<Flags>,
}

impl ControlBlock {
    #[must_use]
    pub(crate) fn new_free(next: Option<BlockIndex>) -> Self {
        Self {
            link: Cell::new(Link::Free { next }),
            slot: Cell::new(None),
            generation: Cell::new(0),
            flags: Cell::new(Flags::default()),
        }
    }

    #[must_use]
    pub(crate) fn link(&self) -> Link {
        self.link.get()
    }

    pub(crate) fn set_link(&self, link: Link) {
        self.link.set(link);
    }

    #[must_use]
    pub(crate) fn is_queued(&self) -> bool {
        matches!(self.link.get(), Link::Pending { .. })
    }

    #[must_use]
    pub(crate) fn slot(&self) -> Option<usize> {
        self.slot.get()
    }

    pub(crate) fn set_slot(&self, slot: usize) {
        self.slot.set(Some(slot));
    }

    #[must_use]
    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Prepares a detached block to anchor a freshly created record at `slot`.
    ///
    /// New records always start in the active partition. The generation is left untouched.
    ///
    /// # Panics
    ///
    /// Panics if the block is still threaded onto a list.
    pub(crate) fn construct(&self, slot: usize) {
        assert!(
            self.link.get() == Link::Detached,
            "control block must be unlinked before it is constructed, was {:?}",
            self.link.get()
        );

        self.slot.set(Some(slot));
        self.flags.set(Flags {
            active: true,
            ..Flags::default()
        });
    }

    /// Detaches the block from its record and invalidates all handles issued for it.
    ///
    /// # Panics
    ///
    /// Panics if the block is still threaded onto a list.
    pub(crate) fn destroy(&self) {
        assert!(
            self.link.get() == Link::Detached,
            "control block must be unlinked before it is destroyed, was {:?}",
            self.link.get()
        );

        self.slot.set(None);
        self.flags.set(Flags::default());
        self.generation.set(
            self.generation
                .get()
                .checked_add(1)
                .expect("a u64 generation cannot realistically overflow by incrementing"),
        );
    }

    #[must_use]
    pub(crate) fn is_active(&self) -> bool {
        self.flags.get().active
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.update_flags(|flags| flags.active = active);
    }

    /// Records a request to move the record to the given partition at the next commit,
    /// replacing any earlier activation request.
    pub(crate) fn mark_active_state_change(&self, desired: bool) {
        self.update_flags(|flags| flags.pending_state = Some(desired));
    }

    #[must_use]
    pub(crate) fn pending_active_state(&self) -> Option<bool> {
        self.flags.get().pending_state
    }

    pub(crate) fn mark_for_deletion(&self) {
        self.update_flags(|flags| flags.pending_delete = true);
    }

    #[must_use]
    pub(crate) fn is_pending_deletion(&self) -> bool {
        self.flags.get().pending_delete
    }

    pub(crate) fn clear_pending_changes(&self) {
        self.update_flags(|flags| {
            flags.pending_state = None;
            flags.pending_delete = false;
        });
    }

    fn update_flags(&self, f: impl FnOnce(&mut Flags)) {
        let mut flags = self.flags.get();
        f(&mut flags);
        self.flags.set(flags);
    }
}
