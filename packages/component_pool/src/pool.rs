use std::any::type_name;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;
use std::result;
use std::slice;
use std::thread;

use tracing::{debug, trace};

use crate::{
    BlockIndex, Component, ComponentPoolBuilder, ControlBlockAllocator, CreateError, DropPolicy,
    Error, Handle, PendingChanges, Result, UpdateContext,
};

/// A fixed-capacity object pool that stores its records contiguously, split into a sleeping and
/// an active partition, and hands out stable [`Handle`]s to them.
///
/// # Storage layout
///
/// Records live in one contiguous block. Sleeping records occupy the front of the block and
/// active records follow them, so [`update()`][1] walks a single dense slice. Records are moved
/// around within the block when they change partition or when another record is deleted. Each
/// record is tracked by a control block that follows it around, which is what [`Handle`]s point
/// to.
///
/// # Deferred changes
///
/// Structural changes are never applied immediately. [`set_active()`][2] and [`delete()`][3]
/// only record the request; [`commit()`][4] applies everything requested since the previous
/// commit. A frame therefore looks like:
///
/// ```rust
/// use component_pool::{Component, ComponentPool, UpdateContext};
///
/// struct Countdown {
///     remaining: f32,
///     me: component_pool::Handle<Countdown>,
/// }
///
/// impl Component for Countdown {
///     fn update(&mut self, delta_time: f32, ctx: &UpdateContext<'_, Self>) {
///         self.remaining -= delta_time;
///
///         if self.remaining <= 0.0 {
///             // Takes effect at the next commit.
///             ctx.delete(&self.me).unwrap();
///         }
///     }
/// }
///
/// let mut pool = ComponentPool::with_capacity(8);
/// let handle = pool
///     .create_with(|me| Countdown {
///         remaining: 0.5,
///         me: me.clone(),
///     })
///     .unwrap();
///
/// pool.update(0.25);
/// pool.commit();
/// assert!(handle.is_valid());
///
/// pool.update(0.25);
/// pool.commit();
/// assert!(!handle.is_valid());
/// assert!(pool.is_empty());
/// ```
///
/// # Thread safety
///
/// The pool is single-threaded and is neither [`Send`] nor [`Sync`].
///
/// [1]: Self::update
/// [2]: Self::set_active
/// [3]: Self::delete
/// [4]: Self::commit
pub struct ComponentPool<T> {
    /// Shared with every handle issued by this pool.
    allocator: Rc<ControlBlockAllocator>,

    /// `[0, sleeping_count)` is the sleeping partition, the rest is the active partition.
    records: Vec<T>,

    /// Control block of the record at the same index of `records`.
    slot_owner: Vec<BlockIndex>,

    sleeping_count: usize,
    active_count: usize,

    pending: PendingChanges,

    drop_policy: DropPolicy,
}

/// What a call to [`ComponentPool::commit()`] changed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommitSummary {
    deleted: usize,
    woken: usize,
    slept: usize,
}

impl CommitSummary {
    /// Number of records removed from the pool.
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.deleted
    }

    /// Number of records moved from the sleeping to the active partition. Records that were
    /// woken only in order to be deleted are not counted.
    #[must_use]
    pub fn woken(&self) -> usize {
        self.woken
    }

    /// Number of records moved from the active to the sleeping partition.
    #[must_use]
    pub fn slept(&self) -> usize {
        self.slept
    }

    /// Whether the commit changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deleted == 0 && self.woken == 0 && self.slept == 0
    }
}

impl<T> ComponentPool<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub(crate) fn new_inner(capacity: usize, drop_policy: DropPolicy) -> Self {
        assert!(capacity > 0, "ComponentPool must have non-zero capacity");

        debug!(
            capacity,
            ?drop_policy,
            record_type = type_name::<T>(),
            "creating component pool"
        );

        Self {
            allocator: Rc::new(ControlBlockAllocator::with_capacity(capacity)),
            records: Vec::with_capacity(capacity),
            slot_owner: Vec::with_capacity(capacity),
            sleeping_count: 0,
            active_count: 0,
            pending: PendingChanges::default(),
            drop_policy,
        }
    }

    /// Creates a new [`ComponentPool`] with the default configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use component_pool::{ComponentPool, DEFAULT_CAPACITY};
    ///
    /// let pool = ComponentPool::<String>::new();
    ///
    /// assert!(pool.is_empty());
    /// assert_eq!(pool.capacity(), DEFAULT_CAPACITY);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new [`ComponentPool`] that holds at most `capacity` records.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::builder().capacity(capacity).build()
    }

    /// Starts building a new [`ComponentPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the defaults.
    pub fn builder() -> ComponentPoolBuilder<T> {
        ComponentPoolBuilder::new()
    }

    /// The number of records in the pool, in either partition.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated to accept more records than capacity.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the pool holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The maximum number of records the pool can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.allocator.capacity()
    }

    /// The number of records in the active partition.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// The number of records in the sleeping partition.
    #[must_use]
    pub fn sleeping_count(&self) -> usize {
        self.sleeping_count
    }

    /// Whether any requests are waiting for the next [`commit()`][Self::commit].
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Creates a new active record and returns a handle to it.
    ///
    /// The record takes part in updates starting with the next call to
    /// [`update()`][Self::update].
    ///
    /// # Errors
    ///
    /// [`Error::PoolExhausted`] if the pool is at capacity. The value is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use component_pool::{ComponentPool, Error};
    ///
    /// let mut pool = ComponentPool::with_capacity(1);
    ///
    /// let handle = pool.create("first".to_string()).unwrap();
    /// assert_eq!(pool.get(&handle).unwrap(), "first");
    ///
    /// assert_eq!(
    ///     pool.create("second".to_string()),
    ///     Err(Error::PoolExhausted { capacity: 1 })
    /// );
    /// ```
    pub fn create(&mut self, value: T) -> Result<Handle<T>> {
        self.create_with(|_| value)
    }

    /// Creates a new active record from a closure that receives the handle of the record being
    /// created. This allows the record to hold a handle to itself.
    ///
    /// # Errors
    ///
    /// [`Error::PoolExhausted`] if the pool is at capacity. The closure is not called.
    pub fn create_with<F>(&mut self, f: F) -> Result<Handle<T>>
    where
        F: FnOnce(&Handle<T>) -> T,
    {
        match self.try_create_with(|handle| Ok::<T, Infallible>(f(handle))) {
            Ok(handle) => Ok(handle),
            Err(CreateError::Pool(error)) => Err(error),
            Err(CreateError::Construction(never)) => match never {},
        }
    }

    /// Creates a new active record from a fallible closure that receives the handle of the
    /// record being created.
    ///
    /// If the closure fails (or panics), the control block reserved for the record is returned
    /// to the pool and any handle the closure may have cloned is invalidated. The pool is left
    /// as it was before the call.
    ///
    /// # Errors
    ///
    /// [`CreateError::Pool`] if the pool is at capacity, [`CreateError::Construction`] with the
    /// closure's error if the closure fails.
    ///
    /// # Example
    ///
    /// ```rust
    /// use component_pool::{ComponentPool, CreateError};
    ///
    /// let mut pool = ComponentPool::<u8>::with_capacity(4);
    ///
    /// let result = pool.try_create_with(|_| "300".parse::<u8>());
    ///
    /// assert!(matches!(result, Err(CreateError::Construction(_))));
    /// assert!(pool.is_empty());
    /// ```
    pub fn try_create_with<E, F>(&mut self, f: F) -> result::Result<Handle<T>, CreateError<E>>
    where
        F: FnOnce(&Handle<T>) -> result::Result<T, E>,
    {
        let slot = self.len();

        if slot >= self.capacity() {
            return Err(Error::PoolExhausted {
                capacity: self.capacity(),
            }
            .into());
        }

        let index = self.allocator.allocate()?;

        // Until the record is in place, any exit from this function hands the block back.
        let allocator = &self.allocator;
        let reservation = scopeguard::guard(index, |index| {
            trace!(index, "rolling back reserved control block");

            allocator
                .release(index)
                .expect("block was allocated above and never linked anywhere");
        });

        let handle = Handle::new(Rc::clone(allocator), index);

        let value = f(&handle).map_err(CreateError::Construction)?;

        let index = scopeguard::ScopeGuard::into_inner(reservation);

        self.records.push(value);
        self.slot_owner.push(index);
        self.allocator.construct(index, slot);

        self.active_count = self
            .active_count
            .checked_add(1)
            .expect("guarded by capacity check above");

        trace!(index, slot, "created record");

        Ok(handle)
    }

    /// Requests that the record be moved to the active (`true`) or sleeping (`false`)
    /// partition. The change is applied at the next [`commit()`][Self::commit].
    ///
    /// Requesting the state the record is already in does nothing, even when an opposite
    /// request is outstanding. Otherwise, when several requests are made before a commit, the
    /// last one wins.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`] if the handle is null or stale,
    /// [`Error::ForeignHandle`] if it was issued by another pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use component_pool::ComponentPool;
    ///
    /// let mut pool = ComponentPool::<u32>::with_capacity(2);
    /// let handle = pool.create(5).unwrap();
    ///
    /// pool.set_active(&handle, false).unwrap();
    /// assert_eq!(pool.is_active(&handle), Ok(true));
    ///
    /// pool.commit();
    /// assert_eq!(pool.is_active(&handle), Ok(false));
    /// assert_eq!(pool.sleeping_count(), 1);
    /// ```
    pub fn set_active(&mut self, handle: &Handle<T>, active: bool) -> Result<()> {
        self.pending
            .request_active_state(&self.allocator, handle, active)
    }

    /// Requests that the record be deleted. The record is removed and all handles to it become
    /// invalid at the next [`commit()`][Self::commit].
    ///
    /// Requesting deletion again before the commit has no further effect. A deletion request
    /// overrides any activation request for the same record.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`] if the handle is null or stale,
    /// [`Error::ForeignHandle`] if it was issued by another pool.
    pub fn delete(&mut self, handle: &Handle<T>) -> Result<()> {
        self.pending.request_deletion(&self.allocator, handle)
    }

    /// Whether the record is currently in the active partition. Uncommitted requests are not
    /// taken into account.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`] if the handle is null or stale,
    /// [`Error::ForeignHandle`] if it was issued by another pool.
    pub fn is_active(&self, handle: &Handle<T>) -> Result<bool> {
        let index = self.allocator.resolve(handle)?;

        Ok(self.allocator.block(index).is_active())
    }

    /// Gets a shared reference to the record.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`] if the handle is null or stale,
    /// [`Error::ForeignHandle`] if it was issued by another pool.
    pub fn get(&self, handle: &Handle<T>) -> Result<&T> {
        let slot = self.slot_of(handle)?;

        Ok(self
            .records
            .get(slot)
            .expect("a live control block always points at a live record"))
    }

    /// Gets an exclusive reference to the record.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`] if the handle is null or stale,
    /// [`Error::ForeignHandle`] if it was issued by another pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use component_pool::ComponentPool;
    ///
    /// let mut pool = ComponentPool::with_capacity(2);
    /// let handle = pool.create(vec![1, 2]).unwrap();
    ///
    /// pool.get_mut(&handle).unwrap().push(3);
    ///
    /// assert_eq!(pool.get(&handle).unwrap(), &[1, 2, 3]);
    /// ```
    pub fn get_mut(&mut self, handle: &Handle<T>) -> Result<&mut T> {
        let slot = self.slot_of(handle)?;

        Ok(self
            .records
            .get_mut(slot)
            .expect("a live control block always points at a live record"))
    }

    /// The records in the sleeping partition, in storage order.
    #[must_use]
    pub fn sleeping(&self) -> &[T] {
        self.records
            .get(..self.sleeping_count)
            .expect("sleeping count never exceeds the number of records")
    }

    /// The records in the active partition, in the order [`update()`][Self::update] visits them.
    #[must_use]
    pub fn active(&self) -> &[T] {
        self.records
            .get(self.sleeping_count..)
            .expect("sleeping count never exceeds the number of records")
    }

    /// Iterates over all records, sleeping ones first.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.records.iter()
    }

    /// Applies all requests made since the previous commit.
    ///
    /// Requests are applied one control block at a time, most recently queued first. For each
    /// record a deletion request takes precedence over an activation request. Handles to deleted
    /// records become invalid when this method returns.
    ///
    /// This must not be called while references into the pool are held, which the borrow
    /// checker enforces.
    pub fn commit(&mut self) -> CommitSummary {
        let mut summary = CommitSummary::default();

        while let Some(index) = self.pending.pop(&self.allocator) {
            let block = self.allocator.block(index);
            let pending_delete = block.is_pending_deletion();
            let pending_state = block.pending_active_state();

            if pending_delete {
                self.delete_internal(index);
                summary.deleted = summary
                    .deleted
                    .checked_add(1)
                    .expect("bounded by capacity");
            } else {
                let desired =
                    pending_state.expect("a queued control block always carries a request");

                if self.set_active_internal(index, desired) {
                    let counter = if desired {
                        &mut summary.woken
                    } else {
                        &mut summary.slept
                    };
                    *counter = counter.checked_add(1).expect("bounded by capacity");
                }

                self.allocator.block(index).clear_pending_changes();
            }
        }

        if !summary.is_empty() {
            debug!(
                deleted = summary.deleted,
                woken = summary.woken,
                slept = summary.slept,
                active = self.active_count,
                sleeping = self.sleeping_count,
                "committed pending changes"
            );
        }

        #[cfg(debug_assertions)]
        self.integrity_check();

        summary
    }

    /// Removes the record anchored by the given detached control block and releases the block.
    fn delete_internal(&mut self, index: BlockIndex) {
        // Deletion always removes from the end of the active partition, so a sleeping record is
        // woken up first.
        self.set_active_internal(index, true);

        let position = self.position_of(index);
        let last = self
            .len()
            .checked_sub(1)
            .expect("a record is being deleted so the pool is not empty");

        self.swap_slots(position, last);

        let owner = self.slot_owner.pop();
        debug_assert_eq!(owner, Some(index));

        drop(self.records.pop());

        self.active_count = self
            .active_count
            .checked_sub(1)
            .expect("the deleted record was in the active partition");

        let generation = self.allocator.block(index).generation();

        self.allocator
            .release(index)
            .expect("block was popped off the pending list so it is detached and ours");

        trace!(index, position, generation, "deleted record");
    }

    /// Moves the record to the requested partition. Returns whether it had to move.
    fn set_active_internal(&mut self, index: BlockIndex, active: bool) -> bool {
        if self.allocator.block(index).is_active() == active {
            return false;
        }

        let position = self.position_of(index);

        if active {
            // The last sleeping slot becomes the first active slot.
            let target = self
                .sleeping_count
                .checked_sub(1)
                .expect("the record is sleeping so the sleeping partition is not empty");

            self.swap_slots(position, target);

            self.sleeping_count = target;
            self.active_count = self
                .active_count
                .checked_add(1)
                .expect("bounded by capacity");
        } else {
            // The first active slot becomes the last sleeping slot.
            let target = self.sleeping_count;

            self.swap_slots(position, target);

            self.sleeping_count = self
                .sleeping_count
                .checked_add(1)
                .expect("bounded by capacity");
            self.active_count = self
                .active_count
                .checked_sub(1)
                .expect("the record is active so the active partition is not empty");
        }

        self.allocator.block(index).set_active(active);

        trace!(index, position, active, "changed record partition");

        true
    }

    /// Exchanges two records along with their control-block bookkeeping.
    fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }

        self.records.swap(a, b);
        self.slot_owner.swap(a, b);

        for slot in [a, b] {
            let owner = *self
                .slot_owner
                .get(slot)
                .expect("swapped slots are within the live range");

            self.allocator.block(owner).set_slot(slot);
        }
    }

    fn position_of(&self, index: BlockIndex) -> usize {
        self.allocator
            .block(index)
            .slot()
            .expect("a control block with pending changes anchors a live record")
    }

    fn slot_of(&self, handle: &Handle<T>) -> Result<usize> {
        let index = self.allocator.resolve(handle)?;

        // A valid handle can only lack a slot while its record is still being constructed.
        self.allocator
            .block(index)
            .slot()
            .ok_or(Error::InvalidReference)
    }

    /// Verifies the storage invariants, panicking if any is violated.
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    pub(crate) fn integrity_check(&self) {
        assert_eq!(
            self.records.len(),
            self.slot_owner.len(),
            "records and slot owner table are out of sync in pool of {}",
            type_name::<T>()
        );

        assert_eq!(
            self.sleeping_count.checked_add(self.active_count),
            Some(self.records.len()),
            "partition counts do not add up to the number of records in pool of {}",
            type_name::<T>()
        );

        assert_eq!(
            self.allocator.available().checked_add(self.records.len()),
            Some(self.capacity()),
            "every record must own exactly one control block in pool of {}",
            type_name::<T>()
        );

        for (slot, owner) in self.slot_owner.iter().enumerate() {
            let block = self.allocator.block(*owner);

            assert_eq!(
                block.slot(),
                Some(slot),
                "control block {owner} does not point back at slot {slot} in pool of {}",
                type_name::<T>()
            );

            assert_eq!(
                block.is_active(),
                slot >= self.sleeping_count,
                "control block {owner} active flag disagrees with its partition in pool of {}",
                type_name::<T>()
            );
        }
    }
}

impl<T: Component> ComponentPool<T> {
    /// Updates every record in the active partition, in storage order.
    ///
    /// Sleeping records are not visited. Records may request changes to any record of this pool
    /// through the [`UpdateContext`] they receive; these take effect at the next
    /// [`commit()`][Self::commit].
    pub fn update(&mut self, delta_time: f32) {
        // Disjoint field borrows: records are iterated while the context reaches control blocks.
        let ctx = UpdateContext::new(&self.allocator, &self.pending, delta_time);

        let active = self
            .records
            .get_mut(self.sleeping_count..)
            .expect("sleeping count never exceeds the number of records");

        for record in active {
            record.update(delta_time, &ctx);
        }
    }
}

impl<T> Default for ComponentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a ComponentPool<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> fmt::Debug for ComponentPool<T> {
    #[cfg_attr(test, mutants::skip)] // Debug output is not API surface.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("capacity", &self.capacity())
            .field("active_count", &self.active_count)
            .field("sleeping_count", &self.sleeping_count)
            .field("has_pending_changes", &self.has_pending_changes())
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for ComponentPool<T> {
    fn drop(&mut self) {
        let remaining = self.len();

        if remaining > 0 {
            debug!(
                remaining,
                record_type = type_name::<T>(),
                "dropping component pool with remaining records"
            );
        }

        // Unlink everything first, the blocks must be detached before they can be released.
        while self.pending.pop(&self.allocator).is_some() {}

        for index in self.slot_owner.drain(..) {
            self.allocator
                .release(index)
                .expect("every slot owner is an allocated, detached block of this pool");
        }

        self.records.clear();

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotDropItems && !thread::panicking() {
            assert!(
                remaining == 0,
                "dropped a non-empty pool of {} with a policy that says it must be empty when dropped",
                type_name::<T>()
            );
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    use static_assertions::assert_not_impl_any;

    use super::*;

    assert_not_impl_any!(ComponentPool<u32>: Send, Sync);

    #[derive(Debug, Default)]
    struct Ticker {
        ticks: usize,
    }

    impl Component for Ticker {
        fn update(&mut self, _delta_time: f32, _ctx: &UpdateContext<'_, Self>) {
            self.ticks = self.ticks.checked_add(1).unwrap();
        }
    }

    fn slot(pool: &ComponentPool<u32>, handle: &Handle<u32>) -> usize {
        pool.slot_of(handle).unwrap()
    }

    #[test]
    fn smoke_test() {
        let mut pool = ComponentPool::<u32>::with_capacity(3);

        let a = pool.create(1).unwrap();
        let b = pool.create(2).unwrap();
        let c = pool.create(3).unwrap();

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.active_count(), 3);
        assert_eq!(pool.sleeping_count(), 0);
        assert_eq!(pool.get(&a), Ok(&1));
        assert_eq!(pool.get(&b), Ok(&2));
        assert_eq!(pool.get(&c), Ok(&3));

        pool.delete(&b).unwrap();
        let summary = pool.commit();

        assert_eq!(summary.deleted(), 1);
        assert_eq!(pool.len(), 2);
        assert!(!b.is_valid());
        assert_eq!(pool.get(&a), Ok(&1));
        assert_eq!(pool.get(&c), Ok(&3));
    }

    #[test]
    fn records_are_appended_in_creation_order() {
        let mut pool = ComponentPool::<u32>::with_capacity(3);

        let a = pool.create(1).unwrap();
        let b = pool.create(2).unwrap();

        assert_eq!(slot(&pool, &a), 0);
        assert_eq!(slot(&pool, &b), 1);
        assert_eq!(pool.active(), &[1, 2]);
    }

    #[test]
    fn exhausted_pool_is_unchanged() {
        let mut pool = ComponentPool::<u32>::with_capacity(1);
        let a = pool.create(1).unwrap();

        assert_eq!(pool.create(2), Err(Error::PoolExhausted { capacity: 1 }));

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(&a), Ok(&1));
        pool.integrity_check();
    }

    #[test]
    fn failed_construction_rolls_back() {
        let mut pool = ComponentPool::<u32>::with_capacity(1);
        let mut leaked = Handle::null();

        let result = pool.try_create_with(|handle| {
            leaked = handle.clone();
            Err::<u32, _>("nope")
        });

        assert!(matches!(result, Err(CreateError::Construction("nope"))));
        assert!(pool.is_empty());
        assert!(!leaked.is_valid());

        // The block is available again.
        let a = pool.create(5).unwrap();
        assert_eq!(pool.get(&a), Ok(&5));
        assert_eq!(a.index(), leaked.index());
        pool.integrity_check();
    }

    #[test]
    fn panicking_construction_rolls_back() {
        let mut pool = ComponentPool::<u32>::with_capacity(1);

        let result = catch_unwind(AssertUnwindSafe(|| {
            drop(pool.create_with(|_| panic!("constructor panicked")));
        }));

        assert!(result.is_err());
        assert!(pool.is_empty());
        assert!(pool.create(1).is_ok());
    }

    #[test]
    fn construction_closure_sees_own_handle() {
        struct SelfAware {
            me: Handle<SelfAware>,
        }

        let mut pool = ComponentPool::with_capacity(1);

        let handle = pool
            .create_with(|me| SelfAware { me: me.clone() })
            .unwrap();

        assert_eq!(pool.get(&handle).unwrap().me, handle);
    }

    #[test]
    fn sleep_moves_to_front() {
        let mut pool = ComponentPool::<u32>::with_capacity(3);
        let a = pool.create(1).unwrap();
        let b = pool.create(2).unwrap();
        let c = pool.create(3).unwrap();

        pool.set_active(&c, false).unwrap();
        let summary = pool.commit();

        assert_eq!(summary.slept(), 1);
        assert_eq!(pool.sleeping_count(), 1);
        assert_eq!(pool.active_count(), 2);
        assert_eq!(slot(&pool, &c), 0);
        assert_eq!(pool.sleeping(), &[3]);
        assert_eq!(pool.is_active(&c), Ok(false));
        assert_eq!(pool.is_active(&a), Ok(true));
        assert_eq!(pool.get(&a), Ok(&1));
        assert_eq!(pool.get(&b), Ok(&2));
    }

    #[test]
    fn wake_moves_to_start_of_active() {
        let mut pool = ComponentPool::<u32>::with_capacity(3);
        let a = pool.create(1).unwrap();
        let b = pool.create(2).unwrap();
        let c = pool.create(3).unwrap();

        pool.set_active(&a, false).unwrap();
        pool.set_active(&b, false).unwrap();
        pool.commit();
        assert_eq!(pool.sleeping_count(), 2);

        pool.set_active(&a, true).unwrap();
        let summary = pool.commit();

        assert_eq!(summary.woken(), 1);
        assert_eq!(pool.sleeping_count(), 1);
        assert_eq!(slot(&pool, &a), 1);
        assert_eq!(pool.get(&b), Ok(&2));
        assert_eq!(pool.get(&c), Ok(&3));
        assert_eq!(pool.active(), &[1, 3]);
    }

    #[test]
    fn deleting_sleeping_record() {
        let mut pool = ComponentPool::<u32>::with_capacity(3);
        let a = pool.create(1).unwrap();
        let b = pool.create(2).unwrap();
        let c = pool.create(3).unwrap();

        pool.set_active(&a, false).unwrap();
        pool.set_active(&b, false).unwrap();
        pool.commit();

        pool.delete(&a).unwrap();
        let summary = pool.commit();

        assert_eq!(summary.deleted(), 1);
        assert_eq!(summary.woken(), 0);
        assert!(!a.is_valid());
        assert_eq!(pool.sleeping_count(), 1);
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.get(&b), Ok(&2));
        assert_eq!(pool.get(&c), Ok(&3));
        assert_eq!(pool.is_active(&b), Ok(false));
    }

    #[test]
    fn deletion_dominates_activation_request() {
        let mut pool = ComponentPool::<u32>::with_capacity(2);
        let a = pool.create(1).unwrap();
        let b = pool.create(2).unwrap();

        pool.set_active(&a, false).unwrap();
        pool.delete(&a).unwrap();
        let summary = pool.commit();

        assert_eq!(summary.deleted(), 1);
        assert_eq!(summary.slept(), 0);
        assert!(!a.is_valid());
        assert_eq!(pool.sleeping_count(), 0);
        assert_eq!(pool.active(), &[2]);
        assert!(b.is_valid());
    }

    #[test]
    fn double_delete_removes_once() {
        let mut pool = ComponentPool::<u32>::with_capacity(3);
        let a = pool.create(1).unwrap();
        let b = pool.create(2).unwrap();

        pool.delete(&a).unwrap();
        pool.delete(&a).unwrap();
        let summary = pool.commit();

        assert_eq!(summary.deleted(), 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(&b), Ok(&2));
        assert_eq!(pool.delete(&a), Err(Error::InvalidReference));
    }

    #[test]
    fn set_active_to_current_state_is_noop() {
        let mut pool = ComponentPool::<u32>::with_capacity(1);
        let a = pool.create(1).unwrap();

        pool.set_active(&a, true).unwrap();

        assert!(!pool.has_pending_changes());
        assert!(pool.commit().is_empty());
    }

    #[test]
    fn request_for_current_state_does_not_cancel_pending_request() {
        let mut pool = ComponentPool::<u32>::with_capacity(1);
        let a = pool.create(1).unwrap();

        pool.set_active(&a, false).unwrap();
        // Already active, so this does nothing and the sleep request stands.
        pool.set_active(&a, true).unwrap();

        assert_eq!(pool.commit().slept(), 1);
        assert_eq!(pool.is_active(&a), Ok(false));
        assert!(!pool.has_pending_changes());

        // Sleeping now, so a wake request is queued again.
        pool.set_active(&a, true).unwrap();
        assert_eq!(pool.commit().woken(), 1);
        assert_eq!(pool.is_active(&a), Ok(true));
    }

    #[test]
    fn foreign_handle_is_rejected() {
        let mut first = ComponentPool::<u32>::with_capacity(1);
        let mut second = ComponentPool::<u32>::with_capacity(1);
        let a = first.create(1).unwrap();

        assert_eq!(second.get(&a), Err(Error::ForeignHandle));
        assert_eq!(second.get_mut(&a), Err(Error::ForeignHandle));
        assert_eq!(second.delete(&a), Err(Error::ForeignHandle));
        assert_eq!(second.set_active(&a, false), Err(Error::ForeignHandle));
        assert_eq!(second.is_active(&a), Err(Error::ForeignHandle));
        assert!(!second.has_pending_changes());
    }

    #[test]
    fn null_handle_is_rejected() {
        let mut pool = ComponentPool::<u32>::with_capacity(1);
        let null = Handle::null();

        assert_eq!(pool.get(&null), Err(Error::InvalidReference));
        assert_eq!(pool.delete(&null), Err(Error::InvalidReference));
        assert_eq!(pool.set_active(&null, true), Err(Error::InvalidReference));
    }

    #[test]
    fn stale_handle_does_not_resolve_to_new_occupant() {
        let mut pool = ComponentPool::<u32>::with_capacity(1);
        let old = pool.create(1).unwrap();
        pool.delete(&old).unwrap();
        pool.commit();

        let new = pool.create(2).unwrap();

        assert_eq!(old.index(), new.index());
        assert_eq!(pool.get(&old), Err(Error::InvalidReference));
        assert_eq!(pool.get(&new), Ok(&2));
    }

    #[test]
    fn update_visits_only_active_records() {
        let mut pool = ComponentPool::<Ticker>::with_capacity(3);
        let a = pool.create(Ticker::default()).unwrap();
        let b = pool.create(Ticker::default()).unwrap();
        let c = pool.create(Ticker::default()).unwrap();

        pool.set_active(&b, false).unwrap();
        pool.commit();

        pool.update(0.1);
        pool.update(0.1);

        assert_eq!(pool.get(&a).unwrap().ticks, 2);
        assert_eq!(pool.get(&b).unwrap().ticks, 0);
        assert_eq!(pool.get(&c).unwrap().ticks, 2);
    }

    #[test]
    fn requests_during_update_wait_for_commit() {
        struct SelfDestruct {
            me: Handle<SelfDestruct>,
        }

        impl Component for SelfDestruct {
            fn update(&mut self, _delta_time: f32, ctx: &UpdateContext<'_, Self>) {
                ctx.delete(&self.me).unwrap();
                assert!(self.me.is_valid());
            }
        }

        let mut pool = ComponentPool::with_capacity(2);
        let a = pool
            .create_with(|me| SelfDestruct { me: me.clone() })
            .unwrap();

        pool.update(1.0);

        assert!(a.is_valid());
        assert_eq!(pool.len(), 1);

        pool.commit();

        assert!(!a.is_valid());
        assert!(pool.is_empty());
    }

    #[test]
    fn drop_invalidates_outstanding_handles() {
        let mut pool = ComponentPool::<u32>::with_capacity(2);
        let a = pool.create(1).unwrap();
        let b = pool.create(2).unwrap();
        pool.delete(&b).unwrap();

        drop(pool);

        assert!(!a.is_valid());
        assert!(!b.is_valid());
    }

    #[test]
    fn drop_drops_remaining_records() {
        struct Counted(Rc<Cell<usize>>);

        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.set(self.0.get().checked_add(1).unwrap());
            }
        }

        let dropped = Rc::new(Cell::new(0_usize));

        let mut pool = ComponentPool::with_capacity(3);
        _ = pool.create(Counted(Rc::clone(&dropped))).unwrap();
        let b = pool.create(Counted(Rc::clone(&dropped))).unwrap();

        pool.delete(&b).unwrap();
        pool.commit();
        assert_eq!(dropped.get(), 1);

        drop(pool);
        assert_eq!(dropped.get(), 2);
    }

    #[test]
    #[should_panic]
    fn drop_item_with_forbidden_to_drop_policy_panics() {
        let mut pool = ComponentPool::<u32>::builder()
            .capacity(1)
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        _ = pool.create(1).unwrap();
    }

    #[test]
    fn drop_emptied_pool_with_forbidden_to_drop_policy_ok() {
        let mut pool = ComponentPool::<u32>::builder()
            .capacity(1)
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        let a = pool.create(1).unwrap();
        pool.delete(&a).unwrap();
        pool.commit();

        drop(pool);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_is_panic() {
        drop(ComponentPool::<u32>::with_capacity(0));
    }

    #[test]
    fn in_refcell_works_fine() {
        let pool = RefCell::new(ComponentPool::<u32>::with_capacity(2));

        let a = pool.borrow_mut().create(1).unwrap();
        pool.borrow_mut().delete(&a).unwrap();
        pool.borrow_mut().commit();

        assert!(pool.borrow().is_empty());
    }
}
