use std::any::type_name;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;

use crate::{BlockIndex, ControlBlock, ControlBlockAllocator};

/// A stable reference to a record in a [`ComponentPool`][crate::ComponentPool].
///
/// Records move around inside the pool as it keeps its storage compact and partitioned, but a
/// handle keeps referring to the same record until that record is deleted. A handle does not
/// keep the record alive; it only remembers which record it was issued for and can tell whether
/// that record still exists.
///
/// Handles are obtained from [`ComponentPool::create()`][1] and related methods. Access to the
/// record goes through [`ComponentPool::get()`][2] and [`ComponentPool::get_mut()`][3].
///
/// # Validity
///
/// A handle is valid from the moment it is issued until the deletion of its record is
/// committed. Validity is checked afresh on every use and costs one comparison.
///
/// ```
/// use component_pool::{ComponentPool, Handle};
///
/// let mut pool = ComponentPool::<u32>::with_capacity(4);
/// let handle = pool.create(42).unwrap();
/// assert!(handle.is_valid());
///
/// pool.delete(&handle).unwrap();
/// // Deletion takes effect only when changes are committed.
/// assert!(handle.is_valid());
///
/// pool.commit();
/// assert!(!handle.is_valid());
///
/// assert!(!Handle::<u32>::null().is_valid());
/// ```
///
/// # Comparison
///
/// Two handles are equal if both are valid and refer to the same record. An invalid handle is
/// not equal to any handle, including itself, which is why `Handle` implements [`PartialEq`] but
/// not [`Eq`]. Ordering follows the current storage position of the records in their pool and
/// is only defined when both handles are valid and belong to the same pool.
///
/// Because a handle is not [`Eq`], it cannot be the key of a `HashMap` or `HashSet`. Use
/// [`key()`][Self::key] to obtain a [`HandleKey`] for that purpose. The [`Hash`] implementation
/// agrees with [`PartialEq`] and is meant for hashing handles into a [`Hasher`] directly.
///
/// # Thread safety
///
/// Handles are neither [`Send`] nor [`Sync`], the same as the pool that issues them.
///
/// [1]: crate::ComponentPool::create
/// [2]: crate::ComponentPool::get
/// [3]: crate::ComponentPool::get_mut
pub struct Handle<T> {
    target: Option<Target>,

    _record: PhantomData<fn() -> T>,
}

/// The identity of a record at the time [`Handle::key()`] was called.
///
/// Two keys are equal if and only if they were taken from handles to the same record. A key
/// stays the same after the record is deleted, and no later record will ever share it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct HandleKey {
    pool_id: u64,
    index: BlockIndex,
    generation: u64,
}

struct Target {
    allocator: Rc<ControlBlockAllocator>,
    index: BlockIndex,

    /// The generation of the control block at the time the handle was issued.
    generation: u64,
}

impl<T> Handle<T> {
    /// Creates a handle to the record currently anchored by the given control block.
    #[must_use]
    pub(crate) fn new(allocator: Rc<ControlBlockAllocator>, index: BlockIndex) -> Self {
        let generation = allocator.block(index).generation();

        Self {
            target: Some(Target {
                allocator,
                index,
                generation,
            }),
            _record: PhantomData,
        }
    }

    /// Creates a handle that does not refer to any record. It is never valid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use component_pool::Handle;
    ///
    /// let handle = Handle::<String>::null();
    /// assert!(!handle.is_valid());
    /// ```
    #[must_use]
    pub fn null() -> Self {
        Self {
            target: None,
            _record: PhantomData,
        }
    }

    /// Whether the record this handle was issued for still exists.
    ///
    /// A null handle is never valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.target.as_ref().is_some_and(|target| {
            target.allocator.block(target.index).generation() == target.generation
        })
    }

    /// Turns this handle into a null handle.
    ///
    /// # Example
    ///
    /// ```rust
    /// use component_pool::ComponentPool;
    ///
    /// let mut pool = ComponentPool::<u32>::with_capacity(1);
    ///
    /// let mut handle = pool.create(1).unwrap();
    /// handle.reset();
    ///
    /// assert!(!handle.is_valid());
    /// // The record itself is unaffected.
    /// assert_eq!(pool.len(), 1);
    /// ```
    pub fn reset(&mut self) {
        self.target = None;
    }

    /// A snapshot of the identity of the record, suitable as a key of hash-based or ordered
    /// collections. `None` if the handle is not valid.
    ///
    /// Unlike the handle itself, the key is [`Eq`] and does not change when the record is
    /// deleted. Keys of different records never compare equal, even across pools or after the
    /// control block of a deleted record has been reused.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::HashMap;
    ///
    /// use component_pool::ComponentPool;
    ///
    /// let mut pool = ComponentPool::<&str>::with_capacity(4);
    /// let cat = pool.create("cat").unwrap();
    ///
    /// let mut names = HashMap::new();
    /// names.insert(cat.key().unwrap(), "Cheshire");
    ///
    /// assert_eq!(names.get(&cat.clone().key().unwrap()), Some(&"Cheshire"));
    /// ```
    #[must_use]
    pub fn key(&self) -> Option<HandleKey> {
        if !self.is_valid() {
            return None;
        }

        let target = self.target.as_ref()?;

        Some(HandleKey {
            pool_id: target.allocator.id(),
            index: target.index,
            generation: target.generation,
        })
    }

    #[must_use]
    pub(crate) fn allocator(&self) -> Option<&Rc<ControlBlockAllocator>> {
        self.target.as_ref().map(|target| &target.allocator)
    }

    #[must_use]
    pub(crate) fn index(&self) -> Option<BlockIndex> {
        self.target.as_ref().map(|target| target.index)
    }

    /// The control block of the record, if the handle is valid.
    fn live_block(&self) -> Option<&ControlBlock> {
        let target = self.target.as_ref()?;
        let block = target.allocator.block(target.index);

        (block.generation() == target.generation).then_some(block)
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.as_ref().map(|target| Target {
                allocator: Rc::clone(&target.allocator),
                index: target.index,
                generation: target.generation,
            }),
            _record: PhantomData,
        }
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.target.as_ref(), other.target.as_ref()) {
            (Some(a), Some(b)) => {
                self.is_valid()
                    && other.is_valid()
                    && Rc::ptr_eq(&a.allocator, &b.allocator)
                    && a.index == b.index
            }
            _ => false,
        }
    }
}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let (Some(a), Some(b)) = (self.target.as_ref(), other.target.as_ref()) else {
            return None;
        };

        if !Rc::ptr_eq(&a.allocator, &b.allocator) {
            return None;
        }

        let a_slot = self.live_block()?.slot()?;
        let b_slot = other.live_block()?.slot()?;

        Some(a_slot.cmp(&b_slot))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Equal handles share the allocator and the block, so hashing those two is consistent
        // with `PartialEq`. Invalid handles all hash the same.
        match self.target.as_ref() {
            Some(target) if self.is_valid() => {
                Rc::as_ptr(&target.allocator).hash(state);
                target.index.hash(state);
            }
            _ => state.write_u8(0),
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    #[cfg_attr(test, mutants::skip)] // Debug output is not API surface.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Handle");

        debug
            .field(
                "record_type",
                &format_args!("{}", type_name::<T>()),
            )
            .field("is_valid", &self.is_valid());

        if let Some(target) = &self.target {
            debug
                .field("index", &target.index)
                .field("generation", &target.generation);
        }

        debug.finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;
    use std::collections::hash_map::DefaultHasher;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_not_impl_any!(Handle<u32>: Send, Sync, Copy, Eq, Ord);
    assert_impl_all!(HandleKey: Send, Sync, Copy, Eq, Ord, Hash);

    fn live_handle(allocator: &Rc<ControlBlockAllocator>, slot: usize) -> Handle<u32> {
        let index = allocator.allocate().unwrap();
        allocator.construct(index, slot);
        Handle::new(Rc::clone(allocator), index)
    }

    fn hash_of(handle: &Handle<u32>) -> u64 {
        let mut hasher = DefaultHasher::new();
        handle.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn null_and_default_are_invalid() {
        assert!(!Handle::<u32>::null().is_valid());
        assert!(!Handle::<u32>::default().is_valid());
    }

    #[test]
    fn becomes_invalid_when_block_released() {
        let allocator = Rc::new(ControlBlockAllocator::with_capacity(2));
        let handle = live_handle(&allocator, 0);

        assert!(handle.is_valid());

        allocator.release(handle.index().unwrap()).unwrap();

        assert!(!handle.is_valid());
    }

    #[test]
    fn stays_invalid_after_block_reuse() {
        let allocator = Rc::new(ControlBlockAllocator::with_capacity(1));
        let old = live_handle(&allocator, 0);

        allocator.release(old.index().unwrap()).unwrap();
        let new = live_handle(&allocator, 0);

        assert_eq!(old.index(), new.index());
        assert!(!old.is_valid());
        assert!(new.is_valid());
        assert_ne!(old, new);
    }

    #[test]
    fn clones_are_equal_and_hash_equal() {
        let allocator = Rc::new(ControlBlockAllocator::with_capacity(2));
        let handle = live_handle(&allocator, 0);
        let clone = handle.clone();

        assert_eq!(handle, clone);
        assert_eq!(hash_of(&handle), hash_of(&clone));
    }

    #[test]
    fn key_identifies_record() {
        let allocator = Rc::new(ControlBlockAllocator::with_capacity(2));
        let a = live_handle(&allocator, 0);
        let b = live_handle(&allocator, 1);

        let keys: HashSet<_> = [&a, &a.clone(), &b]
            .into_iter()
            .filter_map(Handle::key)
            .collect();

        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&a.key().unwrap()));
        assert!(keys.contains(&b.key().unwrap()));
    }

    #[test]
    fn key_survives_deletion_but_is_not_reissued() {
        let allocator = Rc::new(ControlBlockAllocator::with_capacity(1));
        let old = live_handle(&allocator, 0);
        let old_key = old.key().unwrap();

        allocator.release(old.index().unwrap()).unwrap();
        assert_eq!(old.key(), None);

        let new = live_handle(&allocator, 0);
        assert_ne!(new.key(), Some(old_key));
    }

    #[test]
    fn keys_differ_across_pools() {
        let first = Rc::new(ControlBlockAllocator::with_capacity(1));
        let second = Rc::new(ControlBlockAllocator::with_capacity(1));

        let a = live_handle(&first, 0);
        let b = live_handle(&second, 0);

        assert_ne!(a.key(), b.key());
        assert_eq!(Handle::<u32>::null().key(), None);
    }

    #[test]
    fn invalid_handle_is_not_equal_to_itself() {
        let allocator = Rc::new(ControlBlockAllocator::with_capacity(1));
        let handle = live_handle(&allocator, 0);
        allocator.release(handle.index().unwrap()).unwrap();

        #[expect(clippy::eq_op, reason = "testing reflexivity on purpose")]
        let equal_to_self = handle == handle;
        assert!(!equal_to_self);

        assert_ne!(Handle::<u32>::null(), Handle::<u32>::null());
    }

    #[test]
    fn handles_to_different_records_differ() {
        let allocator = Rc::new(ControlBlockAllocator::with_capacity(2));
        let a = live_handle(&allocator, 0);
        let b = live_handle(&allocator, 1);

        assert_ne!(a, b);
    }

    #[test]
    fn ordering_follows_storage_position() {
        let allocator = Rc::new(ControlBlockAllocator::with_capacity(2));
        let a = live_handle(&allocator, 1);
        let b = live_handle(&allocator, 0);

        assert!(b < a);

        allocator.block(a.index().unwrap()).set_slot(0);
        allocator.block(b.index().unwrap()).set_slot(1);

        assert!(a < b);
    }

    #[test]
    fn ordering_is_undefined_across_pools_and_for_invalid() {
        let first = Rc::new(ControlBlockAllocator::with_capacity(1));
        let second = Rc::new(ControlBlockAllocator::with_capacity(1));
        let a = live_handle(&first, 0);
        let b = live_handle(&second, 0);

        assert_eq!(a.partial_cmp(&b), None);
        assert_eq!(a.partial_cmp(&Handle::null()), None);
    }

    #[test]
    fn reset_makes_null() {
        let allocator = Rc::new(ControlBlockAllocator::with_capacity(1));
        let mut handle = live_handle(&allocator, 0);

        handle.reset();

        assert!(!handle.is_valid());
        assert_eq!(handle.index(), None);
        // The block itself is untouched.
        assert_eq!(allocator.block(0).slot(), Some(0));
    }
}
