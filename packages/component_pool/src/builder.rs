use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use crate::{ComponentPool, DropPolicy};

/// The capacity of a pool built without an explicit capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Builder for creating an instance of [`ComponentPool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`ComponentPool::new()`][1] holds up to
/// [`DEFAULT_CAPACITY`] records.
///
/// # Examples
///
/// ```
/// use component_pool::{ComponentPool, DropPolicy};
///
/// let pool = ComponentPool::<u32>::builder()
///     .capacity(64)
///     .drop_policy(DropPolicy::MayDropItems)
///     .build();
///
/// assert_eq!(pool.capacity(), 64);
/// ```
///
/// [1]: ComponentPool::new
#[must_use]
pub struct ComponentPoolBuilder<T> {
    capacity: usize,
    drop_policy: DropPolicy,

    _record: PhantomData<T>,
}

impl<T> fmt::Debug for ComponentPoolBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentPoolBuilder")
            .field("record_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &self.capacity)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T> ComponentPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            drop_policy: DropPolicy::default(),
            _record: PhantomData,
        }
    }

    /// Sets the maximum number of records the pool can hold at the same time.
    ///
    /// Storage for this many records is reserved when the pool is built and the pool never
    /// grows beyond it.
    ///
    /// # Examples
    ///
    /// ```
    /// use component_pool::ComponentPool;
    ///
    /// let pool = ComponentPool::<u32>::builder().capacity(3).build();
    /// assert_eq!(pool.capacity(), 3);
    /// ```
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how
    /// to treat remaining records in the pool when the pool is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use component_pool::{ComponentPool, DropPolicy};
    ///
    /// let pool = ComponentPool::<u32>::builder()
    ///     .drop_policy(DropPolicy::MustNotDropItems)
    ///     .build();
    /// ```
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if the capacity is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use component_pool::ComponentPool;
    ///
    /// let pool = ComponentPool::<u32>::builder().build();
    /// assert!(pool.is_empty());
    /// ```
    #[must_use]
    pub fn build(self) -> ComponentPool<T> {
        ComponentPool::new_inner(self.capacity, self.drop_policy)
    }
}
