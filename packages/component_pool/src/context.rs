use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::{ControlBlockAllocator, Handle, PendingChanges, Result};

/// A record that can be stored in a [`ComponentPool`][crate::ComponentPool] and updated once
/// per tick.
///
/// Any Rust type can be moved in memory and dropped without reporting failure, so the pool
/// places no further requirements on the record type.
pub trait Component: Sized {
    /// Performs one tick of work. Called by [`ComponentPool::update()`][1] for every record in
    /// the active partition.
    ///
    /// The context can be used to request activation changes or deletion of any record in the
    /// same pool, including this one. Such requests take effect at the next
    /// [`commit()`][2], never during the ongoing update.
    ///
    /// [1]: crate::ComponentPool::update
    /// [2]: crate::ComponentPool::commit
    fn update(&mut self, delta_time: f32, ctx: &UpdateContext<'_, Self>);
}

/// The view of a pool that a [`Component`] receives while the pool is being updated.
///
/// The record storage is borrowed for the duration of the update, so only operations that do
/// not touch it are available here.
pub struct UpdateContext<'p, T> {
    allocator: &'p Rc<ControlBlockAllocator>,
    pending: &'p PendingChanges,
    delta_time: f32,

    _record: PhantomData<fn() -> T>,
}

impl<'p, T> UpdateContext<'p, T> {
    #[must_use]
    pub(crate) fn new(
        allocator: &'p Rc<ControlBlockAllocator>,
        pending: &'p PendingChanges,
        delta_time: f32,
    ) -> Self {
        Self {
            allocator,
            pending,
            delta_time,
            _record: PhantomData,
        }
    }

    /// The time delta passed to the ongoing update.
    #[must_use]
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Requests that the record be moved to the active (`true`) or sleeping (`false`) partition
    /// at the next commit. Same as [`ComponentPool::set_active()`][1].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`][2] if the handle is null or stale,
    /// [`Error::ForeignHandle`][3] if it was issued by another pool.
    ///
    /// [1]: crate::ComponentPool::set_active
    /// [2]: crate::Error::InvalidReference
    /// [3]: crate::Error::ForeignHandle
    pub fn set_active(&self, handle: &Handle<T>, active: bool) -> Result<()> {
        self.pending
            .request_active_state(self.allocator, handle, active)
    }

    /// Requests that the record be deleted at the next commit. Same as
    /// [`ComponentPool::delete()`][1].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`][2] if the handle is null or stale,
    /// [`Error::ForeignHandle`][3] if it was issued by another pool.
    ///
    /// [1]: crate::ComponentPool::delete
    /// [2]: crate::Error::InvalidReference
    /// [3]: crate::Error::ForeignHandle
    pub fn delete(&self, handle: &Handle<T>) -> Result<()> {
        self.pending.request_deletion(self.allocator, handle)
    }

    /// Whether the record is currently in the active partition. Pending requests are not
    /// taken into account.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`][1] if the handle is null or stale,
    /// [`Error::ForeignHandle`][2] if it was issued by another pool.
    ///
    /// [1]: crate::Error::InvalidReference
    /// [2]: crate::Error::ForeignHandle
    pub fn is_active(&self, handle: &Handle<T>) -> Result<bool> {
        let index = self.allocator.resolve(handle)?;

        Ok(self.allocator.block(index).is_active())
    }
}

impl<T> fmt::Debug for UpdateContext<'_, T> {
    #[cfg_attr(test, mutants::skip)] // Debug output is not API surface.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("delta_time", &self.delta_time)
            .field("has_pending_changes", &!self.pending.is_empty())
            .finish_non_exhaustive()
    }
}
