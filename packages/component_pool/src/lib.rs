#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-capacity object pool that keeps its records in one contiguous, partitioned block
//! while handing out stable, generation-checked handles to them.
//!
//! This crate provides [`ComponentPool`], a pool for records that are updated once per tick, as
//! is typical for game components or simulation agents. The pool keeps iteration fast by storing
//! records densely and moving them around as needed, yet callers can hold on to a [`Handle`] that
//! keeps finding its record wherever it has moved.
//!
//! # Key Features
//!
//! - **Contiguous storage**: Records live in a single block allocated up front, with sleeping
//!   records at the front and active records behind them.
//! - **Stable handles**: A [`Handle`] refers to its record through a control block that follows
//!   the record as it moves.
//! - **Cheap staleness detection**: Each control block carries a generation that is bumped when
//!   its record is deleted. A handle compares its captured generation on every use, so a handle to
//!   a deleted record is detected even after its control block has been reused.
//! - **Active and sleeping records**: [`ComponentPool::update()`] only visits the active
//!   partition.
//! - **Deferred structural changes**: Deletion and activation changes are requested at any time,
//!   including from inside an update, and applied together by [`ComponentPool::commit()`].
//!
//! # Frame structure
//!
//! A typical frame calls [`ComponentPool::update()`] and then [`ComponentPool::commit()`]. During
//! the update, each active record receives an [`UpdateContext`] through which it can request
//! changes to itself or to other records of the same pool:
//!
//! ```rust
//! use component_pool::{Component, ComponentPool, Handle, UpdateContext};
//!
//! struct Lamp {
//!     me: Handle<Lamp>,
//!     burn_time: f32,
//! }
//!
//! impl Component for Lamp {
//!     fn update(&mut self, delta_time: f32, ctx: &UpdateContext<'_, Self>) {
//!         self.burn_time -= delta_time;
//!
//!         if self.burn_time <= 0.0 {
//!             // Lamps that burn out go to sleep instead of being updated every frame.
//!             ctx.set_active(&self.me, false).unwrap();
//!         }
//!     }
//! }
//!
//! let mut pool = ComponentPool::with_capacity(16);
//!
//! let lamp = pool
//!     .create_with(|me| Lamp {
//!         me: me.clone(),
//!         burn_time: 1.0,
//!     })
//!     .unwrap();
//!
//! pool.update(1.0);
//! pool.commit();
//!
//! assert_eq!(pool.is_active(&lamp), Ok(false));
//! assert_eq!(pool.sleeping_count(), 1);
//!
//! // Sleeping records can be woken up again.
//! pool.get_mut(&lamp).unwrap().burn_time = 5.0;
//! pool.set_active(&lamp, true).unwrap();
//! pool.commit();
//!
//! assert_eq!(pool.active_count(), 1);
//! ```
//!
//! # Handle validity
//!
//! ```rust
//! use component_pool::{ComponentPool, Error};
//!
//! let mut pool = ComponentPool::<&str>::with_capacity(4);
//!
//! let cat = pool.create("cat").unwrap();
//! pool.delete(&cat).unwrap();
//!
//! // Still there until the commit.
//! assert_eq!(pool.get(&cat), Ok(&"cat"));
//!
//! pool.commit();
//!
//! assert!(!cat.is_valid());
//! assert_eq!(pool.get(&cat), Err(Error::InvalidReference));
//! ```

mod allocator;
mod builder;
mod context;
mod control_block;
mod drop_policy;
mod error;
mod handle;
mod pending;
mod pool;

pub(crate) use allocator::*;
pub use builder::*;
pub use context::*;
pub(crate) use control_block::*;
pub use drop_policy::*;
pub use error::*;
pub use handle::{Handle, HandleKey};
pub(crate) use pending::*;
pub use pool::{CommitSummary, ComponentPool};
