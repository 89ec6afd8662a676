use thiserror::Error;

/// Errors that can occur when operating on a [`ComponentPool`][crate::ComponentPool].
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A record could not be created because the pool already holds as many records as its
    /// capacity allows. The pool is unchanged.
    #[error("the pool is at its capacity of {capacity} records")]
    PoolExhausted {
        /// The fixed capacity of the pool that rejected the request.
        capacity: usize,
    },

    /// The handle is null or refers to a record that has since been deleted.
    ///
    /// This is the expected outcome of using a handle after its record was removed. The
    /// appropriate reaction is to drop the handle.
    #[error("the handle is null or refers to a record that no longer exists")]
    InvalidReference,

    /// The handle is valid but was issued by a different pool than the one it was used with.
    #[error("the handle was issued by a different pool")]
    ForeignHandle,

    /// A control block was returned to an allocator that does not own it or that already
    /// considers it free.
    #[error("control block {index} does not belong to this allocator or is already free")]
    InvalidPointer {
        /// Index of the offending control block.
        index: usize,
    },
}

/// Error returned by the fallible creation methods of
/// [`ComponentPool`][crate::ComponentPool].
///
/// Whichever variant is returned, the pool is left in the state it was in before the call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CreateError<E> {
    /// The pool rejected the request before the record was constructed.
    #[error(transparent)]
    Pool(#[from] Error),

    /// The record constructor failed. The control block reserved for the record has already
    /// been returned to the pool.
    #[error("record construction failed: {0}")]
    Construction(E),
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
