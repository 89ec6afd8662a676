/// Determines record dropping behavior when the pool is dropped.
///
/// By default, the pool will drop its remaining records when it is dropped.
///
/// # Examples
///
/// ```
/// use component_pool::{ComponentPool, DropPolicy};
///
/// // The drop policy is set at pool creation time.
/// let pool = ComponentPool::<u32>::builder()
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The pool will drop its records when the pool is dropped. This is the default.
    #[default]
    MayDropItems,

    /// The pool will panic if it still contains records when it is dropped.
    ///
    /// This may be valuable if every record is expected to be deleted through the regular
    /// delete and commit cycle before the pool goes away, for example because records release
    /// external resources in response to being deleted.
    MustNotDropItems,
}
