use crate::error::FactoryError;

/// Lifecycle hooks for a type that lives in a [`Pool`](super::Pool).
///
/// An instance is constructed once, then bounces between active and
/// inactive for as long as the pool lives:
///
/// ```text
/// Uninitialized --on_create--> Active <--on_activate / on_deactivate--> Inactive
/// ```
pub trait Poolable {
    /// Data needed to (re)place an instance when it is spawned.
    type Params;

    /// One-time construction work. Runs exactly once per underlying instance.
    fn on_create(&mut self) {}

    /// Runs on every spawn, fresh or recycled. Must fully reset observable state.
    fn on_activate(&mut self, params: &Self::Params);

    /// Runs on every release.
    fn on_deactivate(&mut self) {}
}

/// Builds a brand-new instance on a free-list miss.
///
/// `parent` is the pool's owning context, if it has one.
pub trait Factory<T: Poolable, C> {
    fn create(&mut self, params: &T::Params, parent: Option<&C>) -> Result<T, FactoryError>;
}

impl<T, C, F> Factory<T, C> for F
where
    T: Poolable,
    F: FnMut(&T::Params, Option<&C>) -> Result<T, FactoryError>,
{
    fn create(&mut self, params: &T::Params, parent: Option<&C>) -> Result<T, FactoryError> {
        self(params, parent)
    }
}
