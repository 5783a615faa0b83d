use crate::pool::PoolId;

/// Error a factory may return when it cannot build a fresh instance.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can go wrong in a spawn or a release.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The factory failed on a free-list miss. Pool counters are untouched.
    #[error("factory failed to create instance: {0}")]
    Factory(#[source] FactoryError),

    /// An instance vended by another pool (or by none) was handed back here.
    #[error("instance belongs to pool {found:?}, not pool {expected}")]
    ForeignInstance {
        expected: PoolId,
        found: Option<PoolId>,
    },

    /// Release was attempted while the shared pool was already borrowed,
    /// e.g. from inside a factory or lifecycle hook.
    #[error("pool is busy (re-entrant release)")]
    PoolBusy,
}

/// A failed release or retire. Carries the instance back so nothing is lost.
#[derive(thiserror::Error)]
#[error("instance handed back: {error}")]
pub struct Rejected<I> {
    pub error: PoolError,
    pub instance: I,
}

impl<I> Rejected<I> {
    pub(crate) fn new(error: PoolError, instance: I) -> Self {
        Self { error, instance }
    }

    pub fn into_instance(self) -> I {
        self.instance
    }

    /// Rewrap the carried instance, keeping the error.
    pub fn map<J>(self, f: impl FnOnce(I) -> J) -> Rejected<J> {
        Rejected {
            error: self.error,
            instance: f(self.instance),
        }
    }
}

impl<I> std::fmt::Debug for Rejected<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Give up on the instance and keep only the error.
impl<I> From<Rejected<I>> for PoolError {
    fn from(rejected: Rejected<I>) -> Self {
        rejected.error
    }
}
