/// Free-list slots allocated by a fresh pool.
pub const DEFAULT_INITIAL_CAPACITY: usize = 2;

/// Tuning knobs for a [`Pool`](crate::Pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Starting free-list capacity. Clamped to at least 1 so doubling always grows.
    pub initial_capacity: usize,
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Capacity the pool actually starts with.
    pub(crate) fn effective_capacity(&self) -> usize {
        self.initial_capacity.max(1)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}
