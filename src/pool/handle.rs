use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};

use super::lifecycle::Poolable;
use super::{Pool, PoolStats, Pooled};
use crate::error::{PoolError, Rejected};

/// Single-owner shared pool whose instances can return themselves.
pub struct SharedPool<T: Poolable, C = ()> {
    inner: Rc<RefCell<Pool<T, C>>>,
}

impl<T: Poolable, C> Clone for SharedPool<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Poolable, C> SharedPool<T, C> {
    pub fn new(pool: Pool<T, C>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(pool)),
        }
    }

    /// Like [`Pool::spawn`], but the instance remembers where it came from.
    pub fn spawn(&self, params: &T::Params) -> Result<Recyclable<T, C>, PoolError> {
        let instance = self
            .inner
            .try_borrow_mut()
            .map_err(|_| PoolError::PoolBusy)?
            .spawn(params)?;
        Ok(Recyclable {
            instance,
            pool: Rc::downgrade(&self.inner),
        })
    }

    /// Counter snapshot. `PoolBusy` while the pool is mid-spawn or mid-release,
    /// e.g. when called from a factory or hook.
    pub fn stats(&self) -> Result<PoolStats, PoolError> {
        self.inner
            .try_borrow()
            .map(|pool| pool.stats())
            .map_err(|_| PoolError::PoolBusy)
    }

    pub fn active_count(&self) -> Result<usize, PoolError> {
        self.stats().map(|s| s.active)
    }

    pub fn free_count(&self) -> Result<usize, PoolError> {
        self.stats().map(|s| s.free)
    }
}

/// An instance holding a weak back-reference to the pool that vended it.
pub struct Recyclable<T: Poolable, C = ()> {
    instance: Pooled<T>,
    pool: Weak<RefCell<Pool<T, C>>>,
}

impl<T: Poolable, C> Recyclable<T, C> {
    /// A value with no pool behind it. Returning it is a no-op.
    pub fn detached(value: T) -> Self {
        Self {
            instance: Pooled::detached(value),
            pool: Weak::new(),
        }
    }

    /// Whether a live pool is still behind this instance.
    pub fn is_attached(&self) -> bool {
        self.pool.strong_count() > 0
    }

    pub fn serial(&self) -> u64 {
        self.instance.serial()
    }

    /// Release back to the vending pool.
    ///
    /// Returns `Ok(false)` and drops the value when there is no pool to go
    /// back to (never attached, or the pool is gone). If the pool is busy
    /// the instance comes back inside the error, still attached.
    pub fn return_to_pool(self) -> Result<bool, Rejected<Self>> {
        let Some(shared) = self.pool.upgrade() else {
            log::debug!("instance {} has no pool, dropping", self.instance.serial());
            return Ok(false);
        };
        let Ok(mut pool) = shared.try_borrow_mut() else {
            return Err(Rejected::new(PoolError::PoolBusy, self));
        };
        let weak = self.pool;
        pool.release(self.instance)
            .map_err(|rejected| rejected.map(|instance| Recyclable { instance, pool: weak }))?;
        Ok(true)
    }
}

impl<T: Poolable, C> Deref for Recyclable<T, C> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T: Poolable, C> DerefMut for Recyclable<T, C> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.instance
    }
}
