pub mod handle;
pub mod lifecycle;

use std::cell::Cell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Quat, Vec3};

use crate::config::PoolConfig;
use crate::error::{FactoryError, PoolError, Rejected};
use crate::placement::Placement;
use self::lifecycle::{Factory, Poolable};

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique identity of a pool. Stamped on every instance it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u32);

impl PoolId {
    fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bumps the owning pool's `leaked` count if a borrowed instance is dropped.
/// Disarmed while the instance sits in the free-list or once it is retired.
struct LeakGuard(Option<Rc<Cell<usize>>>);

impl LeakGuard {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for LeakGuard {
    fn drop(&mut self) {
        if let Some(leaked) = self.0.take() {
            leaked.set(leaked.get() + 1);
            log::warn!("pooled instance dropped without being released");
        }
    }
}

/// An instance vended by a pool.
///
/// Not `Clone`: a given instance can be released at most once.
/// Dropping it instead of releasing it leaves it counted as active and
/// bumps [`PoolStats::leaked`].
pub struct Pooled<T> {
    value: T,
    pool: Option<PoolId>,
    serial: u64,
    guard: LeakGuard,
}

impl<T> Pooled<T> {
    /// Wrap a value that no pool knows about.
    pub(crate) fn detached(value: T) -> Self {
        Self {
            value,
            pool: None,
            serial: 0,
            guard: LeakGuard(None),
        }
    }

    /// Pool that created this instance.
    pub fn pool_id(&self) -> Option<PoolId> {
        self.pool
    }

    /// Creation order within the owning pool, starting at 1. Stable across recycles.
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("pool", &self.pool)
            .field("serial", &self.serial)
            .field("value", &self.value)
            .finish()
    }
}

/// Read-only snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Borrowed and not yet returned.
    pub active: usize,
    /// Parked in the free-list.
    pub free: usize,
    /// Free-list slots allocated. Never shrinks.
    pub capacity: usize,
    /// Instances ever built by the factory.
    pub created: usize,
    /// Instances taken out of the pool for good via [`Pool::retire`].
    pub retired: usize,
    /// Free-list growth events.
    pub grows: usize,
    /// Spawns served from the free-list.
    pub reuses: usize,
    /// Borrowed instances dropped instead of released. Still counted in `active`.
    pub leaked: usize,
}

/// Growable LIFO free-list of reusable instances.
///
/// `spawn` hands out the most recently released instance, or asks the
/// factory for a new one when the free-list is empty. `release` parks an
/// instance for reuse, doubling free-list capacity when it is full.
/// Both are O(1) amortized.
pub struct Pool<T: Poolable, C = ()> {
    id: PoolId,
    factory: Box<dyn Factory<T, C>>,
    parent: Option<C>,
    /// Top of stack = most recently released.
    free: Vec<Pooled<T>>,
    capacity: usize,
    active: usize,
    created: usize,
    retired: usize,
    grows: usize,
    reuses: usize,
    leaked: Rc<Cell<usize>>,
}

impl<T: Poolable, C> Pool<T, C> {
    /// Empty pool with the default initial capacity. Nothing is built eagerly.
    pub fn new<F>(factory: F, parent: Option<C>) -> Self
    where
        F: FnMut(&T::Params, Option<&C>) -> Result<T, FactoryError> + 'static,
    {
        Self::from_factory(factory, parent, PoolConfig::default())
    }

    /// Empty pool with explicit tuning.
    pub fn with_config<F>(factory: F, parent: Option<C>, config: PoolConfig) -> Self
    where
        F: FnMut(&T::Params, Option<&C>) -> Result<T, FactoryError> + 'static,
    {
        Self::from_factory(factory, parent, config)
    }

    /// Build from any [`Factory`] implementation, not just a closure.
    pub fn from_factory(
        factory: impl Factory<T, C> + 'static,
        parent: Option<C>,
        config: PoolConfig,
    ) -> Self {
        let capacity = config.effective_capacity();
        Self {
            id: PoolId::next(),
            factory: Box::new(factory),
            parent,
            free: Vec::with_capacity(capacity),
            capacity,
            active: 0,
            created: 0,
            retired: 0,
            grows: 0,
            reuses: 0,
            leaked: Rc::new(Cell::new(0)),
        }
    }

    /// Identity stamped on every instance this pool creates.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Owning context handed to the factory for every new instance.
    pub fn parent(&self) -> Option<&C> {
        self.parent.as_ref()
    }

    /// Borrow an instance placed per `params`.
    ///
    /// Reuses the most recently released instance if there is one; otherwise
    /// the factory builds a new one and `on_create` runs. `on_activate` runs
    /// either way. A factory error propagates and leaves the pool untouched.
    pub fn spawn(&mut self, params: &T::Params) -> Result<Pooled<T>, PoolError> {
        let mut instance = match self.free.pop() {
            Some(instance) => {
                self.reuses += 1;
                log::trace!(
                    "pool {}: reusing instance {} ({} free left)",
                    self.id,
                    instance.serial,
                    self.free.len()
                );
                instance
            }
            None => self.create(params)?,
        };

        instance.value.on_activate(params);
        instance.guard = LeakGuard(Some(Rc::clone(&self.leaked)));
        self.active += 1;
        Ok(instance)
    }

    /// Hand an instance back for reuse. It becomes the next one `spawn` returns.
    ///
    /// Instances from another pool are handed back untouched in the error.
    pub fn release(&mut self, mut instance: Pooled<T>) -> Result<(), Rejected<Pooled<T>>> {
        if let Err(error) = self.check_owner(&instance) {
            return Err(Rejected::new(error, instance));
        }

        instance.guard.disarm();
        instance.value.on_deactivate();
        self.park(instance);
        debug_assert!(self.active > 0, "release with no active instances");
        self.active = self.active.saturating_sub(1);
        Ok(())
    }

    /// Take an active instance out of the pool's bookkeeping for good.
    ///
    /// No hook runs; the value is returned as-is, still in its active state.
    pub fn retire(&mut self, instance: Pooled<T>) -> Result<T, Rejected<Pooled<T>>> {
        if let Err(error) = self.check_owner(&instance) {
            return Err(Rejected::new(error, instance));
        }

        let Pooled {
            value,
            serial,
            mut guard,
            ..
        } = instance;
        guard.disarm();
        self.active = self.active.saturating_sub(1);
        self.retired += 1;
        log::debug!("pool {}: retired instance {}", self.id, serial);
        Ok(value)
    }

    /// Number of instances currently borrowed.
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Number of instances parked in the free-list.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Free-list slots currently allocated.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of every counter.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active: self.active,
            free: self.free.len(),
            capacity: self.capacity,
            created: self.created,
            retired: self.retired,
            grows: self.grows,
            reuses: self.reuses,
            leaked: self.leaked.get(),
        }
    }

    fn create(&mut self, params: &T::Params) -> Result<Pooled<T>, PoolError> {
        let mut value = self
            .factory
            .create(params, self.parent.as_ref())
            .map_err(PoolError::Factory)?;
        value.on_create();

        self.created += 1;
        log::debug!(
            "pool {}: free-list empty, created instance {}",
            self.id,
            self.created
        );
        Ok(Pooled {
            value,
            pool: Some(self.id),
            serial: self.created as u64,
            guard: LeakGuard(None),
        })
    }

    fn check_owner(&self, instance: &Pooled<T>) -> Result<(), PoolError> {
        if instance.pool == Some(self.id) {
            return Ok(());
        }
        log::warn!(
            "pool {}: rejected instance {} owned by {:?}",
            self.id,
            instance.serial,
            instance.pool
        );
        Err(PoolError::ForeignInstance {
            expected: self.id,
            found: instance.pool,
        })
    }

    /// Push onto the free-list, doubling storage first if it is full.
    fn park(&mut self, instance: Pooled<T>) {
        if self.free.len() == self.capacity {
            self.grow();
        }
        self.free.push(instance);
    }

    fn grow(&mut self) {
        let new_capacity = (self.capacity * 2).max(self.free.len() + 1);
        self.free.reserve_exact(new_capacity - self.free.len());
        log::debug!(
            "pool {}: free-list full, growing {} -> {}",
            self.id,
            self.capacity,
            new_capacity
        );
        self.capacity = new_capacity;
        self.grows += 1;
    }
}

impl<T, C> Pool<T, C>
where
    T: Poolable,
    T::Params: Default,
{
    /// Spawn with default params.
    pub fn spawn_default(&mut self) -> Result<Pooled<T>, PoolError> {
        self.spawn(&T::Params::default())
    }

    /// Build `count` instances now and park them as free.
    ///
    /// Each runs `on_create` then `on_deactivate`, never `on_activate`.
    pub fn prewarm(&mut self, count: usize) -> Result<(), PoolError> {
        let params = T::Params::default();
        for _ in 0..count {
            let mut instance = self.create(&params)?;
            instance.value.on_deactivate();
            self.park(instance);
        }
        log::debug!(
            "pool {}: prewarmed {} instances ({} free)",
            self.id,
            count,
            self.free.len()
        );
        Ok(())
    }
}

impl<T, C> Pool<T, C>
where
    T: Poolable<Params = Placement>,
{
    /// Spawn at `position` with no rotation.
    pub fn spawn_at(&mut self, position: Vec3) -> Result<Pooled<T>, PoolError> {
        self.spawn(&Placement::at(position))
    }

    pub fn spawn_at_rotated(
        &mut self,
        position: Vec3,
        rotation: Quat,
    ) -> Result<Pooled<T>, PoolError> {
        self.spawn(&Placement::new(position, rotation))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Instance that counts its own lifecycle hooks.
    #[derive(Debug)]
    pub(crate) struct Tagged {
        pub tag: u32,
        pub placement: Placement,
        pub active: bool,
        pub creates: u32,
        pub activations: u32,
        pub deactivations: u32,
        pub parent: Option<String>,
    }

    impl Tagged {
        pub(crate) fn new(tag: u32) -> Self {
            Self {
                tag,
                placement: Placement::default(),
                active: false,
                creates: 0,
                activations: 0,
                deactivations: 0,
                parent: None,
            }
        }
    }

    impl Poolable for Tagged {
        type Params = Placement;

        fn on_create(&mut self) {
            self.creates += 1;
        }

        fn on_activate(&mut self, params: &Placement) {
            self.placement = *params;
            self.active = true;
            self.activations += 1;
        }

        fn on_deactivate(&mut self) {
            self.active = false;
            self.deactivations += 1;
        }
    }

    /// Factory hands out I1, I2, I3... in creation order.
    pub(crate) fn tagged_pool() -> Pool<Tagged> {
        let mut next = 0;
        Pool::new(
            move |_params: &Placement, _parent: Option<&()>| {
                next += 1;
                Ok(Tagged::new(next))
            },
            None,
        )
    }

    fn assert_conserved<C>(pool: &Pool<Tagged, C>) {
        let s = pool.stats();
        assert_eq!(s.active + s.free + s.retired, s.created);
        assert!(s.free <= s.capacity);
    }

    #[test]
    fn new_pool_is_empty_and_lazy() {
        let pool = tagged_pool();
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.stats().created, 0);
    }

    #[test]
    fn scenario_spawn_release_lifo_and_growth() {
        let mut pool = tagged_pool();

        let i1 = pool.spawn_default().unwrap();
        let i2 = pool.spawn_default().unwrap();
        let i3 = pool.spawn_default().unwrap();
        assert_eq!((i1.tag, i2.tag, i3.tag), (1, 2, 3));
        assert_eq!(pool.active_count(), 3);
        assert_eq!(pool.free_count(), 0);

        pool.release(i2).unwrap();
        pool.release(i1).unwrap();
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.capacity(), 2);

        let again = pool.spawn_default().unwrap();
        assert_eq!(again.tag, 1);

        // One slot was still open, so this release fits without growing.
        pool.release(i3).unwrap();
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.active_count(), 1);

        // Free-list is now full: the next release has to grow it.
        pool.release(again).unwrap();
        assert!(pool.capacity() >= 3);
        assert_eq!(pool.free_count(), 3);
        assert_eq!(pool.active_count(), 0);
        assert_conserved(&pool);
    }

    #[test]
    fn release_into_full_free_list_grows() {
        let mut pool = tagged_pool();
        let a = pool.spawn_default().unwrap();
        let b = pool.spawn_default().unwrap();
        let c = pool.spawn_default().unwrap();
        pool.release(a).unwrap();
        pool.release(b).unwrap();
        assert_eq!(pool.free_count(), pool.capacity());

        pool.release(c).unwrap();
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.stats().grows, 1);
    }

    #[test]
    fn reuse_returns_same_instance() {
        let mut pool = tagged_pool();
        let first = pool.spawn_default().unwrap();
        let serial = first.serial();
        pool.release(first).unwrap();

        let second = pool.spawn_default().unwrap();
        assert_eq!(second.serial(), serial);
        assert_eq!(second.tag, 1);
        assert_eq!(pool.stats().created, 1);
        assert_eq!(pool.stats().reuses, 1);
    }

    #[test]
    fn lifo_order() {
        let mut pool = tagged_pool();
        let a = pool.spawn_default().unwrap();
        let b = pool.spawn_default().unwrap();
        pool.release(a).unwrap();
        pool.release(b).unwrap();

        assert_eq!(pool.spawn_default().unwrap().tag, 2);
        assert_eq!(pool.spawn_default().unwrap().tag, 1);
    }

    #[test]
    fn construction_hook_fires_once() {
        let mut pool = tagged_pool();
        let mut inst = pool.spawn_default().unwrap();
        for _ in 1..10 {
            pool.release(inst).unwrap();
            inst = pool.spawn_default().unwrap();
        }
        assert_eq!(inst.creates, 1);
        assert_eq!(inst.activations, 10);
        assert_eq!(inst.deactivations, 9);
    }

    #[test]
    fn activate_and_deactivate_toggle_state() {
        let mut pool = tagged_pool();
        let inst = pool
            .spawn_at_rotated(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(1.0))
            .unwrap();
        assert!(inst.active);
        assert_eq!(inst.placement.position, Vec3::new(1.0, 2.0, 3.0));
        pool.release(inst).unwrap();

        let inst = pool.spawn_at(Vec3::X).unwrap();
        assert!(inst.active);
        assert_eq!(inst.placement.position, Vec3::X);
        assert_eq!(inst.placement.rotation, Quat::IDENTITY);
    }

    #[test]
    fn growth_doubles_only_when_full() {
        let mut pool = tagged_pool();
        let spawned: Vec<_> = (0..9).map(|_| pool.spawn_default().unwrap()).collect();

        let mut capacities = Vec::new();
        for inst in spawned {
            pool.release(inst).unwrap();
            capacities.push(pool.capacity());
        }

        assert_eq!(capacities, vec![2, 2, 4, 4, 8, 8, 8, 8, 16]);
        assert!(capacities.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(pool.stats().grows, 3);
        assert_conserved(&pool);
    }

    #[test]
    fn capacity_never_shrinks() {
        let mut pool = tagged_pool();
        let spawned: Vec<_> = (0..5).map(|_| pool.spawn_default().unwrap()).collect();
        for inst in spawned {
            pool.release(inst).unwrap();
        }
        let peak = pool.capacity();

        let drained: Vec<_> = (0..5).map(|_| pool.spawn_default().unwrap()).collect();
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.capacity(), peak);
        drop(drained);
    }

    #[test]
    fn factory_failure_leaves_pool_untouched() {
        let mut calls = 0;
        let mut pool: Pool<Tagged> = Pool::new(
            move |_params: &Placement, _parent: Option<&()>| {
                calls += 1;
                if calls == 1 {
                    Err("out of prefabs".into())
                } else {
                    Ok(Tagged::new(calls))
                }
            },
            None,
        );

        let before = pool.stats();
        let err = pool.spawn_default().unwrap_err();
        assert!(matches!(err, PoolError::Factory(_)));
        assert_eq!(pool.stats(), before);

        let inst = pool.spawn_default().unwrap();
        assert_eq!(inst.serial(), 1);
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn foreign_instance_is_rejected() {
        let mut a = tagged_pool();
        let mut b = tagged_pool();
        let inst = a.spawn_default().unwrap();

        let before = b.stats();
        let rejected = b.release(inst).unwrap_err();
        match rejected.error {
            PoolError::ForeignInstance { expected, found } => {
                assert_eq!(expected, b.id());
                assert_eq!(found, Some(a.id()));
            }
            ref other => panic!("unexpected error: {other}"),
        }
        assert_eq!(b.stats(), before);

        // Nothing was lost: the instance still goes home.
        let inst = rejected.into_instance();
        assert_eq!(inst.tag, 1);
        a.release(inst).unwrap();
        let s = a.stats();
        assert_eq!((s.active, s.free, s.created), (0, 1, 1));
        assert_eq!(a.spawn_default().unwrap().serial(), 1);
    }

    #[test]
    fn foreign_retire_hands_instance_back() {
        let mut a = tagged_pool();
        let mut b = tagged_pool();
        let inst = a.spawn_default().unwrap();

        let rejected = b.retire(inst).unwrap_err();
        assert!(matches!(rejected.error, PoolError::ForeignInstance { .. }));
        assert_eq!(b.stats().retired, 0);

        a.retire(rejected.into_instance()).unwrap();
        assert_eq!(a.stats().retired, 1);
        assert_conserved(&a);
    }

    #[test]
    fn dropped_instance_counts_as_leaked() {
        let mut pool = tagged_pool();
        let kept = pool.spawn_default().unwrap();
        let lost = pool.spawn_default().unwrap();
        drop(lost);

        let s = pool.stats();
        assert_eq!(s.leaked, 1);
        assert_eq!(s.active, 2);

        // Released and retired instances are not leaks, and neither is the free-list.
        pool.release(kept).unwrap();
        let again = pool.spawn_default().unwrap();
        pool.retire(again).unwrap();
        pool.prewarm(2).unwrap();
        assert_eq!(pool.stats().leaked, 1);
    }

    #[test]
    fn detached_instance_is_rejected() {
        let mut pool = tagged_pool();
        let rejected = pool.release(Pooled::detached(Tagged::new(7))).unwrap_err();
        assert!(matches!(rejected.error, PoolError::ForeignInstance { found: None, .. }));
        assert_eq!(rejected.into_instance().tag, 7);
    }

    #[test]
    fn parent_is_passed_to_factory() {
        #[derive(Debug)]
        struct Den {
            name: String,
        }

        let mut pool: Pool<Tagged, Den> = Pool::new(
            |_params: &Placement, parent: Option<&Den>| {
                let mut t = Tagged::new(1);
                t.parent = parent.map(|d| d.name.clone());
                Ok(t)
            },
            Some(Den {
                name: "basket".to_string(),
            }),
        );

        let inst = pool.spawn_default().unwrap();
        assert_eq!(inst.parent.as_deref(), Some("basket"));
        assert_eq!(pool.parent().map(|d| d.name.as_str()), Some("basket"));
    }

    #[test]
    fn missing_parent_means_none() {
        let mut pool: Pool<Tagged, String> = Pool::new(
            |_params: &Placement, parent: Option<&String>| {
                let mut t = Tagged::new(1);
                t.parent = parent.cloned();
                Ok(t)
            },
            None,
        );
        assert!(pool.spawn_default().unwrap().parent.is_none());
    }

    #[test]
    fn prewarm_parks_instances_without_activating() {
        let mut pool = tagged_pool();
        pool.prewarm(5).unwrap();

        let s = pool.stats();
        assert_eq!(s.created, 5);
        assert_eq!(s.free, 5);
        assert_eq!(s.active, 0);
        assert!(s.capacity >= 5);

        let inst = pool.spawn_default().unwrap();
        assert_eq!(inst.tag, 5);
        assert_eq!(inst.creates, 1);
        assert_eq!(inst.activations, 1);
        assert_eq!(inst.deactivations, 1);
        assert_conserved(&pool);
    }

    #[test]
    fn retire_removes_instance_from_accounting() {
        let mut pool = tagged_pool();
        let inst = pool.spawn_default().unwrap();
        let value = pool.retire(inst).unwrap();
        assert_eq!(value.tag, 1);
        assert!(value.active);

        let s = pool.stats();
        assert_eq!(s.active, 0);
        assert_eq!(s.retired, 1);
        assert_conserved(&pool);

        // The retired instance is gone; the next spawn builds a new one.
        assert_eq!(pool.spawn_default().unwrap().tag, 2);
    }

    #[test]
    fn custom_initial_capacity() {
        let pool: Pool<Tagged> = Pool::with_config(
            |_params: &Placement, _parent: Option<&()>| Ok(Tagged::new(0)),
            None,
            PoolConfig::new().initial_capacity(0),
        );
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn struct_factory() {
        struct Counter(u32);

        impl Factory<Tagged, ()> for Counter {
            fn create(
                &mut self,
                _params: &Placement,
                _parent: Option<&()>,
            ) -> Result<Tagged, FactoryError> {
                self.0 += 10;
                Ok(Tagged::new(self.0))
            }
        }

        let mut pool: Pool<Tagged> = Pool::from_factory(Counter(0), None, PoolConfig::default());
        assert_eq!(pool.spawn_default().unwrap().tag, 10);
        assert_eq!(pool.spawn_default().unwrap().tag, 20);
    }
}
