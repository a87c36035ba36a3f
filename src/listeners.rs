//! A thread-safe list of weakly referenced listeners.

use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock, Weak},
};

/// Listeners registered with a [`Session`][crate::Session] or a
/// [`JoystickFilter`][crate::JoystickFilter].
///
/// The list holds [`Weak`] references: registering a listener doesn't keep it alive, and
/// listeners that have been dropped are skipped and pruned. Mutation is copy-on-write, so
/// dispatching iterates over a snapshot and listeners may add or remove listeners (including
/// themselves) from within a callback.
pub(crate) struct Listeners<L: ?Sized> {
    list: RwLock<Arc<Vec<Weak<L>>>>,
}

impl<L: ?Sized> Listeners<L> {
    pub(crate) fn new() -> Self {
        Self {
            list: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Adds `listener` to the end of the list, unless it is already registered.
    pub(crate) fn add(&self, listener: &Arc<L>) {
        let mut list = self.list.write().unwrap_or_else(PoisonError::into_inner);
        let list = Arc::make_mut(&mut list);
        list.retain(|l| l.strong_count() != 0);
        if !list.iter().any(|l| same(l.as_ptr(), Arc::as_ptr(listener))) {
            list.push(Arc::downgrade(listener));
        }
    }

    /// Removes `listener` from the list. Does nothing if it isn't registered.
    pub(crate) fn remove(&self, listener: &Arc<L>) {
        let mut list = self.list.write().unwrap_or_else(PoisonError::into_inner);
        if !list.iter().any(|l| same(l.as_ptr(), Arc::as_ptr(listener))) {
            return;
        }
        Arc::make_mut(&mut list)
            .retain(|l| l.strong_count() != 0 && !same(l.as_ptr(), Arc::as_ptr(listener)));
    }

    /// Returns the number of listeners that are still alive.
    pub(crate) fn len(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|l| l.strong_count() != 0)
            .count()
    }

    fn snapshot(&self) -> Arc<Vec<Weak<L>>> {
        self.list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Calls `f` for every live listener, in registration order.
    ///
    /// Iterates over the list as it was when the call started. Each listener is upgraded to an
    /// [`Arc`] for the duration of its call, so it stays alive even if its owner drops it
    /// concurrently.
    pub(crate) fn for_each(&self, mut f: impl FnMut(&L)) {
        let snapshot = self.snapshot();
        let mut dead = false;
        for listener in snapshot.iter() {
            match listener.upgrade() {
                Some(listener) => f(&listener),
                None => dead = true,
            }
        }
        drop(snapshot);

        if dead {
            let mut list = self.list.write().unwrap_or_else(PoisonError::into_inner);
            if list.iter().any(|l| l.strong_count() == 0) {
                Arc::make_mut(&mut list).retain(|l| l.strong_count() != 0);
            }
        }
    }
}

impl<L: ?Sized> fmt::Debug for Listeners<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}

/// Compares listener identity by address, ignoring vtable pointers of trait objects.
fn same<L: ?Sized>(a: *const L, b: *const L) -> bool {
    a.cast::<()>() == b.cast::<()>()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    trait Listener: Send + Sync {
        fn call(&self, log: &Mutex<Vec<u32>>);
    }

    struct Id(u32);
    impl Listener for Id {
        fn call(&self, log: &Mutex<Vec<u32>>) {
            log.lock().unwrap().push(self.0);
        }
    }

    fn dispatch(listeners: &Listeners<dyn Listener>) -> Vec<u32> {
        let log = Mutex::new(Vec::new());
        listeners.for_each(|l| l.call(&log));
        log.into_inner().unwrap()
    }

    #[test]
    fn order_and_dedup() {
        let listeners = Listeners::<dyn Listener>::new();
        let a: Arc<dyn Listener> = Arc::new(Id(1));
        let b: Arc<dyn Listener> = Arc::new(Id(2));
        listeners.add(&a);
        listeners.add(&b);
        listeners.add(&a);
        assert_eq!(listeners.len(), 2);
        assert_eq!(dispatch(&listeners), &[1, 2]);

        listeners.remove(&a);
        listeners.remove(&a);
        assert_eq!(dispatch(&listeners), &[2]);

        // Removing something that was never added is fine.
        listeners.remove(&(Arc::new(Id(3)) as Arc<dyn Listener>));
        assert_eq!(dispatch(&listeners), &[2]);
    }

    #[test]
    fn weak_registration() {
        let listeners = Listeners::<dyn Listener>::new();
        let a: Arc<dyn Listener> = Arc::new(Id(1));
        let b: Arc<dyn Listener> = Arc::new(Id(2));
        listeners.add(&a);
        listeners.add(&b);

        drop(a);
        assert_eq!(listeners.len(), 1);
        assert_eq!(dispatch(&listeners), &[2]);
        assert_eq!(listeners.snapshot().len(), 1, "dead listener should be pruned");
    }

    #[test]
    fn mutation_during_dispatch() {
        struct Remover {
            listeners: Arc<Listeners<dyn Listener>>,
            victim: Mutex<Option<Arc<dyn Listener>>>,
        }
        impl Listener for Remover {
            fn call(&self, log: &Mutex<Vec<u32>>) {
                log.lock().unwrap().push(0);
                if let Some(victim) = self.victim.lock().unwrap().take() {
                    self.listeners.remove(&victim);
                    self.listeners.add(&(Arc::new(Id(99)) as Arc<dyn Listener>));
                }
            }
        }

        let listeners = Arc::new(Listeners::<dyn Listener>::new());
        let victim: Arc<dyn Listener> = Arc::new(Id(1));
        let remover: Arc<dyn Listener> = Arc::new(Remover {
            listeners: listeners.clone(),
            victim: Mutex::new(Some(victim.clone())),
        });
        listeners.add(&remover);
        listeners.add(&victim);

        // The running dispatch still sees the list as it was when it started.
        assert_eq!(dispatch(&listeners), &[0, 1]);
        // The removal took effect for the next one (the added listener was dropped already).
        assert_eq!(dispatch(&listeners), &[0]);
    }
}
