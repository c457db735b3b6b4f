use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::error::ListenerError;
use crate::listener::{ServiceListener, ServiceListenerFactory};

/// Table of service listener factories keyed by listener name.
///
/// Owned by the composition root and passed by reference to the backends
/// that register themselves and to whoever activates discovery. It never
/// builds listeners itself.
#[derive(Default)]
pub struct ListenerRegistry {
    factories: RwLock<HashMap<String, ServiceListenerFactory>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service listener factory.
    ///
    /// A missing factory or an empty name is logged and ignored. Registering
    /// a name twice logs an error and the later factory replaces the earlier.
    pub fn register(&self, name: &str, factory: Option<ServiceListenerFactory>) {
        let Some(factory) = factory else {
            tracing::warn!("Service listener factory {} does not exist.", name);
            return;
        };
        if name.is_empty() {
            tracing::warn!("Refusing to register a service listener factory without a name");
            return;
        }

        let mut factories = self.write();
        if factories.insert(name.to_string(), factory).is_some() {
            tracing::error!("Service listener factory {} already registered. Overwriting.", name);
        } else {
            tracing::debug!("Registered service listener factory {}", name);
        }
    }

    /// Register a closure as the factory for `name`.
    pub fn register_fn<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Result<Box<dyn ServiceListener>, ListenerError> + Send + Sync + 'static,
    {
        self.register(name, Some(Arc::new(factory)));
    }

    /// Like `register`, but a name that is already taken is an error and
    /// the existing factory stays in place.
    pub fn try_register(&self, name: &str, factory: ServiceListenerFactory) -> Result<(), ListenerError> {
        if name.is_empty() {
            return Err(ListenerError::EmptyName);
        }

        let mut factories = self.write();
        if factories.contains_key(name) {
            return Err(ListenerError::AlreadyRegistered { name: name.to_string() });
        }
        factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn factory(&self, name: &str) -> Option<ServiceListenerFactory> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of every registration, sorted by name.
    pub fn factories(&self) -> Vec<(String, ServiceListenerFactory)> {
        let mut entries: Vec<_> = self
            .read()
            .iter()
            .map(|(name, factory)| (name.clone(), factory.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated,
    // so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ServiceListenerFactory>> {
        self.factories.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ServiceListenerFactory>> {
        self.factories.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use crate::testing::FakeListener;

    fn counting_factory(calls: Arc<AtomicUsize>) -> ServiceListenerFactory {
        Arc::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeListener::new("fake", Vec::new())) as Box<dyn ServiceListener>)
        })
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ListenerRegistry::new();
        registry.register("fake", Some(counting_factory(Arc::new(AtomicUsize::new(0)))));

        assert!(registry.contains("fake"));
        assert_eq!(registry.names(), vec!["fake".to_string()]);
        assert!(registry.factory("fake").is_some());
        assert!(registry.factory("other").is_none());
    }

    #[test]
    fn test_duplicate_registration_overwrites() {
        let registry = ListenerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        registry.register("fake", Some(counting_factory(first.clone())));
        registry.register("fake", Some(counting_factory(second.clone())));
        assert_eq!(registry.len(), 1);

        let factory = registry.factory("fake").unwrap();
        assert!(factory().is_ok());
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_factory_is_not_registered() {
        let registry = ListenerRegistry::new();
        registry.register("ghost", None);
        assert!(!registry.contains("ghost"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_name_is_not_registered() {
        let registry = ListenerRegistry::new();
        registry.register("", Some(counting_factory(Arc::new(AtomicUsize::new(0)))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_factory_keeps_existing_entry() {
        let registry = ListenerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register("fake", Some(counting_factory(calls.clone())));
        registry.register("fake", None);

        let factory = registry.factory("fake").unwrap();
        assert!(factory().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_try_register_rejects_duplicates() {
        let registry = ListenerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        registry
            .try_register("fake", counting_factory(first.clone()))
            .unwrap();

        let err = registry
            .try_register("fake", counting_factory(Arc::new(AtomicUsize::new(0))))
            .unwrap_err();
        assert!(matches!(err, ListenerError::AlreadyRegistered { ref name } if name == "fake"));

        assert!(registry.factory("fake").unwrap()().is_ok());
        assert_eq!(first.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let registry = ListenerRegistry::new();
        for name in ["b", "a", "c"] {
            registry.register_fn(name, || {
                Ok(Box::new(FakeListener::new("fake", Vec::new())) as Box<dyn ServiceListener>)
            });
        }
        let names: Vec<String> = registry.factories().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_concurrent_registration_and_iteration() {
        let registry = Arc::new(ListenerRegistry::new());

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        registry.register(
                            &format!("backend-{}-{}", i, j),
                            Some(counting_factory(Arc::new(AtomicUsize::new(0)))),
                        );
                    }
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        let names = registry.names();
                        assert!(names.windows(2).all(|w| w[0] < w[1]));
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8 * 50);
    }
}
