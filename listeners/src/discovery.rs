use crate::channel::EventSenders;
use crate::error::ListenerError;
use crate::listener::ServiceListener;
use crate::registry::ListenerRegistry;

/// Listeners that were built from the registry and are listening.
pub struct ActiveListeners {
    listeners: Vec<(String, Box<dyn ServiceListener>)>,
    failures: Vec<(String, ListenerError)>,
}

impl ActiveListeners {
    /// Build every named listener and start it on `senders`.
    ///
    /// A name that is not registered, a factory that fails, or a listener
    /// that refuses to start is logged and kept in `failures`; the remaining
    /// listeners still start.
    pub fn start(registry: &ListenerRegistry, names: &[String], senders: &EventSenders) -> Self {
        let mut listeners = Vec::new();
        let mut failures = Vec::new();

        for name in names {
            match start_one(registry, name, senders) {
                Ok(listener) => {
                    tracing::info!("Listening for services with {}", name);
                    listeners.push((name.clone(), listener));
                }
                Err(e) => {
                    tracing::error!("Failed to start service listener {}: {}", name, e);
                    failures.push((name.clone(), e));
                }
            }
        }

        Self { listeners, failures }
    }

    /// Names of the listeners that started.
    pub fn names(&self) -> Vec<&str> {
        self.listeners.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn failures(&self) -> &[(String, ListenerError)] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Stop every listener, returning the errors reported while stopping.
    pub async fn stop_all(mut self) -> Vec<(String, ListenerError)> {
        let mut errors = Vec::new();
        for (name, listener) in self.listeners.iter_mut() {
            if let Err(e) = listener.stop().await {
                tracing::error!("Service listener {} stopped with error: {}", name, e);
                errors.push((name.clone(), e));
            }
        }
        errors
    }
}

fn start_one(
    registry: &ListenerRegistry,
    name: &str,
    senders: &EventSenders,
) -> Result<Box<dyn ServiceListener>, ListenerError> {
    let factory = registry
        .factory(name)
        .ok_or_else(|| ListenerError::UnknownListener { name: name.to_string() })?;
    let mut listener = factory()?;
    listener.listen(senders.new_svc.clone(), senders.del_svc.clone())?;
    Ok(listener)
}
