use std::collections::HashMap;
use std::time::Duration;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use ad_listeners::{ContainerPort, EventReceivers, Service, ServiceError, ServiceEvent, ServiceId};

/// What the tracker learned about a live service when it was added.
#[derive(Debug, Clone)]
pub struct TrackedService {
    pub ad_identifiers: Vec<String>,
    pub hosts: HashMap<String, String>,
    pub ports: Vec<ContainerPort>,
    pub tags: Vec<String>,
    pub pid: Option<u32>,
    pub hostname: Option<String>,
    pub first_seen: DateTime<Utc>,
}

impl TrackedService {
    fn resolve(svc: &dyn Service) -> Self {
        let id = svc.id();
        Self {
            ad_identifiers: attribute(id, "ad_identifiers", svc.ad_identifiers()).unwrap_or_default(),
            hosts: attribute(id, "hosts", svc.hosts()).unwrap_or_default(),
            ports: attribute(id, "ports", svc.ports()).unwrap_or_default(),
            tags: attribute(id, "tags", svc.tags()).unwrap_or_default(),
            pid: attribute(id, "pid", svc.pid()),
            hostname: attribute(id, "hostname", svc.hostname()),
            first_seen: Utc::now(),
        }
    }
}

/// Unsupported attributes are expected and only logged at debug level.
fn attribute<T>(id: &ServiceId, name: &str, value: Result<T, ServiceError>) -> Option<T> {
    match value {
        Ok(value) => Some(value),
        Err(e) if e.is_not_supported() => {
            tracing::debug!("Service {} does not provide {}", id, name);
            None
        }
        Err(e) => {
            tracing::warn!("Failed to read {} of service {}: {}", name, id, e);
            None
        }
    }
}

/// In-memory view of the services currently announced by the listeners.
#[derive(Debug, Default)]
pub struct ServiceTracker {
    services: HashMap<ServiceId, TrackedService>,
}

impl ServiceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ServiceEvent) {
        match event {
            ServiceEvent::Added(svc) => {
                let tracked = TrackedService::resolve(svc.as_ref());
                tracing::info!(
                    "Service added: {} (ad identifiers: {:?}, ports: {})",
                    svc.id(),
                    tracked.ad_identifiers,
                    tracked.ports.len()
                );
                tracing::debug!(
                    "Service {} hosts: {:?}, tags: {:?}, pid: {:?}, hostname: {:?}",
                    svc.id(),
                    tracked.hosts,
                    tracked.tags,
                    tracked.pid,
                    tracked.hostname
                );
                if self.services.insert(svc.id().clone(), tracked).is_some() {
                    tracing::warn!("Service {} was already tracked", svc.id());
                }
            }
            ServiceEvent::Removed(svc) => match self.services.remove(svc.id()) {
                Some(tracked) => {
                    let lifetime = Utc::now() - tracked.first_seen;
                    tracing::info!(
                        "Service removed: {} (seen for {}s)",
                        svc.id(),
                        lifetime.num_seconds()
                    );
                }
                None => {
                    tracing::warn!("Removal of untracked service {}", svc.id());
                }
            },
        }
    }

    pub fn get(&self, id: &ServiceId) -> Option<&TrackedService> {
        self.services.get(id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Live services grouped by AD identifier.
    pub fn by_ad_identifier(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for tracked in self.services.values() {
            for ident in &tracked.ad_identifiers {
                *counts.entry(ident.as_str()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Tracker event loop - consumes listener events until the channels close
/// or the token is cancelled.
pub async fn run(
    mut tracker: ServiceTracker,
    mut events: EventReceivers,
    summary_interval: Duration,
    cancel: CancellationToken,
) -> ServiceTracker {
    let mut summary = tokio::time::interval(summary_interval);

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => tracker.apply(&event),
                    None => {
                        tracing::info!("All service listeners are gone");
                        break;
                    }
                }
            }
            _ = summary.tick() => {
                tracing::info!(
                    "{} live services, by AD identifier: {:?}",
                    tracker.len(),
                    tracker.by_ad_identifier()
                );
            }
            _ = cancel.cancelled() => {
                tracing::info!("Service tracker shutting down");
                break;
            }
        }
    }

    tracker
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use ad_listeners::{event_channels, ServiceHandle};
    use crate::config::StaticServiceConfig;
    use crate::static_services::StaticService;

    fn static_svc(id: &str, pid: Option<u32>) -> ServiceHandle {
        Arc::new(StaticService::new(StaticServiceConfig {
            id: id.to_string(),
            ad_identifiers: Some(vec!["redis".to_string()]),
            hosts: None,
            ports: Some(vec![ContainerPort::new(6379, "redis")]),
            tags: None,
            pid,
            hostname: None,
        }))
    }

    #[test]
    fn test_unsupported_attributes_fall_back() {
        let mut tracker = ServiceTracker::new();
        let svc = static_svc("a", None);
        tracker.apply(&ServiceEvent::Added(svc.clone()));

        let tracked = tracker.get(svc.id()).unwrap();
        assert_eq!(tracked.ad_identifiers, vec!["redis".to_string()]);
        assert_eq!(tracked.ports, vec![ContainerPort::new(6379, "redis")]);
        assert!(tracked.hosts.is_empty());
        assert!(tracked.pid.is_none());
        assert!(tracked.hostname.is_none());
    }

    #[test]
    fn test_add_then_remove() {
        let mut tracker = ServiceTracker::new();
        let a = static_svc("a", Some(10));
        let b = static_svc("b", Some(11));
        tracker.apply(&ServiceEvent::Added(a.clone()));
        tracker.apply(&ServiceEvent::Added(b.clone()));
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.by_ad_identifier()["redis"], 2);
        assert_eq!(tracker.get(a.id()).unwrap().pid, Some(10));

        tracker.apply(&ServiceEvent::Removed(a.clone()));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.get(a.id()).is_none());

        // Unknown removal is tolerated.
        tracker.apply(&ServiceEvent::Removed(a));
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_when_channels_close() {
        let (senders, events) = event_channels(4);
        senders.new_svc.send(static_svc("a", None)).await.unwrap();
        senders.new_svc.send(static_svc("b", None)).await.unwrap();
        senders.del_svc.send(static_svc("a", None)).await.unwrap();
        drop(senders);

        let tracker = tokio::time::timeout(
            Duration::from_secs(1),
            run(ServiceTracker::new(), events, Duration::from_secs(60), CancellationToken::new()),
        )
        .await
        .unwrap();

        assert_eq!(tracker.len(), 1);
        assert!(tracker.get(&ServiceId::scoped("static", "b")).is_some());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (_senders, events) = event_channels(4);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            ServiceTracker::new(),
            events,
            Duration::from_secs(60),
            cancel.clone(),
        ));

        cancel.cancel();
        let tracker = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(tracker.is_empty());
    }
}
