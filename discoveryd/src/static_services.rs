use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use ad_listeners::{
    ContainerPort, ListenerError, ListenerRegistry, ListenerTask, Service, ServiceError, ServiceId,
    ServiceListener, ServiceSender,
};
use crate::config::{StaticConfig, StaticServiceConfig};

pub const LISTENER_NAME: &str = "static";

/// A service declared in the config file.
#[derive(Debug, Clone)]
pub struct StaticService {
    id: ServiceId,
    entry: StaticServiceConfig,
}

impl StaticService {
    pub fn new(entry: StaticServiceConfig) -> Self {
        Self {
            id: ServiceId::scoped(LISTENER_NAME, &entry.id),
            entry,
        }
    }
}

fn declared<T: Clone>(field: &Option<T>) -> Result<T, ServiceError> {
    field.clone().ok_or(ServiceError::NotSupported)
}

impl Service for StaticService {
    fn id(&self) -> &ServiceId {
        &self.id
    }

    fn ad_identifiers(&self) -> Result<Vec<String>, ServiceError> {
        declared(&self.entry.ad_identifiers)
    }

    fn hosts(&self) -> Result<HashMap<String, String>, ServiceError> {
        declared(&self.entry.hosts)
    }

    fn ports(&self) -> Result<Vec<ContainerPort>, ServiceError> {
        declared(&self.entry.ports)
    }

    fn tags(&self) -> Result<Vec<String>, ServiceError> {
        declared(&self.entry.tags)
    }

    fn pid(&self) -> Result<u32, ServiceError> {
        declared(&self.entry.pid)
    }

    fn hostname(&self) -> Result<String, ServiceError> {
        declared(&self.entry.hostname)
    }
}

/// Announces the configured services once. They are never withdrawn.
pub struct StaticListener {
    services: Vec<Arc<StaticService>>,
    task: ListenerTask,
}

impl StaticListener {
    pub fn new(config: &StaticConfig) -> Self {
        let services = config
            .services
            .iter()
            .cloned()
            .map(|entry| Arc::new(StaticService::new(entry)))
            .collect();
        Self {
            services,
            task: ListenerTask::new(LISTENER_NAME),
        }
    }
}

#[async_trait]
impl ServiceListener for StaticListener {
    fn listen(&mut self, new_svc: ServiceSender, del_svc: ServiceSender) -> Result<(), ListenerError> {
        let services = self.services.clone();
        self.task.start(new_svc, del_svc, move |mut emitter| async move {
            for svc in services {
                emitter.add(svc).await?;
            }
            tracing::info!("Announced {} static services", emitter.live());
            Ok::<(), ListenerError>(())
        })
    }

    async fn stop(&mut self) -> Result<(), ListenerError> {
        self.task.stop().await
    }
}

pub fn register(registry: &ListenerRegistry, config: &StaticConfig) {
    let config = config.clone();
    registry.register_fn(LISTENER_NAME, move || {
        Ok(Box::new(StaticListener::new(&config)) as Box<dyn ServiceListener>)
    });
}
