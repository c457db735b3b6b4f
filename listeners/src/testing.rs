use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use crate::channel::ServiceSender;
use crate::error::{ListenerError, ServiceError};
use crate::listener::ServiceListener;
use crate::service::{Service, ServiceHandle};
use crate::task::ListenerTask;
use crate::types::{ContainerPort, ServiceId};

/// In-memory service. Only the ID, AD identifiers and tags are known;
/// everything else is unsupported.
#[derive(Debug, Clone)]
pub struct FakeService {
    id: ServiceId,
    ad_identifiers: Vec<String>,
    tags: Vec<String>,
}

impl FakeService {
    pub fn new(id: &str) -> Self {
        Self {
            id: ServiceId::from(id),
            ad_identifiers: vec!["fake".to_string()],
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

impl Service for FakeService {
    fn id(&self) -> &ServiceId {
        &self.id
    }

    fn ad_identifiers(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.ad_identifiers.clone())
    }

    fn hosts(&self) -> Result<HashMap<String, String>, ServiceError> {
        Err(ServiceError::NotSupported)
    }

    fn ports(&self) -> Result<Vec<ContainerPort>, ServiceError> {
        Err(ServiceError::NotSupported.context("fake backend has no ports"))
    }

    fn tags(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.tags.clone())
    }

    fn pid(&self) -> Result<u32, ServiceError> {
        Err(ServiceError::NotSupported)
    }

    fn hostname(&self) -> Result<String, ServiceError> {
        Err(ServiceError::NotSupported)
    }
}

#[derive(Debug, Clone)]
pub enum FakeStep {
    Add(ServiceHandle),
    Remove(ServiceId),
}

pub fn add(id: &str) -> FakeStep {
    FakeStep::Add(Arc::new(FakeService::new(id)))
}

pub fn remove(id: &str) -> FakeStep {
    FakeStep::Remove(ServiceId::from(id))
}

/// Listener that plays a fixed script, then idles until stopped.
pub struct FakeListener {
    script: Vec<FakeStep>,
    task: ListenerTask,
}

impl FakeListener {
    pub fn new(name: &str, script: Vec<FakeStep>) -> Self {
        Self {
            script,
            task: ListenerTask::new(name),
        }
    }
}

#[async_trait]
impl ServiceListener for FakeListener {
    fn listen(&mut self, new_svc: ServiceSender, del_svc: ServiceSender) -> Result<(), ListenerError> {
        let script = self.script.clone();
        self.task.start(new_svc, del_svc, move |mut emitter| async move {
            for step in script {
                match step {
                    FakeStep::Add(svc) => {
                        emitter.add(svc).await?;
                    }
                    FakeStep::Remove(id) => {
                        emitter.remove(&id).await?;
                    }
                }
                tokio::task::yield_now().await;
            }
            emitter.cancellation().cancelled().await;
            Ok::<(), ListenerError>(())
        })
    }

    async fn stop(&mut self) -> Result<(), ListenerError> {
        self.task.stop().await
    }
}
