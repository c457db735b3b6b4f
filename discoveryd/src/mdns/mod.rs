pub mod browser;
pub mod service;

use async_trait::async_trait;
use mdns_sd::ServiceDaemon;
use anyhow::Context;
use ad_listeners::{ListenerError, ListenerRegistry, ListenerTask, ServiceListener, ServiceSender};
use crate::config::MdnsConfig;

pub const LISTENER_NAME: &str = "mdns";

/// Service listener backed by an mdns-sd daemon.
pub struct MdnsListener {
    config: MdnsConfig,
    daemon: Option<ServiceDaemon>,
    task: ListenerTask,
}

impl MdnsListener {
    /// Create the mDNS daemon, bound to the configured interface if any.
    pub fn new(config: MdnsConfig) -> anyhow::Result<Self> {
        let daemon = ServiceDaemon::new().context("Failed to create mDNS daemon")?;

        if let Some(interface) = &config.interface {
            daemon
                .disable_interface(mdns_sd::IfKind::All)
                .context("Failed to disable default interfaces")?;
            daemon
                .enable_interface(interface.as_str())
                .with_context(|| format!("Failed to enable interface {}", interface))?;
        }

        Ok(Self {
            config,
            daemon: Some(daemon),
            task: ListenerTask::new(LISTENER_NAME),
        })
    }
}

#[async_trait]
impl ServiceListener for MdnsListener {
    fn listen(&mut self, new_svc: ServiceSender, del_svc: ServiceSender) -> Result<(), ListenerError> {
        let Some(daemon) = self.daemon.clone() else {
            return Err(ListenerError::Stopped { name: LISTENER_NAME.to_string() });
        };
        let config = self.config.clone();
        self.task.start(new_svc, del_svc, move |emitter| {
            browser::run_browser(daemon, config, emitter)
        })
    }

    async fn stop(&mut self) -> Result<(), ListenerError> {
        let result = self.task.stop().await;

        if let Some(daemon) = self.daemon.take() {
            if let Err(e) = daemon.shutdown() {
                tracing::error!("Failed to shutdown mDNS daemon: {}", e);
            }
        }

        result
    }
}

impl Drop for MdnsListener {
    fn drop(&mut self) {
        if let Some(daemon) = self.daemon.take() {
            let _ = daemon.shutdown();
        }
    }
}

pub fn register(registry: &ListenerRegistry, config: &MdnsConfig) {
    let config = config.clone();
    registry.register_fn(LISTENER_NAME, move || {
        let listener = MdnsListener::new(config.clone())?;
        Ok(Box::new(listener) as Box<dyn ServiceListener>)
    });
}
