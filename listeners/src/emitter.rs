use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use crate::channel::ServiceSender;
use crate::error::ListenerError;
use crate::service::ServiceHandle;
use crate::types::ServiceId;

/// Producer side of a listener's event channels.
///
/// Keeps the services the listener has announced and not yet withdrawn, so
/// an ID is never added twice in a row and a delete always follows its add.
/// Every send races the listener's cancellation token: once the listener is
/// stopped nothing more goes out, even if the consumer stopped draining.
pub struct ServiceEmitter {
    listener: String,
    new_svc: ServiceSender,
    del_svc: ServiceSender,
    live: HashMap<ServiceId, ServiceHandle>,
    cancel: CancellationToken,
}

impl ServiceEmitter {
    pub fn new(
        listener: impl Into<String>,
        new_svc: ServiceSender,
        del_svc: ServiceSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            listener: listener.into(),
            new_svc,
            del_svc,
            live: HashMap::new(),
            cancel,
        }
    }

    /// Announce a service. Returns false if its ID is already live.
    pub async fn add(&mut self, svc: ServiceHandle) -> Result<bool, ListenerError> {
        let id = svc.id().clone();
        if self.live.contains_key(&id) {
            tracing::debug!("{}: service {} already announced", self.listener, id);
            return Ok(false);
        }

        deliver(&self.listener, &self.new_svc, &self.cancel, svc.clone()).await?;
        tracing::debug!("{}: added service {}", self.listener, id);
        self.live.insert(id, svc);
        Ok(true)
    }

    /// Withdraw a service. Returns false if the ID was never announced.
    ///
    /// The delete carries the handle that was sent with the add.
    pub async fn remove(&mut self, id: &ServiceId) -> Result<bool, ListenerError> {
        let Some(svc) = self.live.remove(id) else {
            tracing::debug!("{}: ignoring removal of unknown service {}", self.listener, id);
            return Ok(false);
        };

        deliver(&self.listener, &self.del_svc, &self.cancel, svc).await?;
        tracing::debug!("{}: removed service {}", self.listener, id);
        Ok(true)
    }

    pub fn is_live(&self, id: &ServiceId) -> bool {
        self.live.contains_key(id)
    }

    pub fn live(&self) -> usize {
        self.live.len()
    }

    pub fn listener(&self) -> &str {
        &self.listener
    }

    /// Token cancelled when the listener is asked to stop.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

async fn deliver(
    listener: &str,
    tx: &ServiceSender,
    cancel: &CancellationToken,
    svc: ServiceHandle,
) -> Result<(), ListenerError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ListenerError::Stopped { name: listener.to_string() }),
        sent = tx.send(svc) => sent.map_err(|_| ListenerError::ChannelClosed { name: listener.to_string() }),
    }
}
