use std::sync::Arc;
use async_trait::async_trait;
use crate::channel::ServiceSender;
use crate::error::ListenerError;

/// Watches one backend and reports services as they come and go.
///
/// A listener goes constructed -> listening -> stopped and never back.
#[async_trait]
pub trait ServiceListener: Send {
    /// Start discovery in the background and return immediately.
    ///
    /// New services are pushed on `new_svc`, vanished ones on `del_svc`.
    /// For any ID the add is sent before the delete, and an ID is never
    /// added twice without a delete in between. Calling `listen` a second
    /// time, or after `stop`, is an error.
    fn listen(&mut self, new_svc: ServiceSender, del_svc: ServiceSender) -> Result<(), ListenerError>;

    /// Stop discovery and release backend resources.
    ///
    /// Once this returns nothing more is sent on either channel, whether or
    /// not the consumer is still draining them. Safe to call more than once.
    /// Returns the error the background worker failed with, if any.
    async fn stop(&mut self) -> Result<(), ListenerError>;
}

/// Builds a service listener.
pub type ServiceListenerFactory =
    Arc<dyn Fn() -> Result<Box<dyn ServiceListener>, ListenerError> + Send + Sync>;
