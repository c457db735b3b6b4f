pub mod channel;
pub mod discovery;
pub mod emitter;
pub mod error;
pub mod listener;
pub mod registry;
pub mod service;
pub mod task;
pub mod types;

#[cfg(test)]
mod testing;

pub use channel::{event_channels, EventReceivers, EventSenders, ServiceEvent, ServiceSender, DEFAULT_CHANNEL_CAPACITY};
pub use discovery::ActiveListeners;
pub use emitter::ServiceEmitter;
pub use error::{ListenerError, ServiceError};
pub use listener::{ServiceListener, ServiceListenerFactory};
pub use registry::ListenerRegistry;
pub use service::{Service, ServiceHandle};
pub use task::ListenerTask;
pub use types::{ContainerPort, ServiceId};
