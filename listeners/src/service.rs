use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use crate::error::ServiceError;
use crate::types::{ContainerPort, ServiceId};

/// Something a check can run against: a container, a process, an
/// orchestrator object.
///
/// Every accessor answers on its own. A backend that cannot provide an
/// attribute returns `ServiceError::NotSupported` for it; the other
/// accessors keep working.
pub trait Service: Send + Sync + Debug {
    /// Unique ID, valid for the lifetime of the instance.
    fn id(&self) -> &ServiceId;

    /// Identifiers on which check templates are matched. May be empty.
    fn ad_identifiers(&self) -> Result<Vec<String>, ServiceError>;

    /// Network name to address.
    fn hosts(&self) -> Result<HashMap<String, String>, ServiceError>;

    fn ports(&self) -> Result<Vec<ContainerPort>, ServiceError>;

    fn tags(&self) -> Result<Vec<String>, ServiceError>;

    /// Process identifier.
    fn pid(&self) -> Result<u32, ServiceError>;

    /// hostname.domainname of the entity.
    fn hostname(&self) -> Result<String, ServiceError>;
}

/// Shared handle carried on the event channels.
pub type ServiceHandle = Arc<dyn Service>;
