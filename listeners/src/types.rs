use std::fmt;
use serde::{Serialize, Deserialize};

/// Opaque identity of one discovered service instance.
///
/// Stable for the lifetime of the instance and never handed to a different
/// instance while the old one can still be referenced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds `<scheme>://<entity>`, keeping IDs from different backends apart.
    pub fn scoped(scheme: &str, entity: &str) -> Self {
        Self(format!("{}://{}", scheme, entity))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A network port exposed by a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerPort {
    pub port: u16,

    /// Port name, e.g. "http". May be empty.
    #[serde(default)]
    pub name: String,
}

impl ContainerPort {
    pub fn new(port: u16, name: impl Into<String>) -> Self {
        Self { port, name: name.into() }
    }
}
