use thiserror::Error;
use crate::types::ServiceId;

/// Failure of a single `Service` accessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The backend cannot provide the requested attribute at all.
    #[error("AD: variable not supported by listener")]
    NotSupported,

    /// The entity behind the service is gone.
    #[error("service {id} is no longer available")]
    Unavailable { id: ServiceId },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ServiceError>,
    },
}

impl ServiceError {
    /// Wrap this error with backend-specific context.
    pub fn context(self, context: impl Into<String>) -> Self {
        ServiceError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True if this is, or wraps, `NotSupported`.
    pub fn is_not_supported(&self) -> bool {
        match self {
            ServiceError::NotSupported => true,
            ServiceError::Context { source, .. } => source.is_not_supported(),
            ServiceError::Unavailable { .. } => false,
        }
    }
}

/// Registry and listener lifecycle errors.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("service listener factory {name} already registered")]
    AlreadyRegistered { name: String },

    #[error("service listener name must not be empty")]
    EmptyName,

    #[error("unknown service listener {name}")]
    UnknownListener { name: String },

    #[error("service listener {name} is already listening")]
    AlreadyListening { name: String },

    #[error("service listener {name} is stopped")]
    Stopped { name: String },

    #[error("event channel of service listener {name} is closed")]
    ChannelClosed { name: String },

    #[error("service listener {name} must be started inside a tokio runtime")]
    NoRuntime {
        name: String,
        #[source]
        source: tokio::runtime::TryCurrentError,
    },

    #[error("service listener {name} worker panicked")]
    WorkerPanicked {
        name: String,
        #[source]
        source: tokio::task::JoinError,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_supported_survives_context() {
        let err = ServiceError::NotSupported
            .context("docker inspect")
            .context("container abc");
        assert!(err.is_not_supported());
        assert_eq!(
            err.to_string(),
            "container abc: docker inspect: AD: variable not supported by listener"
        );
    }

    #[test]
    fn test_unavailable_is_not_unsupported() {
        let err = ServiceError::Unavailable { id: ServiceId::from("svc-1") }.context("pid");
        assert!(!err.is_not_supported());
    }
}
