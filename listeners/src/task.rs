use std::future::Future;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use crate::channel::ServiceSender;
use crate::emitter::ServiceEmitter;
use crate::error::ListenerError;

enum State {
    Constructed,
    Listening {
        cancel: CancellationToken,
        handle: JoinHandle<Result<(), ListenerError>>,
    },
    Stopped,
}

/// Lifecycle of a listener's background worker.
///
/// Backends embed one of these and forward `listen`/`stop` to it. The
/// worker gets a `ServiceEmitter` and runs until it returns or the task is
/// stopped; `stop` cancels and joins it. Dropping the task cancels the
/// worker without waiting for it.
pub struct ListenerTask {
    name: String,
    state: State,
}

impl ListenerTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: State::Constructed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state, State::Listening { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, State::Stopped)
    }

    /// Spawn the worker on the current tokio runtime.
    pub fn start<F, Fut>(
        &mut self,
        new_svc: ServiceSender,
        del_svc: ServiceSender,
        run: F,
    ) -> Result<(), ListenerError>
    where
        F: FnOnce(ServiceEmitter) -> Fut,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        match self.state {
            State::Constructed => {}
            State::Listening { .. } => {
                return Err(ListenerError::AlreadyListening { name: self.name.clone() });
            }
            State::Stopped => {
                return Err(ListenerError::Stopped { name: self.name.clone() });
            }
        }

        let runtime = Handle::try_current().map_err(|source| ListenerError::NoRuntime {
            name: self.name.clone(),
            source,
        })?;

        let cancel = CancellationToken::new();
        let emitter = ServiceEmitter::new(self.name.clone(), new_svc, del_svc, cancel.clone());
        let worker = run(emitter);
        let name = self.name.clone();

        let handle = runtime.spawn(async move {
            tracing::info!("Service listener {} started", name);
            let result = worker.await;
            match &result {
                Ok(()) | Err(ListenerError::Stopped { .. }) => {
                    tracing::debug!("Service listener {} worker finished", name);
                }
                Err(e) => {
                    tracing::error!("Service listener {} failed: {}", name, e);
                }
            }
            result
        });

        self.state = State::Listening { cancel, handle };
        Ok(())
    }

    /// Cancel the worker and wait for it to exit.
    pub async fn stop(&mut self) -> Result<(), ListenerError> {
        let State::Listening { cancel, handle } = std::mem::replace(&mut self.state, State::Stopped) else {
            return Ok(());
        };

        cancel.cancel();
        let result = match handle.await {
            Ok(Ok(())) | Ok(Err(ListenerError::Stopped { .. })) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(source) => Err(ListenerError::WorkerPanicked {
                name: self.name.clone(),
                source,
            }),
        };
        tracing::info!("Service listener {} stopped", self.name);
        result
    }
}

impl Drop for ListenerTask {
    fn drop(&mut self) {
        if let State::Listening { cancel, .. } = &self.state {
            cancel.cancel();
        }
    }
}
