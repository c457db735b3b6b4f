use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::Future;
use anyhow::{anyhow, Context};
use ad_listeners::{ListenerError, Service, ServiceEmitter, ServiceId};
use crate::config::MdnsConfig;
use super::service::MdnsService;
use super::LISTENER_NAME;

const META_QUERY_TYPE: &str = "_services._dns-sd._udp.local.";

type RecvResult = (usize, flume::Receiver<ServiceEvent>, std::result::Result<ServiceEvent, flume::RecvError>);
type RecvFuture = Pin<Box<dyn Future<Output = RecvResult> + Send>>;

/// Each future owns a clone of the receiver, avoiding borrow issues with the
/// receivers vec. flume::Receiver is Clone (multi-consumer).
fn make_recv_future(idx: usize, rx: flume::Receiver<ServiceEvent>) -> RecvFuture {
    Box::pin(async move {
        let result = rx.recv_async().await;
        (idx, rx, result)
    })
}

/// What the browser does with one mDNS event.
#[derive(Debug)]
enum Action {
    Browse(String),
    Add(MdnsService),
    Remove(ServiceId),
    Ignore,
}

/// Meta-query answers arrive as `ServiceFound` naming a service type. A
/// type has no SRV record, so it is never resolved.
fn meta_action(event: ServiceEvent) -> Action {
    match event {
        ServiceEvent::ServiceFound(_, service_type) => Action::Browse(service_type),
        _ => Action::Ignore,
    }
}

fn type_action(event: ServiceEvent, ipv6_only: bool) -> Action {
    match event {
        ServiceEvent::ServiceResolved(info) => match MdnsService::from_info(&info, ipv6_only) {
            Some(svc) => Action::Add(svc),
            None => Action::Ignore,
        },
        ServiceEvent::ServiceRemoved(_, fullname) => {
            Action::Remove(ServiceId::scoped(LISTENER_NAME, &fullname))
        }
        _ => Action::Ignore,
    }
}

/// Browses mDNS and reports resolved and removed services through the
/// emitter until the listener is stopped.
pub async fn run_browser(
    daemon: ServiceDaemon,
    config: MdnsConfig,
    emitter: ServiceEmitter,
) -> Result<(), ListenerError> {
    let browse = move |service_type: &str| {
        daemon
            .browse(service_type)
            .map_err(|e| anyhow!("{}", e))
    };
    browse_loop(browse, config, emitter).await
}

/// Browser event loop. `browse_type` opens the event stream of one service
/// type, or of the meta-query.
async fn browse_loop<B>(
    mut browse_type: B,
    config: MdnsConfig,
    mut emitter: ServiceEmitter,
) -> Result<(), ListenerError>
where
    B: FnMut(&str) -> anyhow::Result<flume::Receiver<ServiceEvent>> + Send,
{
    tracing::info!("Starting mDNS browser");
    let cancel = emitter.cancellation();

    // Without configured types, the meta-query tells us which ones exist.
    let meta_receiver = if config.service_types.is_empty() {
        Some(browse_type(META_QUERY_TYPE).context("Failed to start meta-query browse")?)
    } else {
        None
    };

    let mut browsed_types = HashSet::new();
    let mut next_idx = 0usize;
    let mut type_futures: FuturesUnordered<RecvFuture> = FuturesUnordered::new();

    let mut browse = |service_type: &str, pending: &mut FuturesUnordered<RecvFuture>| {
        if !browsed_types.insert(service_type.to_string()) {
            return;
        }
        tracing::info!("Browsing service type: {}", service_type);
        match browse_type(service_type) {
            Ok(receiver) => {
                pending.push(make_recv_future(next_idx, receiver));
                next_idx += 1;
            }
            Err(e) => {
                tracing::error!("Failed to browse {}: {}", service_type, e);
            }
        }
    };

    for service_type in &config.service_types {
        browse(service_type.as_str(), &mut type_futures);
    }

    loop {
        tokio::select! {
            event = recv_meta(meta_receiver.as_ref()) => {
                match event {
                    Ok(event) => {
                        if let Action::Browse(service_type) = meta_action(event) {
                            browse(&service_type, &mut type_futures);
                        }
                    }
                    Err(e) => {
                        return Err(anyhow!("mDNS meta-query channel closed: {}", e).into());
                    }
                }
            }

            Some((idx, rx, result)) = type_futures.next() => {
                match result {
                    Ok(event) => {
                        match type_action(event, config.ipv6_only) {
                            Action::Add(svc) => {
                                tracing::debug!("Resolved service: {}", svc.id());
                                emitter.add(Arc::new(svc)).await?;
                            }
                            Action::Remove(id) => {
                                tracing::debug!("Service removed: {}", id);
                                emitter.remove(&id).await?;
                            }
                            Action::Browse(_) | Action::Ignore => {}
                        }
                        type_futures.push(make_recv_future(idx, rx));
                    }
                    Err(e) => {
                        tracing::warn!("Receiver {} disconnected: {}", idx, e);
                    }
                }
            }

            _ = cancel.cancelled() => {
                tracing::info!("mDNS browser shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Next meta-query event, or never when browsing configured types only.
async fn recv_meta(
    rx: Option<&flume::Receiver<ServiceEvent>>,
) -> std::result::Result<ServiceEvent, flume::RecvError> {
    match rx {
        Some(rx) => rx.recv_async().await,
        None => futures::future::pending().await,
    }
}
