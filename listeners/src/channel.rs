use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use crate::service::ServiceHandle;
use crate::types::ServiceId;

/// Default capacity of each event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// How long `recv` waits for a held event's counterpart that another
/// sender is still writing.
const COUNTERPART_WAIT: Duration = Duration::from_millis(100);

pub type ServiceSender = mpsc::Sender<ServiceHandle>;
pub type ServiceReceiver = mpsc::Receiver<ServiceHandle>;

/// A lifecycle event, as seen by the consumer.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    Added(ServiceHandle),
    Removed(ServiceHandle),
}

impl ServiceEvent {
    pub fn service(&self) -> &ServiceHandle {
        match self {
            ServiceEvent::Added(svc) | ServiceEvent::Removed(svc) => svc,
        }
    }
}

/// Producer halves of the add and delete channels. Cloned into every
/// listener that should report to the same consumer.
#[derive(Debug, Clone)]
pub struct EventSenders {
    pub new_svc: ServiceSender,
    pub del_svc: ServiceSender,
}

/// Create a bounded pair of event channels.
///
/// A full channel suspends the listener that sends on it until the consumer
/// catches up. Panics if `capacity` is zero.
pub fn event_channels(capacity: usize) -> (EventSenders, EventReceivers) {
    let (new_tx, new_rx) = mpsc::channel(capacity);
    let (del_tx, del_rx) = mpsc::channel(capacity);
    (
        EventSenders { new_svc: new_tx, del_svc: del_tx },
        EventReceivers::with_capacity(new_rx, del_rx, capacity),
    )
}

/// Consumer halves of the add and delete channels.
///
/// Listeners send the add for an ID before its delete, but the two
/// channels are separate queues so a consumer polling both can pick the
/// delete first. `recv` undoes that: an event that arrives ahead of its
/// counterpart on the other channel is held back until the counterpart
/// has been pulled and delivered.
#[derive(Debug)]
pub struct EventReceivers {
    new_svc: ServiceReceiver,
    del_svc: ServiceReceiver,
    live: HashSet<ServiceId>,
    ready: VecDeque<ServiceEvent>,
    /// Event waiting for its counterpart. Kept here across awaits.
    held: Option<ServiceEvent>,
    /// Most events pulled from the other channel while looking for a
    /// counterpart. Any counterpart is queued within one channel's capacity.
    drain_limit: usize,
    /// Channels are polled alternately so neither can starve the other.
    del_first: bool,
}

impl EventReceivers {
    pub fn new(new_svc: ServiceReceiver, del_svc: ServiceReceiver) -> Self {
        Self::with_capacity(new_svc, del_svc, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(new_svc: ServiceReceiver, del_svc: ServiceReceiver, capacity: usize) -> Self {
        Self {
            new_svc,
            del_svc,
            live: HashSet::new(),
            ready: VecDeque::new(),
            held: None,
            drain_limit: capacity.max(1),
            del_first: false,
        }
    }

    /// Next event in per-ID order. `None` once every sender is gone and
    /// both channels are drained.
    ///
    /// Cancel safe: an event being held for its counterpart stays in the
    /// receiver and is delivered by the next call.
    pub async fn recv(&mut self) -> Option<ServiceEvent> {
        loop {
            if self.held.is_some() {
                self.settle_held().await;
            }
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }
            let event = self.next_event().await?;
            self.held = Some(event);
        }
    }

    /// Number of IDs added and not yet removed, as delivered by `recv`.
    pub fn live(&self) -> usize {
        self.live.len()
    }

    async fn next_event(&mut self) -> Option<ServiceEvent> {
        let event = if self.del_first {
            tokio::select! {
                biased;
                Some(svc) = self.del_svc.recv() => ServiceEvent::Removed(svc),
                Some(svc) = self.new_svc.recv() => ServiceEvent::Added(svc),
                else => return None,
            }
        } else {
            tokio::select! {
                biased;
                Some(svc) = self.new_svc.recv() => ServiceEvent::Added(svc),
                Some(svc) = self.del_svc.recv() => ServiceEvent::Removed(svc),
                else => return None,
            }
        };
        self.del_first = !self.del_first;
        Some(event)
    }

    /// Move the held event to `ready`, after its counterpart if it overtook
    /// one. A re-add of a live ID waits for that ID's delete, and a delete
    /// of an unknown ID waits for its add.
    async fn settle_held(&mut self) {
        let Some(held) = &self.held else {
            return;
        };
        let id = held.service().id().clone();
        let added = matches!(held, ServiceEvent::Added(_));

        if added == self.live.contains(&id) {
            for _ in 0..self.drain_limit {
                let rx = if added { &mut self.del_svc } else { &mut self.new_svc };
                let Some(other) = pull(rx).await else {
                    break;
                };
                let matched = other.id() == &id;
                if added {
                    self.push_removed(other);
                } else {
                    self.push_added(other);
                }
                if matched {
                    break;
                }
            }
        }

        match self.held.take() {
            Some(ServiceEvent::Added(svc)) => self.push_added(svc),
            Some(ServiceEvent::Removed(svc)) => self.push_removed(svc),
            None => {}
        }
    }

    fn push_added(&mut self, svc: ServiceHandle) {
        if !self.live.insert(svc.id().clone()) {
            tracing::warn!("Service {} added twice without a delete", svc.id());
        }
        self.ready.push_back(ServiceEvent::Added(svc));
    }

    fn push_removed(&mut self, svc: ServiceHandle) {
        if !self.live.remove(svc.id()) {
            tracing::warn!("Service {} removed without a prior add", svc.id());
        }
        self.ready.push_back(ServiceEvent::Removed(svc));
    }
}

async fn pull(rx: &mut ServiceReceiver) -> Option<ServiceHandle> {
    match rx.try_recv() {
        Ok(svc) => Some(svc),
        Err(TryRecvError::Disconnected) => None,
        Err(TryRecvError::Empty) => tokio::time::timeout(COUNTERPART_WAIT, rx.recv())
            .await
            .ok()
            .flatten(),
    }
}
