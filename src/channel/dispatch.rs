//! Bounded fanout of rewritten deliveries to application subscribers.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crossbeam::channel::{Receiver, Sender, TryRecvError, TrySendError};
use thiserror::Error;
use tracing::warn;

use crate::channel::base::ConsumerSink;
use crate::channel::event::Delivery;
use crate::channel::tag::VisibleTag;
use crate::config::ChannelLimits;
use crate::error::Transience;
use crate::metrics;

/// What a subscriber receives: pushes and pulls, already in visible
/// numbering.
#[derive(Clone, Debug, PartialEq)]
pub enum DeliveryEvent {
    Deliver(Delivery<VisibleTag>),
    GetOk(Delivery<VisibleTag>),
}

impl DeliveryEvent {
    pub fn delivery(&self) -> &Delivery<VisibleTag> {
        match self {
            DeliveryEvent::Deliver(delivery) | DeliveryEvent::GetOk(delivery) => delivery,
        }
    }
}

/// Why a subscriber stopped receiving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    SubscriberLagged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatcherLimits {
    pub max_subscribers: usize,
    pub subscriber_queue_events: usize,
}

impl DispatcherLimits {
    pub fn from_limits(limits: &ChannelLimits) -> Self {
        Self {
            max_subscribers: limits.max_subscribers,
            subscriber_queue_events: limits.subscriber_queue_events.max(1),
        }
    }
}

pub struct DeliverySubscription {
    receiver: Receiver<DeliveryEvent>,
    drop_reason: Arc<Mutex<Option<DropReason>>>,
}

impl DeliverySubscription {
    pub fn recv(&self) -> Result<DeliveryEvent, crossbeam::channel::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<DeliveryEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        self.drop_reason.lock().ok().and_then(|guard| *guard)
    }
}

/// Fans each event out to every live subscriber over bounded queues. A
/// subscriber that cannot keep up is disconnected rather than allowed to
/// stall the network-read path.
#[derive(Clone)]
pub struct DeliveryDispatcher {
    inner: Arc<Mutex<DispatchState>>,
}

impl DeliveryDispatcher {
    pub fn new(limits: DispatcherLimits) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DispatchState::new(limits))),
        }
    }

    pub fn subscribe(&self) -> Result<DeliverySubscription, DispatchError> {
        let mut state = self.lock_state()?;
        if state.subscribers.len() >= state.limits.max_subscribers {
            return Err(DispatchError::SubscriberLimitReached {
                max_subscribers: state.limits.max_subscribers,
            });
        }

        let (sender, receiver) =
            crossbeam::channel::bounded(state.limits.subscriber_queue_events);
        let drop_reason = Arc::new(Mutex::new(None));
        let id = state.next_subscriber_id;
        state.next_subscriber_id = state.next_subscriber_id.saturating_add(1);
        state.subscribers.insert(
            id,
            SubscriberState {
                sender,
                drop_reason: Arc::clone(&drop_reason),
            },
        );

        Ok(DeliverySubscription {
            receiver,
            drop_reason,
        })
    }

    pub fn subscriber_count(&self) -> Result<usize, DispatchError> {
        Ok(self.lock_state()?.subscribers.len())
    }

    fn publish(&self, event: DeliveryEvent) -> Result<(), DispatchError> {
        let mut state = self.lock_state()?;

        let mut dropped = Vec::new();
        for (id, subscriber) in &state.subscribers {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    subscriber.set_drop_reason(DropReason::SubscriberLagged);
                    metrics::dispatch_dropped();
                    dropped.push(*id);
                }
                Err(TrySendError::Disconnected(_)) => {
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            state.subscribers.remove(&id);
        }

        Ok(())
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, DispatchState>, DispatchError> {
        self.inner.lock().map_err(|_| DispatchError::LockPoisoned)
    }
}

impl ConsumerSink for DeliveryDispatcher {
    fn deliver(&self, delivery: Delivery<VisibleTag>) {
        if let Err(err) = self.publish(DeliveryEvent::Deliver(delivery)) {
            warn!(%err, "delivery not dispatched");
        }
    }

    fn get_ok(&self, delivery: Delivery<VisibleTag>) {
        if let Err(err) = self.publish(DeliveryEvent::GetOk(delivery)) {
            warn!(%err, "get response not dispatched");
        }
    }
}

struct DispatchState {
    limits: DispatcherLimits,
    next_subscriber_id: u64,
    subscribers: BTreeMap<u64, SubscriberState>,
}

impl DispatchState {
    fn new(limits: DispatcherLimits) -> Self {
        Self {
            limits,
            next_subscriber_id: 1,
            subscribers: BTreeMap::new(),
        }
    }
}

struct SubscriberState {
    sender: Sender<DeliveryEvent>,
    drop_reason: Arc<Mutex<Option<DropReason>>>,
}

impl SubscriberState {
    fn set_drop_reason(&self, reason: DropReason) {
        if let Ok(mut guard) = self.drop_reason.lock() {
            if guard.is_none() {
                *guard = Some(reason);
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("subscriber limit reached ({max_subscribers})")]
    SubscriberLimitReached { max_subscribers: usize },
    #[error("dispatcher lock poisoned")]
    LockPoisoned,
}

impl DispatchError {
    pub fn transience(&self) -> Transience {
        match self {
            // Slots free up when an existing subscriber goes away.
            DispatchError::SubscriberLimitReached { .. } => Transience::Retryable,
            DispatchError::LockPoisoned => Transience::Permanent,
        }
    }
}
