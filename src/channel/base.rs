//! Trait seams on either side of the recovery layer.

use thiserror::Error;

use crate::channel::event::Delivery;
use crate::channel::tag::{BrokerTag, VisibleTag};
use crate::error::Transience;

/// Broker-facing channel capability, keyed by broker-relative tags.
///
/// Implemented by the protocol/framing layer. The recovery layer only ever
/// calls these five operations plus [`BaseChannel::take_over`]; it never
/// touches raw bytes itself.
pub trait BaseChannel {
    /// Acknowledge `tag`, or everything up to and including `tag` when
    /// `multiple` is set.
    fn basic_ack(&self, tag: BrokerTag, multiple: bool) -> Result<(), ChannelError>;

    /// Negatively acknowledge `tag` (or everything up to it when
    /// `multiple`), optionally requeueing.
    fn basic_nack(&self, tag: BrokerTag, multiple: bool, requeue: bool)
        -> Result<(), ChannelError>;

    /// Reject a single delivery, optionally requeueing.
    fn basic_reject(&self, tag: BrokerTag, requeue: bool) -> Result<(), ChannelError>;

    /// Transfer shared, tag-unrelated channel state from a predecessor
    /// (consumer registrations, pending continuations, ...). Called exactly
    /// once during handoff, before the successor sees any traffic.
    fn take_over(&self, predecessor: &Self);
}

/// Application-facing edge that receives rewritten inbound events.
///
/// Both methods are total: the recovery layer emits and forgets.
pub trait ConsumerSink {
    /// A pushed delivery.
    fn deliver(&self, delivery: Delivery<VisibleTag>);

    /// A get response.
    fn get_ok(&self, delivery: Delivery<VisibleTag>);
}

/// Errors surfaced by the broker-facing channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel was closed by the broker or the peer layer.
    #[error("channel is closed")]
    Closed,
    /// The underlying connection is gone; recovery may produce a successor.
    #[error("connection is closed")]
    ConnectionClosed,
    #[error("i/o failure talking to the broker")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    pub fn transience(&self) -> Transience {
        match self {
            // A closed channel never comes back; its successor is a new
            // generation.
            ChannelError::Closed => Transience::Permanent,
            ChannelError::ConnectionClosed => Transience::Retryable,
            ChannelError::Io(_) => Transience::Unknown,
        }
    }
}
