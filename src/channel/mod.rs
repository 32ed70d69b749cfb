//! Recovery-aware channel layer.
//!
//! Module order follows the data flow:
//! - tag: the two delivery-tag domains and the offset arithmetic between them
//! - event: inbound delivery payloads, typed by tag domain
//! - base: trait seams toward the broker and toward the application
//! - recovery: generation-aware remapping between the two domains
//! - dispatch: bounded fanout of rewritten deliveries to subscribers

pub mod base;
pub mod dispatch;
pub mod event;
pub mod recovery;
pub mod tag;

pub use base::{BaseChannel, ChannelError, ConsumerSink};
pub use dispatch::{
    DeliveryDispatcher, DeliveryEvent, DeliverySubscription, DispatchError, DispatcherLimits,
    DropReason,
};
pub use event::{ConsumerTag, Delivery};
pub use recovery::RecoveryAwareChannel;
pub use tag::{BrokerTag, TagOffset, VisibleTag};
