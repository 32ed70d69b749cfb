//! Inbound delivery payloads, typed by tag domain.

use bytes::Bytes;

use crate::channel::tag::{BrokerTag, TagOffset, VisibleTag};

/// Consumer identifier assigned when a consumer is registered.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConsumerTag(String);

impl ConsumerTag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One message handed down by the broker, either pushed to a consumer or
/// returned from a get request.
///
/// The type parameter is the tag domain: `Delivery<BrokerTag>` on the wire
/// side, `Delivery<VisibleTag>` once it has crossed the recovery layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery<T> {
    pub tag: T,
    /// `None` for get responses; set for pushed deliveries.
    pub consumer_tag: Option<ConsumerTag>,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub body: Bytes,
}

impl Delivery<BrokerTag> {
    /// Re-key this delivery into the visible domain of the generation
    /// `offset` belongs to.
    pub fn offset_by(self, offset: TagOffset) -> Delivery<VisibleTag> {
        Delivery {
            tag: VisibleTag::from_broker(self.tag, offset),
            consumer_tag: self.consumer_tag,
            exchange: self.exchange,
            routing_key: self.routing_key,
            redelivered: self.redelivered,
            body: self.body,
        }
    }
}
