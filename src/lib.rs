#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;
pub mod transport;

pub use error::{Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the channel-layer types at crate root for convenience
pub use crate::channel::{
    BaseChannel, BrokerTag, ChannelError, ConsumerSink, ConsumerTag, Delivery, DeliveryDispatcher,
    DeliveryEvent, DeliverySubscription, RecoveryAwareChannel, TagOffset, VisibleTag,
};
pub use crate::transport::{AddrFamily, TcpStreamAdapter, TransportError};
