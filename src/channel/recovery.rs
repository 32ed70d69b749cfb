//! Generation-aware tag remapping around a base channel.
//!
//! Each reconnect replaces the physical channel and restarts the broker's
//! delivery-tag numbering at 1. One [`RecoveryAwareChannel`] instance spans
//! exactly one such generation: it adds a fixed offset to every inbound tag
//! before the application sees it, strips the offset from every outbound
//! ack/nack/reject, and silently drops acknowledgments that refer to a
//! generation that no longer exists. Handoff between generations moves the
//! accumulated tag space forward via [`RecoveryAwareChannel::take_over`].

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::channel::base::{BaseChannel, ChannelError, ConsumerSink};
use crate::channel::event::Delivery;
use crate::channel::tag::{BrokerTag, TagOffset, VisibleTag};
use crate::metrics::{self, AckOp};

/// A base channel wrapped with per-generation tag-space state.
///
/// Inbound deliveries may arrive on a network-read thread while
/// acknowledgments originate on application threads; the max-seen counter
/// is maintained with an atomic compare-and-increase so interleaved
/// push-delivery and get-response paths never lose an update. The offset is
/// written only at construction and handoff, strictly before this
/// generation accepts traffic (the recovery coordinator's ordering
/// guarantee; `take_over` taking `&mut self` keeps that visible in the
/// types).
pub struct RecoveryAwareChannel<C> {
    inner: C,
    offset: TagOffset,
    max_seen: AtomicU64,
}

impl<C: BaseChannel> RecoveryAwareChannel<C> {
    /// First generation of a logical channel: no prior tag space.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            offset: TagOffset::ZERO,
            max_seen: AtomicU64::new(0),
        }
    }

    /// Seed this generation from a quiesced predecessor.
    ///
    /// Shared channel state is transferred by the base layer first, then
    /// the tag space moves forward: the new offset absorbs every tag the
    /// predecessor handed out. The caller guarantees the predecessor
    /// receives no further inbound deliveries and that none reach `self`
    /// before this returns; nothing is validated here and nothing can fail.
    pub fn take_over(&mut self, predecessor: &RecoveryAwareChannel<C>) {
        self.inner.take_over(&predecessor.inner);
        self.offset = predecessor.offset.advance(predecessor.max_seen());
        *self.max_seen.get_mut() = 0;
        metrics::channel_takeover(self.offset.get());
        debug!(offset = %self.offset, "tag space handed over");
    }

    /// Offset of this generation.
    pub fn offset(&self) -> TagOffset {
        self.offset
    }

    /// Highest broker-relative tag observed in this generation.
    pub fn max_seen(&self) -> u64 {
        self.max_seen.load(Ordering::Acquire)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Inbound pushed delivery, in broker numbering. Re-keyed and emitted
    /// to the sink; never fails.
    pub fn handle_deliver<S: ConsumerSink>(&self, delivery: Delivery<BrokerTag>, sink: &S) {
        sink.deliver(self.observe(delivery));
    }

    /// Inbound get response. Same tag handling as a pushed delivery.
    pub fn handle_get_ok<S: ConsumerSink>(&self, delivery: Delivery<BrokerTag>, sink: &S) {
        sink.get_ok(self.observe(delivery));
    }

    fn observe(&self, delivery: Delivery<BrokerTag>) -> Delivery<VisibleTag> {
        self.max_seen
            .fetch_max(delivery.tag.get(), Ordering::AcqRel);
        metrics::delivery_in();
        delivery.offset_by(self.offset)
    }

    /// Acknowledge a delivery by its application-visible tag.
    pub fn basic_ack(&self, tag: VisibleTag, multiple: bool) -> Result<(), ChannelError> {
        match tag.into_broker(self.offset) {
            Some(real) => self.inner.basic_ack(real, multiple),
            None => {
                self.drop_stale(AckOp::Ack, tag);
                Ok(())
            }
        }
    }

    /// Negatively acknowledge a delivery by its application-visible tag.
    /// `multiple` and `requeue` pass through unchanged.
    pub fn basic_nack(
        &self,
        tag: VisibleTag,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), ChannelError> {
        match tag.into_broker(self.offset) {
            Some(real) => self.inner.basic_nack(real, multiple, requeue),
            None => {
                self.drop_stale(AckOp::Nack, tag);
                Ok(())
            }
        }
    }

    /// Reject a delivery by its application-visible tag.
    pub fn basic_reject(&self, tag: VisibleTag, requeue: bool) -> Result<(), ChannelError> {
        match tag.into_broker(self.offset) {
            Some(real) => self.inner.basic_reject(real, requeue),
            None => {
                self.drop_stale(AckOp::Reject, tag);
                Ok(())
            }
        }
    }

    // Stale acknowledgments are not surfaced to the caller; the counter and
    // the debug event are the only trace they leave.
    fn drop_stale(&self, op: AckOp, tag: VisibleTag) {
        metrics::stale_ack_dropped(op);
        debug!(
            op = op.as_str(),
            tag = %tag,
            offset = %self.offset,
            "dropped acknowledgment for a prior channel generation"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use super::*;
    use crate::channel::event::ConsumerTag;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Forwarded {
        Ack { tag: u64, multiple: bool },
        Nack { tag: u64, multiple: bool, requeue: bool },
        Reject { tag: u64, requeue: bool },
    }

    #[derive(Default)]
    struct RecordingChannel {
        forwarded: Mutex<Vec<Forwarded>>,
        took_over: AtomicBool,
    }

    impl RecordingChannel {
        fn forwarded(&self) -> Vec<Forwarded> {
            self.forwarded.lock().unwrap().clone()
        }
    }

    impl BaseChannel for RecordingChannel {
        fn basic_ack(&self, tag: BrokerTag, multiple: bool) -> Result<(), ChannelError> {
            self.forwarded.lock().unwrap().push(Forwarded::Ack {
                tag: tag.get(),
                multiple,
            });
            Ok(())
        }

        fn basic_nack(
            &self,
            tag: BrokerTag,
            multiple: bool,
            requeue: bool,
        ) -> Result<(), ChannelError> {
            self.forwarded.lock().unwrap().push(Forwarded::Nack {
                tag: tag.get(),
                multiple,
                requeue,
            });
            Ok(())
        }

        fn basic_reject(&self, tag: BrokerTag, requeue: bool) -> Result<(), ChannelError> {
            self.forwarded.lock().unwrap().push(Forwarded::Reject {
                tag: tag.get(),
                requeue,
            });
            Ok(())
        }

        fn take_over(&self, predecessor: &Self) {
            let _ = predecessor;
            self.took_over.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        delivered: Mutex<Vec<u64>>,
        got: Mutex<Vec<u64>>,
    }

    impl ConsumerSink for CollectingSink {
        fn deliver(&self, delivery: Delivery<VisibleTag>) {
            self.delivered.lock().unwrap().push(delivery.tag.get());
        }

        fn get_ok(&self, delivery: Delivery<VisibleTag>) {
            self.got.lock().unwrap().push(delivery.tag.get());
        }
    }

    fn delivery(tag: u64) -> Delivery<BrokerTag> {
        Delivery {
            tag: BrokerTag::new(tag),
            consumer_tag: Some(ConsumerTag::new("ctag-0")),
            exchange: "ex".to_string(),
            routing_key: "rk".to_string(),
            redelivered: false,
            body: Bytes::from_static(b"m"),
        }
    }

    #[test]
    fn fresh_channel_passes_tags_through() {
        let channel = RecoveryAwareChannel::new(RecordingChannel::default());
        let sink = CollectingSink::default();

        channel.handle_deliver(delivery(1), &sink);
        channel.handle_deliver(delivery(5), &sink);

        assert_eq!(*sink.delivered.lock().unwrap(), vec![1, 5]);
        assert_eq!(channel.max_seen(), 5);

        channel.basic_ack(VisibleTag::new(5), false).unwrap();
        assert_eq!(
            channel.inner().forwarded(),
            vec![Forwarded::Ack {
                tag: 5,
                multiple: false
            }]
        );
    }

    #[test]
    fn take_over_shifts_the_tag_space() {
        let sink = CollectingSink::default();
        let old = RecoveryAwareChannel::new(RecordingChannel::default());
        old.handle_deliver(delivery(5), &sink);

        let mut new = RecoveryAwareChannel::new(RecordingChannel::default());
        new.take_over(&old);

        assert!(new.inner().took_over.load(Ordering::SeqCst));
        assert_eq!(new.offset(), TagOffset::new(5));
        assert_eq!(new.max_seen(), 0);

        new.handle_deliver(delivery(1), &sink);
        assert_eq!(*sink.delivered.lock().unwrap(), vec![5, 6]);

        new.basic_ack(VisibleTag::new(6), false).unwrap();
        assert_eq!(
            new.inner().forwarded(),
            vec![Forwarded::Ack {
                tag: 1,
                multiple: false
            }]
        );
    }

    #[test]
    fn stale_ack_is_dropped_not_forwarded() {
        let sink = CollectingSink::default();
        let old = RecoveryAwareChannel::new(RecordingChannel::default());
        old.handle_deliver(delivery(5), &sink);

        let mut new = RecoveryAwareChannel::new(RecordingChannel::default());
        new.take_over(&old);

        // Tag 3 belongs to the discarded generation.
        new.basic_ack(VisibleTag::new(3), false).unwrap();
        new.basic_nack(VisibleTag::new(3), false, true).unwrap();
        new.basic_reject(VisibleTag::new(3), true).unwrap();

        assert!(new.inner().forwarded().is_empty());
    }

    #[test]
    fn nack_flags_pass_through_unchanged() {
        let channel = RecoveryAwareChannel::new(RecordingChannel::default());
        let sink = CollectingSink::default();
        channel.handle_deliver(delivery(2), &sink);

        channel.basic_nack(VisibleTag::new(2), true, true).unwrap();
        channel.basic_reject(VisibleTag::new(1), false).unwrap();

        assert_eq!(
            channel.inner().forwarded(),
            vec![
                Forwarded::Nack {
                    tag: 2,
                    multiple: true,
                    requeue: true
                },
                Forwarded::Reject {
                    tag: 1,
                    requeue: false
                },
            ]
        );
    }

    #[test]
    fn get_responses_update_max_seen_like_deliveries() {
        let channel = RecoveryAwareChannel::new(RecordingChannel::default());
        let sink = CollectingSink::default();

        channel.handle_get_ok(delivery(4), &sink);
        channel.handle_deliver(delivery(2), &sink);

        // The later, lower-tagged delivery must not regress max_seen.
        assert_eq!(channel.max_seen(), 4);
        assert_eq!(*sink.got.lock().unwrap(), vec![4]);
        assert_eq!(*sink.delivered.lock().unwrap(), vec![2]);
    }

    #[test]
    fn concurrent_deliveries_never_lose_a_max_seen_update() {
        let channel = Arc::new(RecoveryAwareChannel::new(RecordingChannel::default()));
        let sink = Arc::new(CollectingSink::default());

        let mut handles = Vec::new();
        for worker in 0..4u64 {
            let channel = Arc::clone(&channel);
            let sink = Arc::clone(&sink);
            handles.push(std::thread::spawn(move || {
                for i in 0..250u64 {
                    let tag = worker * 250 + i + 1;
                    if tag % 2 == 0 {
                        channel.handle_deliver(delivery(tag), &*sink);
                    } else {
                        channel.handle_get_ok(delivery(tag), &*sink);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(channel.max_seen(), 1000);
    }
}
