//! Minimal metrics emission helpers.
//!
//! These helpers emit structured metrics via tracing by default. A test sink
//! can be installed to capture emissions in unit tests.

use std::sync::{Arc, RwLock};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetricValue {
    Counter(u64),
    Gauge(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricLabel {
    pub key: &'static str,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricEvent {
    pub name: &'static str,
    pub value: MetricValue,
    pub labels: Vec<MetricLabel>,
}

pub trait MetricSink: Send + Sync {
    fn record(&self, event: MetricEvent);
}

struct TracingSink;

impl MetricSink for TracingSink {
    fn record(&self, event: MetricEvent) {
        let value = match event.value {
            MetricValue::Counter(value) | MetricValue::Gauge(value) => value,
        };
        tracing::info!(
            target: "metrics",
            metric = event.name,
            value,
            labels = ?event.labels
        );
    }
}

static METRIC_SINK: std::sync::OnceLock<RwLock<Arc<dyn MetricSink>>> = std::sync::OnceLock::new();

fn sink() -> Arc<dyn MetricSink> {
    METRIC_SINK
        .get_or_init(|| RwLock::new(Arc::new(TracingSink)))
        .read()
        .expect("metrics sink lock poisoned")
        .clone()
}

pub fn set_sink(sink: Arc<dyn MetricSink>) {
    let lock = METRIC_SINK.get_or_init(|| RwLock::new(Arc::new(TracingSink)));
    *lock.write().expect("metrics sink lock poisoned") = sink;
}

fn emit(name: &'static str, value: MetricValue, labels: Vec<MetricLabel>) {
    sink().record(MetricEvent { name, value, labels });
}

/// Which acknowledgment operation a stale drop happened on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckOp {
    Ack,
    Nack,
    Reject,
}

impl AckOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AckOp::Ack => "ack",
            AckOp::Nack => "nack",
            AckOp::Reject => "reject",
        }
    }
}

/// An acknowledgment referred to a prior channel generation and was not
/// forwarded. Dropping is intentional, long-standing behavior; this counter
/// exists so operators can see it happening (flagged for product review
/// rather than changed).
pub fn stale_ack_dropped(op: AckOp) {
    emit(
        "stale_ack_dropped",
        MetricValue::Counter(1),
        vec![MetricLabel {
            key: "op",
            value: op.as_str().to_string(),
        }],
    );
}

pub fn delivery_in() {
    emit("deliveries_in", MetricValue::Counter(1), Vec::new());
}

pub fn channel_takeover(offset: u64) {
    emit("channel_takeover", MetricValue::Counter(1), Vec::new());
    emit("tag_offset", MetricValue::Gauge(offset), Vec::new());
}

pub fn dispatch_dropped() {
    emit("dispatch_dropped", MetricValue::Counter(1), Vec::new());
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct TestSink {
        events: Mutex<Vec<MetricEvent>>,
    }

    impl MetricSink for TestSink {
        fn record(&self, event: MetricEvent) {
            self.events.lock().expect("metrics lock").push(event);
        }
    }

    #[test]
    fn emits_counters_with_labels() {
        let sink = Arc::new(TestSink::default());
        set_sink(sink.clone());

        stale_ack_dropped(AckOp::Nack);
        delivery_in();
        channel_takeover(42);

        let events = sink.events.lock().expect("metrics lock");
        assert!(events.iter().any(|e| {
            e.name == "stale_ack_dropped"
                && e.labels
                    .iter()
                    .any(|l| l.key == "op" && l.value == "nack")
        }));
        assert!(events.iter().any(|e| e.name == "deliveries_in"));
        assert!(
            events
                .iter()
                .any(|e| e.name == "tag_offset" && e.value == MetricValue::Gauge(42))
        );
    }
}
