//! Delivery-tag domains and the offset arithmetic between them.
//!
//! A broker numbers deliveries per physical channel session, restarting at 1
//! after every reconnect. The application sees a single continuous numbering
//! instead. The two domains are kept as distinct types so a tag can never be
//! forwarded to the wrong side by accident; crossing the boundary goes
//! through [`VisibleTag::from_broker`] and [`VisibleTag::into_broker`].

use std::fmt;

/// Broker-relative delivery tag.
///
/// Starts at 1 and strictly increases within one channel generation. The
/// broker never assigns tag 0.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BrokerTag(u64);

impl BrokerTag {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BrokerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BrokerTag({})", self.0)
    }
}

impl fmt::Display for BrokerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<BrokerTag> for u64 {
    fn from(value: BrokerTag) -> u64 {
        value.0
    }
}

/// Application-visible delivery tag.
///
/// Strictly increasing over the logical channel's entire lifetime, across
/// any number of reconnects (absent 64-bit overflow).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VisibleTag(u64);

impl VisibleTag {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Lift a broker tag into the visible domain of the generation `offset`
    /// belongs to.
    pub fn from_broker(tag: BrokerTag, offset: TagOffset) -> Self {
        Self(tag.0.wrapping_add(offset.0))
    }

    /// Translate back into the broker domain of the generation `offset`
    /// belongs to.
    ///
    /// Returns `None` for tags minted by an earlier generation. Such a tag
    /// satisfies `visible < offset`, so the wraparound subtraction produces
    /// a value exceeding `visible` and the guard rejects it. The comparison
    /// must stay on the wrapped value; an isolated range check cannot
    /// discriminate current-generation tags from stale ones. `real == 0`
    /// (`visible == offset`) is rejected too: the broker never assigns
    /// tag 0.
    pub fn into_broker(self, offset: TagOffset) -> Option<BrokerTag> {
        let real = self.0.wrapping_sub(offset.0);
        if real > 0 && real <= self.0 {
            Some(BrokerTag(real))
        } else {
            None
        }
    }
}

impl fmt::Debug for VisibleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VisibleTag({})", self.0)
    }
}

impl fmt::Display for VisibleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<VisibleTag> for u64 {
    fn from(value: VisibleTag) -> u64 {
        value.0
    }
}

/// Cumulative tag count consumed by all prior generations of a logical
/// channel; fixed for the lifetime of one generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TagOffset(u64);

impl TagOffset {
    pub const ZERO: TagOffset = TagOffset(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Offset for the generation following one that saw `max_seen` as its
    /// highest broker tag. Modular add, same domain as the subtraction in
    /// [`VisibleTag::into_broker`].
    pub fn advance(self, max_seen: u64) -> TagOffset {
        TagOffset(self.0.wrapping_add(max_seen))
    }
}

impl fmt::Display for TagOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
