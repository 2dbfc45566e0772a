//! Normalized market event record.
//!
//! Every wire protocol decodes into this one shape; subscribers never see
//! protocol-specific layouts.

/// Event category of a normalized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum EventKind {
    #[default]
    Unknown = 0,
    Trade = 1,
    Quote = 2,
    OrderAdd = 3,
    /// Covers both partial cancels (quantity = shares removed, a decrement
    /// rather than a new total) and order replaces.
    OrderModify = 4,
    OrderDelete = 5,
    OrderExecute = 6,
    Imbalance = 7,
    SystemEvent = 8,
}

/// Order side. `None` for messages that carry no side on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
    #[default]
    None = 2,
}

/// The canonical cross-protocol event, one cache line wide.
///
/// `local_timestamp` is stamped at packet receipt and travels unchanged
/// through the pipeline; it is the basis for end-to-end latency
/// measurement. Prices are fixed-point integers scaled by 10,000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C, align(64))]
pub struct Record {
    /// Exchange-local instrument identifier (ITCH stock locate).
    pub instrument_id: u64,
    /// Order reference number, 0 when not applicable.
    pub order_id: u64,
    /// Price in 1/10,000 units.
    pub price: i64,
    /// Shares / units.
    pub quantity: u64,
    /// Nanoseconds since exchange midnight, straight off the wire.
    pub exchange_timestamp: u64,
    /// Nanoseconds on the local monotonic clock at packet receipt.
    pub local_timestamp: u64,
    /// ITCH tracking number or packet sequence.
    pub sequence: u32,
    pub kind: EventKind,
    pub side: Side,
}

impl Record {
    /// True for the all-zero record produced by `Default`.
    pub fn is_unknown(&self) -> bool {
        self.kind == EventKind::Unknown
    }
}
