// Core data model shared across the Tickwire pipeline crates.

pub mod packet;
pub mod record;
pub mod stats;
pub mod time;

pub use packet::{PacketView, MAX_PACKET_SIZE};
pub use record::{EventKind, Record, Side};
pub use stats::{Statistics, StatsSnapshot};
pub use time::monotonic_ns;
