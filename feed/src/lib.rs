//! Receive-path market data pipeline.
//!
//! Three stages on three dedicated threads, connected by bounded
//! lock-free rings:
//!
//! ```text
//! kernel ──> ingress ──SPSC──> decoder ──SPSC──> dispatcher ──SPSC──> subscriber
//!            (socket)          (parser)           per-subscriber rings
//! ```
//!
//! The ingress thread owns the multicast socket and never blocks on
//! downstream slowness: a full ring means the datagram is dropped and
//! counted. The decoder frames each packet into ITCH messages and emits
//! normalized records; the dispatcher fans every record out to each
//! subscriber's private ring and drives delivery. Everything on the hot
//! path is allocation-free after [`FeedEngine::start`].

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod ingress;
pub mod ring;
pub mod subscriber;

pub use config::FeedConfig;
pub use dispatch::Dispatcher;
pub use engine::FeedEngine;
pub use error::FeedError;
pub use ingress::Packet;
pub use ring::{MpscRing, SpscRing};
pub use subscriber::{subscriber_from_fn, Subscriber};
