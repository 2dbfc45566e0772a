//! NASDAQ ITCH 5.0 wire model and the parser contract of the Tickwire
//! pipeline.
//!
//! A UDP payload is a concatenation of length-prefixed frames; each frame
//! body starts with a 13-byte common header (stock locate, tracking
//! number, timestamp, type code). [`ItchParser`] turns those frames into
//! normalized [`tickwire_types::Record`]s; [`FrameWriter`] builds them,
//! which is what the round-trip tests lean on.

pub mod builder;
pub mod error;
pub mod itch;
pub mod parser;
pub mod wire;

pub use builder::FrameWriter;
pub use error::CodecError;
pub use itch::ItchParser;
pub use parser::{EchoParser, NullParser, Parser, ParserStats};
pub use wire::MessageType;
