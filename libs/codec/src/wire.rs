//! ITCH 5.0 wire layout: framing constants, the message type catalog and
//! big-endian field extraction.
//!
//! Every multi-byte integer on the wire is big-endian. A frame is a
//! `u16` length (which counts itself) followed by `length - 2` body
//! bytes; the body begins with a common header and the type code sits at
//! body offset 12.

use crate::error::CodecError;
use byteorder::{BigEndian, ByteOrder};

/// Bytes of the frame length prefix.
pub const FRAME_HEADER_LEN: usize = 2;
/// Smallest wire length a frame may declare.
pub const MIN_FRAME_LEN: usize = 3;
/// Common header: locate(2) tracking(2) timestamp(8) type(1).
pub const BODY_HEADER_LEN: usize = 13;

/// Fixed-point price scale: wire prices are in 1/10,000 units.
pub const PRICE_SCALE: i64 = 10_000;

/// Body offsets of the common header.
pub const OFF_STOCK_LOCATE: usize = 0;
pub const OFF_TRACKING: usize = 2;
pub const OFF_TIMESTAMP: usize = 4;
pub const OFF_TYPE: usize = 12;

/// ITCH buy indicator.
pub const SIDE_BUY: u8 = b'B';
/// ITCH sell indicator.
pub const SIDE_SELL: u8 = b'S';

/// The message types the pipeline maps into normalized records.
///
/// ITCH defines more types than these; anything else is skipped without
/// being counted as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    SystemEvent = b'S',
    StockDirectory = b'R',
    AddOrder = b'A',
    AddOrderMpid = b'F',
    OrderExecuted = b'E',
    OrderExecutedWithPrice = b'C',
    OrderCancel = b'X',
    OrderDelete = b'D',
    OrderReplace = b'U',
    Trade = b'P',
}

impl MessageType {
    /// Maps a wire type code, `None` for anything outside the catalog.
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            b'S' => Self::SystemEvent,
            b'R' => Self::StockDirectory,
            b'A' => Self::AddOrder,
            b'F' => Self::AddOrderMpid,
            b'E' => Self::OrderExecuted,
            b'C' => Self::OrderExecutedWithPrice,
            b'X' => Self::OrderCancel,
            b'D' => Self::OrderDelete,
            b'U' => Self::OrderReplace,
            b'P' => Self::Trade,
            _ => return None,
        })
    }

    /// Fixed body size of this message type, common header included.
    pub fn body_len(self) -> usize {
        match self {
            Self::SystemEvent => 14,
            Self::StockDirectory => 41,
            Self::AddOrder => 38,
            Self::AddOrderMpid => 42,
            Self::OrderExecuted => 33,
            Self::OrderExecutedWithPrice => 38,
            Self::OrderCancel => 25,
            Self::OrderDelete => 21,
            Self::OrderReplace => 37,
            Self::Trade => 46,
        }
    }
}

#[inline]
pub fn read_u16(body: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&body[offset..offset + 2])
}

#[inline]
pub fn read_u32(body: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&body[offset..offset + 4])
}

#[inline]
pub fn read_u64(body: &[u8], offset: usize) -> u64 {
    BigEndian::read_u64(&body[offset..offset + 8])
}

/// Frame length declared at `offset` in a packet payload.
#[inline]
pub fn frame_length(payload: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&payload[offset..offset + 2])
}

/// Validates the frame starting at `offset` and returns its body.
///
/// The caller must have at least [`MIN_FRAME_LEN`] bytes left at
/// `offset`. A declared length below the minimum or past the end of the
/// payload means the frame boundary is lost.
#[inline]
pub fn next_frame(payload: &[u8], offset: usize) -> Result<&[u8], CodecError> {
    let remaining = payload.len() - offset;
    debug_assert!(remaining >= MIN_FRAME_LEN);

    let length = frame_length(payload, offset);
    let length_usize = length as usize;
    if length_usize < MIN_FRAME_LEN || length_usize > remaining {
        return Err(CodecError::BadFrameLength { length, remaining });
    }
    Ok(&payload[offset + FRAME_HEADER_LEN..offset + length_usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_sizes_match_itch50() {
        assert_eq!(MessageType::SystemEvent.body_len(), 14);
        assert_eq!(MessageType::StockDirectory.body_len(), 41);
        assert_eq!(MessageType::AddOrder.body_len(), 38);
        assert_eq!(MessageType::AddOrderMpid.body_len(), 42);
        assert_eq!(MessageType::OrderExecuted.body_len(), 33);
        assert_eq!(MessageType::OrderExecutedWithPrice.body_len(), 38);
        assert_eq!(MessageType::OrderCancel.body_len(), 25);
        assert_eq!(MessageType::OrderDelete.body_len(), 21);
        assert_eq!(MessageType::OrderReplace.body_len(), 37);
        assert_eq!(MessageType::Trade.body_len(), 46);
    }

    #[test]
    fn unmapped_codes_are_none() {
        assert_eq!(MessageType::from_u8(b'Q'), None); // cross trade, unmapped
        assert_eq!(MessageType::from_u8(b'I'), None); // NOII, unmapped
        assert_eq!(MessageType::from_u8(0), None);
        for code in [b'S', b'R', b'A', b'F', b'E', b'C', b'X', b'D', b'U', b'P'] {
            assert!(MessageType::from_u8(code).is_some());
        }
    }

    #[test]
    fn big_endian_extraction() {
        let body = [0x00, 0x01, 0x00, 0x64, 0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(read_u16(&body, 0), 1);
        assert_eq!(read_u16(&body, 2), 100);
        assert_eq!(read_u32(&body, 4), 0xDEAD_BEEF);
    }
}
