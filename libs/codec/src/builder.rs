//! ITCH 5.0 frame builder.
//!
//! Appends complete length-prefixed frames to a packet buffer. The
//! round-trip tests and the pipeline's scenario tests are built on this;
//! it is also what a replay tool would use to synthesize traffic.

use crate::wire::{MessageType, FRAME_HEADER_LEN, SIDE_BUY, SIDE_SELL};
use byteorder::{BigEndian, ByteOrder};
use tickwire_types::Side;

/// Accumulates ITCH frames into one UDP payload.
#[derive(Debug, Default)]
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_packet(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Appends a frame with an arbitrary body. Used by tests to shape
    /// malformed or unmapped messages.
    pub fn raw_frame(&mut self, body: &[u8]) -> &mut Self {
        let mut prefix = [0u8; FRAME_HEADER_LEN];
        BigEndian::write_u16(&mut prefix, (body.len() + FRAME_HEADER_LEN) as u16);
        self.buf.extend_from_slice(&prefix);
        self.buf.extend_from_slice(body);
        self
    }

    pub fn system_event(&mut self, locate: u16, tracking: u16, ts: u64, event_code: u8) -> &mut Self {
        let base = self.begin(MessageType::SystemEvent, locate, tracking, ts);
        self.buf[base + 13] = event_code;
        self
    }

    pub fn stock_directory(
        &mut self,
        locate: u16,
        tracking: u16,
        ts: u64,
        symbol: &[u8; 8],
    ) -> &mut Self {
        let base = self.begin(MessageType::StockDirectory, locate, tracking, ts);
        self.buf[base + 13..base + 21].copy_from_slice(symbol);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_order(
        &mut self,
        locate: u16,
        tracking: u16,
        ts: u64,
        order_ref: u64,
        side: Side,
        shares: u32,
        symbol: &[u8; 8],
        price: u32,
    ) -> &mut Self {
        let base = self.begin(MessageType::AddOrder, locate, tracking, ts);
        self.put_u64(base + 13, order_ref);
        self.buf[base + 21] = side_to_wire(side);
        self.put_u32(base + 22, shares);
        self.buf[base + 26..base + 34].copy_from_slice(symbol);
        self.put_u32(base + 34, price);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_order_mpid(
        &mut self,
        locate: u16,
        tracking: u16,
        ts: u64,
        order_ref: u64,
        side: Side,
        shares: u32,
        symbol: &[u8; 8],
        price: u32,
        mpid: &[u8; 4],
    ) -> &mut Self {
        let base = self.begin(MessageType::AddOrderMpid, locate, tracking, ts);
        self.put_u64(base + 13, order_ref);
        self.buf[base + 21] = side_to_wire(side);
        self.put_u32(base + 22, shares);
        self.buf[base + 26..base + 34].copy_from_slice(symbol);
        self.put_u32(base + 34, price);
        self.buf[base + 38..base + 42].copy_from_slice(mpid);
        self
    }

    pub fn order_executed(
        &mut self,
        locate: u16,
        tracking: u16,
        ts: u64,
        order_ref: u64,
        shares: u32,
        match_number: u64,
    ) -> &mut Self {
        let base = self.begin(MessageType::OrderExecuted, locate, tracking, ts);
        self.put_u64(base + 13, order_ref);
        self.put_u32(base + 21, shares);
        self.put_u64(base + 25, match_number);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn order_executed_with_price(
        &mut self,
        locate: u16,
        tracking: u16,
        ts: u64,
        order_ref: u64,
        shares: u32,
        match_number: u64,
        price: u32,
    ) -> &mut Self {
        let base = self.begin(MessageType::OrderExecutedWithPrice, locate, tracking, ts);
        self.put_u64(base + 13, order_ref);
        self.put_u32(base + 21, shares);
        self.put_u64(base + 25, match_number);
        self.buf[base + 33] = b'Y'; // printable
        self.put_u32(base + 34, price);
        self
    }

    pub fn order_cancel(
        &mut self,
        locate: u16,
        tracking: u16,
        ts: u64,
        order_ref: u64,
        cancelled: u32,
    ) -> &mut Self {
        let base = self.begin(MessageType::OrderCancel, locate, tracking, ts);
        self.put_u64(base + 13, order_ref);
        self.put_u32(base + 21, cancelled);
        self
    }

    pub fn order_delete(&mut self, locate: u16, tracking: u16, ts: u64, order_ref: u64) -> &mut Self {
        let base = self.begin(MessageType::OrderDelete, locate, tracking, ts);
        self.put_u64(base + 13, order_ref);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn order_replace(
        &mut self,
        locate: u16,
        tracking: u16,
        ts: u64,
        original_ref: u64,
        new_ref: u64,
        shares: u32,
        price: u32,
    ) -> &mut Self {
        let base = self.begin(MessageType::OrderReplace, locate, tracking, ts);
        self.put_u64(base + 13, original_ref);
        self.put_u64(base + 21, new_ref);
        self.put_u32(base + 29, shares);
        self.put_u32(base + 33, price);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn trade(
        &mut self,
        locate: u16,
        tracking: u16,
        ts: u64,
        order_ref: u64,
        side: Side,
        shares: u32,
        symbol: &[u8; 8],
        price: u32,
        match_number: u64,
    ) -> &mut Self {
        let base = self.begin(MessageType::Trade, locate, tracking, ts);
        self.put_u64(base + 13, order_ref);
        self.buf[base + 21] = side_to_wire(side);
        self.put_u32(base + 22, shares);
        self.buf[base + 26..base + 34].copy_from_slice(symbol);
        self.put_u32(base + 34, price);
        self.put_u64(base + 38, match_number);
        self
    }

    /// Appends the length prefix and zeroed body for `msg_type`, fills in
    /// the common header and returns the body's start offset.
    fn begin(&mut self, msg_type: MessageType, locate: u16, tracking: u16, ts: u64) -> usize {
        let body_len = msg_type.body_len();
        let mut prefix = [0u8; FRAME_HEADER_LEN];
        BigEndian::write_u16(&mut prefix, (body_len + FRAME_HEADER_LEN) as u16);
        self.buf.extend_from_slice(&prefix);

        let base = self.buf.len();
        self.buf.resize(base + body_len, 0);
        self.put_u16(base, locate);
        self.put_u16(base + 2, tracking);
        self.put_u64(base + 4, ts);
        self.buf[base + 12] = msg_type as u8;
        base
    }

    fn put_u16(&mut self, at: usize, value: u16) {
        BigEndian::write_u16(&mut self.buf[at..at + 2], value);
    }

    fn put_u32(&mut self, at: usize, value: u32) {
        BigEndian::write_u32(&mut self.buf[at..at + 4], value);
    }

    fn put_u64(&mut self, at: usize, value: u64) {
        BigEndian::write_u64(&mut self.buf[at..at + 8], value);
    }
}

fn side_to_wire(side: Side) -> u8 {
    match side {
        Side::Buy => SIDE_BUY,
        _ => SIDE_SELL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire;

    #[test]
    fn add_order_matches_reference_bytes() {
        // The worked example from the protocol notes: locate 1, tracking
        // 100, ts 200ms, ref 940, buy 100 AAPL @ 150.0000.
        let mut w = FrameWriter::new();
        w.add_order(
            0x0001,
            0x0064,
            0x0000_0000_0BEB_C200,
            0x0000_0000_0000_03AC,
            Side::Buy,
            0x0000_0064,
            b"AAPL    ",
            0x0016_E360,
        );

        let bytes = w.as_bytes();
        assert_eq!(bytes.len(), 40);
        assert_eq!(wire::frame_length(bytes, 0), 0x0028);

        let body = &bytes[2..];
        assert_eq!(wire::read_u16(body, 0), 1);
        assert_eq!(wire::read_u16(body, 2), 100);
        assert_eq!(wire::read_u64(body, 4), 200_000_000);
        assert_eq!(body[12], b'A');
        assert_eq!(wire::read_u64(body, 13), 940);
        assert_eq!(body[21], b'B');
        assert_eq!(wire::read_u32(body, 22), 100);
        assert_eq!(&body[26..34], b"AAPL    ");
        assert_eq!(wire::read_u32(body, 34), 1_500_000);
    }

    #[test]
    fn frames_concatenate() {
        let mut w = FrameWriter::new();
        w.order_delete(1, 1, 10, 5).order_delete(1, 2, 20, 6);
        // Two 21-byte bodies, each with a 2-byte prefix.
        assert_eq!(w.len(), 2 * (2 + 21));
    }

    #[test]
    fn builder_reuse_after_clear() {
        let mut w = FrameWriter::new();
        w.system_event(0, 0, 0, b'O');
        assert!(!w.is_empty());
        w.clear();
        assert!(w.is_empty());
    }
}
