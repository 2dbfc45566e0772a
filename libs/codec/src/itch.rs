//! ITCH 5.0 parser: frames a packet, demultiplexes on the type code and
//! emits normalized records.

use crate::error::CodecError;
use crate::parser::{Parser, ParserStats};
use crate::wire::{
    self, MessageType, BODY_HEADER_LEN, FRAME_HEADER_LEN, MIN_FRAME_LEN, OFF_STOCK_LOCATE,
    OFF_TIMESTAMP, OFF_TRACKING, OFF_TYPE, SIDE_BUY,
};
use std::collections::HashMap;
use tickwire_types::{EventKind, PacketView, Record, Side};
use tracing::trace;

/// Stateful ITCH 5.0 decoder.
///
/// Frame errors (a declared length that runs past the packet, or a body
/// shorter than its type requires) bump `parse_errors`; type codes
/// outside the mapped catalog are skipped silently, which is normal for
/// a full ITCH feed. The stock directory is folded into a locate→symbol
/// table as a side effect of parsing `R` messages.
#[derive(Debug, Default)]
pub struct ItchParser {
    messages_parsed: u64,
    parse_errors: u64,
    symbols: HashMap<u16, [u8; 8]>,
}

impl ItchParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Space-padded symbol last announced for `locate`, if any `R`
    /// message has been seen for it.
    pub fn symbol(&self, locate: u16) -> Option<&[u8; 8]> {
        self.symbols.get(&locate)
    }

    fn decode_body(&mut self, body: &[u8], view: &PacketView<'_>) -> Result<Record, CodecError> {
        if body.len() < BODY_HEADER_LEN {
            return Err(CodecError::Truncated {
                need: BODY_HEADER_LEN,
                have: body.len(),
            });
        }

        let msg_type = MessageType::from_u8(body[OFF_TYPE])
            .ok_or(CodecError::UnknownType(body[OFF_TYPE]))?;

        if body.len() < msg_type.body_len() {
            trace!(?msg_type, have = body.len(), "short message body");
            return Err(CodecError::Truncated {
                need: msg_type.body_len(),
                have: body.len(),
            });
        }

        let mut record = Record {
            instrument_id: wire::read_u16(body, OFF_STOCK_LOCATE) as u64,
            sequence: wire::read_u16(body, OFF_TRACKING) as u32,
            exchange_timestamp: wire::read_u64(body, OFF_TIMESTAMP),
            local_timestamp: view.local_timestamp,
            ..Record::default()
        };

        match msg_type {
            MessageType::SystemEvent => {
                record.kind = EventKind::SystemEvent;
                // System events are not instrument-specific.
                record.instrument_id = 0;
            }
            MessageType::StockDirectory => {
                record.kind = EventKind::SystemEvent;
                let locate = wire::read_u16(body, OFF_STOCK_LOCATE);
                let mut symbol = [0u8; 8];
                symbol.copy_from_slice(&body[13..21]);
                self.symbols.insert(locate, symbol);
            }
            MessageType::AddOrder | MessageType::AddOrderMpid => {
                record.kind = EventKind::OrderAdd;
                record.order_id = wire::read_u64(body, 13);
                record.side = side_from_wire(body[21]);
                record.quantity = wire::read_u32(body, 22) as u64;
                record.price = wire::read_u32(body, 34) as i64;
            }
            MessageType::OrderExecuted => {
                record.kind = EventKind::OrderExecute;
                record.order_id = wire::read_u64(body, 13);
                record.quantity = wire::read_u32(body, 21) as u64;
            }
            MessageType::OrderExecutedWithPrice => {
                record.kind = EventKind::OrderExecute;
                record.order_id = wire::read_u64(body, 13);
                record.quantity = wire::read_u32(body, 21) as u64;
                record.price = wire::read_u32(body, 34) as i64;
            }
            MessageType::OrderCancel => {
                // Quantity is the number of shares removed, not a new total.
                record.kind = EventKind::OrderModify;
                record.order_id = wire::read_u64(body, 13);
                record.quantity = wire::read_u32(body, 21) as u64;
            }
            MessageType::OrderDelete => {
                record.kind = EventKind::OrderDelete;
                record.order_id = wire::read_u64(body, 13);
            }
            MessageType::OrderReplace => {
                // The record carries the replacement's new reference number.
                record.kind = EventKind::OrderModify;
                record.order_id = wire::read_u64(body, 21);
                record.quantity = wire::read_u32(body, 29) as u64;
                record.price = wire::read_u32(body, 33) as i64;
            }
            MessageType::Trade => {
                record.kind = EventKind::Trade;
                record.order_id = wire::read_u64(body, 13);
                record.side = side_from_wire(body[21]);
                record.quantity = wire::read_u32(body, 22) as u64;
                record.price = wire::read_u32(body, 34) as i64;
            }
        }

        Ok(record)
    }
}

#[inline]
fn side_from_wire(code: u8) -> Side {
    if code == SIDE_BUY {
        Side::Buy
    } else {
        Side::Sell
    }
}

impl Parser for ItchParser {
    fn parse(&mut self, view: &PacketView<'_>, out: &mut [Record]) -> usize {
        let payload = view.payload;
        let mut offset = 0usize;
        let mut produced = 0usize;

        while payload.len() - offset >= MIN_FRAME_LEN && produced < out.len() {
            let body = match wire::next_frame(payload, offset) {
                Ok(body) => body,
                // Frame boundary is lost; nothing after this is trustworthy.
                Err(_) => {
                    self.parse_errors += 1;
                    break;
                }
            };

            match self.decode_body(body, view) {
                Ok(record) => {
                    out[produced] = record;
                    produced += 1;
                }
                // Unmapped ITCH type: normal for a full feed, not an error.
                Err(CodecError::UnknownType(_)) => {}
                Err(_) => self.parse_errors += 1,
            }

            offset += FRAME_HEADER_LEN + body.len();
        }

        self.messages_parsed += produced as u64;
        produced
    }

    fn name(&self) -> &'static str {
        "itch-5.0"
    }

    fn reset(&mut self) {
        self.messages_parsed = 0;
        self.parse_errors = 0;
        self.symbols.clear();
    }

    fn stats(&self) -> ParserStats {
        ParserStats {
            messages_parsed: self.messages_parsed,
            parse_errors: self.parse_errors,
        }
    }
}
