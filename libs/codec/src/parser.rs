//! The parser contract and its test collaborators.
//!
//! The pipeline is protocol-agnostic: any `Parser` implementation can sit
//! in the decoder stage. The ITCH implementation lives in [`crate::itch`];
//! `NullParser` and `EchoParser` exist for wiring tests and benchmarks.

use tickwire_types::{EventKind, PacketView, Record};

/// Counters a parser maintains internally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub messages_parsed: u64,
    pub parse_errors: u64,
}

/// Turns one raw packet into normalized records.
///
/// `parse` writes at most `out.len()` records and returns how many it
/// produced. A record is either fully populated or not emitted at all.
/// Implementations must not allocate or block: `parse` runs on the
/// decoder thread for every packet.
pub trait Parser: Send {
    fn parse(&mut self, view: &PacketView<'_>, out: &mut [Record]) -> usize;

    /// Diagnostic name.
    fn name(&self) -> &'static str;

    /// Called once before the pipeline starts.
    fn initialize(&mut self) {}

    /// Drop accumulated state and counters.
    fn reset(&mut self) {}

    fn stats(&self) -> ParserStats {
        ParserStats::default()
    }
}

/// Produces nothing. Useful to measure the pipeline skeleton alone.
#[derive(Debug, Default)]
pub struct NullParser;

impl Parser for NullParser {
    fn parse(&mut self, _view: &PacketView<'_>, _out: &mut [Record]) -> usize {
        0
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Emits one passthrough record per packet carrying the packet metadata:
/// `local_timestamp` and `sequence` from the view, payload length in
/// `quantity`.
#[derive(Debug, Default)]
pub struct EchoParser {
    packets_seen: u64,
}

impl Parser for EchoParser {
    fn parse(&mut self, view: &PacketView<'_>, out: &mut [Record]) -> usize {
        if out.is_empty() || view.is_empty() {
            return 0;
        }

        out[0] = Record {
            kind: EventKind::SystemEvent,
            quantity: view.len() as u64,
            local_timestamp: view.local_timestamp,
            sequence: view.sequence,
            ..Record::default()
        };
        self.packets_seen += 1;
        1
    }

    fn name(&self) -> &'static str {
        "echo"
    }

    fn reset(&mut self) {
        self.packets_seen = 0;
    }

    fn stats(&self) -> ParserStats {
        ParserStats {
            messages_parsed: self.packets_seen,
            parse_errors: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_parser_produces_nothing() {
        let mut parser = NullParser;
        let view = PacketView::new(&[1, 2, 3], 42, 7);
        let mut out = [Record::default(); 4];
        assert_eq!(parser.parse(&view, &mut out), 0);
    }

    #[test]
    fn echo_parser_carries_packet_metadata() {
        let mut parser = EchoParser::default();
        let payload = [0u8; 25];
        let view = PacketView::new(&payload, 1_000, 3);
        let mut out = [Record::default(); 4];

        assert_eq!(parser.parse(&view, &mut out), 1);
        assert_eq!(out[0].kind, EventKind::SystemEvent);
        assert_eq!(out[0].quantity, 25);
        assert_eq!(out[0].local_timestamp, 1_000);
        assert_eq!(out[0].sequence, 3);
        assert_eq!(parser.stats().messages_parsed, 1);
    }

    #[test]
    fn echo_parser_skips_empty_packets() {
        let mut parser = EchoParser::default();
        let view = PacketView::new(&[], 0, 0);
        let mut out = [Record::default(); 1];
        assert_eq!(parser.parse(&view, &mut out), 0);
    }
}
