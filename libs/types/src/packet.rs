//! Zero-copy view of a received datagram.

/// Largest datagram the pipeline accepts (jumbo frame).
pub const MAX_PACKET_SIZE: usize = 9000;

/// Read-only reference to one raw packet, handed from the ingress ring to
/// the decoder. Valid only for the decoder's current iteration; the
/// decoder must not retain it past producing its records.
#[derive(Debug, Clone, Copy)]
pub struct PacketView<'a> {
    /// Raw UDP payload.
    pub payload: &'a [u8],
    /// Nanoseconds on the local monotonic clock at receipt.
    pub local_timestamp: u64,
    /// Packet sequence assigned on dequeue, monotone per ingress.
    pub sequence: u32,
}

impl<'a> PacketView<'a> {
    pub fn new(payload: &'a [u8], local_timestamp: u64, sequence: u32) -> Self {
        Self {
            payload,
            local_timestamp,
            sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
