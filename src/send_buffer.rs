use std::collections::BTreeMap;
use std::net::SocketAddr;
use bytes::Bytes;
use tracing::trace;
use crate::send_socket::SendSocket;
use crate::sequence_number::{SequenceNumber, SequenceRange};

/// Retains the most recently sent datagrams (fully serialized, including their transport
///  header) so that repair requests can be serviced by re-sending them byte-for-byte.
///
/// The buffer holds at most `capacity` datagrams. When it is full, the datagram with the lowest
///  sequence number is evicted, and repair requests for it can only be answered with a NAKACK.
pub struct TransportSendBuffer {
    capacity: usize,
    buffer: BTreeMap<SequenceNumber, Bytes>,
}

impl TransportSendBuffer {
    pub fn new(capacity: usize) -> TransportSendBuffer {
        TransportSendBuffer {
            capacity,
            buffer: BTreeMap::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn low(&self) -> Option<SequenceNumber> {
        self.buffer.keys().next().cloned()
    }

    pub fn high(&self) -> Option<SequenceNumber> {
        self.buffer.keys().next_back().cloned()
    }

    pub fn insert(&mut self, sequence: SequenceNumber, datagram: Bytes) {
        self.buffer.insert(sequence, datagram);

        while self.buffer.len() > self.capacity {
            if let Some((evicted, _)) = self.buffer.pop_first() {
                trace!("evicting datagram #{} from the send buffer", evicted);
            }
        }
    }

    /// true iff some part of the range is below the lowest retained datagram
    pub fn has_evicted(&self, range: SequenceRange) -> bool {
        self.low()
            .map_or(false, |low| range.low < low)
    }

    /// Re-sends all retained datagrams in the range. Returns `false` if some part of the range
    ///  was evicted already and can not be repaired.
    pub async fn resend(&self, range: SequenceRange, socket: &dyn SendSocket, to: SocketAddr) -> bool {
        for (sequence, datagram) in self.buffer.range(range.low..=range.high) {
            trace!("resending datagram #{}", sequence);
            socket.do_send_packet(to, datagram).await;
        }
        !self.has_evicted(range)
    }

    pub fn release_all(&mut self) {
        trace!("releasing {} datagrams from the send buffer", self.buffer.len());
        self.buffer.clear();
    }
}
