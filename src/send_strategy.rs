use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::bail;
use bytes::{BufMut, BytesMut};
use tokio::sync::Mutex;
use tracing::trace;
use crate::config::MulticastConfig;
use crate::control_messages::ControlMessage;
use crate::peer::MulticastPeer;
use crate::send_buffer::TransportSendBuffer;
use crate::send_socket::SendSocket;
use crate::sequence_number::{SequenceNumber, SequenceRange};
use crate::transport_header::{MessageKind, TransportHeader};
use crate::util::buf_ext::ByteOrder;

struct SendStrategyInner {
    /// the sequence number of the next datagram to be sent
    next_sequence: SequenceNumber,
    /// present iff sessions are reliable
    send_buffer: Option<TransportSendBuffer>,
}

/// Sends datagrams to the multicast group on behalf of a data link. Every datagram, data and
///  control alike, gets the next sequence number of the local peer, and reliable links retain
///  the serialized datagram in the send buffer for repairs.
///
/// Sending is serialized by a lock so datagrams go on the wire in sequence order.
pub struct SendStrategy {
    socket: Arc<dyn SendSocket>,
    group_address: SocketAddr,
    local_peer: MulticastPeer,
    byte_order: ByteOrder,
    max_datagram_size: usize,
    inner: Mutex<SendStrategyInner>,
}

impl SendStrategy {
    pub fn new(config: &MulticastConfig, local_peer: MulticastPeer, socket: Arc<dyn SendSocket>) -> SendStrategy {
        let send_buffer = if config.reliable {
            Some(TransportSendBuffer::new(config.nak_depth))
        }
        else {
            None
        };

        SendStrategy {
            socket,
            group_address: config.group_address,
            local_peer,
            byte_order: config.byte_order,
            max_datagram_size: config.max_datagram_size,
            inner: Mutex::new(SendStrategyInner {
                next_sequence: SequenceNumber::FIRST,
                send_buffer,
            }),
        }
    }

    pub fn local_peer(&self) -> MulticastPeer {
        self.local_peer
    }

    pub fn max_payload_len(&self) -> usize {
        self.max_datagram_size - TransportHeader::SERIALIZED_LEN
    }

    pub async fn send_data(&self, payload: &[u8]) -> anyhow::Result<SequenceNumber> {
        if payload.len() > self.max_payload_len() {
            bail!("payload has a maximum length of {} to fit a single datagram, was {}", self.max_payload_len(), payload.len());
        }
        Ok(self.send_bytes(MessageKind::Data, 0, payload).await)
    }

    pub async fn send_control(&self, message: &ControlMessage) -> SequenceNumber {
        let mut payload = BytesMut::new();
        message.ser(&mut payload, self.byte_order);

        trace!("sending control message {:?}", message);
        self.send_bytes(MessageKind::TransportControl, message.submessage_id().into(), &payload).await
    }

    async fn send_bytes(&self, message_kind: MessageKind, submessage_id: u8, payload: &[u8]) -> SequenceNumber {
        let mut inner = self.inner.lock().await;

        let header = self.prepare_header(&mut inner, message_kind, submessage_id);
        let mut buf = BytesMut::with_capacity(TransportHeader::SERIALIZED_LEN + payload.len());
        header.ser(&mut buf);
        buf.put_slice(payload);
        let datagram = buf.freeze();

        trace!("sending datagram #{} ({:?}) with {} bytes of payload", header.sequence, message_kind, payload.len());
        self.socket.do_send_packet(self.group_address, &datagram).await;
        //NB: we don't handle a send error but keep the (potentially) unsent datagram in the send buffer

        if let Some(send_buffer) = &mut inner.send_buffer {
            send_buffer.insert(header.sequence, datagram);
        }
        header.sequence
    }

    fn prepare_header(&self, inner: &mut SendStrategyInner, message_kind: MessageKind, submessage_id: u8) -> TransportHeader {
        let sequence = inner.next_sequence;
        inner.next_sequence = sequence.next();
        TransportHeader::new(self.byte_order, message_kind, submessage_id, self.local_peer, sequence)
    }

    /// Re-sends the buffered datagrams in the range, returning `false` if some of them are no
    ///  longer available (or if the link is not reliable)
    pub async fn resend(&self, range: SequenceRange) -> bool {
        let inner = self.inner.lock().await;
        match &inner.send_buffer {
            Some(send_buffer) => send_buffer.resend(range, self.socket.as_ref(), self.group_address).await,
            None => false,
        }
    }

    /// The lowest sequence number that can still be repaired if some part of the range can not
    pub async fn evicted_below(&self, range: SequenceRange) -> Option<SequenceNumber> {
        let inner = self.inner.lock().await;
        let send_buffer = inner.send_buffer.as_ref()?;
        if send_buffer.has_evicted(range) {
            send_buffer.low()
        }
        else {
            None
        }
    }

    /// The lowest sequence number that can still be repaired, if the first datagram ever sent
    ///  was evicted already
    pub async fn low_if_evicted_initial(&self) -> Option<SequenceNumber> {
        self.evicted_below(SequenceRange::single(SequenceNumber::FIRST)).await
    }

    pub async fn release_send_buffer(&self) {
        if let Some(send_buffer) = &mut self.inner.lock().await.send_buffer {
            send_buffer.release_all();
        }
    }
}
