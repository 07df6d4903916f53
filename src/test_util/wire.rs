use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;
use crate::control_messages::ControlMessage;
use crate::data_link::MulticastDataLink;
use crate::peer::MulticastPeer;
use crate::send_socket::SendSocket;
use crate::sequence_number::SequenceNumber;
use crate::transport_header::{MessageKind, TransportHeader};
use crate::util::buf_ext::ByteOrder;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum SentMessage {
    Data(Vec<u8>),
    Control(ControlMessage),
}

pub fn decode(datagram: &[u8]) -> (TransportHeader, SentMessage) {
    let mut buf = datagram;
    let header = TransportHeader::deser(&mut buf).unwrap();
    let message = match header.message_kind {
        MessageKind::Data => SentMessage::Data(buf.to_vec()),
        MessageKind::TransportControl => SentMessage::Control(ControlMessage::deser(header.submessage_id, &mut buf, header.byte_order).unwrap()),
    };
    (header, message)
}

pub fn control_header(message: &ControlMessage, source: u64, sequence: u64) -> TransportHeader {
    TransportHeader::new(ByteOrder::Big, MessageKind::TransportControl, message.submessage_id().into(), MulticastPeer::from_raw(source), SequenceNumber::from_raw(sequence))
}

pub fn data_header(source: u64, sequence: u64) -> TransportHeader {
    TransportHeader::new(ByteOrder::Big, MessageKind::Data, 0, MulticastPeer::from_raw(source), SequenceNumber::from_raw(sequence))
}

/// An in-memory multicast group. Every datagram sent through the wire is recorded, and queued
///  until [TestWire::pump] delivers it to the links under test.
#[derive(Default)]
pub struct TestWire {
    history: RwLock<Vec<Vec<u8>>>,
    in_flight: RwLock<VecDeque<Vec<u8>>>,
}

impl TestWire {
    pub fn new() -> Arc<TestWire> {
        Default::default()
    }

    pub async fn datagrams(&self) -> Vec<Vec<u8>> {
        self.history.read().await.clone()
    }

    pub async fn sent(&self) -> Vec<(TransportHeader, SentMessage)> {
        self.history.read().await
            .iter()
            .map(|d| decode(d))
            .collect()
    }

    pub async fn sent_from(&self, source: MulticastPeer) -> Vec<(u64, SentMessage)> {
        self.sent().await
            .into_iter()
            .filter(|(header, _)| header.source == source)
            .map(|(header, message)| (header.sequence.to_raw(), message))
            .collect()
    }

    pub async fn sent_control_messages(&self) -> Vec<ControlMessage> {
        self.sent().await
            .into_iter()
            .flat_map(|(_, message)| match message {
                SentMessage::Control(control) => Some(control),
                SentMessage::Data(_) => None,
            })
            .collect()
    }

    pub async fn clear(&self) {
        self.history.write().await.clear();
        self.in_flight.write().await.clear();
    }

    /// Delivers queued datagrams to all links until the wire is quiet, including datagrams that
    ///  are sent in reaction to delivered datagrams. Datagrams for which `lose` returns `true`
    ///  are dropped instead of being delivered.
    pub async fn pump(&self, links: &[&MulticastDataLink], mut lose: impl FnMut(&TransportHeader, &SentMessage) -> bool) {
        for _ in 0..10_000 {
            let next = self.in_flight.write().await.pop_front();
            let Some(datagram) = next else {
                return;
            };

            let (header, message) = decode(&datagram);
            if lose(&header, &message) {
                continue;
            }
            for link in links {
                link.receive_bytes(&datagram).await;
            }
        }
        panic!("wire did not become quiet");
    }
}

#[async_trait]
impl SendSocket for TestWire {
    async fn do_send_packet(&self, _to: SocketAddr, packet_buf: &[u8]) {
        self.history.write().await.push(packet_buf.to_vec());
        self.in_flight.write().await.push_back(packet_buf.to_vec());
    }
}
