use crate::peer::MulticastPeer;
use crate::transport_header::TransportHeader;

pub struct ReceivedDatagram<'a> {
    pub header: TransportHeader,
    pub payload: &'a [u8],
}

/// Parses datagrams received from the multicast group. Datagrams sent by the local peer come
///  back through multicast loopback and are filtered out here.
pub struct ReceiveStrategy {
    local_peer: MulticastPeer,
}

impl ReceiveStrategy {
    pub fn new(local_peer: MulticastPeer) -> ReceiveStrategy {
        ReceiveStrategy { local_peer }
    }

    /// Returns `None` for the local peer's own datagrams, and an error for datagrams that can
    ///  not be parsed
    pub fn receive_bytes<'a>(&self, datagram: &'a [u8]) -> anyhow::Result<Option<ReceivedDatagram<'a>>> {
        let mut payload = datagram;
        let header = TransportHeader::deser(&mut payload)?;

        if header.source == self.local_peer {
            return Ok(None);
        }
        Ok(Some(ReceivedDatagram { header, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use crate::transport_header::MessageKind;

    #[rstest]
    #[case::data_from_peer(vec![1,0,0,0, 0,0,0,0,0,0,0,2, 0,0,0,0,0,0,0,5, 7,8,9], Some((2, 5, vec![7,8,9])))]
    #[case::empty_payload(vec![1,0,0,0, 0,0,0,0,0,0,0,2, 0,0,0,0,0,0,0,5], Some((2, 5, vec![])))]
    #[case::own_datagram(vec![1,0,0,0, 0,0,0,0,0,0,0,1, 0,0,0,0,0,0,0,5, 7,8,9], None)]
    fn test_receive_bytes(#[case] datagram: Vec<u8>, #[case] expected: Option<(u64, u64, Vec<u8>)>) {
        let receive_strategy = ReceiveStrategy::new(MulticastPeer::from_raw(1));

        let actual = receive_strategy.receive_bytes(&datagram).unwrap()
            .map(|received| {
                assert_eq!(received.header.message_kind, MessageKind::Data);
                (received.header.source.to_raw(), received.header.sequence.to_raw(), received.payload.to_vec())
            });
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_receive_bytes_malformed() {
        let receive_strategy = ReceiveStrategy::new(MulticastPeer::from_raw(1));
        assert!(receive_strategy.receive_bytes(&[1, 0, 0]).is_err());
    }
}
