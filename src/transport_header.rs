use anyhow::{anyhow, bail};
use bytes::{Buf, BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::peer::MulticastPeer;
use crate::sequence_number::SequenceNumber;
use crate::util::buf_ext::{BufExt, BufMutExt, ByteOrder};

#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MessageKind {
    Data = 0,
    TransportControl = 1,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct TransportHeader {
    pub byte_order: ByteOrder,
    pub message_kind: MessageKind,
    /// Discriminator of the control message, always 0 for data
    pub submessage_id: u8,
    pub source: MulticastPeer,
    pub sequence: SequenceNumber,
}

impl TransportHeader {
    pub const PROTOCOL_VERSION_1: u8 = 1;
    pub const SERIALIZED_LEN: usize = 20;

    const FLAG_LITTLE_ENDIAN: u8 = 0x01;

    pub fn new(byte_order: ByteOrder, message_kind: MessageKind, submessage_id: u8, source: MulticastPeer, sequence: SequenceNumber) -> TransportHeader {
        TransportHeader {
            byte_order,
            message_kind,
            submessage_id,
            source,
            sequence,
        }
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        let flags = match self.byte_order {
            ByteOrder::Big => 0,
            ByteOrder::Little => Self::FLAG_LITTLE_ENDIAN,
        };

        buf.put_u8(Self::PROTOCOL_VERSION_1);
        buf.put_u8(flags);
        buf.put_u8(self.message_kind.into());
        buf.put_u8(self.submessage_id);
        buf.put_u64_ordered(self.source.to_raw(), self.byte_order);
        buf.put_u64_ordered(self.sequence.to_raw(), self.byte_order);
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<TransportHeader> {
        let protocol_version = buf.try_get_u8_checked()?;
        if protocol_version != Self::PROTOCOL_VERSION_1 {
            bail!("unsupported protocol version {}", protocol_version);
        }

        let flags = buf.try_get_u8_checked()?;
        let byte_order = if flags & Self::FLAG_LITTLE_ENDIAN != 0 {
            ByteOrder::Little
        }
        else {
            ByteOrder::Big
        };

        let raw_kind = buf.try_get_u8_checked()?;
        let message_kind = MessageKind::try_from(raw_kind)
            .map_err(|_| anyhow!("unknown message kind {}", raw_kind))?;

        let submessage_id = buf.try_get_u8_checked()?;
        let source = MulticastPeer::from_raw(buf.try_get_u64_ordered(byte_order)?);
        let sequence = SequenceNumber::from_raw(buf.try_get_u64_ordered(byte_order)?);

        Ok(TransportHeader {
            byte_order,
            message_kind,
            submessage_id,
            source,
            sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::data_big_endian(
        TransportHeader::new(ByteOrder::Big, MessageKind::Data, 0, MulticastPeer::from_raw(0x0102), SequenceNumber::from_raw(7)),
        vec![1, 0, 0, 0, 0,0,0,0,0,0,1,2, 0,0,0,0,0,0,0,7],
    )]
    #[case::control_big_endian(
        TransportHeader::new(ByteOrder::Big, MessageKind::TransportControl, 2, MulticastPeer::from_raw(0x0102), SequenceNumber::from_raw(0x0304)),
        vec![1, 0, 1, 2, 0,0,0,0,0,0,1,2, 0,0,0,0,0,0,3,4],
    )]
    #[case::control_little_endian(
        TransportHeader::new(ByteOrder::Little, MessageKind::TransportControl, 3, MulticastPeer::from_raw(0x0102), SequenceNumber::from_raw(0x0304)),
        vec![1, 1, 1, 3, 2,1,0,0,0,0,0,0, 4,3,0,0,0,0,0,0],
    )]
    fn test_ser_deser(#[case] header: TransportHeader, #[case] expected: Vec<u8>) {
        let mut buf = BytesMut::new();
        header.ser(&mut buf);
        assert_eq!(buf.len(), TransportHeader::SERIALIZED_LEN);
        assert_eq!(buf.as_ref(), expected.as_slice());

        let mut b: &[u8] = &expected;
        assert_eq!(TransportHeader::deser(&mut b).unwrap(), header);
        assert!(b.is_empty());
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::wrong_version(vec![2, 0, 0, 0, 0,0,0,0,0,0,1,2, 0,0,0,0,0,0,0,7])]
    #[case::unknown_kind(vec![1, 0, 9, 0, 0,0,0,0,0,0,1,2, 0,0,0,0,0,0,0,7])]
    #[case::truncated(vec![1, 0, 0, 0, 0,0,0,0,0,0,1,2, 0,0,0,0,0,0,0])]
    fn test_deser_invalid(#[case] buf: Vec<u8>) {
        let mut b: &[u8] = &buf;
        assert!(TransportHeader::deser(&mut b).is_err());
    }
}
