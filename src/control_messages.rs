use anyhow::anyhow;
use bytes::{Buf, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::peer::MulticastPeer;
use crate::sequence_number::{SequenceNumber, SequenceRange};
use crate::util::buf_ext::{BufExt, BufMutExt, ByteOrder};

#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SubmessageId {
    Syn = 0,
    SynAck = 1,
    Nak = 2,
    NakAck = 3,
}

/// The payload of a `TRANSPORT_CONTROL` datagram. All peer ids in payloads refer to the peer
///  the sender is addressing, i.e. to the receiver's own id, so receivers can filter out
///  messages that were meant for someone else on the group.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ControlMessage {
    Syn { remote_peer: MulticastPeer },
    SynAck { remote_peer: MulticastPeer },
    Nak { remote_peer: MulticastPeer, range: SequenceRange },
    /// Broadcast by a sender whose send buffer no longer has data below `low`
    NakAck { low: SequenceNumber },
}

impl ControlMessage {
    pub fn submessage_id(&self) -> SubmessageId {
        match self {
            ControlMessage::Syn { .. } => SubmessageId::Syn,
            ControlMessage::SynAck { .. } => SubmessageId::SynAck,
            ControlMessage::Nak { .. } => SubmessageId::Nak,
            ControlMessage::NakAck { .. } => SubmessageId::NakAck,
        }
    }

    pub fn ser(&self, buf: &mut BytesMut, byte_order: ByteOrder) {
        match self {
            ControlMessage::Syn { remote_peer } |
            ControlMessage::SynAck { remote_peer } => {
                buf.put_u64_ordered(remote_peer.to_raw(), byte_order);
            }
            ControlMessage::Nak { remote_peer, range } => {
                buf.put_u64_ordered(remote_peer.to_raw(), byte_order);
                buf.put_u64_ordered(range.low.to_raw(), byte_order);
                buf.put_u64_ordered(range.high.to_raw(), byte_order);
            }
            ControlMessage::NakAck { low } => {
                buf.put_u64_ordered(low.to_raw(), byte_order);
            }
        }
    }

    pub fn deser(submessage_id: u8, buf: &mut impl Buf, byte_order: ByteOrder) -> anyhow::Result<ControlMessage> {
        let submessage_id = SubmessageId::try_from(submessage_id)
            .map_err(|_| anyhow!("unknown control submessage {:#x}", submessage_id))?;

        let result = match submessage_id {
            SubmessageId::Syn => ControlMessage::Syn {
                remote_peer: MulticastPeer::from_raw(buf.try_get_u64_ordered(byte_order)?),
            },
            SubmessageId::SynAck => ControlMessage::SynAck {
                remote_peer: MulticastPeer::from_raw(buf.try_get_u64_ordered(byte_order)?),
            },
            SubmessageId::Nak => {
                let remote_peer = MulticastPeer::from_raw(buf.try_get_u64_ordered(byte_order)?);
                let low = buf.try_get_u64_ordered(byte_order)?;
                let high = buf.try_get_u64_ordered(byte_order)?;
                ControlMessage::Nak {
                    remote_peer,
                    range: SequenceRange::from_raw(low, high)?,
                }
            }
            SubmessageId::NakAck => ControlMessage::NakAck {
                low: SequenceNumber::from_raw(buf.try_get_u64_ordered(byte_order)?),
            },
        };
        Ok(result)
    }
}
