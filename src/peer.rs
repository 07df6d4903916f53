use std::fmt::{Debug, Display, Formatter};

/// Opaque id of a participant on the multicast group. It is carried in every datagram header as
///  the sender's id, and in SYN / SYNACK / NAK payloads as the id of the addressed peer.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MulticastPeer(u64);

impl MulticastPeer {
    pub fn from_raw(value: u64) -> MulticastPeer {
        MulticastPeer(value)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }
}

impl Display for MulticastPeer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Debug for MulticastPeer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MulticastPeer({:016x})", self.0)
    }
}
