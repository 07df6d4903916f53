//! A reliable multicast transport over UDP: peers join a multicast group, and every datagram sent
//!  to the group reaches all of them. On top of that, sessions between a sending (*active*) peer and
//!  each listening (*passive*) peer add a handshake, duplicate suppression and NAK based repair of
//!  lost datagrams.
//!
//! ## Design goals
//!
//! * One-to-many data distribution on a LAN, with UDP multicast doing the fan-out
//! * Reliability is receiver driven: listeners detect gaps and request repairs (NAK), senders keep
//!    a bounded buffer of recently sent datagrams for servicing them
//! * Delivery is *not* in order: data is handed to the application as it arrives, and repaired
//!    data arrives later. Ordering is left to the application.
//! * Repair is best effort: a sender tells listeners when requested data is no longer buffered
//!    (NAKACK), and listeners give up on repairs after a timeout
//! * Repair requests are randomized and suppressed: a listener that sees another listener
//!    request the same data from the same sender holds back its own request
//! * Sessions can be configured as *best-effort*, without handshake and repair
//!
//! ## Header
//!
//! Every datagram starts with a fixed-size transport header. Multi-byte numbers are in the byte
//!  order that the flags specify:
//! ```ascii
//!  0: protocol version (u8), currently 1
//!  1: flags (u8):
//!     * bit 0: byte order - 0 for big endian, 1 for little endian
//!     * bits 1-7: unused, should be 0
//!  2: message kind (u8): 0 for DATA, 1 for TRANSPORT_CONTROL
//!  3: submessage id (u8): 0 for DATA, see below for TRANSPORT_CONTROL
//!  4: source peer id (u64)
//! 12: sequence number (u64): per source peer, starting at 1 and incremented for every datagram
//!      the peer sends, data and control alike
//! 20: payload
//! ```
//!
//! ## Control messages
//!
//! Control payloads that carry a peer id carry the id of the addressed peer. Since every peer on
//!  the group receives every control message, this is how peers tell their own messages apart.
//!
//! *SYN* (0): `addressed peer (u64)`
//!
//! Sent by an active session to start the handshake, and repeated with exponential backoff until
//!  a SYNACK arrives or the handshake times out. The passive side starts tracking the sender's
//!  sequence numbers at the SYN's sequence number: nothing that was sent before can be repaired.
//!
//! *SYNACK* (1): `addressed peer (u64)`
//!
//! Sent by a passive session in reply to every SYN it receives from its remote peer.
//!
//! *NAK* (2): `addressed peer (u64), low (u64), high (u64)`
//!
//! Sent by a passive session to request repair of the inclusive range of sequence numbers from
//!  the addressed peer. The addressed peer re-sends the buffered datagrams byte-for-byte.
//!
//! *NAKACK* (3): `low (u64)`
//!
//! Broadcast by an active session when it received a NAK for data that is no longer buffered:
//!  everything below `low` is lost for good, and receivers stop requesting it.

pub mod config;
pub mod control_messages;
pub mod data_link;
pub mod disjoint_sequence;
pub mod listeners;
pub mod peer;
pub mod receive_strategy;
pub mod send_buffer;
pub mod send_socket;
pub mod send_strategy;
pub mod sequence_number;
pub mod session;
pub mod transport;
pub mod transport_header;
pub mod util;

#[cfg(test)] mod test_util;


#[cfg(test)]
mod test {
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(Level::TRACE)
            .try_init()
            .ok();
    }
}
