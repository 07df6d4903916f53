use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use anyhow::bail;
use crate::peer::MulticastPeer;
use crate::transport_header::TransportHeader;
use crate::util::buf_ext::ByteOrder;

#[derive(Clone, Debug)]
pub struct MulticastConfig {
    /// The multicast group (and port) that all peers of a domain send to and listen on
    pub group_address: SocketAddr,
    /// The local interface to join the group on. `None` lets the OS pick the default interface.
    pub local_address: Option<IpAddr>,

    /// Sessions are reliable (handshake, sequence tracking and NAK-based repair) if this is
    ///  `true`, and best-effort otherwise
    pub reliable: bool,

    /// Multicast TTL of outgoing datagrams. The default of 1 keeps traffic inside the local
    ///  subnet.
    pub ttl: u32,
    /// Size of the socket receive buffer, or `None` to keep the OS default. Bursts of multicast
    ///  traffic are dropped silently by the kernel if this is too small, so it is a good idea to
    ///  increase it for high-volume links.
    pub rcv_buffer_size: Option<usize>,
    /// Maximum size of a datagram including the transport header. Data that does not fit is
    ///  rejected rather than fragmented.
    pub max_datagram_size: usize,
    /// Byte order used for sending. Receivers handle either order.
    pub byte_order: ByteOrder,
    /// The local peer id, or `None` for a randomly generated id
    pub local_peer: Option<MulticastPeer>,

    /// Initial interval between SYN retries of an active session
    pub syn_interval: Duration,
    /// Factor by which the SYN retry interval grows with each retry
    pub syn_backoff: f64,
    /// Time after which an active session stops sending SYNs and gives up on the handshake
    pub syn_timeout: Duration,

    /// Base interval for NAK scheduling. The actual interval is randomized to lie between this
    ///  value and twice this value, to avoid many passive peers sending NAKs for the same gap
    ///  at the same time.
    pub nak_interval: Duration,
    /// Number of sent datagrams that are retained for servicing repair requests
    pub nak_depth: usize,
    /// Number of NAK intervals to wait before requesting a gap again
    pub nak_delay_intervals: u32,
    /// Maximum number of times a gap is requested again after the initial request
    pub nak_max: u32,
    /// Time after which an unanswered repair request is given up on, and the gap is skipped
    pub nak_timeout: Duration,
}

impl MulticastConfig {
    pub fn default_ipv4() -> MulticastConfig {
        Self::new(SocketAddr::from((Ipv4Addr::new(224, 0, 0, 128), 49152)))
    }

    pub fn default_ipv6() -> MulticastConfig {
        Self::new(SocketAddr::from((Ipv6Addr::new(0xff03, 0, 0, 0, 0, 0, 0, 1), 49152)))
    }

    pub fn new(group_address: SocketAddr) -> MulticastConfig {
        MulticastConfig {
            group_address,
            local_address: None,
            reliable: true,
            ttl: 1,
            rcv_buffer_size: None,
            max_datagram_size: 1472,
            byte_order: ByteOrder::Big,
            local_peer: None,
            syn_interval: Duration::from_millis(250),
            syn_backoff: 2.0,
            syn_timeout: Duration::from_secs(30),
            nak_interval: Duration::from_millis(500),
            nak_depth: 32,
            nak_delay_intervals: 4,
            nak_max: 3,
            nak_timeout: Duration::from_secs(30),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.group_address.ip().is_multicast() {
            bail!("group address {} is not a multicast address", self.group_address);
        }
        if let Some(local_address) = self.local_address {
            if local_address.is_ipv4() != self.group_address.is_ipv4() {
                bail!("local address {} and group address {} must use the same IP version", local_address, self.group_address);
            }
        }
        if self.max_datagram_size <= TransportHeader::SERIALIZED_LEN {
            bail!("max datagram size must leave room for the transport header");
        }
        if self.syn_interval.is_zero() {
            bail!("SYN interval must be positive");
        }
        if !(self.syn_backoff >= 1.0 && self.syn_backoff.is_finite()) {
            bail!("SYN backoff must be a finite factor of at least 1.0, was {}", self.syn_backoff);
        }
        if self.nak_interval.is_zero() {
            bail!("NAK interval must be positive");
        }
        if self.nak_depth == 0 {
            bail!("NAK depth must be positive");
        }

        Ok(())
    }
}
