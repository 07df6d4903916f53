use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use anyhow::anyhow;
use async_trait::async_trait;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, error, info, span, trace, Instrument, Level};
use uuid::Uuid;
use crate::config::MulticastConfig;
use crate::data_link::MulticastDataLink;
use crate::listeners::{AssociationListener, DataDispatcher};
use crate::peer::MulticastPeer;
use crate::sequence_number::SequenceNumber;
use crate::util::random::{Random, RngRandom};

/// Maximum size of a UDP datagram: received datagrams are never truncated
const RECEIVE_BUFFER_SIZE: usize = 65536;

/// Wakes up tasks waiting for associations when a handshake completes
#[derive(Default)]
struct AssociationTracker {
    notify: Notify,
}

#[async_trait]
impl AssociationListener for AssociationTracker {
    async fn check_fully_association(&self) {
        self.notify.notify_waiters();
    }
}

/// The application's entry point: a transport joins the multicast group, and sends and receives
///  through a single data link.
///
/// An *active* transport is a sender: it associates with the listeners it is told about, and
///  services their repair requests. A *passive* transport is a listener: it accepts associations
///  from any sender that addresses it.
pub struct MulticastTransport {
    socket: Arc<UdpSocket>,
    link: Arc<MulticastDataLink>,
    associations: Arc<AssociationTracker>,
}

impl MulticastTransport {
    pub async fn new(config: Arc<MulticastConfig>, active: bool, data_dispatcher: Arc<dyn DataDispatcher>) -> anyhow::Result<MulticastTransport> {
        config.validate()?;

        let socket = Self::bind_multicast_socket(&config)?;
        info!("joined multicast group {:?}", config.group_address);

        Self::from_socket(config, active, socket, data_dispatcher)
    }

    pub(crate) fn from_socket(config: Arc<MulticastConfig>, active: bool, socket: UdpSocket, data_dispatcher: Arc<dyn DataDispatcher>) -> anyhow::Result<MulticastTransport> {
        let local_peer = config.local_peer
            .unwrap_or_else(|| MulticastPeer::from_raw(RngRandom::next_u64()));
        info!("local peer is {} ({})", local_peer, if active { "active" } else { "passive" });

        let socket = Arc::new(socket);
        let associations = Arc::new(AssociationTracker::default());
        let link = Arc::new(MulticastDataLink::new(
            config,
            local_peer,
            active,
            Arc::new(socket.clone()),
            data_dispatcher,
            associations.clone(),
        ));

        Ok(MulticastTransport {
            socket,
            link,
            associations,
        })
    }

    fn bind_multicast_socket(config: &MulticastConfig) -> anyhow::Result<UdpSocket> {
        let group = config.group_address;
        let domain = if group.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        // several peers on the same host share the group port
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        if let Some(size) = config.rcv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }

        match group.ip() {
            IpAddr::V4(group_ip) => {
                let interface = match config.local_address {
                    Some(IpAddr::V4(addr)) => addr,
                    _ => Ipv4Addr::UNSPECIFIED,
                };
                socket.bind(&SockAddr::from(SocketAddr::from((Ipv4Addr::UNSPECIFIED, group.port()))))?;
                socket.join_multicast_v4(&group_ip, &interface)?;
                socket.set_multicast_ttl_v4(config.ttl)?;
                socket.set_multicast_loop_v4(true)?;
                if !interface.is_unspecified() {
                    socket.set_multicast_if_v4(&interface)?;
                }
            }
            IpAddr::V6(group_ip) => {
                socket.set_only_v6(true)?;
                socket.bind(&SockAddr::from(SocketAddr::from((Ipv6Addr::UNSPECIFIED, group.port()))))?;
                socket.join_multicast_v6(&group_ip, 0)?;
                socket.set_multicast_hops_v6(config.ttl)?;
                socket.set_multicast_loop_v6(true)?;
            }
        }

        socket.set_nonblocking(true)?;
        Ok(UdpSocket::from_std(socket.into())?)
    }

    pub fn local_peer(&self) -> MulticastPeer {
        self.link.local_peer()
    }

    pub fn max_payload_len(&self) -> usize {
        self.link.max_payload_len()
    }

    /// Starts a session with a remote peer. For an active transport, this starts the handshake.
    pub async fn associate(&self, remote_peer: MulticastPeer) -> anyhow::Result<()> {
        self.link.find_or_create_session(remote_peer).await?;
        Ok(())
    }

    pub async fn release(&self, remote_peer: MulticastPeer) {
        self.link.release_session(remote_peer).await;
    }

    /// An active transport is fully associated with a remote peer once the handshake completed.
    ///  A passive transport is associated as soon as it has a session with the remote peer.
    pub async fn is_fully_associated(&self, remote_peer: MulticastPeer) -> bool {
        if self.link.is_active() {
            self.link.is_acked(remote_peer).await
        }
        else {
            self.link.find_session(remote_peer).await.is_some()
        }
    }

    pub async fn wait_for_association(&self, remote_peer: MulticastPeer, timeout: Duration) -> anyhow::Result<()> {
        let wait = async {
            loop {
                // registered before checking to avoid missing a notification in between
                let notified = self.associations.notify.notified();
                if self.is_fully_associated(remote_peer).await {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait).await
            .map_err(|_| anyhow!("no association with {} after {:?}", remote_peer, timeout))
    }

    pub async fn send(&self, payload: &[u8]) -> anyhow::Result<SequenceNumber> {
        self.link.send_data(payload).await
    }

    pub async fn recv_loop(&self) {
        info!("starting receive loop");

        let mut buf = vec![0u8; RECEIVE_BUFFER_SIZE];
        loop {
            let (num_read, from) = match self.socket.recv_from(&mut buf).await {
                Ok(x) => x,
                Err(e) => {
                    error!("socket error: {}", e);
                    continue;
                }
            };

            let correlation_id = Uuid::new_v4();
            let span = span!(Level::TRACE, "datagram_received", ?correlation_id);
            trace!(parent: &span, "received datagram with {} bytes from {:?}", num_read, from);

            self.link.receive_bytes(&buf[..num_read])
                .instrument(span)
                .await;
        }
    }

    /// Stops all sessions. The receive loop must be stopped separately, by aborting its task.
    pub async fn shutdown(&self) {
        debug!("shutting down transport for {}", self.local_peer());
        self.link.stop().await;
    }
}
