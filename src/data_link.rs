use std::collections::hash_map::Entry;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;
use tracing::{debug, error, trace, warn};
use crate::config::MulticastConfig;
use crate::control_messages::ControlMessage;
use crate::listeners::{AssociationListener, DataDispatcher};
use crate::peer::MulticastPeer;
use crate::receive_strategy::ReceiveStrategy;
use crate::send_socket::SendSocket;
use crate::send_strategy::SendStrategy;
use crate::sequence_number::SequenceNumber;
use crate::session::best_effort::BestEffortSession;
use crate::session::reliable::ReliableSession;
use crate::session::MulticastSession;
use crate::transport_header::{MessageKind, TransportHeader};

/// A data link is the local peer's attachment to a multicast group. It owns the send and receive
///  strategies, and one session per remote peer.
///
/// Every datagram on the group reaches every peer, so received datagrams are first checked by the
///  session of the sending peer (for duplicates), and control messages are then offered to all
///  sessions: a session may need to see messages between other peers, e.g. NAKs from other
///  listeners for suppressing its own requests.
pub struct MulticastDataLink {
    config: Arc<MulticastConfig>,
    active: bool,
    send_strategy: Arc<SendStrategy>,
    receive_strategy: ReceiveStrategy,
    data_dispatcher: Arc<dyn DataDispatcher>,
    association_listener: Arc<dyn AssociationListener>,
    sessions: RwLock<FxHashMap<MulticastPeer, Arc<dyn MulticastSession>>>,
}

impl Debug for MulticastDataLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MulticastDataLink{{local_peer:{}, active:{}}}", self.local_peer(), self.active)
    }
}

impl MulticastDataLink {
    pub fn new(
        config: Arc<MulticastConfig>,
        local_peer: MulticastPeer,
        active: bool,
        socket: Arc<dyn SendSocket>,
        data_dispatcher: Arc<dyn DataDispatcher>,
        association_listener: Arc<dyn AssociationListener>,
    ) -> MulticastDataLink {
        MulticastDataLink {
            send_strategy: Arc::new(SendStrategy::new(&config, local_peer, socket)),
            receive_strategy: ReceiveStrategy::new(local_peer),
            config,
            active,
            data_dispatcher,
            association_listener,
            sessions: Default::default(),
        }
    }

    pub fn local_peer(&self) -> MulticastPeer {
        self.send_strategy.local_peer()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn max_payload_len(&self) -> usize {
        self.send_strategy.max_payload_len()
    }

    pub async fn find_session(&self, remote_peer: MulticastPeer) -> Option<Arc<dyn MulticastSession>> {
        self.sessions.read().await
            .get(&remote_peer)
            .cloned()
    }

    /// Returns the session for a remote peer, creating and starting it in the link's role if
    ///  there is none yet
    pub async fn find_or_create_session(&self, remote_peer: MulticastPeer) -> anyhow::Result<Arc<dyn MulticastSession>> {
        match self.sessions.write().await
            .entry(remote_peer)
        {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                let session = self.create_session(remote_peer);
                session.start(self.active).await?;
                debug!("{}: created {} session for {}", self.local_peer(), if self.config.reliable { "reliable" } else { "best-effort" }, remote_peer);
                Ok(e.insert(session).clone())
            }
        }
    }

    fn create_session(&self, remote_peer: MulticastPeer) -> Arc<dyn MulticastSession> {
        if self.config.reliable {
            Arc::new(ReliableSession::new(self.config.clone(), self.send_strategy.clone(), self.association_listener.clone(), remote_peer))
        }
        else {
            Arc::new(BestEffortSession::new(self.send_strategy.clone(), remote_peer))
        }
    }

    pub async fn release_session(&self, remote_peer: MulticastPeer) {
        let removed = self.sessions.write().await
            .remove(&remote_peer);
        match removed {
            Some(session) => {
                debug!("{}: releasing session for {}", self.local_peer(), remote_peer);
                session.stop().await;
            }
            None => debug!("{}: no session for {} to release", self.local_peer(), remote_peer),
        }
    }

    pub async fn is_acked(&self, remote_peer: MulticastPeer) -> bool {
        match self.find_session(remote_peer).await {
            Some(session) => session.acked().await,
            None => false,
        }
    }

    pub async fn send_data(&self, payload: &[u8]) -> anyhow::Result<SequenceNumber> {
        self.send_strategy.send_data(payload).await
    }

    /// Stops all sessions and releases buffered data. The link can not be used afterwards.
    pub async fn stop(&self) {
        let sessions = self.sessions.write().await
            .drain()
            .map(|(_, session)| session)
            .collect::<Vec<_>>();
        for session in sessions {
            session.stop().await;
        }
        self.send_strategy.release_send_buffer().await;
    }

    /// Handles a datagram received from the group
    pub async fn receive_bytes(&self, datagram: &[u8]) {
        let received = match self.receive_strategy.receive_bytes(datagram) {
            Ok(Some(received)) => received,
            Ok(None) => return,
            Err(e) => {
                warn!("received a malformed datagram - discarding: {}", e);
                return;
            }
        };

        if !self.check_header(&received.header).await {
            return;
        }

        match received.header.message_kind {
            MessageKind::Data => self.data_received(&received.header, received.payload).await,
            MessageKind::TransportControl => self.control_received(&received.header, received.payload).await,
        }
    }

    async fn check_header(&self, header: &TransportHeader) -> bool {
        match self.find_session(header.source).await {
            Some(session) => session.check_header(header).await,
            None => {
                // passive links must see traffic from peers they don't know (yet), e.g. SYNs
                //  that create sessions or NAKs from other listeners
                if self.active {
                    trace!("{}: dropping datagram from unknown peer {}", self.local_peer(), header.source);
                }
                !self.active
            }
        }
    }

    async fn data_received(&self, header: &TransportHeader, payload: &[u8]) {
        if self.find_session(header.source).await.is_none() {
            trace!("{}: dropping data from {} without a session", self.local_peer(), header.source);
            return;
        }
        self.data_dispatcher.on_data(header.source, header.sequence, payload).await;
    }

    async fn control_received(&self, header: &TransportHeader, mut payload: &[u8]) {
        let message = match ControlMessage::deser(header.submessage_id, &mut payload, header.byte_order) {
            Ok(message) => message,
            Err(e) => {
                warn!("received a malformed control message from {} - discarding: {}", header.source, e);
                return;
            }
        };
        trace!("{}: received {:?} from {}", self.local_peer(), message, header.source);

        if let ControlMessage::Syn { remote_peer } = &message {
            if !self.active && *remote_peer == self.local_peer() && self.find_session(header.source).await.is_none() {
                debug!("{}: SYN from new peer {}", self.local_peer(), header.source);
                if let Err(e) = self.find_or_create_session(header.source).await {
                    error!("{}: failed to create session for {}: {}", self.local_peer(), header.source, e);
                    return;
                }
                // a passive session is associated as soon as it exists
                self.association_listener.check_fully_association().await;
            }
        }

        let sessions = self.sessions.read().await
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for session in sessions {
            session.control_received(header, &message).await;
        }
    }
}
