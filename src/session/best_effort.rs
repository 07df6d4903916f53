use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use tracing::trace;
use crate::control_messages::ControlMessage;
use crate::peer::MulticastPeer;
use crate::send_strategy::SendStrategy;
use crate::session::MulticastSession;
use crate::transport_header::TransportHeader;

/// Session without handshake, sequence tracking or repair: it is acked from the start, and every
///  datagram is delivered as it arrives.
///
/// Passive best-effort sessions still answer SYNs so that reliable senders can associate.
pub struct BestEffortSession {
    send_strategy: Arc<SendStrategy>,
    remote_peer: MulticastPeer,
    active: AtomicBool,
}

impl BestEffortSession {
    pub fn new(send_strategy: Arc<SendStrategy>, remote_peer: MulticastPeer) -> BestEffortSession {
        BestEffortSession {
            send_strategy,
            remote_peer,
            active: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl MulticastSession for BestEffortSession {
    fn remote_peer(&self) -> MulticastPeer {
        self.remote_peer
    }

    async fn acked(&self) -> bool {
        true
    }

    async fn start(&self, active: bool) -> anyhow::Result<()> {
        self.active.store(active, Ordering::Release);
        Ok(())
    }

    async fn stop(&self) {
    }

    async fn check_header(&self, _header: &TransportHeader) -> bool {
        true
    }

    async fn control_received(&self, header: &TransportHeader, message: &ControlMessage) {
        if self.active.load(Ordering::Acquire) || header.source != self.remote_peer {
            return;
        }

        if let ControlMessage::Syn { remote_peer } = message {
            if *remote_peer == self.send_strategy.local_peer() {
                trace!("best-effort session answering SYN from {}", self.remote_peer);
                self.send_strategy.send_control(&ControlMessage::SynAck { remote_peer: self.remote_peer }).await;
            }
        }
    }
}
