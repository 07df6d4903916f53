use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use crate::peer::MulticastPeer;
use crate::sequence_number::SequenceNumber;

/// Application callback for data datagrams. It is called once per datagram that passed duplicate
///  detection, in order of arrival (not necessarily in order of sequence numbers).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataDispatcher: Send + Sync + 'static {
    async fn on_data(&self, source: MulticastPeer, sequence: SequenceNumber, payload: &[u8]);
}

/// Notified by sessions when a handshake completes, so pending associations can be re-evaluated
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AssociationListener: Send + Sync + 'static {
    async fn check_fully_association(&self);
}
