//! A session represents the relationship of the local peer with one remote peer on the group.
//!  Active sessions (on the sending side) initiate the handshake, passive sessions (on the
//!  listening side) track the remote peer's sequence numbers and request repairs.

use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use crate::control_messages::ControlMessage;
use crate::peer::MulticastPeer;
use crate::transport_header::TransportHeader;

pub mod best_effort;
pub mod reliable;
mod watchdog;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum HandshakeState {
    Unsynced,
    /// active sessions only
    SynSent,
    Acked,
    /// The handshake was given up on after `syn_timeout`. This is terminal.
    TimedOut,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MulticastSession: Send + Sync + 'static {
    fn remote_peer(&self) -> MulticastPeer;

    async fn acked(&self) -> bool;

    /// Starts the session's timers. Starting a session that was started before has no effect.
    async fn start(&self, active: bool) -> anyhow::Result<()>;

    /// Cancels all timers. This must be called before the session is discarded.
    async fn stop(&self);

    /// Checks the header of a datagram received on the link, returning `false` if the datagram
    ///  is a duplicate and must be dropped
    async fn check_header(&self, header: &TransportHeader) -> bool;

    async fn control_received(&self, header: &TransportHeader, message: &ControlMessage);
}
