//! Utilities for testing sessions and data links without real sockets. [wire::TestWire] stands in
//!  for the multicast group, delivering every datagram to all attached links.

pub mod wire;
pub mod dispatcher;
