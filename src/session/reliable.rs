use std::cmp::min;
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};
use crate::config::MulticastConfig;
use crate::control_messages::ControlMessage;
use crate::disjoint_sequence::DisjointSequence;
use crate::listeners::AssociationListener;
use crate::peer::MulticastPeer;
use crate::send_strategy::SendStrategy;
use crate::sequence_number::{SequenceNumber, SequenceRange};
use crate::session::watchdog::{NakWatchdog, SynWatchdog};
use crate::session::{HandshakeState, MulticastSession};
use crate::transport_header::TransportHeader;
use crate::util::random::RngRandom;

/// A repair request sent in one NAK interval, remembered for pacing re-requests and for giving
///  up on gaps after `nak_timeout`
#[derive(Clone, Debug)]
struct NakRequest {
    high_water_mark: SequenceNumber,
    requested_at: Instant,
}

pub(super) struct ReliableSessionInner {
    config: Arc<MulticastConfig>,
    send_strategy: Arc<SendStrategy>,
    local_peer: MulticastPeer,
    remote_peer: MulticastPeer,
    active: bool,
    started: bool,
    state: HandshakeState,
    syn_retries: u32,
    nak_sequence: DisjointSequence,
    nak_requests: VecDeque<NakRequest>,
    /// ranges other passive peers requested from our remote peer during the current NAK interval
    nak_peers: Vec<SequenceRange>,
}

impl ReliableSessionInner {
    pub(super) fn acked(&self) -> bool {
        self.state == HandshakeState::Acked
    }

    fn check_header(&mut self, header: &TransportHeader) -> bool {
        if self.active || header.source != self.remote_peer || !self.acked() {
            return true;
        }

        let is_new = self.nak_sequence.update(header.sequence);
        if !is_new {
            trace!("dropping duplicate #{} from {}", header.sequence, header.source);
        }
        is_new
    }

    pub(super) async fn send_syn(&mut self) {
        if self.state == HandshakeState::Unsynced {
            self.state = HandshakeState::SynSent;
        }
        self.syn_retries += 1;

        debug!("{} -> {}: sending SYN #{}", self.local_peer, self.remote_peer, self.syn_retries);
        self.send_strategy.send_control(&ControlMessage::Syn { remote_peer: self.remote_peer }).await;
    }

    pub(super) fn syn_timed_out(&mut self) {
        if self.acked() {
            return;
        }
        error!("{} -> {}: no SYNACK after {} SYNs - giving up on the handshake", self.local_peer, self.remote_peer, self.syn_retries);
        self.state = HandshakeState::TimedOut;
    }

    async fn syn_received(&mut self, header: &TransportHeader, addressed_peer: MulticastPeer) {
        if self.active || header.source != self.remote_peer || addressed_peer != self.local_peer {
            return;
        }

        if !self.acked() {
            debug!("{} <- {}: SYN, starting to track sequence numbers at #{}", self.local_peer, self.remote_peer, header.sequence);
            self.state = HandshakeState::Acked;
            self.nak_sequence.reset(header.sequence);
        }
        // SYNs are answered even after the handshake completed, the previous SYNACK may have been lost
        self.send_synack().await;
    }

    async fn send_synack(&self) {
        if let Some(low) = self.send_strategy.low_if_evicted_initial().await {
            self.send_nakack(low).await;
        }

        trace!("{} -> {}: sending SYNACK", self.local_peer, self.remote_peer);
        self.send_strategy.send_control(&ControlMessage::SynAck { remote_peer: self.remote_peer }).await;
    }

    /// returns `true` if this SYNACK completed the handshake
    fn synack_received(&mut self, header: &TransportHeader, addressed_peer: MulticastPeer) -> bool {
        if !self.active || header.source != self.remote_peer || addressed_peer != self.local_peer {
            return false;
        }

        match self.state {
            HandshakeState::Unsynced | HandshakeState::SynSent => {
                debug!("{} <- {}: SYNACK, handshake complete", self.local_peer, self.remote_peer);
                self.state = HandshakeState::Acked;
                true
            }
            HandshakeState::Acked | HandshakeState::TimedOut => false,
        }
    }

    async fn nak_received(&mut self, header: &TransportHeader, addressed_peer: MulticastPeer, range: SequenceRange) {
        if addressed_peer == self.remote_peer {
            // some other peer asks our remote peer for a repair: we get the repair as well, so we
            //  can hold back our own request for the same range
            if !self.active {
                trace!("{} requested {} from {} - suppressing our own request", header.source, range, self.remote_peer);
                self.nak_peers.push(range);
            }
            return;
        }

        if !self.active || addressed_peer != self.local_peer || header.source != self.remote_peer {
            return;
        }

        // the NAKACK is retained in the send buffer as well, so it must go out after the resend:
        //  inserting it may evict the datagram at `low`
        let evicted_below = self.send_strategy.evicted_below(range).await;
        let complete = self.send_strategy.resend(range).await;
        debug!("{} <- {}: NAK for {}, repair complete: {}", self.local_peer, self.remote_peer, range, complete);

        if let Some(low) = evicted_below {
            self.send_nakack(low).await;
        }
    }

    async fn send_nakack(&self, low: SequenceNumber) {
        debug!("{}: no data below #{} available for repair - sending NAKACK", self.local_peer, low);
        self.send_strategy.send_control(&ControlMessage::NakAck { low }).await;
    }

    fn nakack_received(&mut self, header: &TransportHeader, low: SequenceNumber) {
        if self.active || header.source != self.remote_peer || !self.acked() {
            return;
        }
        let below_low = self.nak_sequence.low()
            .map_or(false, |floor| floor < low.previous());
        if !below_low {
            return;
        }

        let lost = self.nak_sequence.shift(low);
        if !lost.is_empty() {
            warn!("{} <- {}: data below #{} can not be repaired, lost {:?}", self.local_peer, self.remote_peer, low, lost);
        }
    }

    /// Requests repairs for all gaps in the received sequence that are due in this NAK interval.
    ///  A gap is requested when it is first detected, and then again every `nak_delay_intervals`
    ///  intervals, at most `nak_max` more times. Ranges that other peers requested during the
    ///  interval are not requested again.
    pub(super) async fn send_naks(&mut self) {
        let nak_peers = mem::take(&mut self.nak_peers);

        if !self.acked() || !self.nak_sequence.disjoint() {
            return;
        }
        let Some(high_water_mark) = self.nak_sequence.high() else {
            return;
        };

        let mut missing = self.nak_sequence.clone();
        for range in nak_peers {
            if range.low <= high_water_mark {
                missing.insert_range(SequenceRange { low: range.low, high: min(range.high, high_water_mark) });
            }
        }

        for range in missing.missing_ranges() {
            let age = self.nak_age(range);
            if self.is_nak_due(age) {
                debug!("{} -> {}: sending NAK for {} (requested {} times before)", self.local_peer, self.remote_peer, range, age);
                self.send_strategy.send_control(&ControlMessage::Nak { remote_peer: self.remote_peer, range }).await;
            }
        }

        self.nak_requests.push_back(NakRequest {
            high_water_mark,
            requested_at: Instant::now(),
        });
    }

    /// the number of earlier NAK intervals in which the range was already missing
    fn nak_age(&self, range: SequenceRange) -> u32 {
        self.nak_requests.iter()
            .filter(|r| r.high_water_mark >= range.low)
            .count() as u32
    }

    fn is_nak_due(&self, age: u32) -> bool {
        if age == 0 {
            return true;
        }
        let period = self.config.nak_delay_intervals + 1;
        age % period == 0 && age / period <= self.config.nak_max
    }

    /// Gives up on gaps below the high-water mark of repair requests that are older than
    ///  `nak_timeout`
    pub(super) fn expire_naks(&mut self) {
        let now = Instant::now();

        while let Some(request) = self.nak_requests.front() {
            if now.duration_since(request.requested_at) < self.config.nak_timeout {
                break;
            }
            let high_water_mark = request.high_water_mark;
            self.nak_requests.pop_front();

            let lost = self.nak_sequence.skip(high_water_mark);
            if !lost.is_empty() {
                error!("{} <- {}: repair of {:?} timed out - skipping to #{}", self.local_peer, self.remote_peer, lost, high_water_mark);
            }
        }
    }
}

/// A session with handshake, duplicate detection and NAK-based repair.
///
/// The active side repeats SYNs (with exponential backoff) until it receives a SYNACK, and
///  services NAKs from its remote peer out of the send buffer. The passive side answers SYNs,
///  tracks the remote peer's sequence numbers starting at the SYN, and periodically requests
///  the gaps.
pub struct ReliableSession {
    config: Arc<MulticastConfig>,
    remote_peer: MulticastPeer,
    pub(super) inner: Arc<RwLock<ReliableSessionInner>>,
    association_listener: Arc<dyn AssociationListener>,
    pub(super) syn_watchdog: Mutex<SynWatchdog>,
    pub(super) nak_watchdog: Mutex<NakWatchdog>,
}

impl ReliableSession {
    pub fn new(config: Arc<MulticastConfig>, send_strategy: Arc<SendStrategy>, association_listener: Arc<dyn AssociationListener>, remote_peer: MulticastPeer) -> ReliableSession {
        let inner = ReliableSessionInner {
            config: config.clone(),
            local_peer: send_strategy.local_peer(),
            send_strategy,
            remote_peer,
            active: false,
            started: false,
            state: HandshakeState::Unsynced,
            syn_retries: 0,
            nak_sequence: DisjointSequence::new(),
            nak_requests: VecDeque::new(),
            nak_peers: Vec::new(),
        };

        ReliableSession {
            config,
            remote_peer,
            inner: Arc::new(RwLock::new(inner)),
            association_listener,
            syn_watchdog: Mutex::new(SynWatchdog::new()),
            nak_watchdog: Mutex::new(NakWatchdog::new()),
        }
    }

    pub async fn handshake_state(&self) -> HandshakeState {
        self.inner.read().await.state
    }

    pub async fn nak_sequence(&self) -> DisjointSequence {
        self.inner.read().await.nak_sequence.clone()
    }
}

#[async_trait]
impl MulticastSession for ReliableSession {
    fn remote_peer(&self) -> MulticastPeer {
        self.remote_peer
    }

    async fn acked(&self) -> bool {
        self.inner.read().await.acked()
    }

    async fn start(&self, active: bool) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if inner.started {
            return Ok(());
        }

        if active {
            self.syn_watchdog.lock().await
                .schedule(Arc::downgrade(&self.inner), self.config.clone())?;
        }
        else {
            self.nak_watchdog.lock().await
                .schedule::<RngRandom>(Arc::downgrade(&self.inner), self.config.clone())?;
        }

        debug!("{}: started {} session with {}", inner.local_peer, if active { "active" } else { "passive" }, self.remote_peer);
        inner.active = active;
        inner.started = true;
        Ok(())
    }

    async fn stop(&self) {
        self.syn_watchdog.lock().await.cancel();
        self.nak_watchdog.lock().await.cancel();
    }

    async fn check_header(&self, header: &TransportHeader) -> bool {
        self.inner.write().await
            .check_header(header)
    }

    async fn control_received(&self, header: &TransportHeader, message: &ControlMessage) {
        match message {
            ControlMessage::Syn { remote_peer } => {
                self.inner.write().await
                    .syn_received(header, *remote_peer).await;
            }
            ControlMessage::SynAck { remote_peer } => {
                let handshake_completed = self.inner.write().await
                    .synack_received(header, *remote_peer);

                // the listener may call back into this session, so it must be called without
                //  holding the lock
                if handshake_completed {
                    self.syn_watchdog.lock().await.cancel();
                    self.association_listener.check_fully_association().await;
                }
            }
            ControlMessage::Nak { remote_peer, range } => {
                self.inner.write().await
                    .nak_received(header, *remote_peer, *range).await;
            }
            ControlMessage::NakAck { low } => {
                self.inner.write().await
                    .nakack_received(header, *low);
            }
        }
    }
}
