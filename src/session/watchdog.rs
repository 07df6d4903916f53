use std::cmp::min;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::select;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;
use crate::config::MulticastConfig;
use crate::session::reliable::ReliableSessionInner;
use crate::util::random::Random;

/// Repeats the SYN of an active session with exponential backoff until the handshake completes,
///  giving up after `syn_timeout`.
///
/// The timer task holds only a weak reference to the session and ends when the session is gone.
pub(super) struct SynWatchdog {
    handle: Option<JoinHandle<()>>,
}

impl SynWatchdog {
    pub fn new() -> SynWatchdog {
        SynWatchdog { handle: None }
    }

    #[cfg(test)]
    pub fn is_scheduled(&self) -> bool {
        self.handle.as_ref()
            .map_or(false, |h| !h.is_finished())
    }

    /// The first SYN is sent right away
    pub fn schedule(&mut self, session: Weak<RwLock<ReliableSessionInner>>, config: Arc<MulticastConfig>) -> anyhow::Result<()> {
        self.cancel();
        let runtime = Handle::try_current()?;
        self.handle = Some(runtime.spawn(Self::run(session, config)));
        Ok(())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    async fn run(session: Weak<RwLock<ReliableSessionInner>>, config: Arc<MulticastConfig>) {
        select! {
            _ = Self::syn_loop(session.clone(), config.clone()) => {}
            _ = sleep(config.syn_timeout) => {
                if let Some(inner) = session.upgrade() {
                    inner.write().await
                        .syn_timed_out();
                }
            }
        }
    }

    async fn syn_loop(session: Weak<RwLock<ReliableSessionInner>>, config: Arc<MulticastConfig>) {
        let mut retries = 0;
        loop {
            let Some(inner) = session.upgrade() else {
                trace!("session was discarded - stopping SYN watchdog");
                return;
            };
            {
                let mut inner = inner.write().await;
                if inner.acked() {
                    return;
                }
                inner.send_syn().await;
            }
            drop(inner);

            sleep(Self::retry_interval(&config, retries)).await;
            retries += 1;
        }
    }

    /// `syn_interval * syn_backoff^retries`. It is capped at `syn_timeout` only to keep the
    ///  `Duration` in range: the timeout ends the retries before a capped interval elapses.
    pub fn retry_interval(config: &MulticastConfig, retries: u32) -> Duration {
        let secs = config.syn_interval.as_secs_f64() * config.syn_backoff.powi(i32::try_from(retries).unwrap_or(i32::MAX));
        if secs.is_finite() && secs < config.syn_timeout.as_secs_f64() {
            min(Duration::from_secs_f64(secs), config.syn_timeout)
        }
        else {
            config.syn_timeout
        }
    }
}

impl Drop for SynWatchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Periodically gives up on timed out repair requests and sends NAKs for a passive session. The
///  interval is randomized between `nak_interval` and twice that, so that peers missing the same
///  data don't all request it at the same time.
pub(super) struct NakWatchdog {
    handle: Option<JoinHandle<()>>,
}

impl NakWatchdog {
    pub fn new() -> NakWatchdog {
        NakWatchdog { handle: None }
    }

    #[cfg(test)]
    pub fn is_scheduled(&self) -> bool {
        self.handle.as_ref()
            .map_or(false, |h| !h.is_finished())
    }

    pub fn schedule<R: Random + 'static>(&mut self, session: Weak<RwLock<ReliableSessionInner>>, config: Arc<MulticastConfig>) -> anyhow::Result<()> {
        self.cancel();
        let runtime = Handle::try_current()?;
        self.handle = Some(runtime.spawn(Self::run::<R>(session, config)));
        Ok(())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    async fn run<R: Random>(session: Weak<RwLock<ReliableSessionInner>>, config: Arc<MulticastConfig>) {
        loop {
            sleep(Self::next_interval::<R>(config.nak_interval)).await;

            let Some(inner) = session.upgrade() else {
                trace!("session was discarded - stopping NAK watchdog");
                return;
            };
            let mut inner = inner.write().await;
            inner.expire_naks();
            inner.send_naks().await;
        }
    }

    pub fn next_interval<R: Random>(nak_interval: Duration) -> Duration {
        nak_interval.mul_f64(1.0 + R::gen_f64_range(0.0..1.0))
    }
}

impl Drop for NakWatchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}
