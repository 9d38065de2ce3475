//! In-process paired transport.
//!
//! [`LoopbackSession::pair`] returns two connected ends. Each end also
//! exposes knobs to simulate what a real platform does to a session:
//! the peer wandering out of range, the companion app being missing,
//! activation failing, or the platform parking the session.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{LinkError, Result};
use crate::payload::TransportMap;
use crate::session::{IncomingMessage, PairedSession, Responder, SessionDelegate};

#[derive(Debug, Default)]
struct End {
    delegate: Option<SessionDelegate>,
    active: bool,
    companion_missing: bool,
    fail_next_activation: bool,
    send_failure: Option<String>,
}

#[derive(Debug)]
struct Shared {
    in_range: bool,
    ends: [End; 2],
}

#[derive(Debug, Default)]
struct Counters {
    sends: AtomicUsize,
    delivered: AtomicUsize,
}

/// One end of an in-process pair.
#[derive(Debug)]
pub struct LoopbackSession {
    side: usize,
    shared: Arc<Mutex<Shared>>,
    counters: [Arc<Counters>; 2],
}

impl LoopbackSession {
    /// Two ends that are in range of each other, companions installed.
    pub fn pair() -> (Self, Self) {
        let shared = Arc::new(Mutex::new(Shared {
            in_range: true,
            ends: [End::default(), End::default()],
        }));
        let counters = [Arc::new(Counters::default()), Arc::new(Counters::default())];
        let left = Self {
            side: 0,
            shared: Arc::clone(&shared),
            counters: counters.clone(),
        };
        let right = Self {
            side: 1,
            shared,
            counters,
        };
        (left, right)
    }

    /// Move the peers in or out of range. Both activated ends are told.
    pub fn set_reachable(&self, reachable: bool) {
        let notify = {
            let mut shared = self.lock();
            shared.in_range = reachable;
            let both_active = shared.ends.iter().all(|end| end.active);
            shared
                .ends
                .iter()
                .filter(|end| end.active)
                .filter_map(|end| end.delegate.clone())
                .map(|delegate| (delegate, reachable && both_active))
                .collect::<Vec<_>>()
        };
        debug!(side = self.side, reachable, "loopback range changed");
        for (delegate, reachable) in notify {
            delegate.reachability_changed(reachable);
        }
    }

    /// Report that the companion app is (not) installed on the next activation.
    pub fn set_companion_installed(&self, installed: bool) {
        self.lock().ends[self.side].companion_missing = !installed;
    }

    /// Make the next activation of this end fail.
    pub fn fail_next_activation(&self) {
        self.lock().ends[self.side].fail_next_activation = true;
    }

    /// Make every send from this end fail with `reason`, or clear with `None`.
    pub fn set_send_failure(&self, reason: Option<&str>) {
        self.lock().ends[self.side].send_failure = reason.map(str::to_string);
    }

    /// Simulate the platform parking this end's session.
    pub fn become_inactive(&self) {
        let delegate = {
            let mut shared = self.lock();
            let end = &mut shared.ends[self.side];
            end.active = false;
            end.delegate.clone()
        };
        if let Some(delegate) = delegate {
            delegate.became_inactive();
        }
    }

    /// Simulate the platform finishing deactivation of this end. The peer
    /// loses reachability until this end activates again.
    pub fn deactivate(&self) {
        let (delegate, peer) = {
            let mut shared = self.lock();
            let end = &mut shared.ends[self.side];
            end.active = false;
            let delegate = end.delegate.take();
            let peer = &shared.ends[self.peer()];
            (delegate, peer.delegate.clone().filter(|_| peer.active))
        };
        if let Some(delegate) = delegate {
            delegate.deactivated();
        }
        if let Some(peer) = peer {
            peer.reachability_changed(false);
        }
    }

    /// Times `send_message` was called on this end, including refused sends.
    pub fn send_calls(&self) -> usize {
        self.counters[self.side].sends.load(Ordering::SeqCst)
    }

    /// Messages delivered to this end's delegate.
    pub fn delivered(&self) -> usize {
        self.counters[self.side].delivered.load(Ordering::SeqCst)
    }

    fn peer(&self) -> usize {
        1 - self.side
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PairedSession for LoopbackSession {
    fn activate(&self, delegate: SessionDelegate) -> Result<()> {
        let (outcome, peer_delegate) = {
            let mut shared = self.lock();
            let in_range = shared.in_range;
            let end = &mut shared.ends[self.side];
            let failed = std::mem::take(&mut end.fail_next_activation);
            let installed = !end.companion_missing;
            end.delegate = Some(delegate.clone());
            end.active = !failed && installed;
            let active = end.active;
            let peer = &shared.ends[self.peer()];
            let peer_delegate = peer
                .delegate
                .clone()
                .filter(|_| active && peer.active && in_range);
            ((failed, installed), peer_delegate)
        };

        let (failed, installed) = outcome;
        if failed {
            debug!(side = self.side, "loopback activation failing on request");
            delegate.activation_complete(false, installed, Some("activation failed".to_string()));
            return Ok(());
        }
        delegate.activation_complete(true, installed, None);
        if let Some(peer) = peer_delegate {
            peer.reachability_changed(true);
        }
        Ok(())
    }

    fn is_reachable(&self) -> bool {
        let shared = self.lock();
        shared.in_range && shared.ends.iter().all(|end| end.active)
    }

    fn send_message(&self, message: TransportMap, timeout: Duration) -> Result<TransportMap> {
        self.counters[self.side].sends.fetch_add(1, Ordering::SeqCst);

        let peer = {
            let shared = self.lock();
            if let Some(reason) = &shared.ends[self.side].send_failure {
                return Err(LinkError::Failed(reason.clone()));
            }
            if !shared.in_range {
                return Err(LinkError::NotReachable);
            }
            let peer = &shared.ends[self.peer()];
            peer.delegate
                .clone()
                .filter(|_| peer.active)
                .ok_or(LinkError::NotReachable)?
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        let responder = Responder::new(move |reply| {
            let _ = reply_tx.send(reply);
        });
        self.counters[self.peer()]
            .delivered
            .fetch_add(1, Ordering::SeqCst);
        trace!(side = self.side, "delivering loopback message");
        peer.message_received(IncomingMessage::new(message, responder));

        match reply_rx.recv_timeout(timeout) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => Err(LinkError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Disconnected(
                "peer dropped the reply handle".to_string(),
            )),
        }
    }
}
