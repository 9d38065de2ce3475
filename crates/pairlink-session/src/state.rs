//! Session lifecycle state machine.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::reactivation::ReactivationPolicy;

/// Lifecycle of one end of a paired session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    NotActivated = 0,
    Activating = 1,
    /// Activation failed, the companion app is missing, or the platform
    /// parked the session.
    Inactive = 2,
    ActivatedUnreachable = 3,
    ActivatedReachable = 4,
}

impl SessionState {
    /// Activated with the companion installed, regardless of reachability.
    pub fn is_paired(self) -> bool {
        matches!(
            self,
            SessionState::ActivatedReachable | SessionState::ActivatedUnreachable
        )
    }

    pub fn is_reachable(self) -> bool {
        self == SessionState::ActivatedReachable
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::NotActivated => "not_activated",
            SessionState::Activating => "activating",
            SessionState::Inactive => "inactive",
            SessionState::ActivatedUnreachable => "activated_unreachable",
            SessionState::ActivatedReachable => "activated_reachable",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SessionState::Activating,
            2 => SessionState::Inactive,
            3 => SessionState::ActivatedUnreachable,
            4 => SessionState::ActivatedReachable,
            _ => SessionState::NotActivated,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Drives [`SessionState`] from transport lifecycle callbacks.
///
/// Every input returns `Some(Transition)` only when the state changed, so
/// callers publish exactly once per change.
#[derive(Debug)]
pub struct SessionStateMachine {
    state: SessionState,
    peer_reachable: bool,
    companion_missing: bool,
    policy: ReactivationPolicy,
    reactivations: u32,
}

impl SessionStateMachine {
    pub fn new(policy: ReactivationPolicy) -> Self {
        Self {
            state: SessionState::NotActivated,
            peer_reachable: false,
            companion_missing: false,
            policy,
            reactivations: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// False only while the session sits `Inactive` because the last
    /// activation found no companion app on the peer.
    pub fn companion_installed(&self) -> bool {
        !self.companion_missing
    }

    /// Reactivations spent since the last successful activation.
    pub fn reactivations(&self) -> u32 {
        self.reactivations
    }

    /// NotActivated → Activating. Ignored in any other state.
    pub fn request_activation(&mut self) -> Option<Transition> {
        if self.state != SessionState::NotActivated {
            debug!(state = %self.state, "activation already requested");
            return None;
        }
        self.move_to(SessionState::Activating)
    }

    /// Record reachability without driving a transition. Used to seed the
    /// value that activation completes into.
    pub fn observe_reachability(&mut self, reachable: bool) {
        self.peer_reachable = reachable;
    }

    pub fn on_activation(
        &mut self,
        succeeded: bool,
        companion_installed: bool,
    ) -> Option<Transition> {
        if self.state != SessionState::Activating {
            warn!(state = %self.state, "activation result outside of activation; ignored");
            return None;
        }
        if succeeded {
            self.reactivations = 0;
        }
        self.companion_missing = succeeded && !companion_installed;
        let next = match (succeeded, companion_installed) {
            (true, true) => self.activated_state(),
            (true, false) => {
                info!("session activated but companion app is not installed");
                SessionState::Inactive
            }
            (false, _) => SessionState::Inactive,
        };
        self.move_to(next)
    }

    pub fn on_reachability_changed(&mut self, reachable: bool) -> Option<Transition> {
        self.peer_reachable = reachable;
        if !self.state.is_paired() {
            return None;
        }
        let next = self.activated_state();
        self.move_to(next)
    }

    pub fn on_become_inactive(&mut self) -> Option<Transition> {
        self.companion_missing = false;
        self.move_to(SessionState::Inactive)
    }

    /// Inactive → Activating when the reactivation budget allows it.
    ///
    /// Returns the transition together with the delay the caller must wait
    /// before calling the transport's `activate` again.
    pub fn on_deactivate(&mut self) -> Option<(Transition, Duration)> {
        if self.state != SessionState::Inactive {
            debug!(state = %self.state, "deactivation outside of inactive state; ignored");
            return None;
        }
        let attempt = self.reactivations + 1;
        let Some(delay) = self.policy.delay_for(attempt) else {
            warn!(
                attempts = self.reactivations,
                "reactivation budget exhausted; staying inactive"
            );
            return None;
        };
        self.reactivations = attempt;
        self.companion_missing = false;
        let transition = self.move_to(SessionState::Activating)?;
        info!(attempt, ?delay, "scheduling reactivation");
        Some((transition, delay))
    }

    fn activated_state(&self) -> SessionState {
        if self.peer_reachable {
            SessionState::ActivatedReachable
        } else {
            SessionState::ActivatedUnreachable
        }
    }

    fn move_to(&mut self, next: SessionState) -> Option<Transition> {
        if next == self.state {
            debug!(state = %next, "state unchanged");
            return None;
        }
        let transition = Transition {
            from: self.state,
            to: next,
        };
        self.state = next;
        info!(from = %transition.from, to = %transition.to, "session state changed");
        Some(transition)
    }
}

/// Lock-free mirror of the machine's state for readers on other threads.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
