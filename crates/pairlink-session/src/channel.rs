//! The peer channel: one end of a paired session, owning its transport,
//! its lifecycle state machine and its UI state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{ChannelError, ExchangeResult};
use crate::exchange::{self, Exchange};
use crate::payload::ColorPayload;
use crate::reactivation::ReactivationPolicy;
use crate::session::{PairedSession, SessionDelegate, SessionEvent};
use crate::sink::{ObservableUiState, StateSink};
use crate::state::{SessionState, SessionStateMachine, StateCell, Transition};

/// Tuning for a [`PeerChannel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Process-unique channel name. Also names the channel's threads.
    pub name: String,
    /// How long [`PeerChannel::send`] waits for a reply.
    pub send_timeout: Duration,
    /// How often the event loop checks for shutdown while idle.
    pub poll_interval: Duration,
    pub reactivation: ReactivationPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            send_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
            reactivation: ReactivationPolicy::default(),
        }
    }
}

impl ChannelConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_reactivation(mut self, policy: ReactivationPolicy) -> Self {
        self.reactivation = policy;
        self
    }
}

type Observer = Box<dyn FnMut(&ObservableUiState) + Send>;

/// Configures and opens a [`PeerChannel`].
pub struct ChannelBuilder<S> {
    session: S,
    config: ChannelConfig,
    observers: Vec<Observer>,
}

impl<S: PairedSession> ChannelBuilder<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            config: ChannelConfig::default(),
            observers: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an observer before activation starts, so it sees every
    /// state the channel goes through.
    ///
    /// Observers run on the notification thread; reading the channel's UI
    /// state from inside one yields `None` instead of waiting on itself.
    pub fn with_observer(
        mut self,
        observer: impl FnMut(&ObservableUiState) + Send + 'static,
    ) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Claim the channel name, start the notification and event-loop
    /// threads, and begin activating the session.
    pub fn open(self) -> Result<PeerChannel<S>, ChannelError> {
        let ChannelBuilder {
            session,
            config,
            observers,
        } = self;

        let claim = NameClaim::acquire(&config.name)?;
        let sink = StateSink::spawn(&config.name).map_err(ChannelError::Spawn)?;
        for observer in observers {
            sink.subscribe(observer);
        }

        let session = Arc::new(session);
        let state = Arc::new(StateCell::new(SessionState::NotActivated));
        let running = Arc::new(AtomicBool::new(true));
        let (events_tx, events) = mpsc::channel();

        let event_loop = EventLoop {
            session: Arc::clone(&session),
            machine: SessionStateMachine::new(config.reactivation),
            state: Arc::clone(&state),
            sink: sink.clone(),
            delegate: SessionDelegate::new(events_tx),
            running: Arc::clone(&running),
            poll_interval: config.poll_interval,
            reactivate_at: None,
        };
        let handle = thread::Builder::new()
            .name(format!("pairlink-session-{}", config.name))
            .spawn(move || event_loop.run(events))
            .map_err(ChannelError::Spawn)?;

        info!(channel = %config.name, "peer channel opened");
        Ok(PeerChannel {
            exchange: Exchange::new(session),
            state,
            sink,
            send_timeout: config.send_timeout,
            running,
            event_loop: Some(handle),
            claim,
        })
    }
}

/// One end of a paired session.
///
/// Owns its transport. Lifecycle callbacks are handled on a dedicated
/// event-loop thread; UI state lives on a dedicated notification thread.
/// At most one channel per name may be open in a process.
pub struct PeerChannel<S: PairedSession> {
    exchange: Exchange<S>,
    state: Arc<StateCell>,
    sink: StateSink,
    send_timeout: Duration,
    running: Arc<AtomicBool>,
    event_loop: Option<JoinHandle<()>>,
    claim: NameClaim,
}

impl<S: PairedSession> PeerChannel<S> {
    /// Open with default configuration.
    pub fn open(session: S) -> Result<Self, ChannelError> {
        ChannelBuilder::new(session).open()
    }

    pub fn builder(session: S) -> ChannelBuilder<S> {
        ChannelBuilder::new(session)
    }

    pub fn name(&self) -> &str {
        &self.claim.0
    }

    pub fn session(&self) -> &S {
        self.exchange.session()
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// Activated with the companion installed; says nothing about reachability.
    pub fn is_connected(&self) -> bool {
        self.state().is_paired()
    }

    pub fn is_reachable(&self) -> bool {
        self.state().is_reachable()
    }

    /// Snapshot of the UI state after every update queued so far.
    pub fn ui_state(&self) -> Option<ObservableUiState> {
        self.sink.snapshot()
    }

    pub fn sink(&self) -> &StateSink {
        &self.sink
    }

    /// See [`StateSink::subscribe`]; the observer must not wait on this channel.
    pub fn subscribe(&self, observer: impl FnMut(&ObservableUiState) + Send + 'static) {
        self.sink.subscribe(observer);
    }

    /// Send `color` to the peer with the configured timeout.
    pub fn send(&self, color: &ColorPayload) -> ExchangeResult {
        self.send_with_timeout(color, self.send_timeout)
    }

    /// Send `color` once and record the outcome in the status text.
    pub fn send_with_timeout(&self, color: &ColorPayload, timeout: Duration) -> ExchangeResult {
        let result = self.exchange.send(self.state(), color, timeout);
        self.sink.apply_send_outcome(&color.name, &result);
        result
    }

    /// Block until the session reaches `target`, or `timeout` passes.
    pub fn wait_for_state(&self, target: SessionState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state() == target {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Stop the event loop and release the channel name.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.event_loop.take() {
            if handle.join().is_err() {
                warn!(channel = %self.name(), "event loop panicked");
            }
            debug!(channel = %self.name(), "peer channel closed");
        }
    }
}

impl<S: PairedSession> Drop for PeerChannel<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<S: PairedSession> std::fmt::Debug for PeerChannel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerChannel")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn open_names() -> &'static Mutex<HashSet<String>> {
    static OPEN: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();
    OPEN.get_or_init(Default::default)
}

/// A channel name held for the life of a [`PeerChannel`].
struct NameClaim(String);

impl NameClaim {
    fn acquire(name: &str) -> Result<Self, ChannelError> {
        let mut names = open_names().lock().unwrap_or_else(PoisonError::into_inner);
        if !names.insert(name.to_string()) {
            return Err(ChannelError::AlreadyOpen(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }
}

impl Drop for NameClaim {
    fn drop(&mut self) {
        open_names()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.0);
    }
}

/// Runs on the channel's event-loop thread and owns the state machine.
struct EventLoop<S> {
    session: Arc<S>,
    machine: SessionStateMachine,
    state: Arc<StateCell>,
    sink: StateSink,
    delegate: SessionDelegate,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    reactivate_at: Option<Instant>,
}

impl<S: PairedSession> EventLoop<S> {
    fn run(mut self, events: Receiver<SessionEvent>) {
        let requested = self.machine.request_activation();
        self.publish(requested);
        self.activate();

        while self.running.load(Ordering::Acquire) {
            match events.recv_timeout(self.next_wait()) {
                Ok(event) => self.handle(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if self.reactivate_at.is_some_and(|at| Instant::now() >= at) {
                self.reactivate_at = None;
                self.activate();
            }
        }
        debug!("event loop exiting");
    }

    fn next_wait(&self) -> Duration {
        match self.reactivate_at {
            Some(at) => at
                .saturating_duration_since(Instant::now())
                .min(self.poll_interval),
            None => self.poll_interval,
        }
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ActivationComplete {
                activated,
                companion_installed,
                error,
            } => {
                if let Some(error) = error {
                    warn!(%error, "session activation failed");
                }
                self.machine
                    .observe_reachability(self.session.is_reachable());
                let transition = self.machine.on_activation(activated, companion_installed);
                self.publish(transition);
            }
            SessionEvent::ReachabilityChanged(reachable) => {
                let transition = self.machine.on_reachability_changed(reachable);
                self.publish(transition);
            }
            SessionEvent::BecameInactive => {
                let transition = self.machine.on_become_inactive();
                self.publish(transition);
            }
            SessionEvent::Deactivated => {
                if let Some((transition, delay)) = self.machine.on_deactivate() {
                    self.publish(Some(transition));
                    self.reactivate_at = Some(Instant::now() + delay);
                }
            }
            SessionEvent::MessageReceived(incoming) => {
                exchange::handle_incoming(incoming, &self.sink);
            }
        }
    }

    fn activate(&mut self) {
        if let Err(err) = self.session.activate(self.delegate.clone()) {
            warn!(error = %err, "session activation could not start");
            let transition = self.machine.on_activation(false, false);
            self.publish(transition);
        }
    }

    fn publish(&self, transition: Option<Transition>) {
        if let Some(transition) = transition {
            self.state.store(transition.to);
            self.sink
                .apply_connection(transition.to, self.machine.companion_installed());
        }
    }
}
