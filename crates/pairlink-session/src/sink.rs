//! UI-facing projection of the channel, updated on one notification thread.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{ExchangeError, ExchangeResult};
use crate::payload::ColorPayload;
use crate::state::SessionState;

/// What a UI renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservableUiState {
    /// Activated with the companion installed. Deliberately independent of
    /// reachability; see [`Self::is_reachable`].
    pub is_connected: bool,
    pub is_reachable: bool,
    pub session_state: SessionState,
    /// False while `Inactive` because the peer has no companion app.
    pub companion_installed: bool,
    pub current_color: ColorPayload,
    /// Colors accepted from the peer so far, repeats included.
    pub colors_received: u64,
    pub status_text: String,
}

impl Default for ObservableUiState {
    fn default() -> Self {
        Self {
            is_connected: false,
            is_reachable: false,
            session_state: SessionState::NotActivated,
            companion_installed: true,
            current_color: ColorPayload::placeholder(),
            colors_received: 0,
            status_text: connection_status(SessionState::NotActivated, true).to_string(),
        }
    }
}

impl ObservableUiState {
    fn with_connection(mut self, state: SessionState, companion_installed: bool) -> Self {
        self.session_state = state;
        self.companion_installed = companion_installed;
        self.is_connected = state.is_paired();
        self.is_reachable = state.is_reachable();
        self.status_text = connection_status(state, companion_installed).to_string();
        self
    }

    fn with_color(mut self, color: ColorPayload) -> Self {
        self.status_text = format!("current color: {}", color.name);
        self.current_color = color;
        self.colors_received = self.colors_received.saturating_add(1);
        self
    }

    fn with_status(mut self, status: String) -> Self {
        self.status_text = status;
        self
    }
}

/// Status line for a session state.
pub fn connection_status(state: SessionState, companion_installed: bool) -> &'static str {
    match state {
        SessionState::NotActivated => "peer session not activated",
        SessionState::Activating => "activating peer session...",
        SessionState::Inactive if !companion_installed => "peer has no companion app installed",
        SessionState::Inactive => "peer session inactive",
        SessionState::ActivatedUnreachable => "paired with peer; peer not reachable",
        SessionState::ActivatedReachable => "connected to peer, choose a color",
    }
}

/// Status line the sender shows once a send finishes.
pub fn send_status(color_name: &str, result: &ExchangeResult) -> String {
    match result {
        Ok(reply) if reply.is_success() => format!("color {color_name} sent to peer"),
        Ok(reply) => format!("peer rejected color {color_name}: {}", reply.message),
        Err(ExchangeError::PeerUnreachable) => "peer not connected or not reachable".to_string(),
        Err(err @ ExchangeError::Transport(_)) => format!("send failed: {err}"),
    }
}

type Observer = Box<dyn FnMut(&ObservableUiState) + Send>;

enum SinkCommand {
    Connection {
        state: SessionState,
        companion_installed: bool,
    },
    Color(ColorPayload),
    Status(String),
    Subscribe(Observer),
    Snapshot(Sender<ObservableUiState>),
}

/// Handle to the notification thread that owns the [`ObservableUiState`].
///
/// Every mutation is queued to that one thread and applied in order, and
/// observers run there too, so a UI never sees two updates interleave. An
/// update that leaves the state unchanged does not notify observers. The
/// thread exits when the last handle is dropped.
#[derive(Clone)]
pub struct StateSink {
    commands: Sender<SinkCommand>,
    notifier: ThreadId,
}

impl StateSink {
    /// Start a notification thread named `pairlink-notify-{label}`.
    pub fn spawn(label: &str) -> std::io::Result<Self> {
        let (commands, inbox) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("pairlink-notify-{label}"))
            .spawn(move || run(inbox))?;
        Ok(Self {
            commands,
            notifier: handle.thread().id(),
        })
    }

    /// `companion_installed` is false when an activation found the peer
    /// without its companion app.
    pub fn apply_connection(&self, state: SessionState, companion_installed: bool) {
        self.post(SinkCommand::Connection {
            state,
            companion_installed,
        });
    }

    /// Replace the current color. Called on the receiving side only.
    pub fn apply_color(&self, color: ColorPayload) {
        self.post(SinkCommand::Color(color));
    }

    /// Record a finished send in the status line. The current color is left
    /// alone: a sender's own sends never change what it displays.
    pub fn apply_send_outcome(&self, color_name: &str, result: &ExchangeResult) {
        self.post(SinkCommand::Status(send_status(color_name, result)));
    }

    /// Run `observer` on the notification thread after every change.
    ///
    /// The observer receives the new state by reference. It must not wait on
    /// this sink: [`Self::snapshot`] and [`Self::wait_for`] return `None`
    /// when called from the notification thread.
    pub fn subscribe(&self, observer: impl FnMut(&ObservableUiState) + Send + 'static) {
        self.post(SinkCommand::Subscribe(Box::new(observer)));
    }

    /// Current state, after every update queued before this call.
    ///
    /// `None` if the notification thread is gone (an observer panicked) or
    /// if called from an observer, where waiting would block the thread
    /// that has to answer.
    pub fn snapshot(&self) -> Option<ObservableUiState> {
        if thread::current().id() == self.notifier {
            debug!("snapshot requested from the notification thread; refusing");
            return None;
        }
        let (reply, answer) = mpsc::channel();
        self.commands.send(SinkCommand::Snapshot(reply)).ok()?;
        answer.recv().ok()
    }

    /// Poll snapshots until `predicate` holds or `timeout` passes.
    pub fn wait_for(
        &self,
        timeout: Duration,
        mut predicate: impl FnMut(&ObservableUiState) -> bool,
    ) -> Option<ObservableUiState> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.snapshot()?;
            if predicate(&state) {
                return Some(state);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn post(&self, command: SinkCommand) {
        if self.commands.send(command).is_err() {
            debug!("notification thread gone; update dropped");
        }
    }
}

fn run(inbox: Receiver<SinkCommand>) {
    let mut state = ObservableUiState::default();
    let mut observers: Vec<Observer> = Vec::new();

    for command in inbox {
        let next = match command {
            SinkCommand::Connection {
                state: session,
                companion_installed,
            } => state.clone().with_connection(session, companion_installed),
            SinkCommand::Color(color) => state.clone().with_color(color),
            SinkCommand::Status(text) => state.clone().with_status(text),
            SinkCommand::Subscribe(observer) => {
                observers.push(observer);
                continue;
            }
            SinkCommand::Snapshot(reply) => {
                let _ = reply.send(state.clone());
                continue;
            }
        };

        if next == state {
            trace!("ui state unchanged; not notifying");
            continue;
        }
        state = next;
        for observer in observers.iter_mut() {
            observer(&state);
        }
    }
    debug!("notification thread exiting");
}
