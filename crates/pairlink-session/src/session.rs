//! The transport boundary: what a paired-session platform must provide.

use std::fmt;
use std::sync::mpsc::Sender;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;
use crate::payload::TransportMap;
use crate::reply::Reply;

/// A platform paired-session primitive.
///
/// Implementations report lifecycle changes and inbound messages through
/// the [`SessionDelegate`] handed to [`PairedSession::activate`]. Callbacks
/// may fire on any thread.
pub trait PairedSession: Send + Sync + 'static {
    /// Begin (or retry) activation. Completion is reported asynchronously via
    /// [`SessionDelegate::activation_complete`]; an `Err` here means
    /// activation could not even start.
    fn activate(&self, delegate: SessionDelegate) -> Result<()>;

    /// Whether the peer can receive a message right now.
    fn is_reachable(&self) -> bool;

    /// Send one message and block for its reply, at most `timeout`.
    fn send_message(&self, message: TransportMap, timeout: Duration) -> Result<TransportMap>;
}

/// Lifecycle and message callbacks from a transport.
#[derive(Debug)]
pub enum SessionEvent {
    ActivationComplete {
        activated: bool,
        companion_installed: bool,
        error: Option<String>,
    },
    ReachabilityChanged(bool),
    BecameInactive,
    Deactivated,
    MessageReceived(IncomingMessage),
}

/// Where a transport delivers its callbacks. Cheap to clone.
#[derive(Clone)]
pub struct SessionDelegate {
    events: Sender<SessionEvent>,
}

impl SessionDelegate {
    pub fn new(events: Sender<SessionEvent>) -> Self {
        Self { events }
    }

    pub fn activation_complete(
        &self,
        activated: bool,
        companion_installed: bool,
        error: Option<String>,
    ) {
        self.emit(SessionEvent::ActivationComplete {
            activated,
            companion_installed,
            error,
        });
    }

    pub fn reachability_changed(&self, reachable: bool) {
        self.emit(SessionEvent::ReachabilityChanged(reachable));
    }

    pub fn became_inactive(&self) {
        self.emit(SessionEvent::BecameInactive);
    }

    pub fn deactivated(&self) {
        self.emit(SessionEvent::Deactivated);
    }

    pub fn message_received(&self, message: IncomingMessage) {
        self.emit(SessionEvent::MessageReceived(message));
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(err) = self.events.send(event) {
            debug!(event = ?err.0, "delegate detached; event dropped");
        }
    }
}

impl fmt::Debug for SessionDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDelegate").finish_non_exhaustive()
    }
}

type ReplyFn = Box<dyn FnOnce(TransportMap) + Send>;

/// Single-shot reply handle for one inbound message.
///
/// [`Responder::send`] consumes the handle, so a second reply cannot be
/// written. Dropping it unused sends an `error` reply, so the sender is
/// never left waiting on a message nobody answered.
pub struct Responder {
    reply: Option<ReplyFn>,
}

impl Responder {
    pub fn new(reply: impl FnOnce(TransportMap) + Send + 'static) -> Self {
        Self {
            reply: Some(Box::new(reply)),
        }
    }

    pub fn send(mut self, reply: TransportMap) {
        if let Some(deliver) = self.reply.take() {
            deliver(reply);
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(deliver) = self.reply.take() {
            warn!("message dropped without a reply; answering with error");
            deliver(Reply::error("message was not handled").to_map());
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("pending", &self.reply.is_some())
            .finish()
    }
}

/// A message from the peer together with its reply handle.
#[derive(Debug)]
pub struct IncomingMessage {
    pub message: TransportMap,
    pub responder: Responder,
}

impl IncomingMessage {
    pub fn new(message: TransportMap, responder: Responder) -> Self {
        Self { message, responder }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use serde_json::json;

    use super::*;
    use crate::reply::{Reply, ReplyStatus};

    #[test]
    fn responder_delivers_exactly_once() {
        let (tx, rx) = mpsc::channel();
        let responder = Responder::new(move |reply| tx.send(reply).unwrap());
        responder.send(Reply::color_updated().to_map());

        let first = rx.recv().unwrap();
        assert_eq!(first["status"], json!("success"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_responder_answers_with_error() {
        let (tx, rx) = mpsc::channel();
        drop(Responder::new(move |reply| tx.send(reply).unwrap()));

        let reply = Reply::from_map(&rx.recv().unwrap()).unwrap();
        assert_eq!(reply.status, ReplyStatus::Error);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn delegate_forwards_events_in_order() {
        let (tx, rx) = mpsc::channel();
        let delegate = SessionDelegate::new(tx);
        delegate.activation_complete(true, true, None);
        delegate.reachability_changed(true);
        delegate.became_inactive();
        delegate.deactivated();

        assert!(matches!(
            rx.recv().unwrap(),
            SessionEvent::ActivationComplete {
                activated: true,
                companion_installed: true,
                error: None
            }
        ));
        assert!(matches!(
            rx.recv().unwrap(),
            SessionEvent::ReachabilityChanged(true)
        ));
        assert!(matches!(rx.recv().unwrap(), SessionEvent::BecameInactive));
        assert!(matches!(rx.recv().unwrap(), SessionEvent::Deactivated));
    }

    #[test]
    fn detached_delegate_drops_message_and_still_replies() {
        let (tx, rx) = mpsc::channel();
        let delegate = SessionDelegate::new(tx);
        drop(rx);

        let (reply_tx, reply_rx) = mpsc::channel();
        delegate.message_received(IncomingMessage::new(
            TransportMap::new(),
            Responder::new(move |reply| reply_tx.send(reply).unwrap()),
        ));
        let reply = Reply::from_map(&reply_rx.recv().unwrap()).unwrap();
        assert!(!reply.is_success());
    }
}
