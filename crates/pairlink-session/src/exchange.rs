//! Request/reply exchange with the peer.
//!
//! Sending is gated on reachability and makes exactly one attempt. Receiving
//! decodes the payload, applies it to the [`StateSink`] and answers once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{ExchangeError, ExchangeResult};
use crate::payload::{self, ColorPayload, TransportMap};
use crate::reply::Reply;
use crate::session::{IncomingMessage, PairedSession};
use crate::sink::StateSink;
use crate::state::SessionState;

/// Sending half of the exchange, bound to one transport.
#[derive(Debug)]
pub struct Exchange<S> {
    session: Arc<S>,
}

impl<S> Clone for Exchange<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<S: PairedSession> Exchange<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Send `color` and wait up to `timeout` for the peer's reply.
    ///
    /// Fails with [`ExchangeError::PeerUnreachable`] without touching the
    /// transport unless `state` is `ActivatedReachable`. Never retries.
    pub fn send(
        &self,
        state: SessionState,
        color: &ColorPayload,
        timeout: Duration,
    ) -> ExchangeResult {
        if !state.is_reachable() {
            debug!(%state, color = %color.name, "send refused; peer not reachable");
            return Err(ExchangeError::PeerUnreachable);
        }

        let raw = self
            .session
            .send_message(payload::encode(color), timeout)
            .inspect_err(|err| warn!(color = %color.name, error = %err, "send failed"))?;
        let reply = Reply::from_map(&raw).map_err(ExchangeError::Transport)?;

        info!(
            color = %color.name,
            status = reply.status.as_str(),
            "peer replied"
        );
        Ok(reply)
    }
}

/// Handle one map from the peer and build the reply to send back.
///
/// A decodable payload becomes the sink's current color; anything else is
/// answered with an error status and leaves the sink untouched.
pub fn on_message_received(message: &TransportMap, sink: &StateSink) -> TransportMap {
    match payload::decode(message) {
        Ok(color) => {
            info!(color = %color.name, hex = %color.to_hex(), "color received");
            sink.apply_color(color);
            Reply::color_updated().to_map()
        }
        Err(err) => {
            warn!(error = %err, "rejecting malformed color payload");
            Reply::invalid_color(err).to_map()
        }
    }
}

/// [`on_message_received`] followed by the one reply the message is owed.
pub fn handle_incoming(incoming: IncomingMessage, sink: &StateSink) {
    let IncomingMessage { message, responder } = incoming;
    let reply = on_message_received(&message, sink);
    responder.send(reply);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    use serde_json::{json, Value};

    use super::*;
    use crate::error::{LinkError, Result};
    use crate::reply::ReplyStatus;
    use crate::session::{Responder, SessionDelegate};

    /// Answers every message with a canned reply and counts calls.
    struct Canned {
        reply: std::result::Result<TransportMap, fn() -> LinkError>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn replying(reply: TransportMap) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(err: fn() -> LinkError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(err),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl PairedSession for Canned {
        fn activate(&self, delegate: SessionDelegate) -> Result<()> {
            delegate.activation_complete(true, true, None);
            Ok(())
        }

        fn is_reachable(&self) -> bool {
            true
        }

        fn send_message(&self, _message: TransportMap, _timeout: Duration) -> Result<TransportMap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(map) => Ok(map.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn red() -> ColorPayload {
        ColorPayload::new("紅色", 1.0, 0.0, 0.0, 1.0)
    }

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn send_refused_unless_reachable() {
        let session = Canned::replying(Reply::color_updated().to_map());
        let exchange = Exchange::new(Arc::clone(&session));
        for state in [
            SessionState::NotActivated,
            SessionState::Activating,
            SessionState::Inactive,
            SessionState::ActivatedUnreachable,
        ] {
            assert!(matches!(
                exchange.send(state, &red(), TIMEOUT),
                Err(ExchangeError::PeerUnreachable)
            ));
        }
        assert_eq!(session.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reachable_send_returns_the_reply() {
        let session = Canned::replying(Reply::color_updated().to_map());
        let exchange = Exchange::new(Arc::clone(&session));
        let reply = exchange
            .send(SessionState::ActivatedReachable, &red(), TIMEOUT)
            .unwrap();
        assert!(reply.is_success());
        assert_eq!(session.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transport_failures_are_not_retried() {
        let session = Canned::failing(|| LinkError::Timeout(TIMEOUT));
        let exchange = Exchange::new(Arc::clone(&session));
        let result = exchange.send(SessionState::ActivatedReachable, &red(), TIMEOUT);
        assert!(matches!(
            result,
            Err(ExchangeError::Transport(LinkError::Timeout(_)))
        ));
        assert_eq!(session.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn garbage_reply_is_a_transport_error() {
        let mut garbage = TransportMap::new();
        garbage.insert("status".into(), json!("maybe"));
        let exchange = Exchange::new(Canned::replying(garbage));
        assert!(matches!(
            exchange.send(SessionState::ActivatedReachable, &red(), TIMEOUT),
            Err(ExchangeError::Transport(LinkError::Protocol(_)))
        ));
    }

    #[test]
    fn received_color_updates_sink_and_replies_success() {
        let sink = StateSink::spawn("exchange-test").unwrap();
        let reply = on_message_received(&payload::encode(&red()), &sink);
        assert_eq!(reply["status"], json!("success"));
        assert_eq!(sink.snapshot().unwrap().current_color, red());
    }

    #[test]
    fn malformed_message_replies_error_without_mutation() {
        let sink = StateSink::spawn("exchange-test").unwrap();
        let mut message = payload::encode(&red());
        message.insert("green".into(), Value::String("0".into()));

        let reply = Reply::from_map(&on_message_received(&message, &sink)).unwrap();
        assert_eq!(reply.status, ReplyStatus::Error);
        assert!(reply.message.starts_with("invalid color data"));
        assert_eq!(
            sink.snapshot().unwrap().current_color,
            ColorPayload::placeholder()
        );
    }

    #[test]
    fn handle_incoming_answers_once() {
        let sink = StateSink::spawn("exchange-test").unwrap();
        let (tx, rx) = mpsc::channel();
        let incoming = IncomingMessage::new(
            payload::encode(&red()),
            Responder::new(move |reply| tx.send(reply).unwrap()),
        );
        handle_incoming(incoming, &sink);

        assert_eq!(rx.recv().unwrap()["status"], json!("success"));
        assert!(rx.recv().is_err());
    }
}
