use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pairlink_frame::{
    kind_name, Frame, FrameConfig, FrameError, FrameReader, FrameWriter, CONTROL, MESSAGE, REPLY,
};
use pairlink_transport::{LinkStream, UnixDomainSocket};
use tracing::{debug, info, trace, warn};

use crate::error::{LinkError, Result};
use crate::link::handshake::{hello_accept, hello_connect, HelloOutcome};
use crate::link::{LinkConfig, LinkRole};
use crate::payload::TransportMap;
use crate::reply::Reply;
use crate::session::{IncomingMessage, PairedSession, Responder, SessionDelegate};

type ReplySlot = Sender<Result<TransportMap>>;

/// [`PairedSession`] over a Unix domain socket.
///
/// Nothing happens on the socket until the session is activated; from then
/// on a background thread owns the connection, answers the hello, and
/// dispatches frames. The listening side keeps accepting after a peer
/// leaves; the connecting side keeps reconnecting.
pub struct SocketSession {
    inner: Arc<Inner>,
    link: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    role: LinkRole,
    path: PathBuf,
    config: LinkConfig,
    listener: Option<UnixDomainSocket>,
    delegate: Mutex<Option<SessionDelegate>>,
    /// Stream of the connection being set up or served, kept for shutdown.
    current: Mutex<Option<LinkStream>>,
    /// Present once the hello has completed.
    writer: Mutex<Option<FrameWriter<LinkStream>>>,
    pending: Mutex<HashMap<u32, ReplySlot>>,
    next_id: AtomicU32,
    activated: AtomicBool,
    peer_app_installed: AtomicBool,
    closed: AtomicBool,
}

impl SocketSession {
    /// Bind `path` now; accept peers once activated.
    pub fn listen(path: impl AsRef<Path>, config: LinkConfig) -> Result<Self> {
        let listener = UnixDomainSocket::bind(path.as_ref())?;
        Ok(Self::new(
            LinkRole::Listen,
            listener.path().to_path_buf(),
            config,
            Some(listener),
        ))
    }

    /// Connect to `path` once activated, retrying until a listener is there.
    pub fn connect(path: impl AsRef<Path>, config: LinkConfig) -> Self {
        Self::new(LinkRole::Connect, path.as_ref().to_path_buf(), config, None)
    }

    fn new(
        role: LinkRole,
        path: PathBuf,
        config: LinkConfig,
        listener: Option<UnixDomainSocket>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                role,
                path,
                config,
                listener,
                delegate: Mutex::new(None),
                current: Mutex::new(None),
                writer: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU32::new(1),
                activated: AtomicBool::new(false),
                peer_app_installed: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
            link: Mutex::new(None),
        }
    }

    pub fn role(&self) -> LinkRole {
        self.inner.role
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// The peer's install flag from the last hello, if any hello completed.
    pub fn peer_app_installed(&self) -> Option<bool> {
        self.inner
            .activated
            .load(Ordering::Acquire)
            .then(|| self.inner.peer_app_installed.load(Ordering::Acquire))
    }
}

impl PairedSession for SocketSession {
    fn activate(&self, delegate: SessionDelegate) -> Result<()> {
        *lock(&self.inner.delegate) = Some(delegate.clone());

        if self.inner.activated.load(Ordering::Acquire) {
            delegate.activation_complete(
                true,
                self.inner.peer_app_installed.load(Ordering::Acquire),
                None,
            );
            return Ok(());
        }

        let mut link = lock(&self.link);
        if link.is_some() {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name(format!("pairlink-link-{}", role_name(self.inner.role)))
            .spawn(move || inner.run())
            .map_err(|err| LinkError::Failed(format!("failed to start link thread: {err}")))?;
        *link = Some(handle);
        Ok(())
    }

    fn is_reachable(&self) -> bool {
        lock(&self.inner.writer).is_some()
    }

    fn send_message(&self, message: TransportMap, timeout: Duration) -> Result<TransportMap> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::to_vec(&message)?;
        let (slot, reply) = mpsc::channel();
        lock(&self.inner.pending).insert(id, slot);

        if let Err(err) = self.inner.write(MESSAGE, id, &payload) {
            lock(&self.inner.pending).remove(&id);
            return Err(err);
        }
        trace!(id, "message sent; awaiting reply");

        match reply.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                lock(&self.inner.pending).remove(&id);
                Err(LinkError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(LinkError::Disconnected(
                "connection closed before the reply arrived".to_string(),
            )),
        }
    }
}

impl Drop for SocketSession {
    fn drop(&mut self) {
        self.inner.closed.store(true, Ordering::Release);
        if let Some(stream) = lock(&self.inner.current).as_ref() {
            let _ = stream.shutdown();
        }
        let Some(handle) = lock(&self.link).take() else {
            return;
        };
        if self.inner.role == LinkRole::Listen {
            // Wake the blocking accept.
            let _ = UnixDomainSocket::connect(&self.inner.path);
        }
        if handle.join().is_err() {
            warn!(path = ?self.inner.path, "link thread panicked");
        }
    }
}

impl std::fmt::Debug for SocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSession")
            .field("role", &self.inner.role)
            .field("path", &self.inner.path)
            .field("reachable", &self.is_reachable())
            .finish()
    }
}

impl Inner {
    fn run(self: Arc<Self>) {
        while !self.is_closed() {
            let stream = match self.next_stream() {
                Ok(stream) => stream,
                Err(err) => {
                    if self.is_closed() {
                        break;
                    }
                    debug!(path = ?self.path, error = %err, "no peer yet");
                    thread::sleep(self.config.reconnect_interval);
                    continue;
                }
            };
            if self.is_closed() {
                break;
            }

            match self.establish(stream) {
                Ok(reader) => self.serve(reader),
                Err(err) if self.is_closed() => {
                    debug!(error = %err, "hello interrupted by shutdown");
                }
                Err(err) => {
                    warn!(path = ?self.path, error = %err, "peer hello failed");
                    lock(&self.current).take();
                    if self.role == LinkRole::Connect {
                        if !self.activated.load(Ordering::Acquire) {
                            if let Some(delegate) = self.delegate() {
                                delegate.activation_complete(false, false, Some(err.to_string()));
                            }
                        }
                        break;
                    }
                }
            }
        }
        debug!(path = ?self.path, "link thread exiting");
    }

    fn next_stream(&self) -> Result<LinkStream> {
        let stream = match &self.listener {
            Some(listener) => listener.accept()?,
            None => UnixDomainSocket::connect(&self.path)?,
        };
        *lock(&self.current) = Some(stream.try_clone()?);
        Ok(stream)
    }

    fn establish(&self, stream: LinkStream) -> Result<FrameReader<LinkStream>> {
        let frame_config = FrameConfig {
            max_payload_size: self.config.max_payload_size,
            read_timeout: Some(self.config.handshake_timeout),
            write_timeout: Some(self.config.write_timeout),
        };
        let mut reader = FrameReader::for_stream(stream.try_clone()?, frame_config.clone())?;
        let mut writer = FrameWriter::for_stream(stream, frame_config)?;

        let HelloOutcome {
            peer_version,
            peer_app_installed,
        } = match self.role {
            LinkRole::Connect => hello_connect(&mut reader, &mut writer, &self.config)?,
            LinkRole::Listen => hello_accept(&mut reader, &mut writer, &self.config)?,
        };
        reader.set_read_timeout(Some(self.config.poll_interval))?;
        *lock(&self.writer) = Some(writer);
        let previous_app_installed = self
            .peer_app_installed
            .swap(peer_app_installed, Ordering::AcqRel);
        info!(path = ?self.path, %peer_version, peer_app_installed, "peer link established");

        let first = !self.activated.swap(true, Ordering::AcqRel);
        let Some(delegate) = self.delegate() else {
            return Ok(reader);
        };
        if first {
            delegate.activation_complete(true, peer_app_installed, None);
        } else if previous_app_installed != peer_app_installed {
            // A different companion install state needs a fresh activation;
            // `activate` then reports the new flag.
            info!(peer_app_installed, "peer install state changed; reactivating");
            delegate.became_inactive();
            delegate.deactivated();
        } else {
            delegate.reachability_changed(true);
        }
        Ok(reader)
    }

    fn serve(self: &Arc<Self>, mut reader: FrameReader<LinkStream>) {
        loop {
            if self.is_closed() {
                break;
            }
            match reader.read_frame() {
                Ok(frame) => self.dispatch(frame),
                Err(FrameError::Io(err))
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(FrameError::ConnectionClosed) => {
                    info!(path = ?self.path, "peer disconnected");
                    break;
                }
                Err(err) => {
                    warn!(path = ?self.path, error = %err, "link read failed; dropping connection");
                    break;
                }
            }
        }
        self.drop_connection();
    }

    fn dispatch(self: &Arc<Self>, frame: Frame) {
        match frame.kind {
            MESSAGE => self.on_message(frame),
            REPLY => {
                let Some(slot) = lock(&self.pending).remove(&frame.id) else {
                    debug!(id = frame.id, "reply for unknown or expired message");
                    return;
                };
                let parsed = serde_json::from_slice::<TransportMap>(&frame.payload)
                    .map_err(|err| LinkError::Protocol(format!("reply is not a JSON object: {err}")));
                let _ = slot.send(parsed);
            }
            CONTROL => debug!("ignoring control frame after hello"),
            other => warn!(kind = other, name = kind_name(other), "unexpected frame kind"),
        }
    }

    fn on_message(self: &Arc<Self>, frame: Frame) {
        let id = frame.id;
        let message = match serde_json::from_slice::<TransportMap>(&frame.payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(id, error = %err, "message is not a JSON object");
                let reply = Reply::error("message is not a JSON object").to_map();
                if let Err(err) = self.write_map(REPLY, id, &reply) {
                    warn!(id, error = %err, "failed to answer malformed message");
                }
                return;
            }
        };

        let link: Weak<Inner> = Arc::downgrade(self);
        let responder = Responder::new(move |reply| {
            let Some(link) = link.upgrade() else {
                return;
            };
            if let Err(err) = link.write_map(REPLY, id, &reply) {
                warn!(id, error = %err, "failed to send reply");
            }
        });
        match self.delegate() {
            Some(delegate) => delegate.message_received(IncomingMessage::new(message, responder)),
            None => debug!(id, "no delegate attached; message answered by drop"),
        }
    }

    fn drop_connection(&self) {
        lock(&self.writer).take();
        if let Some(stream) = lock(&self.current).take() {
            let _ = stream.shutdown();
        }
        // Dropping the slots wakes every waiting sender.
        lock(&self.pending).clear();
        if !self.is_closed() {
            if let Some(delegate) = self.delegate() {
                delegate.reachability_changed(false);
            }
        }
    }

    /// A failed write may have left part of a frame on the wire, so the
    /// connection is torn down rather than reused.
    fn write(&self, kind: u16, id: u32, payload: &[u8]) -> Result<()> {
        let mut slot = lock(&self.writer);
        let writer = slot.as_mut().ok_or(LinkError::NotReachable)?;
        match writer.send(kind, id, payload) {
            Ok(()) => Ok(()),
            Err(err @ (FrameError::Io(_) | FrameError::ConnectionClosed)) => {
                warn!(path = ?self.path, error = %err, "write failed; dropping connection");
                slot.take();
                if let Some(stream) = lock(&self.current).as_ref() {
                    let _ = stream.shutdown();
                }
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn write_map(&self, kind: u16, id: u32, map: &TransportMap) -> Result<()> {
        let payload = serde_json::to_vec(map)?;
        self.write(kind, id, &payload)
    }

    fn delegate(&self) -> Option<SessionDelegate> {
        lock(&self.delegate).clone()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn role_name(role: LinkRole) -> &'static str {
    match role {
        LinkRole::Listen => "listen",
        LinkRole::Connect => "connect",
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
