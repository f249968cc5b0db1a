//! Client lifecycle, publish/response correlation, and the reader worker

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::constants::{DEFAULT_EVENT_QUEUE_SIZE, DEFAULT_TIMEOUT_MS};
use crate::error::{AmiError, AmiResult, StopCause};
use crate::message::AmiMessage;
use crate::pending::{PendingTable, PublishOutcome};
use crate::protocol::{new_hook_slot, parse_banner, FrameAssembler, LineReader, SharedDataHook};
use crate::subscriber::{AmiEventStream, SubscriberSet};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Lifecycle status of an [`AmiClient`].
///
/// `Stopped` is emitted on the status watch exactly once per client; a
/// `None` cause means the stop was voluntary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientStatus {
    /// Created, [`start`](AmiClient::start) not yet called.
    Unstarted,
    /// Handshake complete, worker running.
    Running,
    /// Terminal state.
    Stopped(Option<StopCause>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Unstarted,
    Starting,
    Running,
    Stopped,
}

struct ClientInner {
    lifecycle: parking_lot::Mutex<Lifecycle>,
    /// Write half of the stream. Held across a whole-message write so
    /// concurrent publishers never interleave frames.
    writer: Mutex<Option<BoxedWriter>>,
    pending: PendingTable,
    subscribers: SubscriberSet,
    status_tx: watch::Sender<ClientStatus>,
    data_sent: SharedDataHook,
    data_received: SharedDataHook,
    banner: parking_lot::Mutex<Option<String>>,
    event_queue_size: usize,
}

/// Asterisk Manager Interface client (Clone + Send).
///
/// The client drives a single long-lived duplex stream: one background
/// worker task parses inbound frames and routes them, while any number of
/// tasks call [`publish`](AmiClient::publish) concurrently. Responses are
/// correlated to requests by `ActionID`; everything else fans out to
/// [`subscribe`](AmiClient::subscribe) streams.
///
/// The caller supplies the transport: any `AsyncRead + AsyncWrite` stream
/// works. The client never calls shutdown on it; stopping just drops the
/// client's halves of the stream.
///
/// ```rust,no_run
/// use asterisk_ami_tokio::{AmiClient, AmiError, AmiMessage};
///
/// #[tokio::main]
/// async fn main() -> Result<(), AmiError> {
///     let client = AmiClient::connect("127.0.0.1", 5038).await?;
///     client.login("admin", "secret").await?;
///
///     let mut events = client.subscribe()?;
///     let pong = client.publish(AmiMessage::action("Ping")?).await?;
///     println!("ping -> {:?}", pong.get("Ping"));
///
///     while let Some(Ok(event)) = events.recv().await {
///         println!("event: {:?}", event.event());
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct AmiClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiClient")
            .field("status", &self.status())
            .finish()
    }
}

impl Default for AmiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AmiClient {
    /// Create an unstarted client with default settings.
    pub fn new() -> Self {
        Self::with_event_queue_size(DEFAULT_EVENT_QUEUE_SIZE)
    }

    /// Create an unstarted client whose subscribers get queues of the given
    /// capacity.
    pub fn with_event_queue_size(event_queue_size: usize) -> Self {
        let (status_tx, _status_rx) = watch::channel(ClientStatus::Unstarted);
        Self {
            inner: Arc::new(ClientInner {
                lifecycle: parking_lot::Mutex::new(Lifecycle::Unstarted),
                writer: Mutex::new(None),
                pending: PendingTable::new(),
                subscribers: SubscriberSet::new(),
                status_tx,
                data_sent: new_hook_slot(),
                data_received: new_hook_slot(),
                banner: parking_lot::Mutex::new(None),
                event_queue_size: event_queue_size.max(1),
            }),
        }
    }

    /// Connect to an AMI server over TCP and start the client.
    ///
    /// Convenience over [`start`](AmiClient::start) for the common case; the
    /// connect attempt is bounded by a 2 second timeout.
    pub async fn connect(host: &str, port: u16) -> AmiResult<Self> {
        info!("connecting to AMI at {host}:{port}");
        let deadline = Duration::from_millis(DEFAULT_TIMEOUT_MS);
        let stream = timeout(deadline, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                warn!("TCP connect timed out after {DEFAULT_TIMEOUT_MS}ms");
                AmiError::Timeout {
                    timeout_ms: DEFAULT_TIMEOUT_MS,
                }
            })?
            .map_err(|e| {
                warn!("TCP connect failed: {e}");
                AmiError::Io(e)
            })?;
        debug!("TCP connection established");

        let client = Self::new();
        client
            .start(stream)
            .await?;
        Ok(client)
    }

    /// Take ownership of `stream`, validate the server greeting, and spawn
    /// the worker.
    ///
    /// Returns once the banner has been consumed, so a success here means
    /// the peer identified itself as an AMI server. On handshake failure the
    /// client transitions to `Stopped` and subsequent calls return
    /// [`AmiError::NotStarted`].
    ///
    /// Errors: [`AmiError::AlreadyStarted`] on a second call,
    /// [`AmiError::Handshake`] when the greeting is empty or does not begin
    /// (case-insensitively) with `Asterisk Call Manager`.
    pub async fn start<S>(&self, stream: S) -> AmiResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        {
            let mut lifecycle = self
                .inner
                .lifecycle
                .lock();
            if *lifecycle != Lifecycle::Unstarted {
                return Err(AmiError::AlreadyStarted);
            }
            *lifecycle = Lifecycle::Starting;
        }

        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = LineReader::new(
            Box::new(read_half) as BoxedReader,
            Some(
                self.inner
                    .data_received
                    .clone(),
            ),
        );

        // consume the banner synchronously; it never enters the assembler
        let banner = match reader
            .next_line()
            .await
        {
            Ok(Some(line)) => match parse_banner(&line) {
                Ok(banner) => banner,
                Err(e) => return self.fail_start(e).await,
            },
            Ok(None) => {
                return self
                    .fail_start(AmiError::Handshake {
                        banner: String::new(),
                    })
                    .await
            }
            Err(e) => return self.fail_start(e).await,
        };

        info!(banner = %banner, "AMI handshake complete");
        *self
            .inner
            .banner
            .lock() = Some(banner);
        *self
            .inner
            .writer
            .lock()
            .await = Some(Box::new(write_half));
        {
            let mut lifecycle = self
                .inner
                .lifecycle
                .lock();
            if *lifecycle != Lifecycle::Starting {
                // a concurrent stop() won the race; Stopped stays terminal
                drop(lifecycle);
                self.inner
                    .writer
                    .lock()
                    .await
                    .take();
                return Err(AmiError::NotStarted);
            }
            *lifecycle = Lifecycle::Running;
        }
        let _ = self
            .inner
            .status_tx
            .send(ClientStatus::Running);

        tokio::spawn(worker_loop(
            self.inner
                .clone(),
            reader,
        ));
        Ok(())
    }

    async fn fail_start(&self, error: AmiError) -> AmiResult<()> {
        warn!("handshake failed: {error}");
        let cause = match &error {
            AmiError::Handshake { banner } => StopCause::Handshake(banner.clone()),
            AmiError::Malformed { message } => StopCause::Malformed(message.clone()),
            AmiError::Io(e) => StopCause::Io(e.to_string()),
            other => StopCause::Io(other.to_string()),
        };
        stop_with(&self.inner, Some(cause)).await;
        Err(error)
    }

    /// Send an action and await its correlated response.
    ///
    /// The message must carry an `ActionID` (auto-assigned by
    /// [`AmiMessage::new`]) that is unique among requests currently in
    /// flight. The pending slot is registered **before** the bytes are
    /// written, so a response can never race past the correlation table; the
    /// whole serialized message is written under the stream's write lock, so
    /// concurrent publishers never interleave frames.
    ///
    /// No timeout is imposed here; wrap the call in
    /// [`tokio::time::timeout`] if the caller needs one.
    ///
    /// Errors: [`AmiError::NotStarted`], [`AmiError::InvalidArgument`] for a
    /// message without an `ActionID`, [`AmiError::DuplicateActionId`]
    /// (raised before anything is written), [`AmiError::Io`] on a write
    /// fault (which also stops the client and is replayed to every other
    /// pending caller and subscriber), [`AmiError::Cancelled`] /
    /// [`AmiError::Stopped`] when the client stops first.
    pub async fn publish(&self, message: AmiMessage) -> AmiResult<AmiMessage> {
        self.ensure_running()?;
        let action_id = message
            .action_id()
            .ok_or_else(|| AmiError::invalid_argument("message is missing an ActionID"))?
            .to_string();
        let bytes = message.to_bytes();

        let (slot_tx, slot_rx) = oneshot::channel();
        if !self
            .inner
            .pending
            .try_insert(&action_id, slot_tx)
        {
            return Err(AmiError::DuplicateActionId { action_id });
        }
        // removes the slot again if this future is dropped before an
        // outcome arrives, or on any early-return below
        let _guard = PendingGuard {
            pending: &self
                .inner
                .pending,
            action_id: &action_id,
        };

        let write_result = {
            let mut writer_slot = self
                .inner
                .writer
                .lock()
                .await;
            // recheck under the lock: a concurrent stop may have drained the
            // table between the insert above and this point
            if !self.is_running() {
                return Err(AmiError::NotStarted);
            }
            match writer_slot.as_mut() {
                None => return Err(AmiError::NotStarted),
                Some(writer) => match writer
                    .write_all(&bytes)
                    .await
                {
                    Ok(()) => writer
                        .flush()
                        .await,
                    Err(e) => Err(e),
                },
            }
        };

        if let Err(e) = write_result {
            warn!(action_id = %action_id, "write failed: {e}");
            stop_with(
                &self.inner,
                Some(StopCause::Io(e.to_string())),
            )
            .await;
            return Err(AmiError::Io(e));
        }

        fire_hook(
            &self
                .inner
                .data_sent,
            &bytes,
        );
        trace!(action_id = %action_id, "request written, awaiting response");

        match slot_rx.await {
            Ok(PublishOutcome::Response(response)) => Ok(response),
            Ok(PublishOutcome::Cancelled) => Err(AmiError::Cancelled),
            Ok(PublishOutcome::Failed(cause)) => Err(cause.to_error()),
            // sender vanished without an outcome; treat like a cancellation
            Err(_) => Err(AmiError::Cancelled),
        }
    }

    /// Register a subscriber for unsolicited events.
    ///
    /// The returned stream sees every message the worker routes to the event
    /// path, in wire order, until it is dropped or the client stops.
    pub fn subscribe(&self) -> AmiResult<AmiEventStream> {
        self.subscribe_with_capacity(
            self.inner
                .event_queue_size,
        )
    }

    /// Like [`subscribe`](AmiClient::subscribe) with an explicit queue
    /// capacity for this subscriber.
    pub fn subscribe_with_capacity(&self, capacity: usize) -> AmiResult<AmiEventStream> {
        self.ensure_running()?;
        Ok(self
            .inner
            .subscribers
            .add(capacity))
    }

    /// Stop the client. Idempotent.
    ///
    /// Pending `publish` callers resolve with [`AmiError::Cancelled`],
    /// subscribers complete normally, and the status watch emits
    /// `Stopped(None)`. The write half is released immediately; no shutdown
    /// is sent on the transport.
    pub async fn stop(&self) {
        info!("client requested stop");
        stop_with(&self.inner, None).await;
    }

    /// Observe outbound bytes: the hook fires synchronously from within
    /// `publish`, once per message, immediately after the write lock is
    /// released.
    pub fn on_data_sent(&self, hook: impl Fn(&[u8]) + Send + Sync + 'static) {
        *self
            .inner
            .data_sent
            .lock() = Some(Arc::new(hook));
    }

    /// Observe inbound bytes: the hook fires from the worker once per raw
    /// stream read (not per message).
    pub fn on_data_received(&self, hook: impl Fn(&[u8]) + Send + Sync + 'static) {
        *self
            .inner
            .data_received
            .lock() = Some(Arc::new(hook));
    }

    /// Current lifecycle status snapshot.
    pub fn status(&self) -> ClientStatus {
        self.inner
            .status_tx
            .borrow()
            .clone()
    }

    /// Watch lifecycle transitions. The terminal `Stopped(cause?)` value is
    /// sent exactly once per client.
    pub fn status_changes(&self) -> watch::Receiver<ClientStatus> {
        self.inner
            .status_tx
            .subscribe()
    }

    /// Whether the client is in the `Running` state.
    pub fn is_running(&self) -> bool {
        *self
            .inner
            .lifecycle
            .lock()
            == Lifecycle::Running
    }

    /// The greeting line consumed during the handshake, terminator stripped
    /// (e.g. `Asterisk Call Manager/5.0.4`).
    pub fn banner(&self) -> Option<String> {
        self.inner
            .banner
            .lock()
            .clone()
    }

    /// Number of events dropped because a subscriber queue was full.
    pub fn dropped_event_count(&self) -> u64 {
        self.inner
            .subscribers
            .dropped_event_count()
    }

    fn ensure_running(&self) -> AmiResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(AmiError::NotStarted)
        }
    }
}

struct PendingGuard<'a> {
    pending: &'a PendingTable,
    action_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // no-op when the slot was already taken by the worker or a drain
        drop(
            self.pending
                .try_take(self.action_id),
        );
    }
}

/// One-shot stop: only the first entry performs the drain.
async fn stop_with(inner: &Arc<ClientInner>, cause: Option<StopCause>) {
    {
        let mut lifecycle = inner
            .lifecycle
            .lock();
        if *lifecycle == Lifecycle::Stopped {
            return;
        }
        *lifecycle = Lifecycle::Stopped;
    }

    match &cause {
        None => info!("client stopped"),
        Some(cause) if cause.is_fault() => warn!("client stopped: {cause}"),
        Some(cause) => info!("client stopped: {cause}"),
    }

    let _ = inner
        .status_tx
        .send(ClientStatus::Stopped(cause.clone()));
    inner
        .pending
        .drain_with(cause.as_ref());
    inner
        .subscribers
        .dispatch_terminal(cause.as_ref());
    // release the stream reference; closing the transport is the caller's job
    inner
        .writer
        .lock()
        .await
        .take();
}

async fn worker_loop(inner: Arc<ClientInner>, reader: LineReader<BoxedReader>) {
    let result = std::panic::AssertUnwindSafe(worker_loop_inner(inner.clone(), reader));
    if futures_util::FutureExt::catch_unwind(result)
        .await
        .is_err()
    {
        tracing::error!("worker task panicked");
        stop_with(&inner, Some(StopCause::Io("worker task panicked".to_string()))).await;
    }
}

async fn worker_loop_inner(inner: Arc<ClientInner>, mut reader: LineReader<BoxedReader>) {
    let mut assembler = FrameAssembler::new();
    let mut status_rx = inner
        .status_tx
        .subscribe();

    loop {
        let next = tokio::select! {
            next = assembler.next_message(&mut reader) => next,
            _ = stopped(&mut status_rx) => {
                debug!("worker exiting after stop");
                return;
            }
        };

        match next {
            Ok(Some(message)) => dispatch(&inner, message),
            Ok(None) => {
                info!("connection closed (EOF)");
                stop_with(&inner, Some(StopCause::Eof)).await;
                return;
            }
            Err(e) => {
                warn!("worker fault: {e}");
                let cause = match e {
                    AmiError::Malformed { message } => StopCause::Malformed(message),
                    AmiError::Io(e) => StopCause::Io(e.to_string()),
                    other => StopCause::Io(other.to_string()),
                };
                stop_with(&inner, Some(cause)).await;
                return;
            }
        }
    }
}

async fn stopped(status_rx: &mut watch::Receiver<ClientStatus>) {
    loop {
        if matches!(*status_rx.borrow(), ClientStatus::Stopped(_)) {
            return;
        }
        if status_rx
            .changed()
            .await
            .is_err()
        {
            return;
        }
    }
}

/// Route one inbound message: response-correlation branch or event branch.
///
/// Only a message whose **first** field is `Response` and whose `ActionID`
/// has a pending slot completes that slot; everything else - events,
/// `Response` frames without a pending entry, list items carrying a request's
/// `ActionID` - flows to subscribers. Each slot completes at most once.
fn dispatch(inner: &ClientInner, message: AmiMessage) {
    if message.is_response() {
        if let Some(action_id) = message.action_id() {
            if let Some(slot) = inner
                .pending
                .try_take(action_id)
            {
                trace!(action_id = %action_id, "routing response to pending caller");
                // the publisher may have been dropped while we held the slot
                let _ = slot.send(PublishOutcome::Response(message));
                return;
            }
        }
    }
    trace!(
        first_key = message
            .first_key()
            .unwrap_or(""),
        "routing message to subscribers"
    );
    inner
        .subscribers
        .dispatch_next(&message);
}

fn fire_hook(slot: &SharedDataHook, bytes: &[u8]) {
    let hook = slot
        .lock()
        .clone();
    if let Some(hook) = hook {
        hook(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::AmiHeader;
    use tokio::io::AsyncReadExt;

    const BANNER: &[u8] = b"Asterisk Call Manager/5.0.4\r\n";

    async fn started_pair() -> (AmiClient, tokio::io::DuplexStream) {
        let (near, mut far) = tokio::io::duplex(4096);
        far.write_all(BANNER)
            .await
            .unwrap();
        let client = AmiClient::new();
        client
            .start(near)
            .await
            .unwrap();
        (client, far)
    }

    async fn read_frame(far: &mut tokio::io::DuplexStream) -> AmiMessage {
        let mut raw = Vec::new();
        let mut byte = [0u8; 1];
        while !raw.ends_with(b"\r\n\r\n") {
            far.read_exact(&mut byte)
                .await
                .unwrap();
            raw.push(byte[0]);
        }
        AmiMessage::from_bytes(&raw).unwrap()
    }

    #[tokio::test]
    async fn start_consumes_banner_and_runs() {
        let (client, _far) = started_pair().await;
        assert!(client.is_running());
        assert_eq!(client.status(), ClientStatus::Running);
        assert_eq!(
            client
                .banner()
                .as_deref(),
            Some("Asterisk Call Manager/5.0.4")
        );
    }

    #[tokio::test]
    async fn start_rejects_non_ami_greeting() {
        let (near, mut far) = tokio::io::duplex(4096);
        far.write_all(b"HTTP/1.1 200 OK\r\n")
            .await
            .unwrap();
        let client = AmiClient::new();
        let err = client
            .start(near)
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::Handshake { .. }));
        assert!(matches!(client.status(), ClientStatus::Stopped(_)));

        // the client is unusable afterwards
        let publish_err = client
            .publish(AmiMessage::action("Ping").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(publish_err, AmiError::NotStarted));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let (client, _far) = started_pair().await;
        let (near, _other) = tokio::io::duplex(64);
        let err = client
            .start(near)
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::AlreadyStarted));
    }

    #[tokio::test]
    async fn publish_before_start_is_not_started() {
        let client = AmiClient::new();
        let err = client
            .publish(AmiMessage::action("Ping").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::NotStarted));
        assert!(client
            .subscribe()
            .is_err());
    }

    #[tokio::test]
    async fn publish_correlates_response() {
        let (client, mut far) = started_pair().await;

        let server = tokio::spawn(async move {
            let request = read_frame(&mut far).await;
            let action_id = request
                .action_id()
                .unwrap();
            let reply =
                format!("Response: Success\r\nActionID: {action_id}\r\nPing: Pong\r\n\r\n");
            far.write_all(reply.as_bytes())
                .await
                .unwrap();
            far
        });

        let response = client
            .publish(AmiMessage::action("Ping").unwrap())
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.get("Ping"), Some("Pong"));
        server
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn publish_requires_action_id() {
        let (client, _far) = started_pair().await;
        let mut message = AmiMessage::action("Ping").unwrap();
        message.remove(AmiHeader::ActionId);
        let err = client
            .publish(message)
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_cancels_pending() {
        let (client, _far) = started_pair().await;

        let pending = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .publish(AmiMessage::action("Ping").unwrap())
                    .await
            })
        };
        // let the publish register and write before stopping
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        client
            .stop()
            .await;
        client
            .stop()
            .await;

        let err = pending
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, AmiError::Cancelled));
        assert_eq!(client.status(), ClientStatus::Stopped(None));
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn clean_eof_cancels_and_completes() {
        let (client, far) = started_pair().await;
        let mut events = client
            .subscribe()
            .unwrap();

        let pending = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .publish(AmiMessage::action("Ping").unwrap())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(far); // half-close: worker sees EOF at a frame boundary

        let err = pending
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, AmiError::Cancelled));
        assert!(events
            .recv()
            .await
            .is_none());
        assert_eq!(
            client.status(),
            ClientStatus::Stopped(Some(StopCause::Eof))
        );
    }

    #[tokio::test]
    async fn eof_mid_frame_is_a_fault() {
        let (client, mut far) = started_pair().await;
        let mut events = client
            .subscribe()
            .unwrap();

        far.write_all(b"Event: Newchannel\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(far);

        match events
            .recv()
            .await
        {
            Some(Err(AmiError::Malformed { message })) => {
                assert_eq!(message, "unexpected EOF")
            }
            other => panic!("expected Malformed terminal, got {other:?}"),
        }
        assert!(events
            .recv()
            .await
            .is_none());
        assert!(matches!(
            client.status(),
            ClientStatus::Stopped(Some(StopCause::Malformed(_)))
        ));
    }

    #[tokio::test]
    async fn data_hooks_fire() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (near, mut far) = tokio::io::duplex(4096);
        far.write_all(BANNER)
            .await
            .unwrap();
        let client = AmiClient::new();
        let sent = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(AtomicUsize::new(0));
        {
            let sent = sent.clone();
            client.on_data_sent(move |bytes| {
                sent.fetch_add(bytes.len(), Ordering::Relaxed);
            });
            let received = received.clone();
            client.on_data_received(move |bytes| {
                received.fetch_add(bytes.len(), Ordering::Relaxed);
            });
        }
        client
            .start(near)
            .await
            .unwrap();
        // the banner itself is inbound data
        assert_eq!(received.load(Ordering::Relaxed), BANNER.len());

        let server = tokio::spawn(async move {
            let request = read_frame(&mut far).await;
            let reply = format!(
                "Response: Success\r\nActionID: {}\r\n\r\n",
                request
                    .action_id()
                    .unwrap()
            );
            far.write_all(reply.as_bytes())
                .await
                .unwrap();
            far
        });

        let message = AmiMessage::action("Ping").unwrap();
        let wire_len = message
            .to_bytes()
            .len();
        client
            .publish(message)
            .await
            .unwrap();
        assert_eq!(sent.load(Ordering::Relaxed), wire_len);
        assert!(received.load(Ordering::Relaxed) > BANNER.len());
        server
            .await
            .unwrap();
    }
}
