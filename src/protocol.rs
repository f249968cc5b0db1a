//! AMI wire framing: CRLF line reading and frame assembly

use crate::constants::{BANNER_PREFIX, LINE_TERMINATOR, MAX_BUFFER_SIZE, MAX_LINE_SIZE, READ_CHUNK};
use crate::error::{AmiError, AmiResult};
use crate::message::AmiMessage;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Synchronous byte-level observer (`DataSent`/`DataReceived`).
pub(crate) type DataHook = dyn Fn(&[u8]) + Send + Sync;

/// Set-once hook slot shared between the client handle and the worker.
pub(crate) type SharedDataHook = Arc<Mutex<Option<Arc<DataHook>>>>;

pub(crate) fn new_hook_slot() -> SharedDataHook {
    Arc::new(Mutex::new(None))
}

/// Incremental CRLF line reader over an async byte stream.
///
/// Buffers partial reads; each [`next_line`](LineReader::next_line) call
/// returns one line **including** its CRLF terminator, which keeps the
/// downstream blank-line check a plain slice comparison.
pub(crate) struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    /// Bytes before this offset are known CRLF-free, so the scan resumes here.
    scan_from: usize,
    data_received: Option<SharedDataHook>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, data_received: Option<SharedDataHook>) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(READ_CHUNK),
            scan_from: 0,
            data_received,
        }
    }

    /// The next CRLF-terminated line, terminator included.
    ///
    /// Returns `Ok(None)` on EOF at a line boundary. EOF with buffered bytes
    /// is a framing violation. `Interrupted` and `TimedOut` reads are retried
    /// without surfacing.
    pub async fn next_line(&mut self) -> AmiResult<Option<Vec<u8>>> {
        loop {
            if let Some(pos) = find_crlf_from(&self.buf, self.scan_from) {
                let line: Vec<u8> = self
                    .buf
                    .drain(..pos + 2)
                    .collect();
                self.scan_from = 0;
                return Ok(Some(line));
            }
            // a trailing '\r' may pair with the next chunk's '\n'
            self.scan_from = self
                .buf
                .len()
                .saturating_sub(1);

            if self
                .buf
                .len()
                > MAX_LINE_SIZE
            {
                return Err(AmiError::malformed("header line exceeds size limit"));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = match self
                .inner
                .read(&mut chunk)
                .await
            {
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    trace!("transient read error, retrying: {e}");
                    continue;
                }
                Err(e) => return Err(AmiError::Io(e)),
            };

            if n == 0 {
                if self
                    .buf
                    .is_empty()
                {
                    return Ok(None);
                }
                return Err(AmiError::malformed("unexpected EOF"));
            }

            trace!("read {n} bytes from stream");
            if let Some(slot) = &self.data_received {
                let hook = slot
                    .lock()
                    .clone();
                if let Some(hook) = hook {
                    hook(&chunk[..n]);
                }
            }

            self.buf
                .extend_from_slice(&chunk[..n]);
            if self
                .buf
                .len()
                > MAX_BUFFER_SIZE
            {
                return Err(AmiError::malformed("inbound buffer exceeds size limit"));
            }
        }
    }
}

fn find_crlf_from(buf: &[u8], from: usize) -> Option<usize> {
    let from = from.min(buf.len());
    buf[from..]
        .windows(2)
        .position(|w| w == LINE_TERMINATOR.as_bytes())
        .map(|pos| pos + from)
}

/// Groups CRLF lines into blank-line-terminated message frames.
pub(crate) struct FrameAssembler {
    payload: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            payload: Vec::new(),
        }
    }

    /// Feed one raw line (CRLF included). Returns the parsed message when the
    /// line completes a frame.
    pub fn push_line(&mut self, line: &[u8]) -> AmiResult<Option<AmiMessage>> {
        self.payload
            .extend_from_slice(line);
        if self
            .payload
            .len()
            > MAX_BUFFER_SIZE
        {
            return Err(AmiError::malformed("message exceeds size limit"));
        }
        if line == LINE_TERMINATOR.as_bytes() {
            let message = AmiMessage::from_bytes(&self.payload)?;
            self.payload
                .clear();
            return Ok(Some(message));
        }
        Ok(None)
    }

    /// Whether a frame is partially accumulated.
    pub fn in_frame(&self) -> bool {
        !self
            .payload
            .is_empty()
    }

    /// Drive the reader until a whole message is available.
    ///
    /// `Ok(None)` on clean EOF at a frame boundary; EOF mid-frame is
    /// `Malformed("unexpected EOF")`.
    pub async fn next_message<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut LineReader<R>,
    ) -> AmiResult<Option<AmiMessage>> {
        loop {
            let Some(line) = reader
                .next_line()
                .await?
            else {
                if self.in_frame() {
                    return Err(AmiError::malformed("unexpected EOF"));
                }
                return Ok(None);
            };
            if let Some(message) = self.push_line(&line)? {
                return Ok(Some(message));
            }
        }
    }
}

/// Validate the server greeting (raw line, CRLF included) and return the
/// banner text with the terminator stripped.
///
/// The check is a case-insensitive prefix match on `Asterisk Call Manager`;
/// anything else - an empty line, an HTTP status line - is a handshake
/// failure.
pub(crate) fn parse_banner(line: &[u8]) -> AmiResult<String> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim_end_matches(LINE_TERMINATOR),
        Err(_) => {
            return Err(AmiError::Handshake {
                banner: String::from_utf8_lossy(line).into_owned(),
            })
        }
    };
    let prefix_match = text
        .get(..BANNER_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(BANNER_PREFIX));
    if text.is_empty() || !prefix_match {
        return Err(AmiError::Handshake {
            banner: text.to_string(),
        });
    }
    Ok(text.to_string())
}
