//! Protocol constants and configuration values

/// Default Asterisk Manager Interface TCP port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Bytes requested from the stream per read when no complete line is buffered
pub const READ_CHUNK: usize = 4096;

/// Maximum length of a single header line. No legitimate AMI header comes
/// close (the longest are multi-kilobyte `Output` lines from command actions).
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Maximum total inbound buffer size. Indicates a bug or a non-AMI peer
/// if exceeded.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Protocol line terminator. A line consisting of CRLF alone terminates a
/// message frame.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Greeting prefix emitted by the server at connect, matched
/// case-insensitively (e.g. `Asterisk Call Manager/5.0.4`)
pub const BANNER_PREFIX: &str = "Asterisk Call Manager";

/// Maximum number of queued events per subscriber before dropping
pub const DEFAULT_EVENT_QUEUE_SIZE: usize = 1000;

/// Connection timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
