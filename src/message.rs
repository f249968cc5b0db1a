//! AMI message representation and wire serialization

use crate::constants::LINE_TERMINATOR;
use crate::error::{AmiError, AmiResult};
use crate::headers::AmiHeader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// Validate a user-provided header key.
///
/// AMI is line-delimited with colon-separated fields; an embedded newline or
/// colon would let a caller inject protocol lines.
fn validate_key(key: &str) -> AmiResult<()> {
    if key.is_empty() {
        return Err(AmiError::invalid_argument("header key must not be empty"));
    }
    if !key.is_ascii() {
        return Err(AmiError::invalid_argument(format!(
            "header key {key:?} must be ASCII"
        )));
    }
    if key.contains(':') || key.contains('\r') || key.contains('\n') {
        return Err(AmiError::invalid_argument(format!(
            "header key {key:?} must not contain colons or newlines"
        )));
    }
    Ok(())
}

/// Validate a user-provided header value. Values are arbitrary UTF-8
/// excluding CR and LF.
fn validate_value(value: &str) -> AmiResult<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(AmiError::invalid_argument(
            "header value must not contain CR or LF",
        ));
    }
    Ok(())
}

/// One AMI message: an ordered sequence of `(key, value)` header fields.
///
/// Field order is preserved verbatim across serialization round-trips. Key
/// lookups compare ASCII-case-insensitively; the original spelling is kept
/// for the wire.
///
/// Every message built through [`AmiMessage::new`] or [`AmiMessage::action`]
/// carries an auto-assigned `ActionID` (a fresh UUID in canonical text form)
/// which the caller may overwrite with [`set`](AmiMessage::set).
///
/// ```
/// use asterisk_ami_tokio::{AmiHeader, AmiMessage};
///
/// let mut ping = AmiMessage::action("Ping").unwrap();
/// assert_eq!(ping.get(AmiHeader::Action), Some("Ping"));
/// assert!(ping.action_id().is_some());
///
/// ping.set(AmiHeader::ActionId, "my-correlation-id").unwrap();
/// assert_eq!(ping.action_id(), Some("my-correlation-id"));
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct AmiMessage {
    fields: Vec<(String, String)>,
    created: SystemTime,
}

impl AmiMessage {
    fn empty() -> Self {
        Self {
            fields: Vec::new(),
            created: SystemTime::now(),
        }
    }

    /// Create an empty message with an auto-assigned `ActionID`.
    pub fn new() -> Self {
        let mut message = Self::empty();
        message
            .fields
            .push((
                AmiHeader::ActionId
                    .as_str()
                    .to_string(),
                Uuid::new_v4().to_string(),
            ));
        message
    }

    /// Create a message with `Action: <name>` and an auto-assigned `ActionID`.
    pub fn action(name: impl AsRef<str>) -> AmiResult<Self> {
        let name = name.as_ref();
        validate_value(name)?;
        let mut message = Self::empty();
        message
            .fields
            .push((
                AmiHeader::Action
                    .as_str()
                    .to_string(),
                name.to_string(),
            ));
        message
            .fields
            .push((
                AmiHeader::ActionId
                    .as_str()
                    .to_string(),
                Uuid::new_v4().to_string(),
            ));
        Ok(message)
    }

    /// First field whose key matches (ASCII-case-insensitive).
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replace the first case-insensitive match, or append if absent.
    ///
    /// The replacing key keeps the caller's spelling.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> AmiResult<()> {
        let key = key.as_ref();
        let value = value.as_ref();
        validate_key(key)?;
        validate_value(value)?;
        match self
            .fields
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(field) => *field = (key.to_string(), value.to_string()),
            None => self
                .fields
                .push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Append a field unconditionally.
    ///
    /// AMI actions may repeat keys (`Variable:` lines on `Originate`); `push`
    /// never replaces an existing field.
    pub fn push(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> AmiResult<()> {
        let key = key.as_ref();
        let value = value.as_ref();
        validate_key(key)?;
        validate_value(value)?;
        self.fields
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    /// Remove the first case-insensitive match, returning its value.
    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<String> {
        let key = key.as_ref();
        let pos = self
            .fields
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(
            self.fields
                .remove(pos)
                .1,
        )
    }

    /// All fields in wire order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields
            .len()
    }

    /// Whether the message has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields
            .is_empty()
    }

    /// When this message object was created (parse time for inbound messages).
    pub fn created(&self) -> SystemTime {
        self.created
    }

    /// Key of the first field, used for response/event discrimination.
    pub fn first_key(&self) -> Option<&str> {
        self.fields
            .first()
            .map(|(k, _)| k.as_str())
    }

    /// Whether the **first** field's key is `Response`.
    ///
    /// Only such messages are eligible for response correlation; event frames
    /// that merely carry an `ActionID` (as list-producing actions emit) stay
    /// on the event path.
    pub fn is_response(&self) -> bool {
        self.first_key()
            .is_some_and(|k| k.eq_ignore_ascii_case(AmiHeader::Response.as_str()))
    }

    /// Whether the first field's key is `Event`.
    pub fn is_event(&self) -> bool {
        self.first_key()
            .is_some_and(|k| k.eq_ignore_ascii_case(AmiHeader::Event.as_str()))
    }

    /// The `ActionID` correlation token, if present.
    pub fn action_id(&self) -> Option<&str> {
        self.get(AmiHeader::ActionId)
    }

    /// The `Response` header value (`Success`, `Error`, `Goodbye`, ...).
    pub fn response(&self) -> Option<&str> {
        self.get(AmiHeader::Response)
    }

    /// The `Event` header value (`FullyBooted`, `Newchannel`, ...).
    pub fn event(&self) -> Option<&str> {
        self.get(AmiHeader::Event)
    }

    /// The human-readable `Message` header value.
    pub fn message(&self) -> Option<&str> {
        self.get(AmiHeader::Message)
    }

    /// `true` if the `Response` header equals `Success` (case-insensitive).
    pub fn is_success(&self) -> bool {
        self.response()
            .is_some_and(|r| r.eq_ignore_ascii_case("Success"))
    }

    /// Serialize to the wire format: `key: value\r\n` per field, then a
    /// terminating blank line. Values are emitted verbatim.
    pub fn to_bytes(&self) -> Vec<u8> {
        use std::fmt::Write;
        let mut out = String::with_capacity(
            self.fields
                .iter()
                .map(|(k, v)| k.len() + v.len() + 4)
                .sum::<usize>()
                + 2,
        );
        for (key, value) in &self.fields {
            let _ = write!(out, "{key}: {value}{LINE_TERMINATOR}");
        }
        out.push_str(LINE_TERMINATOR);
        out.into_bytes()
    }

    /// Parse one message from its wire form.
    ///
    /// Consumes `key: value` CRLF lines until the terminating blank line.
    /// A missing terminator is `Malformed("unterminated message")`; a line
    /// without a colon is `Malformed("malformed field on line N")`. A single
    /// space after the colon is stripped when present, so values round-trip
    /// byte-for-byte; a bare `key:value` is accepted too.
    pub fn from_bytes(bytes: &[u8]) -> AmiResult<Self> {
        let mut fields = Vec::new();
        let mut rest = bytes;
        let mut line_number = 0usize;

        loop {
            let Some(crlf) = find_crlf(rest) else {
                return Err(AmiError::malformed("unterminated message"));
            };
            let line = &rest[..crlf];
            rest = &rest[crlf + 2..];
            line_number += 1;

            if line.is_empty() {
                return Ok(Self {
                    fields,
                    created: SystemTime::now(),
                });
            }

            let text = std::str::from_utf8(line).map_err(|_| {
                AmiError::malformed(format!("invalid UTF-8 on line {line_number}"))
            })?;
            let Some(colon) = text.find(':') else {
                return Err(AmiError::malformed(format!(
                    "malformed field on line {line_number}"
                )));
            };
            let key = &text[..colon];
            let value = text[colon + 1..]
                .strip_prefix(' ')
                .unwrap_or(&text[colon + 1..]);
            fields.push((key.to_string(), value.to_string()));
        }
    }
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(2)
        .position(|w| w == LINE_TERMINATOR.as_bytes())
}

impl Default for AmiMessage {
    fn default() -> Self {
        Self::new()
    }
}

/// Field comparison only; the creation timestamp is metadata.
impl PartialEq for AmiMessage {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for AmiMessage {}

impl fmt::Debug for AmiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.fields {
            if key.eq_ignore_ascii_case(AmiHeader::Secret.as_str())
                || key.eq_ignore_ascii_case(AmiHeader::Key.as_str())
            {
                map.entry(key, &"[REDACTED]");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}
