//! Typed header keys for AMI messages.

use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an unrecognized header key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAmiHeaderError(pub String);

impl fmt::Display for ParseAmiHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown AMI header: {}", self.0)
    }
}

impl std::error::Error for ParseAmiHeaderError {}

/// Declares [`AmiHeader`] with its canonical wire spellings in one place;
/// parsing walks the variant list case-insensitively.
macro_rules! ami_headers {
    ($($variant:ident: $wire:literal),+ $(,)?) => {
        /// Well-known header keys of the Asterisk Manager Interface.
        ///
        /// AMI compares keys case-insensitively on the wire; these carry the
        /// canonical spelling Asterisk emits. Use with
        /// [`AmiMessage::get()`](crate::AmiMessage::get) for typed lookups —
        /// anything not listed here can still be addressed as a plain string.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        #[allow(missing_docs)]
        pub enum AmiHeader {
            $($variant,)+
        }

        impl AmiHeader {
            const ALL: &'static [AmiHeader] = &[$(AmiHeader::$variant),+];

            /// Canonical wire spelling of this key.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(AmiHeader::$variant => $wire,)+
                }
            }
        }
    };
}

ami_headers! {
    Action: "Action",
    ActionId: "ActionID",
    Response: "Response",
    Event: "Event",
    Message: "Message",
    Username: "Username",
    Secret: "Secret",
    AuthType: "AuthType",
    Challenge: "Challenge",
    Key: "Key",
    EventList: "EventList",
    Events: "Events",
    Output: "Output",
    Variable: "Variable",
    Channel: "Channel",
    Uniqueid: "Uniqueid",
    Privilege: "Privilege",
    ListItems: "ListItems",
}

impl fmt::Display for AmiHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for AmiHeader {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for AmiHeader {
    type Err = ParseAmiHeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|header| s.eq_ignore_ascii_case(header.as_str()))
            .ok_or_else(|| ParseAmiHeaderError(s.to_string()))
    }
}
