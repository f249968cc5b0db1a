//! Asterisk Manager Interface (AMI) client for Rust
//!
//! This crate provides an async Rust client for the Asterisk Management
//! Interface, the line-oriented TCP control protocol of the Asterisk
//! telephony server. It maintains one long-lived duplex connection,
//! serializes outbound actions, parses inbound frames, correlates responses
//! to their originating actions by `ActionID`, and fans out unsolicited
//! events to any number of subscribers.
//!
//! # Architecture
//!
//! The client uses a split reader/writer design:
//! - [`AmiClient`] (Clone + Send) — publish actions from any task
//! - [`AmiEventStream`] — receive events from a background worker task
//!
//! Responses are matched to requests only when the **first** header of a
//! frame is `Response`; event frames that happen to carry an `ActionID` (as
//! Asterisk emits for list-producing actions) flow to subscribers. Each
//! request gets exactly one response.
//!
//! The caller supplies the transport: any `AsyncRead + AsyncWrite` stream
//! works, from a plain `TcpStream` to an in-memory duplex in tests. The
//! client never calls shutdown on it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiError, AmiMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let client = AmiClient::connect("127.0.0.1", 5038).await?;
//!     client.login("admin", "secret").await?;
//!
//!     let response = client.publish(AmiMessage::action("CoreStatus")?).await?;
//!     println!("uptime: {:?}", response.get("CoreStartupTime"));
//!
//!     client.logoff().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Bring your own transport
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiError};
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let stream = TcpStream::connect(("pbx.example.com", 5038)).await?;
//!     let client = AmiClient::new();
//!     client.start(stream).await?; // validates the server greeting
//!     client.login("admin", "secret").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Event subscription
//!
//! ```rust,no_run
//! use asterisk_ami_tokio::{AmiClient, AmiError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AmiError> {
//!     let client = AmiClient::connect("127.0.0.1", 5038).await?;
//!     client.login("admin", "secret").await?;
//!
//!     let mut events = client.subscribe()?;
//!     while let Some(Ok(event)) = events.recv().await {
//!         println!("{:?}: {:?}", event.event(), event.get("Channel"));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Dropping the stream handle unsubscribes. A subscriber that falls behind
//! its bounded queue loses events rather than stalling the reader; see
//! [`AmiEventStream`] for the overflow contract.

pub mod client;
pub mod constants;
pub mod error;
pub mod headers;
pub mod message;

mod auth;
mod pending;
pub(crate) mod protocol;
mod subscriber;

pub use client::{AmiClient, ClientStatus};
pub use constants::DEFAULT_AMI_PORT;
pub use error::{AmiError, AmiResult, StopCause};
pub use headers::{AmiHeader, ParseAmiHeaderError};
pub use message::AmiMessage;
pub use subscriber::AmiEventStream;
