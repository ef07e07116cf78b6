//! Minimal SIP-like client used to ring a phone
//!
//! This is not a general SIP stack: it covers exactly what placing and
//! hanging up a doorbell call needs.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────┐
//! │      Dialog Layer       │
//! │ (one outgoing call, 401 │
//! │  retry, ACK/BYE, SDP)   │
//! └───────────┬─────────────┘
//!             │
//! ┌───────────▼─────────────┐
//! │   Transport Layer       │
//! │  (one TCP connection    │
//! │   per call)             │
//! └─────────────────────────┘
//! ```

pub mod auth;
pub mod dialog;
pub mod message;
pub mod sdp;
pub mod transport;
pub mod uri;

pub use auth::{parse_challenge, AuthChallenge, AuthenticationHandler, DigestHandler};
pub use dialog::{CallOutcome, Dialog};
pub use message::{Header, Request, Response, SipError, SipMethod};
pub use sdp::SessionDescription;
pub use transport::{recv_final, Connection, TcpTransport, Transport};
pub use uri::SipUri;
