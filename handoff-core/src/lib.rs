//! handoff-core: session correlation and relay for the handoff service
//!
//! - **Sessions** - [`SessionStore`] holds every [`Session`], keyed by an opaque [`SessionId`]
//! - **Issuance** - [`SessionIssuer`] mints sessions bound to a [`Destination`] and builds access URLs
//! - **Capture payloads** - [`capture`] validates callback bodies into [`CaptureEvent`]s
//! - **Relay** - [`RelayForwarder`] drains a bounded queue into a [`DeliverySink`]
//!
//! ```text
//!  issue(destination) ──► SessionStore ◄── update(id, apply(event))
//!                                               │ snapshot
//!                                               ▼
//!                       RelayHandle ──mpsc──► RelayForwarder ──► DeliverySink
//! ```

pub mod capture;
pub mod error;
pub mod issuer;
pub mod relay;
pub mod session;

pub use capture::{CaptureEvent, CaptureOptions, LocationReport};
pub use error::{DeliveryError, SessionError};
pub use issuer::{IssuedSession, SessionIssuer};
pub use relay::{
    DeliverySink, LogSink, MemorySink, Notification, RelayConfig, RelayEvent, RelayForwarder,
    RelayHandle, SinkKind, WebhookSink,
};
pub use session::{Destination, ReplayPolicy, Session, SessionConfig, SessionId, SessionStore};
