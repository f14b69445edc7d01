//! Wire types for the CDP session multiplexer.
//!
//! Everything that crosses the transport between a debugger client and the
//! multiplexer is defined here, with no behavior attached:
//!
//! - [`InboundCommand`] - `{id, method, params?, sessionId?}` from the client
//! - [`Response`] and [`Event`] - what the multiplexer writes back
//! - [`ProtocolError`] - the `{code, message}` error payload
//! - [`SessionId`] / [`TargetId`] - opaque identifiers
//! - [`target`] - params, results and events of the `Target` domain
//!
//! The flattened session model needs no framing of its own: every outbound
//! message carries the `sessionId` it belongs to, and the default session's
//! messages carry none.

mod error;
mod ids;
mod message;
pub mod target;

pub use error::{ProtocolError, SERVER_ERROR};
pub use ids::{SessionId, TargetId};
pub use message::{Event, InboundCommand, OutboundMessage, Response};
pub use target::TargetInfo;
