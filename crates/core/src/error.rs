//! Error types for the multiplexer core.

use cdpmux_protocol::{ProtocolError, SessionId, TargetId};
use thiserror::Error;

use crate::provider::ProviderError;
use crate::session::SessionState;

/// Result type alias for multiplexer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while routing commands or managing sessions.
#[derive(Debug, Error)]
pub enum Error {
	/// The referenced target does not exist.
	#[error("Unknown target: {0}")]
	UnknownTarget(TargetId),

	/// No live session with this id on the connection.
	#[error("Unknown session: {0}")]
	UnknownSession(SessionId),

	/// The session was disposed before the command completed.
	#[error("Session disposed")]
	SessionDisposed,

	/// Operation requires a state the session is not in.
	#[error("Session {session} is {state:?}")]
	InvalidState { session: SessionId, state: SessionState },

	/// The target answered a forwarded command with an error.
	#[error(transparent)]
	Remote(ProtocolError),

	/// Failure reported by the target provider.
	#[error(transparent)]
	Provider(#[from] ProviderError),

	/// Command params did not match the method's schema.
	#[error("Invalid parameters: {0}")]
	InvalidParams(#[source] serde_json::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Wire form of this error. Every core failure uses the generic server error code.
	pub fn to_protocol_error(&self) -> ProtocolError {
		match self {
			Error::Remote(err) => err.clone(),
			other => ProtocolError::server(other.to_string()),
		}
	}

	/// Returns true if the command was abandoned because its session went away.
	pub fn is_disposed(&self) -> bool {
		matches!(self, Error::SessionDisposed)
	}
}

impl From<Error> for ProtocolError {
	fn from(err: Error) -> Self {
		err.to_protocol_error()
	}
}
