use std::fmt;

use serde::{Deserialize, Serialize};

/// Generic "server error" code used for every domain-specific failure.
pub const SERVER_ERROR: i64 = -32000;

/// Error payload of a failed command: `{code, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
	pub code: i64,
	pub message: String,
}

impl ProtocolError {
	pub fn new(code: i64, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
		}
	}

	/// A [`SERVER_ERROR`] with the given message.
	pub fn server(message: impl Into<String>) -> Self {
		Self::new(SERVER_ERROR, message)
	}
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.message, self.code)
	}
}

impl std::error::Error for ProtocolError {}
