use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a session on one connection.
///
/// The empty string is the distinguished default session: the one a client
/// talks to when it connects without `Target.attachToTarget`. Its messages
/// carry no `sessionId` field on the wire, see [`SessionId::wire`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// The default session.
	pub fn default_session() -> Self {
		Self(String::new())
	}

	pub fn is_default(&self) -> bool {
		self.0.is_empty()
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Value of the `sessionId` wire field: `None` for the default session.
	pub fn wire(&self) -> Option<SessionId> {
		if self.is_default() {
			None
		} else {
			Some(self.clone())
		}
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_default() {
			f.write_str("<default>")
		} else {
			f.write_str(&self.0)
		}
	}
}

impl From<&str> for SessionId {
	fn from(id: &str) -> Self {
		Self(id.to_owned())
	}
}

impl From<String> for SessionId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl Borrow<str> for SessionId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// Opaque, immutable identifier of a target. Assigned by whoever owns the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TargetId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for TargetId {
	fn from(id: &str) -> Self {
		Self(id.to_owned())
	}
}

impl From<String> for TargetId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl Borrow<str> for TargetId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
