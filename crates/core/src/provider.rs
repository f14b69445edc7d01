//! Target provider collaborator interface.
//!
//! The multiplexer never decides what a target is. A [`TargetProvider`]
//! owns target existence: it lists targets, optionally creates and closes
//! them, announces lifecycle changes, and lets a session attach to a target
//! so commands can be delivered and target output can flow back.
//!
//! Target output reaches the session through a [`SessionSink`], which only
//! holds a weak reference: a provider that keeps a sink after the session is
//! gone cannot keep the session alive, and its late messages are dropped.

use std::sync::Arc;

use async_trait::async_trait;
use cdpmux_protocol::{ProtocolError, TargetId, TargetInfo};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

pub use crate::session::SessionSink;

/// Errors reported by a [`TargetProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
	/// The provider does not implement this optional capability.
	#[error("{0} is not supported")]
	Unsupported(&'static str),

	/// The target is unknown to the provider.
	#[error("Unknown target: {0}")]
	UnknownTarget(TargetId),

	/// Any other provider-side failure, carrying its message.
	#[error("{0}")]
	Failed(String),
}

impl From<ProviderError> for ProtocolError {
	fn from(err: ProviderError) -> Self {
		ProtocolError::server(err.to_string())
	}
}

/// Lifecycle notification pushed by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetLifecycle {
	Created(TargetInfo),
	Destroyed(TargetId),
}

/// A debuggable unit owned by a provider.
pub trait Target: Send + Sync {
	fn id(&self) -> TargetId;

	/// Current `{targetId, type, url, title, attached}` snapshot.
	fn target_info(&self) -> TargetInfo;
}

/// Command delivered to an attached target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetCommand {
	/// Per-session command id; the target answers with the same id.
	pub id: u64,
	pub method: String,
	pub params: Value,
}

/// Live subscription of one session to one target.
pub trait Attachment: Send + Sync {
	/// Hands a command to the target. The answer comes back through the
	/// [`SessionSink`] given to [`TargetProvider::attach`].
	fn send(&self, command: TargetCommand) -> Result<(), ProviderError>;

	/// Ends the subscription. Called exactly once, by the owning session.
	fn dispose(&self);
}

/// Source of targets. Shared read-mostly by every connection.
#[async_trait]
pub trait TargetProvider: Send + Sync {
	fn get_target(&self, target_id: &TargetId) -> Option<Arc<dyn Target>>;

	/// Snapshot of all known targets, in a stable order.
	fn targets(&self) -> Vec<Arc<dyn Target>>;

	/// Subscribes to target creation and destruction.
	fn subscribe(&self) -> broadcast::Receiver<TargetLifecycle>;

	/// Attaches `sink` to a target so it receives the target's events and
	/// replies to commands sent through the returned [`Attachment`].
	fn attach(&self, target_id: &TargetId, sink: SessionSink) -> Result<Box<dyn Attachment>, ProviderError>;

	/// Creates a target showing `url`. Optional capability.
	async fn create_target(&self, _url: &str, _browser_context_id: Option<&str>) -> Result<TargetId, ProviderError> {
		Err(ProviderError::Unsupported("Target.createTarget"))
	}

	/// Closes a target. Optional capability.
	async fn close_target(&self, _target_id: &TargetId) -> Result<bool, ProviderError> {
		Err(ProviderError::Unsupported("Target.closeTarget"))
	}
}
