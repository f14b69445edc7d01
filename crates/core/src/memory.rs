//! In-process [`TargetProvider`].
//!
//! Targets live in a map owned by the provider. Commands sent to a target
//! are either answered immediately with `{}` (`auto_reply`) or queued so the
//! owner can inspect them and reply by hand with [`ReceivedCommand::reply`].
//! Used by the binary for static targets and by tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use cdpmux_protocol::{ProtocolError, SessionId, TargetId, TargetInfo};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::provider::{Attachment, ProviderError, SessionSink, Target, TargetCommand, TargetLifecycle, TargetProvider};

const LIFECYCLE_CAPACITY: usize = 256;

/// Target held by a [`MemoryProvider`].
pub struct MemoryTarget {
	info: Mutex<TargetInfo>,
	attachments: Mutex<IndexMap<u64, SessionSink>>,
	inbox: Mutex<Vec<ReceivedCommand>>,
	next_attachment: AtomicU64,
}

impl MemoryTarget {
	fn new(info: TargetInfo) -> Arc<Self> {
		Arc::new(Self {
			info: Mutex::new(info),
			attachments: Mutex::new(IndexMap::new()),
			inbox: Mutex::new(Vec::new()),
			next_attachment: AtomicU64::new(1),
		})
	}

	/// Updates url and title. Identity never changes.
	pub fn navigate(&self, url: impl Into<String>, title: impl Into<String>) {
		let mut info = self.info.lock();
		info.url = url.into();
		info.title = title.into();
	}

	pub fn attachment_count(&self) -> usize {
		self.attachments.lock().len()
	}

	/// Pushes an event to every attached session.
	pub fn emit(&self, method: &str, params: Value) {
		let sinks: Vec<SessionSink> = self.attachments.lock().values().cloned().collect();
		for sink in sinks {
			sink.event(method, params.clone());
		}
	}

	/// Drains the commands queued for manual replies.
	pub fn take_commands(&self) -> Vec<ReceivedCommand> {
		std::mem::take(&mut *self.inbox.lock())
	}
}

impl Target for MemoryTarget {
	fn id(&self) -> TargetId {
		self.info.lock().target_id.clone()
	}

	fn target_info(&self) -> TargetInfo {
		let attached = self.attachment_count() > 0;
		self.info.lock().clone().with_attached(attached)
	}
}

/// A command a target received, waiting for a manual reply.
#[derive(Debug)]
pub struct ReceivedCommand {
	pub command: TargetCommand,
	sink: SessionSink,
}

impl ReceivedCommand {
	/// Session that sent the command, if it still exists.
	pub fn session_id(&self) -> Option<SessionId> {
		self.sink.session_id()
	}

	pub fn reply(self, outcome: Result<Value, ProtocolError>) {
		self.sink.response(self.command.id, outcome);
	}
}

struct MemoryAttachment {
	target: Arc<MemoryTarget>,
	key: u64,
	sink: SessionSink,
	auto_reply: bool,
}

impl Attachment for MemoryAttachment {
	fn send(&self, command: TargetCommand) -> Result<(), ProviderError> {
		if !self.target.attachments.lock().contains_key(&self.key) {
			return Err(ProviderError::Failed("Target detached".to_owned()));
		}
		if self.auto_reply {
			self.sink.response(command.id, Ok(json!({})));
		} else {
			self.target.inbox.lock().push(ReceivedCommand {
				command,
				sink: self.sink.clone(),
			});
		}
		Ok(())
	}

	fn dispose(&self) {
		self.target.attachments.lock().shift_remove(&self.key);
	}
}

/// In-process target provider.
pub struct MemoryProvider {
	targets: Mutex<IndexMap<TargetId, Arc<MemoryTarget>>>,
	lifecycle: broadcast::Sender<TargetLifecycle>,
	auto_reply: bool,
	can_create: bool,
	can_close: bool,
}

impl Default for MemoryProvider {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryProvider {
	/// Empty provider that queues commands and supports create/close.
	pub fn new() -> Self {
		let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);
		Self {
			targets: Mutex::new(IndexMap::new()),
			lifecycle,
			auto_reply: false,
			can_create: true,
			can_close: true,
		}
	}

	/// Answer every command with `{}` instead of queueing it.
	pub fn with_auto_reply(mut self, auto_reply: bool) -> Self {
		self.auto_reply = auto_reply;
		self
	}

	/// Enables or disables the optional create/close capabilities.
	pub fn with_lifecycle_control(mut self, can_create: bool, can_close: bool) -> Self {
		self.can_create = can_create;
		self.can_close = can_close;
		self
	}

	/// Adds a target and announces it.
	///
	/// Re-adding an existing id replaces that target: the old one is
	/// announced as destroyed first, so its sessions detach.
	pub fn add_target(&self, info: TargetInfo) -> Arc<MemoryTarget> {
		let target = MemoryTarget::new(info.with_attached(false));
		let id = target.id();
		if self.remove_target(&id) {
			tracing::warn!(target_id = %id, "replaced existing memory target");
		}
		self.targets.lock().insert(id, Arc::clone(&target));
		let _ = self.lifecycle.send(TargetLifecycle::Created(target.target_info()));
		target
	}

	/// Adds a `"page"` target with a fresh id.
	pub fn add_page(&self, url: impl Into<String>, title: impl Into<String>) -> Arc<MemoryTarget> {
		self.add_target(TargetInfo::page(Self::new_target_id(), url, title))
	}

	/// Fresh target id in the uppercase hex form browsers use.
	pub fn new_target_id() -> TargetId {
		TargetId::new(uuid::Uuid::new_v4().simple().to_string().to_uppercase())
	}

	/// Removes a target and announces its destruction.
	pub fn remove_target(&self, target_id: &TargetId) -> bool {
		let removed = self.targets.lock().shift_remove(target_id).is_some();
		if removed {
			let _ = self.lifecycle.send(TargetLifecycle::Destroyed(target_id.clone()));
		}
		removed
	}

	pub fn target(&self, target_id: &TargetId) -> Option<Arc<MemoryTarget>> {
		self.targets.lock().get(target_id).cloned()
	}
}

#[async_trait]
impl TargetProvider for MemoryProvider {
	fn get_target(&self, target_id: &TargetId) -> Option<Arc<dyn Target>> {
		self.target(target_id).map(|target| target as Arc<dyn Target>)
	}

	fn targets(&self) -> Vec<Arc<dyn Target>> {
		self.targets
			.lock()
			.values()
			.map(|target| Arc::clone(target) as Arc<dyn Target>)
			.collect()
	}

	fn subscribe(&self) -> broadcast::Receiver<TargetLifecycle> {
		self.lifecycle.subscribe()
	}

	fn attach(&self, target_id: &TargetId, sink: SessionSink) -> Result<Box<dyn Attachment>, ProviderError> {
		let target = self
			.target(target_id)
			.ok_or_else(|| ProviderError::UnknownTarget(target_id.clone()))?;
		let key = target.next_attachment.fetch_add(1, Ordering::SeqCst);
		target.attachments.lock().insert(key, sink.clone());
		Ok(Box::new(MemoryAttachment {
			target,
			key,
			sink,
			auto_reply: self.auto_reply,
		}))
	}

	async fn create_target(&self, url: &str, browser_context_id: Option<&str>) -> Result<TargetId, ProviderError> {
		if !self.can_create {
			return Err(ProviderError::Unsupported("Target.createTarget"));
		}
		let mut info = TargetInfo::page(Self::new_target_id(), url, "");
		info.browser_context_id = browser_context_id.map(str::to_owned);
		Ok(self.add_target(info).id())
	}

	async fn close_target(&self, target_id: &TargetId) -> Result<bool, ProviderError> {
		if !self.can_close {
			return Err(ProviderError::Unsupported("Target.closeTarget"));
		}
		if self.remove_target(target_id) {
			Ok(true)
		} else {
			Err(ProviderError::UnknownTarget(target_id.clone()))
		}
	}
}

#[cfg(test)]
mod tests;
