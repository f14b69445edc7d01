//! CDP session: one client's binding to one target.
//!
//! A session correlates commands it forwards to its target with the
//! target's replies, and forwards the target's events to the client tagged
//! with its own `sessionId`.
//!
//! # Lifecycle
//!
//! ```text
//! Attaching ──attach()──▶ Attached
//!     │                      │
//!     └─(provider refused)─▶ Unattached
//!
//! any state ──dispose()──▶ Disposed (terminal)
//! ```
//!
//! Every command sent through [`Session::send_command`] resolves exactly
//! once: with the target's reply, or with [`Error::SessionDisposed`] when
//! the session is disposed first.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use cdpmux_protocol::target::DOMAIN_PREFIX;
use cdpmux_protocol::{Event, ProtocolError, SessionId, TargetId};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::outbound::Outbound;
use crate::provider::{Attachment, TargetCommand, TargetProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Unattached,
	Attaching,
	Attached,
	Disposed,
}

/// What the session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
	/// Browser-level session. Not subscribed to any target; drives discovery
	/// and auto-attach.
	Browser,
	/// Page session, subscribed to its target through the provider.
	Page,
}

/// Flags stored by `Target.setAutoAttach`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoAttach {
	pub auto_attach: bool,
	pub wait_for_debugger_on_start: bool,
	pub flatten: bool,
}

impl AutoAttach {
	/// Auto-attach in flattened mode, the only mode that creates sessions.
	pub fn is_flat(&self) -> bool {
		self.auto_attach && self.flatten
	}
}

/// Pending command replies keyed by command id.
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

struct Inner {
	state: SessionState,
	auto_attach: AutoAttach,
	discover_targets: bool,
	/// Page session this (browser) session auto-attached, if any.
	auto_attached_page: Option<SessionId>,
	/// Targets already announced with `Target.targetCreated`.
	announced: HashSet<TargetId>,
	attachment: Option<Arc<dyn Attachment>>,
}

pub struct Session {
	id: SessionId,
	target_id: TargetId,
	kind: SessionKind,
	parent: Option<SessionId>,
	outbound: Outbound,
	last_id: AtomicU64,
	pending: PendingMap,
	inner: Mutex<Inner>,
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("target_id", &self.target_id)
			.field("kind", &self.kind)
			.field("state", &self.state())
			.finish()
	}
}

impl Session {
	/// Creates a session bound to `target_id`, in the `Attaching` state.
	///
	/// `parent` is the session whose command created this one; the
	/// coordinator reports this session's detachment on it.
	pub fn new(
		id: SessionId,
		target_id: TargetId,
		kind: SessionKind,
		parent: Option<SessionId>,
		outbound: Outbound,
	) -> Arc<Self> {
		Arc::new(Self {
			id,
			target_id,
			kind,
			parent,
			outbound,
			last_id: AtomicU64::new(0),
			pending: Arc::new(Mutex::new(HashMap::new())),
			inner: Mutex::new(Inner {
				state: SessionState::Attaching,
				auto_attach: AutoAttach::default(),
				discover_targets: false,
				auto_attached_page: None,
				announced: HashSet::new(),
				attachment: None,
			}),
		})
	}

	pub fn id(&self) -> &SessionId {
		&self.id
	}

	pub fn target_id(&self) -> &TargetId {
		&self.target_id
	}

	pub fn kind(&self) -> SessionKind {
		self.kind
	}

	pub fn parent(&self) -> Option<&SessionId> {
		self.parent.as_ref()
	}

	pub fn state(&self) -> SessionState {
		self.inner.lock().state
	}

	pub fn is_disposed(&self) -> bool {
		self.state() == SessionState::Disposed
	}

	/// Subscribes to the target through the provider.
	///
	/// Browser sessions have nothing to subscribe to and attach trivially.
	/// On provider failure the session is left `Unattached` and must not be
	/// reused.
	pub fn attach(self: &Arc<Self>, provider: &dyn TargetProvider) -> Result<()> {
		{
			let inner = self.inner.lock();
			if inner.state != SessionState::Attaching {
				return Err(Error::InvalidState {
					session: self.id.clone(),
					state: inner.state,
				});
			}
		}

		let attachment = match self.kind {
			SessionKind::Browser => None,
			SessionKind::Page => match provider.attach(&self.target_id, SessionSink::new(self)) {
				Ok(attachment) => Some(Arc::<dyn Attachment>::from(attachment)),
				Err(err) => {
					let mut inner = self.inner.lock();
					if inner.state == SessionState::Attaching {
						inner.state = SessionState::Unattached;
					}
					return Err(err.into());
				}
			},
		};

		let mut inner = self.inner.lock();
		if inner.state != SessionState::Attaching {
			// Disposed while the provider was attaching.
			drop(inner);
			if let Some(attachment) = attachment {
				attachment.dispose();
			}
			return Err(Error::SessionDisposed);
		}
		inner.attachment = attachment;
		inner.state = SessionState::Attached;
		tracing::debug!(session = %self.id, target_id = %self.target_id, kind = ?self.kind, "session attached");
		Ok(())
	}

	/// Sends a command to the bound target and waits for its reply.
	///
	/// Command ids increase monotonically per session, starting at 1.
	pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
		let (id, attachment, rx) = {
			let inner = self.inner.lock();
			let attachment = match (inner.state, &inner.attachment) {
				(SessionState::Attached, Some(attachment)) => Arc::clone(attachment),
				(SessionState::Disposed, _) => return Err(Error::SessionDisposed),
				(state, _) => {
					return Err(Error::InvalidState {
						session: self.id.clone(),
						state,
					});
				}
			};
			// Registered under the state lock so dispose() cannot miss it.
			let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
			let (tx, rx) = oneshot::channel();
			self.pending.lock().insert(id, tx);
			(id, attachment, rx)
		};
		let mut guard = PendingGuard::new(id, Arc::clone(&self.pending));

		tracing::debug!(session = %self.id, id, method, "sending command to target");
		attachment.send(TargetCommand {
			id,
			method: method.to_owned(),
			params,
		})?;

		let outcome = rx.await;
		guard.complete();
		outcome.unwrap_or(Err(Error::SessionDisposed))
	}

	/// Resolves the pending command `id` with the target's reply.
	pub fn handle_response(&self, id: u64, outcome: std::result::Result<Value, ProtocolError>) {
		let Some(tx) = self.pending.lock().remove(&id) else {
			tracing::debug!(session = %self.id, id, "reply for unknown or abandoned command");
			return;
		};
		let _ = tx.send(outcome.map_err(Error::Remote));
	}

	/// Forwards a target event to the client, tagged with this session's id.
	///
	/// `Target.*` events are dropped: target lifecycle is reported once per
	/// connection by the coordinator, never per session.
	pub fn handle_event(&self, method: &str, params: Value) {
		if method.starts_with(DOMAIN_PREFIX) {
			tracing::trace!(session = %self.id, method, "dropping Target event from target");
			return;
		}
		if self.is_disposed() {
			return;
		}
		self.outbound.event(Event::new(method, params, self.id.wire()));
	}

	/// Rejects every pending command, detaches from the target and becomes
	/// inert. Returns false if the session was already disposed.
	pub fn dispose(&self) -> bool {
		let attachment = {
			let mut inner = self.inner.lock();
			if inner.state == SessionState::Disposed {
				return false;
			}
			inner.state = SessionState::Disposed;
			inner.announced.clear();
			inner.attachment.take()
		};

		if let Some(attachment) = attachment {
			attachment.dispose();
		}

		let abandoned: Vec<_> = self.pending.lock().drain().collect();
		tracing::debug!(session = %self.id, abandoned = abandoned.len(), "session disposed");
		for (_, tx) in abandoned {
			let _ = tx.send(Err(Error::SessionDisposed));
		}
		true
	}

	/// Number of commands still waiting for a reply.
	pub fn pending_commands(&self) -> usize {
		self.pending.lock().len()
	}

	pub fn auto_attach(&self) -> AutoAttach {
		self.inner.lock().auto_attach
	}

	pub fn set_auto_attach(&self, flags: AutoAttach) {
		self.inner.lock().auto_attach = flags;
	}

	pub fn discover_targets(&self) -> bool {
		self.inner.lock().discover_targets
	}

	/// Stores the discovery flag. Turning discovery off forgets which
	/// targets were announced, so re-enabling announces them again.
	pub fn set_discover_targets(&self, discover: bool) {
		let mut inner = self.inner.lock();
		inner.discover_targets = discover;
		if !discover {
			inner.announced.clear();
		}
	}

	/// Whether this session has already auto-attached a page session.
	pub fn page_attached(&self) -> bool {
		self.inner.lock().auto_attached_page.is_some()
	}

	pub fn auto_attached_page(&self) -> Option<SessionId> {
		self.inner.lock().auto_attached_page.clone()
	}

	pub fn set_auto_attached_page(&self, page: Option<SessionId>) {
		self.inner.lock().auto_attached_page = page;
	}

	/// Records that `Target.targetCreated` was sent for `target_id`.
	/// Returns false if it already was.
	pub fn mark_announced(&self, target_id: &TargetId) -> bool {
		self.inner.lock().announced.insert(target_id.clone())
	}

	pub fn forget_announced(&self, target_id: &TargetId) {
		self.inner.lock().announced.remove(target_id);
	}
}

/// Handle through which a provider delivers target output to a session.
///
/// Holds the session weakly; once the session is gone, deliveries are
/// silently dropped.
#[derive(Clone, Debug)]
pub struct SessionSink {
	session: Weak<Session>,
}

impl SessionSink {
	pub fn new(session: &Arc<Session>) -> Self {
		Self {
			session: Arc::downgrade(session),
		}
	}

	/// Delivers a target event.
	pub fn event(&self, method: &str, params: Value) {
		if let Some(session) = self.session.upgrade() {
			session.handle_event(method, params);
		}
	}

	/// Delivers the target's reply to command `id`.
	pub fn response(&self, id: u64, outcome: std::result::Result<Value, ProtocolError>) {
		match self.session.upgrade() {
			Some(session) => session.handle_response(id, outcome),
			None => tracing::debug!(id, "reply after session was dropped"),
		}
	}

	/// Returns false once the session is disposed or dropped.
	pub fn is_alive(&self) -> bool {
		self.session.upgrade().is_some_and(|session| !session.is_disposed())
	}

	pub fn session_id(&self) -> Option<SessionId> {
		self.session.upgrade().map(|session| session.id().clone())
	}
}

/// Removes a pending entry if the waiting future is dropped before its reply.
struct PendingGuard {
	id: u64,
	pending: PendingMap,
	completed: bool,
}

impl PendingGuard {
	fn new(id: u64, pending: PendingMap) -> Self {
		Self {
			id,
			pending,
			completed: false,
		}
	}

	fn complete(&mut self) {
		self.completed = true;
	}
}

impl Drop for PendingGuard {
	fn drop(&mut self) {
		if !self.completed && self.pending.lock().remove(&self.id).is_some() {
			tracing::debug!(id = self.id, "removed orphaned pending command");
		}
	}
}
