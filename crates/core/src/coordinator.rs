//! Session/proxy coordinator for one client connection.
//!
//! The coordinator owns the connection's session table, routes every inbound
//! command to the addressed session, and is the only component that emits
//! `Target.targetCreated`, `Target.targetDestroyed`,
//! `Target.attachedToTarget` and `Target.detachedFromTarget`.
//!
//! # Message flow
//!
//! 1. The transport hands a raw message to [`Coordinator::handle_inbound_message`]
//! 2. The `sessionId` selects the session (absent means the default session)
//! 3. Registered methods go to the [`Dispatcher`]; anything else is forwarded
//!    to the target of an attached page session, or answered with `{}`
//! 4. The response is written with the command's `id` (and `sessionId`),
//!    followed by any events the handler deferred
//!
//! Provider lifecycle notifications are applied against each live session's
//! discovery and auto-attach flags.
//!
//! [`Coordinator::serve`] runs all of this on a single task per connection.
//! Commands complete out of order when a handler suspends, which is why
//! every response carries its command id.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use cdpmux_protocol::target::{
	ATTACHED_TO_TARGET, AttachedToTarget, DETACHED_FROM_TARGET, DetachedFromTarget, TARGET_CREATED,
	TARGET_DESTROYED, TargetCreated, TargetDestroyed,
};
use cdpmux_protocol::{Event, InboundCommand, ProtocolError, Response, SessionId, TargetId, TargetInfo};
use futures_util::FutureExt;
use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{broadcast, watch};

use crate::context::SessionContext;
use crate::dispatcher::{CommandResult, Dispatcher};
use crate::error::{Error, Result};
use crate::outbound::{Outbound, OutboundReceiver};
use crate::provider::{TargetLifecycle, TargetProvider};
use crate::session::{Session, SessionKind};

/// Target id reported for browser sessions when no target exists.
pub const BROWSER_TARGET_ID: &str = "browser";

/// Dispatcher type the coordinator routes through.
pub type SessionDispatcher = Dispatcher<SessionContext>;

/// Per-connection options.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
	/// Binds the default session to this target (a page endpoint). When
	/// `None` the default session is browser-level.
	pub default_target: Option<TargetId>,
}

struct Inner {
	dispatcher: Arc<SessionDispatcher>,
	provider: Arc<dyn TargetProvider>,
	outbound: Outbound,
	sessions: Mutex<IndexMap<SessionId, Arc<Session>>>,
	lifecycle: Mutex<Option<broadcast::Receiver<TargetLifecycle>>>,
	closed: watch::Sender<bool>,
}

/// Cheaply cloneable handle to one connection's coordinator.
#[derive(Clone)]
pub struct Coordinator {
	inner: Arc<Inner>,
}

impl Coordinator {
	/// Creates the coordinator and its default session.
	///
	/// Returns the receiver of raw outbound messages for the transport.
	pub fn new(
		dispatcher: Arc<SessionDispatcher>,
		provider: Arc<dyn TargetProvider>,
		options: CoordinatorOptions,
	) -> Result<(Self, OutboundReceiver)> {
		let (outbound, outbound_rx) = Outbound::channel();
		let lifecycle = provider.subscribe();
		let (closed, _) = watch::channel(false);

		let coordinator = Self {
			inner: Arc::new(Inner {
				dispatcher,
				provider,
				outbound,
				sessions: Mutex::new(IndexMap::new()),
				lifecycle: Mutex::new(Some(lifecycle)),
				closed,
			}),
		};

		let (target_id, kind) = match options.default_target {
			Some(target_id) => {
				if coordinator.inner.provider.get_target(&target_id).is_none() {
					return Err(Error::UnknownTarget(target_id));
				}
				(target_id, SessionKind::Page)
			}
			None => (coordinator.browser_target_id(), SessionKind::Browser),
		};
		let default = Session::new(
			SessionId::default_session(),
			target_id,
			kind,
			None,
			coordinator.inner.outbound.clone(),
		);
		default.attach(coordinator.inner.provider.as_ref())?;
		coordinator.inner.sessions.lock().insert(default.id().clone(), default);

		Ok((coordinator, outbound_rx))
	}

	pub fn provider(&self) -> &Arc<dyn TargetProvider> {
		&self.inner.provider
	}

	pub fn session(&self, session_id: &SessionId) -> Option<Arc<Session>> {
		self.inner.sessions.lock().get(session_id).cloned()
	}

	/// Snapshot of live sessions in creation order. The default session is first.
	pub fn sessions(&self) -> Vec<Arc<Session>> {
		self.inner.sessions.lock().values().cloned().collect()
	}

	/// Target id for a new browser session: the first known target, or
	/// [`BROWSER_TARGET_ID`].
	pub fn browser_target_id(&self) -> TargetId {
		self.inner
			.provider
			.targets()
			.first()
			.map(|target| target.id())
			.unwrap_or_else(|| TargetId::from(BROWSER_TARGET_ID))
	}

	/// Parses and handles one raw inbound message, then writes its response.
	///
	/// Malformed messages are logged and dropped.
	pub async fn handle_inbound_message(&self, raw: impl AsRef<str>) {
		match serde_json::from_str::<InboundCommand>(raw.as_ref()) {
			Ok(command) => self.handle_command(command).await,
			Err(err) => tracing::warn!(error = %err, "dropping malformed inbound message"),
		}
	}

	/// Routes one command and writes its response.
	pub async fn handle_command(&self, command: InboundCommand) {
		let session_id = command.session();
		let InboundCommand {
			id,
			method,
			params,
			session_id: wire_session,
		} = command;

		let Some(session) = self.session(&session_id) else {
			tracing::debug!(id, method = %method, session = %session_id, "command for unknown session");
			let error = Error::UnknownSession(session_id).to_protocol_error();
			self.inner.outbound.response(Response::new(id, wire_session, Err(error)));
			return;
		};

		let ctx = SessionContext::new(self.clone(), Arc::clone(&session));
		let outcome = if self.inner.dispatcher.handles(&method) {
			tracing::debug!(id, method = %method, session = %session_id, "dispatching command");
			let handler = self.inner.dispatcher.dispatch(&method, params, ctx.clone());
			match AssertUnwindSafe(handler).catch_unwind().await {
				Ok(outcome) => outcome,
				Err(_) => {
					tracing::error!(id, method = %method, "command handler panicked");
					Err(ProtocolError::server(format!("Internal error handling {method}")))
				}
			}
		} else {
			self.forward(&session, &method, params).await
		};

		if session.is_disposed() && !ctx.answers_after_detach() {
			tracing::debug!(id, method = %method, session = %session_id, "session disposed, dropping response");
			return;
		}
		self.inner.outbound.response(Response::new(id, wire_session, outcome));
		for event in ctx.take_deferred() {
			self.inner.outbound.event(event);
		}
	}

	/// Commands without a registered handler: forwarded to the target of an
	/// attached page session, otherwise accepted as no-ops.
	async fn forward(&self, session: &Session, method: &str, params: serde_json::Value) -> CommandResult {
		if session.kind() != SessionKind::Page {
			tracing::debug!(method, "unhandled command on browser session, answering with an empty result");
			return Ok(json!({}));
		}
		session
			.send_command(method, params)
			.await
			.map_err(|err| err.to_protocol_error())
	}

	/// Creates and attaches a session. It only becomes visible in the session
	/// table once attached.
	pub fn create_session(
		&self,
		target_id: TargetId,
		kind: SessionKind,
		parent: Option<SessionId>,
	) -> Result<Arc<Session>> {
		let session = Session::new(
			self.next_session_id(),
			target_id,
			kind,
			parent,
			self.inner.outbound.clone(),
		);
		session.attach(self.inner.provider.as_ref())?;
		self.inner.sessions.lock().insert(session.id().clone(), Arc::clone(&session));
		tracing::debug!(session = %session.id(), target_id = %session.target_id(), kind = ?kind, "session created");
		Ok(session)
	}

	fn next_session_id(&self) -> SessionId {
		let sessions = self.inner.sessions.lock();
		loop {
			let id = SessionId::new(uuid::Uuid::new_v4().simple().to_string().to_uppercase());
			if !sessions.contains_key(&id) {
				return id;
			}
		}
	}

	/// Emits a `Target.*` event on `to` (no `sessionId` for the default session).
	pub fn emit<T: Serialize>(&self, to: &SessionId, method: &str, params: &T) {
		match serde_json::to_value(params) {
			Ok(params) => self.inner.outbound.event(Event::new(method, params, to.wire())),
			Err(err) => tracing::error!(method, error = %err, "failed to serialize event"),
		}
	}

	/// Sends `Target.targetCreated` for `info` on `session`, once per target.
	pub fn announce_target(&self, session: &Session, info: &TargetInfo) {
		if session.mark_announced(&info.target_id) {
			self.emit(
				session.id(),
				TARGET_CREATED,
				&TargetCreated {
					target_info: info.clone(),
				},
			);
		}
	}

	/// Creates a page session for `info` on behalf of `browser` and reports
	/// it with `Target.attachedToTarget`.
	pub fn auto_attach_page(&self, browser: &Session, info: &TargetInfo) -> Result<Arc<Session>> {
		let page = self.create_session(info.target_id.clone(), SessionKind::Page, Some(browser.id().clone()))?;
		browser.set_auto_attached_page(Some(page.id().clone()));
		self.emit(
			browser.id(),
			ATTACHED_TO_TARGET,
			&AttachedToTarget {
				session_id: page.id().clone(),
				target_info: info.clone().with_attached(true),
				waiting_for_debugger: browser.auto_attach().wait_for_debugger_on_start,
			},
		);
		Ok(page)
	}

	/// Disposes a non-default session and reports `Target.detachedFromTarget`
	/// on its parent.
	pub fn detach_session(&self, session_id: &SessionId) -> Result<()> {
		if session_id.is_default() {
			return Err(Error::UnknownSession(session_id.clone()));
		}
		let session = self
			.inner
			.sessions
			.lock()
			.shift_remove(session_id)
			.ok_or_else(|| Error::UnknownSession(session_id.clone()))?;
		self.finish_detach(&session);
		Ok(())
	}

	/// Disposes `session` and everything it attached, children first, each
	/// reported on its own parent. `session` must already be out of the table.
	fn finish_detach(&self, session: &Session) {
		if !session.dispose() {
			return;
		}

		let children: Vec<Arc<Session>> = {
			let mut sessions = self.inner.sessions.lock();
			let ids: Vec<SessionId> = sessions
				.values()
				.filter(|child| child.parent() == Some(session.id()))
				.map(|child| child.id().clone())
				.collect();
			ids.iter().filter_map(|id| sessions.shift_remove(id)).collect()
		};
		for child in &children {
			self.finish_detach(child);
		}

		let parent_id = session.parent().cloned().unwrap_or_default();
		if let Some(parent) = self.session(&parent_id) {
			if parent.auto_attached_page().as_ref() == Some(session.id()) {
				parent.set_auto_attached_page(None);
			}
		}
		if session.kind() == SessionKind::Page || session.parent().is_some() {
			self.emit(
				&parent_id,
				DETACHED_FROM_TARGET,
				&DetachedFromTarget {
					session_id: session.id().clone(),
					target_id: session.target_id().clone(),
				},
			);
		}
	}

	/// Applies a provider lifecycle notification to every live session.
	pub fn handle_target_lifecycle(&self, event: TargetLifecycle) {
		match event {
			TargetLifecycle::Created(info) => self.on_target_created(&info),
			TargetLifecycle::Destroyed(target_id) => self.on_target_destroyed(&target_id),
		}
	}

	fn on_target_created(&self, info: &TargetInfo) {
		tracing::debug!(target_id = %info.target_id, "target created");
		for session in self.sessions() {
			if session.is_disposed() {
				continue;
			}
			let auto_attach =
				session.kind() == SessionKind::Browser && session.auto_attach().is_flat() && !session.page_attached();
			if session.discover_targets() || auto_attach {
				self.announce_target(&session, info);
			}
			if auto_attach {
				if let Err(err) = self.auto_attach_page(&session, info) {
					tracing::warn!(session = %session.id(), target_id = %info.target_id, error = %err, "auto-attach failed");
				}
			}
		}
	}

	fn on_target_destroyed(&self, target_id: &TargetId) {
		tracing::debug!(target_id = %target_id, "target destroyed");
		let bound: Vec<Arc<Session>> = self
			.sessions()
			.into_iter()
			.filter(|session| session.kind() == SessionKind::Page && session.target_id() == target_id)
			.collect();

		let mut default_lost = false;
		for session in &bound {
			if session.id().is_default() {
				default_lost = true;
				continue;
			}
			self.inner.sessions.lock().shift_remove(session.id());
			self.finish_detach(session);
		}

		for session in self.sessions() {
			if session.discover_targets() {
				self.emit(
					session.id(),
					TARGET_DESTROYED,
					&TargetDestroyed {
						target_id: target_id.clone(),
					},
				);
			}
			session.forget_announced(target_id);
		}

		if default_lost {
			tracing::info!(target_id = %target_id, "target of the default session destroyed, closing connection");
			self.close();
		}
	}

	/// Disposes every session and stops [`serve`](Self::serve). Idempotent.
	pub fn close(&self) {
		let sessions: Vec<Arc<Session>> = self.inner.sessions.lock().drain(..).map(|(_, session)| session).collect();
		for session in sessions {
			session.dispose();
		}
		self.inner.closed.send_replace(true);
	}

	pub fn is_closed(&self) -> bool {
		*self.inner.closed.borrow()
	}

	/// Runs the connection until `inbound` ends or the connection closes.
	///
	/// Inbound commands, in-flight handlers and provider lifecycle events are
	/// all polled from this one task. Can only be called once per coordinator.
	pub async fn serve<S>(&self, mut inbound: S)
	where
		S: Stream<Item = String> + Unpin,
	{
		let mut lifecycle = self.inner.lifecycle.lock().take();
		let mut lifecycle_open = lifecycle.is_some();
		let mut closed = self.inner.closed.subscribe();
		let mut in_flight = FuturesUnordered::new();

		loop {
			tokio::select! {
				biased;

				_ = closed.wait_for(|closed| *closed) => break,
				Some(()) = in_flight.next() => {}
				event = next_lifecycle(&mut lifecycle), if lifecycle_open => match event {
					Ok(event) => self.handle_target_lifecycle(event),
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "missed target lifecycle notifications");
					}
					Err(broadcast::error::RecvError::Closed) => lifecycle_open = false,
				},
				message = inbound.next() => match message {
					Some(raw) => in_flight.push(self.handle_inbound_message(raw)),
					None => break,
				},
			}
		}

		tracing::debug!(in_flight = in_flight.len(), "connection ended");
		self.close();
	}
}

async fn next_lifecycle(
	rx: &mut Option<broadcast::Receiver<TargetLifecycle>>,
) -> std::result::Result<TargetLifecycle, broadcast::error::RecvError> {
	match rx {
		Some(rx) => rx.recv().await,
		None => std::future::pending().await,
	}
}
