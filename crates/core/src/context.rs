use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cdpmux_protocol::Event;
use parking_lot::Mutex;
use serde::Serialize;

use crate::coordinator::Coordinator;
use crate::provider::TargetProvider;
use crate::session::Session;

/// Context handed to every domain handler: the connection's coordinator and
/// the session the command was addressed to.
#[derive(Clone)]
pub struct SessionContext {
	coordinator: Coordinator,
	session: Arc<Session>,
	deferred: Arc<Mutex<Vec<Event>>>,
	answer_detached: Arc<AtomicBool>,
}

impl SessionContext {
	pub(crate) fn new(coordinator: Coordinator, session: Arc<Session>) -> Self {
		Self {
			coordinator,
			session,
			deferred: Arc::new(Mutex::new(Vec::new())),
			answer_detached: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn coordinator(&self) -> &Coordinator {
		&self.coordinator
	}

	/// The calling session.
	pub fn session(&self) -> &Arc<Session> {
		&self.session
	}

	pub fn provider(&self) -> &Arc<dyn TargetProvider> {
		self.coordinator.provider()
	}

	/// Queues an event on the calling session, written right after the
	/// command's response.
	pub fn emit_after_response<T: Serialize>(&self, method: &str, params: &T) {
		match serde_json::to_value(params) {
			Ok(params) => self
				.deferred
				.lock()
				.push(Event::new(method, params, self.session.id().wire())),
			Err(err) => tracing::error!(method, error = %err, "failed to serialize deferred event"),
		}
	}

	/// Still answers the command after it detached its own session.
	pub fn answer_after_detach(&self) {
		self.answer_detached.store(true, Ordering::SeqCst);
	}

	pub(crate) fn answers_after_detach(&self) -> bool {
		self.answer_detached.load(Ordering::SeqCst)
	}

	pub(crate) fn take_deferred(&self) -> Vec<Event> {
		std::mem::take(&mut *self.deferred.lock())
	}
}
