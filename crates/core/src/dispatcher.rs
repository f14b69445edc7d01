//! Method dispatch registry.
//!
//! Maps `"Domain.method"` strings to handlers. The registry is built once at
//! startup and then only read, so one [`Dispatcher`] behind an [`Arc`] can be
//! shared by every connection.
//!
//! Unknown domains and methods are not errors: they resolve to an empty
//! success result, because clients routinely probe commands an
//! implementation does not support.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cdpmux_protocol::ProtocolError;
use serde_json::{Value, json};

/// Outcome of one command: the `result` object or the `error` payload.
pub type CommandResult = std::result::Result<Value, ProtocolError>;

/// Boxed handler future.
pub type HandlerFuture = Pin<Box<dyn Future<Output = CommandResult> + Send>>;

/// Handler function: `(params, context)` → async [`CommandResult`].
pub type HandlerFn<C> = Arc<dyn Fn(Value, C) -> HandlerFuture + Send + Sync>;

/// Handler table for one domain, built with [`Domain::method`].
pub struct Domain<C> {
	name: String,
	handlers: HashMap<String, HandlerFn<C>>,
}

impl<C> Domain<C> {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			handlers: HashMap::new(),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Adds a handler for `method` (without the domain prefix).
	///
	/// Synchronous handlers are written as `async move` blocks that never await.
	pub fn method<F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
	where
		C: 'static,
		F: Fn(Value, C) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = CommandResult> + Send + 'static,
	{
		let handler: HandlerFn<C> =
			Arc::new(move |params: Value, ctx: C| -> HandlerFuture { Box::pin(handler(params, ctx)) });
		self.handlers.insert(method.into(), handler);
		self
	}

	pub fn methods(&self) -> impl Iterator<Item = &str> {
		self.handlers.keys().map(String::as_str)
	}
}

/// Registry of [`Domain`]s, generic over the context handed to handlers.
pub struct Dispatcher<C> {
	domains: HashMap<String, HashMap<String, HandlerFn<C>>>,
}

impl<C> Default for Dispatcher<C> {
	fn default() -> Self {
		Self::new()
	}
}

impl<C> Dispatcher<C> {
	pub fn new() -> Self {
		Self {
			domains: HashMap::new(),
		}
	}

	/// Stores a domain's handler table.
	///
	/// Registering the same domain twice replaces the earlier table. That is
	/// a wiring bug, so it is logged rather than reported.
	pub fn register(&mut self, domain: Domain<C>) {
		let Domain { name, handlers } = domain;
		if self.domains.insert(name.clone(), handlers).is_some() {
			tracing::warn!(domain = %name, "domain registered twice, keeping the last registration");
		}
	}

	/// Builder form of [`register`](Self::register).
	pub fn with(mut self, domain: Domain<C>) -> Self {
		self.register(domain);
		self
	}

	/// Returns true if a handler is registered for `method`.
	pub fn handles(&self, method: &str) -> bool {
		self.lookup(method).is_some()
	}

	/// Routes `method` to its handler.
	///
	/// The returned future owns everything it needs, so callers can hold it
	/// across other dispatches or spawn it.
	pub fn dispatch(&self, method: &str, params: Value, ctx: C) -> HandlerFuture {
		match self.lookup(method) {
			Some(handler) => handler(params, ctx),
			None => {
				tracing::debug!(method, "no handler registered, answering with an empty result");
				Box::pin(async { Ok(json!({})) })
			}
		}
	}

	fn lookup(&self, method: &str) -> Option<&HandlerFn<C>> {
		let (domain, name) = method.split_once('.')?;
		self.domains.get(domain)?.get(name)
	}
}

#[cfg(test)]
mod tests;
