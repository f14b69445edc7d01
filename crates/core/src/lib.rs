//! CDP session and target multiplexer.
//!
//! Lets debugger clients discover, attach to and drive independent targets
//! over one flattened connection, where every message is tagged with the
//! `sessionId` it belongs to.
//!
//! The pieces, leaves first:
//!
//! - [`Dispatcher`]: `"Domain.method"` → handler registry
//! - [`domains::target`]: the `Target` domain
//! - [`Session`]: one client's binding to one target, with command correlation
//! - [`Coordinator`]: the session table of one connection, discovery and auto-attach
//!
//! Targets themselves come from a [`TargetProvider`]; [`MemoryProvider`] is an
//! in-process implementation.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use cdpmux::{Coordinator, CoordinatorOptions, Dispatcher, MemoryProvider, domains};
//!
//! let provider = Arc::new(MemoryProvider::new().with_auto_reply(true));
//! provider.add_page("https://example.com/", "Example");
//!
//! let dispatcher = Arc::new(Dispatcher::new().with(domains::target::domain()));
//! let (coordinator, mut outbound) = Coordinator::new(dispatcher, provider, CoordinatorOptions::default())?;
//!
//! coordinator.handle_inbound_message(r#"{"id":1,"method":"Target.getTargets"}"#).await;
//! let response = outbound.recv().await;
//! ```

mod context;
pub mod coordinator;
pub mod dispatcher;
pub mod domains;
pub mod error;
pub mod memory;
pub mod outbound;
pub mod provider;
pub mod session;

pub use cdpmux_protocol as protocol;
pub use context::SessionContext;
pub use coordinator::{BROWSER_TARGET_ID, Coordinator, CoordinatorOptions, SessionDispatcher};
pub use dispatcher::{CommandResult, Dispatcher, Domain, HandlerFuture};
pub use error::{Error, Result};
pub use memory::{MemoryProvider, MemoryTarget, ReceivedCommand};
pub use outbound::{Outbound, OutboundReceiver};
pub use provider::{Attachment, ProviderError, SessionSink, Target, TargetCommand, TargetLifecycle, TargetProvider};
pub use session::{AutoAttach, Session, SessionKind, SessionState};
