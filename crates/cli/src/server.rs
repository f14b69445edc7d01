//! DevTools HTTP and WebSocket endpoint.
//!
//! Each WebSocket gets its own [`Coordinator`]; every connection shares one
//! dispatcher and one target provider.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cdpmux::{Coordinator, CoordinatorOptions, Dispatcher, MemoryProvider, SessionDispatcher, TargetProvider, domains};
use cdpmux_protocol::{TargetId, TargetInfo};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::cli::ServeArgs;
use crate::config::{ServeConfig, TargetSeed};
use crate::domains::{PROTOCOL_VERSION, VersionInfo, browser_domain};

/// How long a closing socket may spend flushing queued messages.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Builds the dispatcher shared by every connection.
pub fn dispatcher() -> SessionDispatcher {
	Dispatcher::new().with(domains::target::domain()).with(browser_domain())
}

/// Builds the in-memory provider and seeds it.
pub fn seeded_provider(auto_reply: bool, seeds: &[TargetSeed]) -> MemoryProvider {
	let provider = MemoryProvider::new().with_auto_reply(auto_reply);
	for seed in seeds {
		let mut info = TargetInfo::page(MemoryProvider::new_target_id(), &seed.url, seed.title.clone().unwrap_or_default());
		if let Some(kind) = &seed.kind {
			info.kind = kind.clone();
		}
		provider.add_target(info);
	}
	provider
}

#[derive(Clone)]
struct AppState {
	dispatcher: Arc<SessionDispatcher>,
	provider: Arc<dyn TargetProvider>,
	addr: SocketAddr,
}

impl AppState {
	/// Authority clients should use in WebSocket URLs.
	fn authority(&self, headers: &HeaderMap) -> String {
		headers
			.get(HOST)
			.and_then(|host| host.to_str().ok())
			.map(str::to_owned)
			.unwrap_or_else(|| self.addr.to_string())
	}
}

/// A bound, not yet running, DevTools endpoint.
pub struct Server {
	listener: TcpListener,
	app: Router,
	addr: SocketAddr,
}

impl Server {
	pub async fn bind(host: &str, port: u16, dispatcher: SessionDispatcher, provider: Arc<dyn TargetProvider>) -> Result<Self> {
		let addr: SocketAddr = format!("{host}:{port}")
			.parse()
			.with_context(|| format!("Invalid host/port combination: {host}:{port}"))?;

		let listener = TcpListener::bind(addr)
			.await
			.with_context(|| format!("Failed to bind DevTools endpoint to {addr}"))?;
		let addr = listener.local_addr().context("Reading bound address")?;

		let state = AppState {
			dispatcher: Arc::new(dispatcher),
			provider,
			addr,
		};
		Ok(Self {
			listener,
			app: router(state),
			addr,
		})
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.addr
	}

	pub async fn run(self) -> Result<()> {
		info!(addr = %self.addr, "DevTools endpoint listening");
		axum::serve(self.listener, self.app.into_make_service())
			.await
			.context("DevTools endpoint error")
	}
}

/// `cdpmux serve`.
pub async fn run_serve(args: ServeArgs) -> Result<()> {
	let config = ServeConfig::resolve(&args).context("Loading configuration")?;
	let provider = seeded_provider(config.auto_reply, &config.targets);
	info!(
		targets = config.targets.len(),
		auto_reply = config.auto_reply,
		"seeded in-memory targets"
	);

	let server = Server::bind(&config.host, config.port, dispatcher(), Arc::new(provider)).await?;
	server.run().await
}

fn router(state: AppState) -> Router {
	Router::new()
		.route("/json/version", get(version))
		.route("/json", get(list))
		.route("/json/list", get(list))
		.route("/devtools/browser", get(browser_socket))
		.route("/devtools/browser/{browser_id}", get(browser_socket))
		.route("/devtools/page/{target_id}", get(page_socket))
		.with_state(state)
}

#[derive(Serialize)]
struct VersionResponse {
	#[serde(rename = "Browser")]
	browser: String,
	#[serde(rename = "Protocol-Version")]
	protocol_version: &'static str,
	#[serde(rename = "User-Agent")]
	user_agent: String,
	#[serde(rename = "webSocketDebuggerUrl")]
	web_socket_debugger_url: String,
}

async fn version(State(state): State<AppState>, headers: HeaderMap) -> Json<VersionResponse> {
	let info = VersionInfo::current();
	Json(VersionResponse {
		browser: info.product,
		protocol_version: PROTOCOL_VERSION,
		user_agent: info.user_agent,
		web_socket_debugger_url: format!("ws://{}/devtools/browser", state.authority(&headers)),
	})
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEntry {
	description: String,
	id: TargetId,
	title: String,
	#[serde(rename = "type")]
	kind: String,
	url: String,
	web_socket_debugger_url: String,
}

async fn list(State(state): State<AppState>, headers: HeaderMap) -> Json<Vec<ListEntry>> {
	let authority = state.authority(&headers);
	let entries = state
		.provider
		.targets()
		.iter()
		.map(|target| {
			let info = target.target_info();
			ListEntry {
				description: String::new(),
				web_socket_debugger_url: format!("ws://{authority}/devtools/page/{}", info.target_id),
				id: info.target_id,
				title: info.title,
				kind: info.kind,
				url: info.url,
			}
		})
		.collect();
	Json(entries)
}

async fn browser_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
	ws.on_upgrade(|socket| handle_socket(socket, state, None))
}

async fn page_socket(Path(target_id): Path<String>, ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
	let target_id = TargetId::new(target_id);
	if state.provider.get_target(&target_id).is_none() {
		return (StatusCode::NOT_FOUND, format!("No such target id: {target_id}")).into_response();
	}
	ws.on_upgrade(|socket| handle_socket(socket, state, Some(target_id)))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, default_target: Option<TargetId>) {
	let endpoint = match &default_target {
		Some(target_id) => format!("page/{target_id}"),
		None => "browser".to_owned(),
	};
	let options = CoordinatorOptions { default_target };
	let (coordinator, outbound) = match Coordinator::new(Arc::clone(&state.dispatcher), Arc::clone(&state.provider), options) {
		Ok(pair) => pair,
		Err(err) => {
			warn!(endpoint = %endpoint, error = %err, "rejecting debugger connection");
			let _ = socket.send(Message::Close(None)).await;
			return;
		}
	};
	info!(endpoint = %endpoint, "debugger connected");

	let (mut ws_tx, mut ws_rx) = socket.split();
	let mut outbound = UnboundedReceiverStream::new(outbound);
	let mut send_task = tokio::spawn(async move {
		while let Some(raw) = outbound.next().await {
			if ws_tx.send(Message::Text(raw.into())).await.is_err() {
				break;
			}
		}
		let _ = ws_tx.send(Message::Close(None)).await;
	});

	let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
	let recv_endpoint = endpoint.clone();
	let recv_task = tokio::spawn(async move {
		while let Some(msg) = ws_rx.next().await {
			match msg {
				Ok(Message::Text(text)) => {
					if inbound_tx.send(text.as_str().to_owned()).is_err() {
						break;
					}
				}
				Ok(Message::Close(_)) => break,
				Ok(_) => {}
				Err(err) => {
					warn!(endpoint = %recv_endpoint, error = %err, "debugger websocket error");
					break;
				}
			}
		}
	});

	coordinator.serve(UnboundedReceiverStream::new(inbound_rx)).await;
	recv_task.abort();

	// Dropping the last coordinator handle closes the outbound stream.
	drop(coordinator);
	if tokio::time::timeout(FLUSH_TIMEOUT, &mut send_task).await.is_err() {
		debug!(endpoint = %endpoint, "outbound flush timed out");
		send_task.abort();
	}
	info!(endpoint = %endpoint, "debugger disconnected");
}
