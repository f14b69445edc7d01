//! Target domain behaviour against a provider whose optional capabilities fail.

use std::sync::Arc;

use async_trait::async_trait;
use cdpmux::{
	Attachment, Coordinator, CoordinatorOptions, Dispatcher, ProviderError, SessionSink, Target, TargetLifecycle,
	TargetProvider, domains,
};
use cdpmux_protocol::{SERVER_ERROR, TargetId, TargetInfo};
use serde_json::{Value, json};
use tokio::sync::broadcast;

struct StaticTarget(TargetInfo);

impl Target for StaticTarget {
	fn id(&self) -> TargetId {
		self.0.target_id.clone()
	}

	fn target_info(&self) -> TargetInfo {
		self.0.clone()
	}
}

/// One target that refuses attachment, plus failing create/close.
struct BrokenProvider {
	target: Arc<StaticTarget>,
	lifecycle: broadcast::Sender<TargetLifecycle>,
}

impl BrokenProvider {
	fn new() -> Self {
		let (lifecycle, _) = broadcast::channel(8);
		Self {
			target: Arc::new(StaticTarget(TargetInfo::page("A", "about:blank", ""))),
			lifecycle,
		}
	}
}

#[async_trait]
impl TargetProvider for BrokenProvider {
	fn get_target(&self, target_id: &TargetId) -> Option<Arc<dyn Target>> {
		(self.target.id() == *target_id).then(|| Arc::clone(&self.target) as Arc<dyn Target>)
	}

	fn targets(&self) -> Vec<Arc<dyn Target>> {
		vec![Arc::clone(&self.target) as Arc<dyn Target>]
	}

	fn subscribe(&self) -> broadcast::Receiver<TargetLifecycle> {
		self.lifecycle.subscribe()
	}

	fn attach(&self, _target_id: &TargetId, _sink: SessionSink) -> Result<Box<dyn Attachment>, ProviderError> {
		Err(ProviderError::Failed("Renderer crashed".to_owned()))
	}

	async fn create_target(&self, _url: &str, _browser_context_id: Option<&str>) -> Result<TargetId, ProviderError> {
		Err(ProviderError::Failed("Browser context is gone".to_owned()))
	}
}

async fn call(message: Value) -> Value {
	let dispatcher = Arc::new(Dispatcher::new().with(domains::target::domain()));
	let (coordinator, mut rx) =
		Coordinator::new(dispatcher, Arc::new(BrokenProvider::new()), CoordinatorOptions::default()).unwrap();
	coordinator.handle_inbound_message(message.to_string()).await;
	serde_json::from_str(&rx.recv().await.unwrap()).unwrap()
}

#[tokio::test]
async fn provider_failure_is_reported_with_its_message() {
	let response = call(json!({"id": 1, "method": "Target.createTarget", "params": {"url": "about:blank"}})).await;
	assert_eq!(
		response,
		json!({"id": 1, "error": {"code": SERVER_ERROR, "message": "Browser context is gone"}})
	);
}

#[tokio::test]
async fn missing_capability_is_reported_as_unsupported() {
	let response = call(json!({"id": 2, "method": "Target.closeTarget", "params": {"targetId": "A"}})).await;
	assert_eq!(
		response,
		json!({"id": 2, "error": {"code": SERVER_ERROR, "message": "Target.closeTarget is not supported"}})
	);
}

#[tokio::test]
async fn refused_attachment_creates_no_session() {
	let dispatcher = Arc::new(Dispatcher::new().with(domains::target::domain()));
	let (coordinator, mut rx) =
		Coordinator::new(dispatcher, Arc::new(BrokenProvider::new()), CoordinatorOptions::default()).unwrap();

	let message = json!({"id": 3, "method": "Target.attachToTarget", "params": {"targetId": "A"}});
	coordinator.handle_inbound_message(message.to_string()).await;
	let response: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();

	assert_eq!(response, json!({"id": 3, "error": {"code": SERVER_ERROR, "message": "Renderer crashed"}}));
	assert!(rx.try_recv().is_err());
	assert_eq!(coordinator.sessions().len(), 1);
}

#[tokio::test]
async fn page_connection_to_refusing_target_fails() {
	let dispatcher = Arc::new(Dispatcher::new().with(domains::target::domain()));
	let options = CoordinatorOptions {
		default_target: Some(TargetId::from("A")),
	};
	let err = Coordinator::new(dispatcher, Arc::new(BrokenProvider::new()), options)
		.err()
		.unwrap();
	assert_eq!(err.to_string(), "Renderer crashed");
}
