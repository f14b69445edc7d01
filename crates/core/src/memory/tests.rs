use super::*;
use crate::outbound::Outbound;
use crate::session::{Session, SessionKind};

#[test]
fn lifecycle_is_broadcast_to_subscribers() {
	let provider = MemoryProvider::new();
	let mut rx = provider.subscribe();

	let target = provider.add_page("https://example.com/", "Example");
	let id = target.id();
	assert!(provider.remove_target(&id));
	assert!(!provider.remove_target(&id));

	match rx.try_recv().unwrap() {
		TargetLifecycle::Created(info) => {
			assert_eq!(info.target_id, id);
			assert_eq!(info.kind, "page");
			assert!(!info.attached);
		}
		other => panic!("unexpected {other:?}"),
	}
	assert_eq!(rx.try_recv().unwrap(), TargetLifecycle::Destroyed(id));
	assert!(rx.try_recv().is_err());
}

#[test]
fn attached_flag_follows_live_attachments() {
	let provider = MemoryProvider::new();
	let target = provider.add_target(TargetInfo::page("A", "about:blank", ""));
	let (outbound, _rx) = Outbound::channel();
	let session = Session::new(SessionId::new("S"), target.id(), SessionKind::Page, None, outbound);

	let attachment = provider.attach(&target.id(), SessionSink::new(&session)).unwrap();
	assert!(target.target_info().attached);
	assert_eq!(provider.targets().len(), 1);

	attachment.dispose();
	assert!(!target.target_info().attached);
	let err = attachment
		.send(TargetCommand {
			id: 1,
			method: "Page.enable".to_owned(),
			params: json!({}),
		})
		.unwrap_err();
	assert_eq!(err, ProviderError::Failed("Target detached".to_owned()));
}

#[test]
fn navigate_keeps_identity() {
	let provider = MemoryProvider::new();
	let target = provider.add_target(TargetInfo::page("A", "about:blank", ""));

	target.navigate("https://example.com/", "Example");

	let info = provider.get_target(&TargetId::from("A")).unwrap().target_info();
	assert_eq!(info.target_id.as_str(), "A");
	assert_eq!(info.url, "https://example.com/");
	assert_eq!(info.title, "Example");
}

#[test]
fn attach_to_unknown_target_fails() {
	let provider = MemoryProvider::new();
	let (outbound, _rx) = Outbound::channel();
	let session = Session::new(SessionId::new("S"), TargetId::from("Z"), SessionKind::Page, None, outbound);

	let err = provider.attach(&TargetId::from("Z"), SessionSink::new(&session)).err().unwrap();
	assert_eq!(err, ProviderError::UnknownTarget(TargetId::from("Z")));
}

#[tokio::test]
async fn create_and_close_honor_capabilities() {
	let provider = MemoryProvider::new();
	let id = provider.create_target("https://new.test/", Some("ctx-1")).await.unwrap();
	let info = provider.target(&id).unwrap().target_info();
	assert_eq!(info.browser_context_id.as_deref(), Some("ctx-1"));
	assert!(provider.close_target(&id).await.unwrap());
	assert_eq!(
		provider.close_target(&id).await.unwrap_err(),
		ProviderError::UnknownTarget(id)
	);

	let locked = MemoryProvider::new().with_lifecycle_control(false, false);
	assert_eq!(
		locked.create_target("about:blank", None).await.unwrap_err(),
		ProviderError::Unsupported("Target.createTarget")
	);
	assert_eq!(
		locked.close_target(&TargetId::from("A")).await.unwrap_err(),
		ProviderError::Unsupported("Target.closeTarget")
	);
}

#[test]
fn emitted_events_reach_every_attached_session() {
	let provider = MemoryProvider::new();
	let target = provider.add_target(TargetInfo::page("A", "about:blank", ""));
	let (outbound, mut rx) = Outbound::channel();
	let sessions: Vec<_> = ["S1", "S2"]
		.into_iter()
		.map(|id| {
			let session = Session::new(SessionId::new(id), target.id(), SessionKind::Page, None, outbound.clone());
			session.attach(&provider).unwrap();
			session
		})
		.collect();

	target.emit("Page.loadEventFired", json!({}));

	let mut delivered = Vec::new();
	while let Ok(raw) = rx.try_recv() {
		let message: Value = serde_json::from_str(&raw).unwrap();
		assert_eq!(message["method"], "Page.loadEventFired");
		delivered.push(message["sessionId"].as_str().unwrap().to_owned());
	}
	let expected: Vec<String> = sessions.iter().map(|session| session.id().to_string()).collect();
	assert_eq!(delivered, expected);
}

#[test]
fn re_adding_a_target_destroys_the_old_one_first() {
	let provider = MemoryProvider::new();
	let mut rx = provider.subscribe();
	let old = provider.add_target(TargetInfo::page("A", "about:blank", ""));
	let (outbound, _outbound_rx) = Outbound::channel();
	let session = Session::new(SessionId::new("S"), old.id(), SessionKind::Page, None, outbound);
	let _attachment = provider.attach(&old.id(), SessionSink::new(&session)).unwrap();

	let new = provider.add_target(TargetInfo::page("A", "https://example.com/", "Example"));

	assert!(!Arc::ptr_eq(&old, &new));
	assert_eq!(new.attachment_count(), 0);
	assert!(matches!(rx.try_recv().unwrap(), TargetLifecycle::Created(_)));
	assert_eq!(rx.try_recv().unwrap(), TargetLifecycle::Destroyed(TargetId::from("A")));
	match rx.try_recv().unwrap() {
		TargetLifecycle::Created(info) => assert_eq!(info.url, "https://example.com/"),
		other => panic!("unexpected {other:?}"),
	}
	assert!(rx.try_recv().is_err());
	assert_eq!(provider.targets().len(), 1);
}
