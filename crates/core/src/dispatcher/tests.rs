use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use super::*;

fn echo_domain() -> Domain<()> {
	Domain::new("Echo")
		.method("params", |params, _ctx| async move { Ok(params) })
		.method("fail", |_params, _ctx| async move { Err(ProtocolError::server("boom")) })
}

#[tokio::test]
async fn unknown_domain_answers_empty_result() {
	let dispatcher = Dispatcher::new().with(echo_domain());

	let result = dispatcher.dispatch("Foo.bar", json!({"x": 1}), ()).await;
	assert_eq!(result, Ok(json!({})));
}

#[tokio::test]
async fn unknown_method_in_known_domain_answers_empty_result() {
	let dispatcher = Dispatcher::new().with(echo_domain());

	assert!(!dispatcher.handles("Echo.missing"));
	let result = dispatcher.dispatch("Echo.missing", Value::Null, ()).await;
	assert_eq!(result, Ok(json!({})));
}

#[tokio::test]
async fn method_without_domain_separator_is_unknown() {
	let dispatcher = Dispatcher::new().with(echo_domain());

	assert!(!dispatcher.handles("params"));
	assert_eq!(dispatcher.dispatch("params", Value::Null, ()).await, Ok(json!({})));
}

#[tokio::test]
async fn handler_result_and_error_pass_through_verbatim() {
	let dispatcher = Dispatcher::new().with(echo_domain());

	let ok = dispatcher.dispatch("Echo.params", json!({"a": [1, 2]}), ()).await;
	assert_eq!(ok, Ok(json!({"a": [1, 2]})));

	let err = dispatcher.dispatch("Echo.fail", Value::Null, ()).await.unwrap_err();
	assert_eq!(err.code, cdpmux_protocol::SERVER_ERROR);
	assert_eq!(err.message, "boom");
}

#[tokio::test]
async fn handler_receives_context() {
	let domain = Domain::new("Ctx").method("get", |_params, ctx: Arc<AtomicUsize>| async move {
		let hits = ctx.fetch_add(1, Ordering::SeqCst) + 1;
		Ok(json!({"hits": hits}))
	});
	let dispatcher = Dispatcher::new().with(domain);
	let counter = Arc::new(AtomicUsize::new(0));

	dispatcher.dispatch("Ctx.get", Value::Null, Arc::clone(&counter)).await.unwrap();
	let second = dispatcher.dispatch("Ctx.get", Value::Null, Arc::clone(&counter)).await;

	assert_eq!(second, Ok(json!({"hits": 2})));
	assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn re_registration_keeps_last_table() {
	let first = Domain::new("Dup").method("which", |_p, _c: ()| async { Ok(json!("first")) });
	let second = Domain::new("Dup").method("which", |_p, _c: ()| async { Ok(json!("second")) });
	let dispatcher = Dispatcher::new().with(first).with(second);

	assert_eq!(dispatcher.dispatch("Dup.which", Value::Null, ()).await, Ok(json!("second")));
}

#[test]
fn domain_lists_its_methods() {
	let domain = echo_domain();
	let mut methods: Vec<_> = domain.methods().collect();
	methods.sort_unstable();
	assert_eq!(domain.name(), "Echo");
	assert_eq!(methods, ["fail", "params"]);
}
