//! Every command sent through a session resolves exactly once, whatever the
//! interleaving of sends, target replies and disposal.

use std::collections::HashSet;
use std::time::Duration;

use cdpmux::{Error, MemoryProvider, Outbound, ReceivedCommand, Session, SessionKind, Target};
use cdpmux_protocol::SessionId;
use proptest::prelude::*;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
enum Op {
	Send,
	Reply(usize),
	Dispose,
}

fn op() -> impl Strategy<Value = Op> {
	prop_oneof![
		4 => Just(Op::Send),
		3 => any::<usize>().prop_map(Op::Reply),
		1 => Just(Op::Dispose),
	]
}

struct Call {
	/// Id the target saw, or `None` if the session was already disposed.
	id: Option<u64>,
	handle: JoinHandle<cdpmux::Result<Value>>,
}

async fn next_command(target: &cdpmux::MemoryTarget) -> ReceivedCommand {
	tokio::time::timeout(Duration::from_secs(5), async {
		loop {
			if let Some(received) = target.take_commands().pop() {
				return received;
			}
			tokio::task::yield_now().await;
		}
	})
	.await
	.expect("command never reached the target")
}

async fn run(ops: Vec<Op>) {
	let provider = MemoryProvider::new();
	let target = provider.add_page("https://prop.test/", "Prop");
	let (outbound, _rx) = Outbound::channel();
	let session = Session::new(SessionId::new("S"), target.id(), SessionKind::Page, None, outbound);
	session.attach(&provider).unwrap();

	let mut calls: Vec<Call> = Vec::new();
	let mut waiting: Vec<ReceivedCommand> = Vec::new();
	let mut replied: HashSet<u64> = HashSet::new();

	for op in ops {
		match op {
			Op::Send => {
				let disposed = session.is_disposed();
				let handle = tokio::spawn({
					let session = session.clone();
					async move { session.send_command("Runtime.evaluate", json!({})).await }
				});
				let id = if disposed {
					None
				} else {
					let received = next_command(&target).await;
					let id = received.command.id;
					waiting.push(received);
					Some(id)
				};
				calls.push(Call { id, handle });
			}
			Op::Reply(index) => {
				if waiting.is_empty() {
					continue;
				}
				let received = waiting.swap_remove(index % waiting.len());
				let id = received.command.id;
				if !session.is_disposed() {
					replied.insert(id);
				}
				received.reply(Ok(json!({"id": id})));
			}
			Op::Dispose => {
				session.dispose();
			}
		}
	}
	session.dispose();
	assert_eq!(session.pending_commands(), 0);

	let ids: Vec<u64> = calls.iter().filter_map(|call| call.id).collect();
	assert_eq!(ids, (1..=ids.len() as u64).collect::<Vec<_>>());

	for call in calls {
		let outcome = tokio::time::timeout(Duration::from_secs(5), call.handle)
			.await
			.expect("command left dangling")
			.unwrap();
		match call.id {
			Some(id) if replied.contains(&id) => assert_eq!(outcome.unwrap(), json!({"id": id})),
			_ => assert!(matches!(outcome, Err(Error::SessionDisposed)), "{outcome:?}"),
		}
	}
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn every_command_resolves_exactly_once(ops in prop::collection::vec(op(), 1..40)) {
		let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
		runtime.block_on(run(ops));
	}
}

#[tokio::test]
async fn two_in_flight_commands_are_rejected_on_dispose() {
	run(vec![Op::Send, Op::Send, Op::Dispose]).await;
}
