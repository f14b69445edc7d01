use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::ids::SessionId;

/// Command sent by a debugger client.
///
/// A missing `sessionId` addresses the default session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundCommand {
	pub id: u64,
	pub method: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
}

impl InboundCommand {
	/// The addressed session, with an absent field mapped to the default session.
	pub fn session(&self) -> SessionId {
		self.session_id.clone().unwrap_or_default()
	}
}

/// Reply to an [`InboundCommand`], correlated by `id`.
///
/// Exactly one of `result` and `error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
	pub id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ProtocolError>,
}

impl Response {
	pub fn new(id: u64, session_id: Option<SessionId>, outcome: Result<Value, ProtocolError>) -> Self {
		match outcome {
			Ok(result) => Self {
				id,
				session_id,
				result: Some(result),
				error: None,
			},
			Err(error) => Self {
				id,
				session_id,
				result: None,
				error: Some(error),
			},
		}
	}
}

/// Notification pushed to the client without a matching command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub method: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
}

impl Event {
	pub fn new(method: impl Into<String>, params: Value, session_id: Option<SessionId>) -> Self {
		Self {
			method: method.into(),
			params,
			session_id,
		}
	}
}

/// Anything written to the client. Responses are told apart by their `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
	Response(Response),
	Event(Event),
}

impl From<Response> for OutboundMessage {
	fn from(response: Response) -> Self {
		Self::Response(response)
	}
}

impl From<Event> for OutboundMessage {
	fn from(event: Event) -> Self {
		Self::Event(event)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn command_without_session_addresses_default_session() {
		let cmd: InboundCommand = serde_json::from_str(r#"{"id": 7, "method": "Target.getTargets"}"#).unwrap();
		assert_eq!(cmd.id, 7);
		assert_eq!(cmd.params, Value::Null);
		assert!(cmd.session().is_default());
	}

	#[test]
	fn command_with_session_keeps_it() {
		let cmd: InboundCommand =
			serde_json::from_str(r#"{"id": 1, "method": "Page.enable", "params": {}, "sessionId": "ABC"}"#).unwrap();
		assert_eq!(cmd.session(), SessionId::from("ABC"));
		assert_eq!(cmd.params, json!({}));
	}

	#[test]
	fn default_session_event_omits_session_field() {
		let event = Event::new("Page.loadEventFired", json!({"timestamp": 1}), SessionId::default().wire());
		let value = serde_json::to_value(&event).unwrap();
		assert_eq!(value, json!({"method": "Page.loadEventFired", "params": {"timestamp": 1}}));
	}

	#[test]
	fn error_response_has_no_result() {
		let response = Response::new(3, Some("S1".into()), Err(ProtocolError::server("Unknown target: x")));
		let value = serde_json::to_value(&response).unwrap();
		assert_eq!(
			value,
			json!({"id": 3, "sessionId": "S1", "error": {"code": -32000, "message": "Unknown target: x"}})
		);
	}

	#[test]
	fn untagged_outbound_distinguishes_responses_from_events() {
		let response: OutboundMessage = serde_json::from_value(json!({"id": 1, "result": {}})).unwrap();
		assert!(matches!(response, OutboundMessage::Response(_)));

		let event: OutboundMessage =
			serde_json::from_value(json!({"method": "Target.targetCreated", "params": {}})).unwrap();
		assert!(matches!(event, OutboundMessage::Event(_)));
	}
}
