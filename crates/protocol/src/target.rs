//! Params, results and events of the `Target` domain.
//!
//! Only the subset needed to discover, attach to, create and close targets is
//! modelled. Field names follow the wire (camelCase).

use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, TargetId};

pub const TARGET_CREATED: &str = "Target.targetCreated";
pub const TARGET_DESTROYED: &str = "Target.targetDestroyed";
pub const ATTACHED_TO_TARGET: &str = "Target.attachedToTarget";
pub const DETACHED_FROM_TARGET: &str = "Target.detachedFromTarget";

/// Prefix shared by every method of the domain.
pub const DOMAIN_PREFIX: &str = "Target.";

/// Snapshot of a target as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	pub target_id: TargetId,
	#[serde(rename = "type")]
	pub kind: String,
	pub title: String,
	pub url: String,
	pub attached: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub browser_context_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub opener_id: Option<TargetId>,
}

impl TargetInfo {
	/// A detached `"page"` target.
	pub fn page(target_id: impl Into<TargetId>, url: impl Into<String>, title: impl Into<String>) -> Self {
		Self {
			target_id: target_id.into(),
			kind: "page".to_owned(),
			title: title.into(),
			url: url.into(),
			attached: false,
			browser_context_id: None,
			opener_id: None,
		}
	}

	/// Copy of this info with `attached` overridden.
	pub fn with_attached(mut self, attached: bool) -> Self {
		self.attached = attached;
		self
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAutoAttachParams {
	pub auto_attach: bool,
	#[serde(default)]
	pub wait_for_debugger_on_start: bool,
	#[serde(default)]
	pub flatten: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDiscoverTargetsParams {
	pub discover: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetParams {
	pub target_id: TargetId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub flatten: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachFromTargetParams {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<SessionId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_id: Option<TargetId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetInfoParams {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_id: Option<TargetId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetParams {
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub browser_context_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTargetParams {
	pub target_id: TargetId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetsResult {
	pub target_infos: Vec<TargetInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTargetInfoResult {
	pub target_info: TargetInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
	pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResult {
	pub target_id: TargetId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTargetResult {
	pub success: bool,
}

/// `Target.targetCreated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCreated {
	pub target_info: TargetInfo,
}

/// `Target.targetDestroyed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDestroyed {
	pub target_id: TargetId,
}

/// `Target.attachedToTarget`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedToTarget {
	pub session_id: SessionId,
	pub target_info: TargetInfo,
	pub waiting_for_debugger: bool,
}

/// `Target.detachedFromTarget`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedFromTarget {
	pub session_id: SessionId,
	pub target_id: TargetId,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn target_info_uses_wire_names() {
		let info = TargetInfo::page("A", "https://example.com/", "Example");
		assert_eq!(
			serde_json::to_value(&info).unwrap(),
			json!({
				"targetId": "A",
				"type": "page",
				"title": "Example",
				"url": "https://example.com/",
				"attached": false
			})
		);
	}

	#[test]
	fn set_auto_attach_defaults_optional_flags() {
		let params: SetAutoAttachParams = serde_json::from_value(json!({"autoAttach": true})).unwrap();
		assert!(params.auto_attach);
		assert!(!params.wait_for_debugger_on_start);
		assert!(!params.flatten);
	}

	#[test]
	fn attach_requires_target_id() {
		let err = serde_json::from_value::<AttachToTargetParams>(json!({"flatten": true})).unwrap_err();
		assert!(err.to_string().contains("targetId"));
	}
}
