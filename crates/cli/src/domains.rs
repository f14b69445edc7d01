//! `Browser` domain served alongside `Target`.

use cdpmux::{Domain, SessionContext};
use serde::Serialize;
use serde_json::json;

pub const PROTOCOL_VERSION: &str = "1.3";

/// `Browser.getVersion` result.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
	pub protocol_version: String,
	pub product: String,
	pub revision: String,
	pub user_agent: String,
	pub js_version: String,
}

impl VersionInfo {
	pub fn current() -> Self {
		let version = env!("CARGO_PKG_VERSION");
		Self {
			protocol_version: PROTOCOL_VERSION.to_owned(),
			product: format!("cdpmux/{version}"),
			revision: version.to_owned(),
			user_agent: format!("cdpmux/{version}"),
			js_version: String::new(),
		}
	}
}

pub fn browser_domain() -> Domain<SessionContext> {
	Domain::new("Browser")
		.method("getVersion", |_params, _ctx: SessionContext| async move {
			serde_json::to_value(VersionInfo::current()).map_err(|err| cdpmux::Error::Json(err).to_protocol_error())
		})
		.method("close", |_params, ctx: SessionContext| async move {
			// Targets belong to the provider; there is no browser process to stop.
			tracing::info!(session = %ctx.session().id(), "ignoring Browser.close");
			Ok(json!({}))
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn version_info_uses_wire_names() {
		let value = serde_json::to_value(VersionInfo::current()).unwrap();
		assert_eq!(value["protocolVersion"], PROTOCOL_VERSION);
		assert!(value["product"].as_str().unwrap().starts_with("cdpmux/"));
		assert!(value.get("userAgent").is_some());
		assert!(value.get("jsVersion").is_some());
	}

	#[test]
	fn browser_domain_registers_its_methods() {
		let domain = browser_domain();
		let mut methods: Vec<&str> = domain.methods().collect();
		methods.sort();
		assert_eq!(methods, vec!["close", "getVersion"]);
	}
}
