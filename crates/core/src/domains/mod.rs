//! Built-in protocol domains.

pub mod target;

use cdpmux_protocol::ProtocolError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::dispatcher::CommandResult;
use crate::error::Error;

/// Decodes command params. Absent params decode like `{}`.
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ProtocolError> {
	let params = if params.is_null() { json!({}) } else { params };
	serde_json::from_value(params).map_err(|err| Error::InvalidParams(err).to_protocol_error())
}

/// Encodes a handler's result object.
pub fn to_result<T: Serialize>(result: &T) -> CommandResult {
	serde_json::to_value(result).map_err(|err| Error::Json(err).to_protocol_error())
}

#[cfg(test)]
mod tests;
