use cdpmux_protocol::SERVER_ERROR;
use cdpmux_protocol::target::{CloseTargetParams, GetTargetInfoParams, SetAutoAttachParams};
use serde_json::json;

use super::*;

#[test]
fn null_params_decode_as_empty_object() {
	let params: GetTargetInfoParams = parse_params(Value::Null).unwrap();
	assert!(params.target_id.is_none());

	let params: SetAutoAttachParams = parse_params(json!({"autoAttach": true, "flatten": true})).unwrap();
	assert!(params.auto_attach && params.flatten);
}

#[test]
fn missing_field_is_a_server_error() {
	let err = parse_params::<CloseTargetParams>(Value::Null).unwrap_err();
	assert_eq!(err.code, SERVER_ERROR);
	assert!(err.message.starts_with("Invalid parameters: "), "{}", err.message);
	assert!(err.message.contains("targetId"), "{}", err.message);
}
