/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared JSON-RPC mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for shinami-clients tests

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ACCESS_KEY: &str = "us1_sui_testnet_test";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// JSON-RPC success envelope
pub fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

/// JSON-RPC error envelope with Shinami `{details}` data
pub fn rpc_invalid_params(details: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {
            "code": -32602,
            "message": "Invalid params",
            "data": { "details": details },
        },
    }))
}

/// Mock matching a JSON-RPC call by method and params
pub fn rpc_call(rpc_method: &str, params: Value) -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(header("X-API-Key", ACCESS_KEY))
        .and(body_partial_json(json!({
            "jsonrpc": "2.0",
            "method": rpc_method,
            "params": params,
        })))
}
