/*
[INPUT]:  Mock JSON-RPC responses
[OUTPUT]: Test results for the JSON-RPC transport
[POS]:    Integration tests - RPC layer
[UPDATE]: When wire protocol handling changes
*/

mod common;

use common::{ACCESS_KEY, rpc_call, rpc_invalid_params, rpc_result, setup_mock_server};
use serde_json::json;
use shinami_clients::{ShinamiError, ShinamiRpcClient};
use tokio_test::assert_ok;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_request_decodes_result() {
    let server = setup_mock_server().await;
    rpc_call("gas_getFund", json!([]))
        .respond_with(rpc_result(json!({ "balance": 5 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = assert_ok!(ShinamiRpcClient::new(ACCESS_KEY, &server.uri()));
    let result: serde_json::Value = assert_ok!(client.request("gas_getFund", json!([])).await);
    assert_eq!(result["balance"], 5);
}

#[tokio::test]
async fn test_request_surfaces_rpc_error() {
    let server = setup_mock_server().await;
    rpc_call("shinami_wal_getWallet", json!(["missing"]))
        .respond_with(rpc_invalid_params("Wallet not found"))
        .mount(&server)
        .await;

    let client = assert_ok!(ShinamiRpcClient::new(ACCESS_KEY, &server.uri()));
    let err = client
        .request::<String, _>("shinami_wal_getWallet", ["missing"])
        .await
        .unwrap_err();

    assert!(err.is_invalid_params());
    assert_eq!(err.error_details().unwrap().details, "Wallet not found");
}

#[tokio::test]
async fn test_request_null_result() {
    let server = setup_mock_server().await;
    rpc_call("shinami_walx_getBeneficiary", json!(["w", "g"]))
        .respond_with(rpc_result(json!(null)))
        .mount(&server)
        .await;

    let client = assert_ok!(ShinamiRpcClient::new(ACCESS_KEY, &server.uri()));
    let result: Option<String> =
        assert_ok!(client.request("shinami_walx_getBeneficiary", ["w", "g"]).await);
    assert!(result.is_none());
}

#[tokio::test]
async fn test_non_json_error_status() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let client = assert_ok!(ShinamiRpcClient::new(ACCESS_KEY, &server.uri()));
    let err = client.rpc_discover().await.unwrap_err();
    match err {
        ShinamiError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("Expected Api error, got {other:?}"),
    }
}
