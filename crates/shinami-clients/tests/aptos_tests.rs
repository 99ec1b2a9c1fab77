/*
[INPUT]:  Mock Aptos service responses
[OUTPUT]: Test results for Aptos clients and the wallet signer
[POS]:    Integration tests - Aptos services
[UPDATE]: When Aptos RPC methods change
*/

mod common;

use common::{ACCESS_KEY, rpc_call, rpc_invalid_params, rpc_result, setup_mock_server};
use serde_json::json;
use shinami_clients::aptos::{
    AptosTransaction, GasStationClient, KeyClient, ShinamiWalletSigner, WalletClient,
};
use tokio_test::assert_ok;

fn simple_transaction() -> AptosTransaction {
    AptosTransaction {
        raw_transaction: vec![0xde, 0xad],
        secondary_signer_addresses: None,
        fee_payer_address: None,
    }
}

#[tokio::test]
async fn test_sponsor_transaction_sets_fee_payer() {
    let server = setup_mock_server().await;
    rpc_call("gas_sponsorTransaction", json!(["0xdead"]))
        .respond_with(rpc_result(json!({
            "feePayer": { "address": "0xfee", "signature": [0, 1, 2] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gas = assert_ok!(GasStationClient::with_url(ACCESS_KEY, &server.uri()));
    let mut tx = simple_transaction();
    let signature = assert_ok!(gas.sponsor_transaction(&mut tx).await);
    assert_eq!(signature, vec![0, 1, 2]);
    assert_eq!(tx.fee_payer_address.as_deref(), Some("0xfee"));
}

#[tokio::test]
async fn test_sponsor_and_submit() {
    let server = setup_mock_server().await;
    rpc_call("gas_sponsorAndSubmitSignedTransaction", json!(["0xdead", "0x0102", []]))
        .respond_with(rpc_result(json!({ "pendingTransaction": { "hash": "0xhash" } })))
        .expect(1)
        .mount(&server)
        .await;

    let gas = assert_ok!(GasStationClient::with_url(ACCESS_KEY, &server.uri()));
    let pending = assert_ok!(
        gas.sponsor_and_submit_signed_transaction(&simple_transaction(), &[1, 2], &[])
            .await
    );
    assert_eq!(pending["hash"], "0xhash");
}

#[tokio::test]
async fn test_signer_creates_wallet_on_chain() {
    let key_server = setup_mock_server().await;
    rpc_call("key_createSession", json!(["secret"]))
        .respond_with(rpc_result(json!("token")))
        .mount(&key_server)
        .await;

    let wallet_server = setup_mock_server().await;
    rpc_call("wal_getWallet", json!(["wallet-1"]))
        .respond_with(rpc_invalid_params("Wallet not found"))
        .mount(&wallet_server)
        .await;
    rpc_call("wal_createWalletOnChain", json!(["wallet-1", "token"]))
        .respond_with(rpc_result(json!({ "accountAddress": "0xaptos" })))
        .expect(1)
        .mount(&wallet_server)
        .await;

    let signer = ShinamiWalletSigner::with_secret(
        "wallet-1",
        assert_ok!(WalletClient::with_url(ACCESS_KEY, &wallet_server.uri())),
        "secret",
        assert_ok!(KeyClient::with_url(ACCESS_KEY, &key_server.uri())),
    );
    assert_eq!(assert_ok!(signer.get_address(true, true).await), "0xaptos");
}

#[tokio::test]
async fn test_signer_sign_transaction() {
    let key_server = setup_mock_server().await;
    rpc_call("key_createSession", json!(["secret"]))
        .respond_with(rpc_result(json!("token")))
        .mount(&key_server)
        .await;

    let wallet_server = setup_mock_server().await;
    rpc_call("wal_signTransaction", json!(["wallet-1", "token", "0xdead"]))
        .respond_with(rpc_result(json!({ "signature": [9, 9] })))
        .expect(1)
        .mount(&wallet_server)
        .await;

    let signer = ShinamiWalletSigner::with_secret(
        "wallet-1",
        assert_ok!(WalletClient::with_url(ACCESS_KEY, &wallet_server.uri())),
        "secret",
        assert_ok!(KeyClient::with_url(ACCESS_KEY, &key_server.uri())),
    );
    let signature = assert_ok!(signer.sign_transaction(&simple_transaction()).await);
    assert_eq!(signature, vec![9, 9]);
}
