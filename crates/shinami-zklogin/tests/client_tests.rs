/*
[INPUT]:  Mock auth API and key set endpoints
[OUTPUT]: Test results for the auth API client and remote key sets
[POS]:    Integration tests - HTTP client side of the login protocol
[UPDATE]: When client calls, cookie handling or key set caching change
*/

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{
    APP_ID, GOOGLE_ISS, SUBJECT, TestProviders, google_apps, google_jwt, jwk_set, login_request,
};
use jwt_simple::prelude::{Claims, Duration as JwtDuration, RS256KeyPair, RSAKeyPairLike};
use serde_json::{Value, json};
use shinami_zklogin::local::MemoryLocalSessionStore;
use shinami_zklogin::oidc::{JwksCache, KeySetSource, verify_jwt};
use shinami_zklogin::{
    AuthApiClient, AuthBackend, AuthError, LocalSession, LocalSessionStore, OidProvider,
    ZkLoginError, ZkLoginUser, create_local_session,
};
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn logged_in_user(session: &LocalSession) -> ZkLoginUser {
    let providers = TestProviders::new(8);
    let handler = providers.handler(google_apps());
    let request = login_request(session, google_jwt(&session.nonce, APP_ID, SUBJECT));
    assert_ok!(handler.login(&request).await).user
}

fn client(server: &MockServer) -> AuthApiClient {
    assert_ok!(AuthApiClient::new(&format!("{}/api/auth", server.uri())))
}

#[tokio::test]
async fn test_login_posts_request_and_keeps_cookie() {
    let server = MockServer::start().await;
    let session = assert_ok!(LocalSession::generate(10));
    let user = logged_in_user(&session).await;
    let request = login_request(&session, google_jwt(&session.nonce, APP_ID, SUBJECT));

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(serde_json::to_value(&request).unwrap()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "zklogin_session=abc; Path=/; HttpOnly")
                .set_body_json(&user),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("cookie", "zklogin_session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&user))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    assert_eq!(api.auth_base().as_str(), format!("{}/api/auth/", server.uri()));

    let logged_in = assert_ok!(api.login(&request).await);
    assert_eq!(logged_in.wallet, user.wallet);

    let me = assert_ok!(api.me().await);
    assert_eq!(me.map(|user| user.wallet), Some(user.wallet));
}

#[tokio::test]
async fn test_login_error_carries_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "Invalid jwt nonce" })))
        .mount(&server)
        .await;

    let session = assert_ok!(LocalSession::generate(10));
    let request = login_request(&session, google_jwt(&session.nonce, APP_ID, SUBJECT));
    match client(&server).login(&request).await {
        Err(ZkLoginError::Api { status, error }) => {
            assert_eq!(status, 400);
            assert_eq!(error, "Invalid jwt nonce");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_me_unauthorized_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Unauthorized" })))
        .mount(&server)
        .await;

    assert!(assert_ok!(client(&server).me().await).is_none());
}

#[tokio::test]
async fn test_me_server_error_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    match client(&server).me().await {
        Err(ZkLoginError::Api { status, error }) => {
            assert_eq!(status, 500);
            assert_eq!(error, "boom");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_local_session_logs_out_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryLocalSessionStore::new();
    let old = assert_ok!(LocalSession::generate(3));
    assert_ok!(store.save(&old));

    let session = assert_ok!(create_local_session(&client(&server), &store, &12u64).await);
    assert_eq!(session.max_epoch, 12);

    let stored = assert_ok!(store.load()).unwrap();
    assert_eq!(stored.nonce, session.nonce);
    assert_ne!(stored.nonce, old.nonce);
}

#[tokio::test]
async fn test_create_local_session_keeps_old_on_logout_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = MemoryLocalSessionStore::new();
    let old = assert_ok!(LocalSession::generate(3));
    assert_ok!(store.save(&old));

    assert!(create_local_session(&client(&server), &store, &12u64).await.is_err());
    assert_eq!(assert_ok!(store.load()).unwrap().nonce, old.nonce);
}

#[tokio::test]
async fn test_execute_tx_signs_prepared_bytes() {
    let server = MockServer::start().await;
    let session = assert_ok!(LocalSession::generate(10));
    let signature = assert_ok!(session.sign_transaction("AAEC"));

    Mock::given(method("POST"))
        .and(path("/api/send/tx"))
        .and(body_json(json!({ "amount": 5 })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "txBytes": "AAEC", "gasSignature": "gas-sig" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/send/exec"))
        .and(body_json(json!({
            "txBytes": "AAEC",
            "gasSignature": "gas-sig",
            "signature": signature,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "digest": "D1" })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let result: Value = assert_ok!(
        api.execute_tx(
            &format!("{}/api/send/", server.uri()),
            &json!({ "amount": 5 }),
            &session
        )
        .await
    );
    assert_eq!(result, json!({ "digest": "D1" }));
}

#[tokio::test]
async fn test_jwks_cached_until_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwk_set()))
        .expect(2)
        .mount(&server)
        .await;

    let cache = JwksCache::new(reqwest::Client::new(), Duration::from_secs(60))
        .with_refresh_cooldown(Duration::ZERO)
        .with_url(OidProvider::Google, format!("{}/certs", server.uri()));

    let first = assert_ok!(cache.key_set(OidProvider::Google, false).await);
    let second = assert_ok!(cache.key_set(OidProvider::Google, false).await);
    assert_eq!(first.keys.len(), 1);
    assert_eq!(first, second);

    let refreshed = assert_ok!(cache.key_set(OidProvider::Google, true).await);
    assert_eq!(refreshed, first);
}

#[tokio::test]
async fn test_refresh_within_cooldown_reuses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwk_set()))
        .expect(1)
        .mount(&server)
        .await;

    let cache = JwksCache::new(reqwest::Client::new(), Duration::from_secs(60))
        .with_url(OidProvider::Google, format!("{}/certs", server.uri()));

    assert_ok!(cache.key_set(OidProvider::Google, false).await);
    assert_ok!(cache.key_set(OidProvider::Google, true).await);
}

#[tokio::test]
async fn test_unknown_key_id_triggers_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [] })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwk_set()))
        .mount(&server)
        .await;

    let cache = JwksCache::new(reqwest::Client::new(), Duration::from_secs(60))
        .with_refresh_cooldown(Duration::ZERO)
        .with_url(OidProvider::Google, format!("{}/certs", server.uri()));
    let jwt = google_jwt("nonce-1", APP_ID, SUBJECT);

    let verified = assert_ok!(verify_jwt(&cache, OidProvider::Google, &jwt, "sub").await);
    assert_eq!(verified.claims["sub"], SUBJECT);
    assert_eq!(verified.aud, APP_ID);
}

#[tokio::test]
async fn test_unknown_key_ids_do_not_hammer_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwk_set()))
        .expect(1)
        .mount(&server)
        .await;

    let cache = JwksCache::new(reqwest::Client::new(), Duration::from_secs(60))
        .with_url(OidProvider::Google, format!("{}/certs", server.uri()));
    let stranger = RS256KeyPair::generate(2048).unwrap().with_key_id("bogus-kid");

    for i in 0..20 {
        let claims = Claims::create(JwtDuration::from_hours(1))
            .with_issuer(GOOGLE_ISS)
            .with_audience(APP_ID)
            .with_subject(SUBJECT)
            .with_nonce(format!("nonce-{i}"));
        let jwt = stranger.sign(claims).unwrap();

        let err = verify_jwt(&cache, OidProvider::Google, &jwt, "sub").await.unwrap_err();
        assert!(matches!(err, ZkLoginError::Auth(AuthError::BadJwt)), "got {err:?}");
    }
}

#[tokio::test]
async fn test_jwks_fetch_failure_is_internal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let cache = JwksCache::new(reqwest::Client::new(), Duration::from_secs(60))
        .with_url(OidProvider::Google, format!("{}/certs", server.uri()));
    let err = cache.key_set(OidProvider::Google, false).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(err.is_internal());
}
