/*
[INPUT]:  HTTP requests below the auth and tx mount points, session cookie jars
[OUTPUT]: axum routers answering JSON / redirects with Set-Cookie
[POS]:    Server layer - route dispatch, session commit per request
[UPDATE]: When routes are added or response mapping changes
*/

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{any, post};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};
use url::form_urlencoded;

use crate::error::{Result, ZkLoginError};
use crate::login::LoginHandler;
use crate::providers::EpochProvider;
use crate::session::{Session, SessionStore, require_user};
use crate::tx::TxExecHandler;
use crate::user::ZkLoginRequest;

/// Writes the pending session change into the response
fn respond(
    sessions: &dyn SessionStore,
    session: &Session,
    jar: CookieJar,
    result: Result<Response>,
) -> Response {
    let response = result.unwrap_or_else(IntoResponse::into_response);
    match sessions.commit(session, jar) {
        Ok(jar) => (jar, response).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn bad_method() -> ZkLoginError {
    ZkLoginError::BadMethod
}

async fn not_found() -> ZkLoginError {
    ZkLoginError::NotFound
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|err| ZkLoginError::InvalidRequest(err.to_string()))
}

/// `login`, `logout`, `me` and `apple`
#[derive(Clone)]
pub struct AuthRouter {
    login: Arc<LoginHandler>,
    sessions: Arc<dyn SessionStore>,
}

impl AuthRouter {
    pub fn new(login: Arc<LoginHandler>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { login, sessions }
    }

    /// Routes relative to the mount point, e.g. nest at `/api/auth`
    pub fn router(self) -> Router {
        Router::new()
            .route("/login", post(login).fallback(bad_method))
            .route("/logout", post(logout).get(logout).fallback(bad_method))
            // guard runs before the method check
            .route("/me", any(me))
            .route("/apple", post(apple).fallback(bad_method))
            .fallback(not_found)
            .with_state(self)
    }

    async fn handle_login(&self, body: &[u8], session: &mut Session) -> Result<Response> {
        let request: ZkLoginRequest = parse_json(body)?;
        let outcome = self.login.login(&request).await?;
        let response = Json(&outcome.user).into_response();
        session.save(outcome.user, outcome.expires_at_ms);
        Ok(response)
    }
}

async fn login(State(router): State<AuthRouter>, jar: CookieJar, body: Bytes) -> Response {
    let mut session = router.sessions.load(&jar);
    let result = router.handle_login(&body, &mut session).await;
    respond(router.sessions.as_ref(), &session, jar, result)
}

async fn logout(State(router): State<AuthRouter>, method: Method, jar: CookieJar) -> Response {
    let mut session = router.sessions.load(&jar);
    session.destroy();
    let response = if method == Method::GET {
        Redirect::temporary("/").into_response()
    } else {
        Json(json!({})).into_response()
    };
    respond(router.sessions.as_ref(), &session, jar, Ok(response))
}

async fn me(State(router): State<AuthRouter>, method: Method, jar: CookieJar) -> Response {
    let mut session = router.sessions.load(&jar);
    let result = match require_user(&mut session, router.login.epochs().as_ref()).await {
        Ok(user) if method == Method::GET => Ok(Json(user).into_response()),
        Ok(_) => Err(ZkLoginError::BadMethod),
        Err(err) => Err(err),
    };
    respond(router.sessions.as_ref(), &session, jar, result)
}

async fn apple(body: Bytes) -> Response {
    apple_callback(&body).unwrap_or_else(IntoResponse::into_response)
}

/// Apple posts the callback as a form; bounce it into a fragment redirect
fn apple_callback(body: &[u8]) -> Result<Response> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(body).into_owned().collect();
    let state = pairs
        .iter()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.as_str())
        .ok_or_else(|| ZkLoginError::InvalidRequest("Missing state".to_string()))?;

    let callback = form_urlencoded::parse(state.as_bytes())
        .find(|(key, _)| key == "callback")
        .map(|(_, value)| value.into_owned())
        .filter(|callback| !callback.is_empty())
        .ok_or_else(|| ZkLoginError::InvalidRequest("Missing callback from state".to_string()))?;

    let fragment = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        .finish();
    let location = HeaderValue::try_from(format!("{callback}#{fragment}"))
        .map_err(|_| ZkLoginError::InvalidRequest("Bad callback from state".to_string()))?;
    Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
}

/// `tx` and `exec` behind the session guard
#[derive(Clone)]
pub struct TxRouter {
    handler: Arc<TxExecHandler>,
    epochs: Arc<dyn EpochProvider>,
    sessions: Arc<dyn SessionStore>,
}

impl TxRouter {
    pub fn new(
        handler: Arc<TxExecHandler>,
        epochs: Arc<dyn EpochProvider>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            handler,
            epochs,
            sessions,
        }
    }

    /// Every request goes through one handler so the guard answers before 404/405
    pub fn router(self) -> Router {
        Router::new().fallback(tx_dispatch).with_state(self)
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: &[u8],
        session: &mut Session,
    ) -> Result<Response> {
        let user = require_user(session, self.epochs.as_ref()).await?;
        match (path.trim_matches('/'), method) {
            ("tx", &Method::POST) => {
                let payload = if body.is_empty() {
                    Value::Null
                } else {
                    parse_json(body)?
                };
                let prepared = self.handler.prepare(&payload, &user).await?;
                Ok(Json(prepared).into_response())
            }
            ("exec", &Method::POST) => {
                let payload: Value = parse_json(body)?;
                let result = self.handler.execute(&payload, &user).await?;
                Ok(Json(result).into_response())
            }
            ("tx" | "exec", _) => Err(ZkLoginError::BadMethod),
            _ => Err(ZkLoginError::NotFound),
        }
    }
}

async fn tx_dispatch(
    State(router): State<TxRouter>,
    method: Method,
    uri: Uri,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    let mut session = router.sessions.load(&jar);
    let result = router
        .dispatch(&method, uri.path(), &body, &mut session)
        .await;
    respond(router.sessions.as_ref(), &session, jar, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apple_redirect_carries_form() {
        let state = "redirectTo=%2F&nonce=n1&callback=https%3A%2F%2Fapp.example%2Fauth%2Fapple";
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("state", state)
            .append_pair("id_token", "a.b.c")
            .finish();
        let response = apple_callback(body.as_bytes()).unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers()[header::LOCATION].to_str().unwrap();
        let (callback, fragment) = location.split_once('#').unwrap();
        assert_eq!(callback, "https://app.example/auth/apple");
        let pairs: Vec<(String, String)> = form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(pairs[0], ("state".to_string(), state.to_string()));
        assert_eq!(pairs[1], ("id_token".to_string(), "a.b.c".to_string()));
    }

    #[test]
    fn test_apple_missing_callback() {
        let err = apple_callback(b"state=nonce%3Dn1").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Missing callback from state");

        let err = apple_callback(b"id_token=a.b.c").unwrap_err();
        assert_eq!(err.public_message(), "Missing state");
    }
}
