/*
[INPUT]:  Local session nonce, OAuth client id, callback URL, post-login path
[OUTPUT]: Provider authorization URLs carrying nonce and encoded state
[POS]:    Client layer - first hop of the OpenID redirect flow
[UPDATE]: When provider endpoints or request parameters change
*/

use url::Url;
use url::form_urlencoded::Serializer;

use crate::error::{Result, ZkLoginError};
use crate::user::OidProvider;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const FACEBOOK_AUTH_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
const TWITCH_AUTH_URL: &str = "https://id.twitch.tv/oauth2/authorize";
const APPLE_AUTH_URL: &str = "https://appleid.apple.com/auth/authorize";

/// Inputs shared by every provider's authorization request
#[derive(Debug, Clone)]
pub struct AuthUrlParams<'a> {
    pub client_id: &'a str,
    /// Where the provider sends the user back
    pub redirect_uri: &'a str,
    pub nonce: &'a str,
    /// Path to open after a successful login
    pub redirect_to: &'a str,
    pub extra_scopes: &'a [&'a str],
}

/// Form-encoded `state`: `redirectTo` and `nonce`, plus `callback` for Apple
pub fn encode_state(redirect_to: &str, nonce: &str, callback: Option<&str>) -> String {
    let mut state = Serializer::new(String::new());
    state.append_pair("redirectTo", redirect_to);
    state.append_pair("nonce", nonce);
    if let Some(callback) = callback {
        state.append_pair("callback", callback);
    }
    state.finish()
}

fn scope(extra_scopes: &[&str]) -> String {
    std::iter::once("openid")
        .chain(extra_scopes.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn build(base: &str, pairs: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|err| ZkLoginError::Internal(err.to_string()))?;
    url.query_pairs_mut().extend_pairs(pairs);
    Ok(url)
}

fn implicit_flow_url(base: &str, params: &AuthUrlParams<'_>, extra: &[(&str, &str)]) -> Result<Url> {
    let scope = scope(params.extra_scopes);
    let state = encode_state(params.redirect_to, params.nonce, None);
    let mut pairs = vec![
        ("client_id", params.client_id),
        ("redirect_uri", params.redirect_uri),
        ("response_type", "id_token"),
        ("scope", scope.as_str()),
    ];
    pairs.extend_from_slice(extra);
    pairs.push(("nonce", params.nonce));
    pairs.push(("state", state.as_str()));
    build(base, &pairs)
}

pub fn google_auth_url(params: &AuthUrlParams<'_>) -> Result<Url> {
    implicit_flow_url(GOOGLE_AUTH_URL, params, &[])
}

pub fn facebook_auth_url(params: &AuthUrlParams<'_>) -> Result<Url> {
    implicit_flow_url(FACEBOOK_AUTH_URL, params, &[])
}

/// Twitch needs extra id_token claims requested explicitly
pub fn twitch_auth_url(params: &AuthUrlParams<'_>, extra_claims: &[&str]) -> Result<Url> {
    let id_token: serde_json::Map<String, serde_json::Value> = extra_claims
        .iter()
        .map(|claim| (claim.to_string(), serde_json::Value::Null))
        .collect();
    let claims = serde_json::json!({ "id_token": id_token }).to_string();
    implicit_flow_url(TWITCH_AUTH_URL, params, &[("claims", claims.as_str())])
}

/// Apple posts the token to `redirect_uri` (the `apple` route), which then
/// redirects to `callback` with the token in the fragment.
pub fn apple_auth_url(params: &AuthUrlParams<'_>, callback: &str) -> Result<Url> {
    let scope = params.extra_scopes.join(" ");
    let state = encode_state(params.redirect_to, params.nonce, Some(callback));
    let mut pairs = vec![
        ("client_id", params.client_id),
        ("redirect_uri", params.redirect_uri),
        ("response_type", "code id_token"),
        ("response_mode", "form_post"),
    ];
    if !scope.is_empty() {
        pairs.push(("scope", scope.as_str()));
    }
    pairs.push(("nonce", params.nonce));
    pairs.push(("state", state.as_str()));
    build(APPLE_AUTH_URL, &pairs)
}

/// Provider dispatch with default options; Apple also needs its callback page
pub fn auth_url(provider: OidProvider, params: &AuthUrlParams<'_>, apple_callback: Option<&str>) -> Result<Url> {
    match provider {
        OidProvider::Google => google_auth_url(params),
        OidProvider::Facebook => facebook_auth_url(params),
        OidProvider::Twitch => twitch_auth_url(params, &[]),
        OidProvider::Apple => {
            let callback = apple_callback.ok_or_else(|| {
                ZkLoginError::InvalidRequest("Apple login needs a callback URL".to_string())
            })?;
            apple_auth_url(params, callback)
        }
    }
}
