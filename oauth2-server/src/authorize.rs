//! The authorization endpoint flow.
//!
//! A request is validated, the user is shown a login form carrying the
//! validated request, and a successful login mints a grant and redirects back
//! to the client with `code=<grant_id>.<grant_code>` and the original `state`.
//! Any failure is terminal and leaves the grant store untouched.

use crate::config::ServerConfig;
use crate::error::{Error, OAuthErrorCode, Result};
use crate::grant::{GrantCode, mint_grant};
use crate::params::{self, Params, ResponseType};
use crate::store::{ClientRegistry, GrantStore, UserStore};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// A validated authorization request, carried through the login form as the
/// `info` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub response_type: String,
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizationRequest {
    /// Base64 of the JSON form of this request.
    pub fn encode_info(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    /// Inverse of [`encode_info`](Self::encode_info). Anything undecodable is
    /// an `invalid_request`.
    pub fn decode_info(info: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(info)
            .or_else(|_| URL_SAFE_NO_PAD.decode(info))
            .map_err(|e| {
                tracing::warn!("login info is not base64: {}", e);
                Error::invalid_request()
            })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!("login info is not a valid request: {}", e);
            Error::invalid_request()
        })
    }

    fn to_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("client_id".into(), self.client_id.clone());
        params.insert("response_type".into(), self.response_type.clone());
        params.insert("redirect_uri".into(), self.redirect_uri.clone());
        if let Some(state) = &self.state {
            params.insert("state".into(), state.clone());
        }
        params
    }
}

/// Validate an authorization request against the client registry.
pub async fn validate_authorization<C>(clients: &C, params: &Params) -> Result<AuthorizationRequest>
where
    C: ClientRegistry + ?Sized,
{
    match params::check_authorize(params)? {
        ResponseType::Code => {}
        // Implicit and hybrid flows are declined outright.
        other => {
            tracing::warn!("refusing response_type {}", other.as_str());
            return Err(Error::ResponseTypeNotImplemented(other.as_str().to_string()));
        }
    }

    let client_id = params::get(params, "client_id").unwrap_or_default();
    let redirect_uri = params::get(params, "redirect_uri").unwrap_or_default();

    let client = clients.find_client(client_id).await?.ok_or_else(|| {
        tracing::warn!("authorize request for unknown client_id: {}", client_id);
        Error::invalid_client()
    })?;

    if !client.redirect_uri_matches(redirect_uri) {
        tracing::warn!(
            "redirect_uri mismatch for client_id {}: {}",
            client_id,
            redirect_uri
        );
        return Err(Error::OAuth(OAuthErrorCode::RedirectUriMismatch));
    }

    Ok(AuthorizationRequest {
        client_id: client.id,
        response_type: ResponseType::Code.as_str().to_string(),
        redirect_uri: redirect_uri.to_string(),
        state: params::get(params, "state").map(str::to_string),
    })
}

/// Handle a login form submission: re-validate the carried request, check the
/// credentials, mint a grant and build the client redirect.
pub async fn complete_login<S>(store: &S, config: &ServerConfig, params: &Params) -> Result<String>
where
    S: ClientRegistry + UserStore + GrantStore + ?Sized,
{
    let (Some(email), Some(password), Some(info)) = (
        params::get(params, "email"),
        params::get(params, "password"),
        params::get(params, "info"),
    ) else {
        tracing::warn!("login request missing email, password or info");
        return Err(Error::invalid_request());
    };

    // The blob went through the browser, so it is checked again.
    let carried = AuthorizationRequest::decode_info(info)?;
    let request = validate_authorization(store, &carried.to_params()).await?;

    let user = store
        .verify_password(email, password)
        .await?
        .ok_or(Error::AuthenticationFailed)?;

    let grant = mint_grant(
        &request.client_id,
        &user.id,
        &request.redirect_uri,
        config.grant_code_length,
        Utc::now(),
    );
    let reference = GrantCode::from(&grant);
    store.create_grant(grant).await?;

    tracing::info!(
        "issued grant {} to client {} for user {}",
        reference.grant_id,
        request.client_id,
        user.id
    );

    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("code", &reference.to_string());
    if let Some(state) = &request.state {
        query.append_pair("state", state);
    }

    Ok(append_query(&request.redirect_uri, &query.finish()))
}

/// Append encoded pairs to a URI without otherwise touching it.
fn append_query(uri: &str, pairs: &str) -> String {
    let (base, fragment) = match uri.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (uri, None),
    };
    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };
    match fragment {
        Some(fragment) => format!("{}{}{}#{}", base, separator, pairs, fragment),
        None => format!("{}{}{}", base, separator, pairs),
    }
}

/// HTML login form posting back to the login path with the carried request.
pub fn render_login_page(config: &ServerConfig, request: &AuthorizationRequest) -> Result<String> {
    let info = request.encode_info()?;
    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<h1>{title}</h1>
<form method="post" action="{action}">
<input type="hidden" name="info" value="{info}">
<label>Email <input type="email" name="email"></label>
<label>Password <input type="password" name="password"></label>
<button type="submit">Sign in</button>
</form>
</body>
</html>
"#,
        title = escape_html(&config.login_title),
        action = escape_html(&config.login_path),
        info = info,
    ))
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
