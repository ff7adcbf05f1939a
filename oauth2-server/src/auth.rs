//! Resolving bearer tokens presented to the resource API.
//!
//! A token arrives either as the `oauth_token` parameter or as an
//! `Authorization: OAuth <token>` header.

use crate::error::{Error, Result};
use crate::params::{self, Params};
use crate::store::TokenStore;

/// Identity behind a valid access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub user_id: String,
    pub client_id: String,
}

/// Extracts a token from an `OAuth` Authorization header value.
///
/// Returns the token if present and valid, or None otherwise.
pub fn extract_oauth_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("OAuth ")
        .or_else(|| auth_header.strip_prefix("oauth "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The token from the `oauth_token` parameter, falling back to the header.
pub fn token_from_request<'a>(params: &'a Params, auth_header: Option<&'a str>) -> Option<&'a str> {
    params::get(params, "oauth_token").or_else(|| auth_header.and_then(extract_oauth_token))
}

/// Resolve a token to the user and client it was issued for.
pub async fn resolve_token<T>(tokens: &T, token: &str) -> Result<TokenInfo>
where
    T: TokenStore + ?Sized,
{
    let record = tokens
        .find_access_token(token)
        .await?
        .ok_or(Error::Unauthorized)?;

    Ok(TokenInfo {
        user_id: record.user_id,
        client_id: record.client_id,
    })
}

/// Authenticate a resource request; no token at all is `Unauthorized`.
pub async fn authenticate<T>(
    tokens: &T,
    params: &Params,
    auth_header: Option<&str>,
) -> Result<TokenInfo>
where
    T: TokenStore + ?Sized,
{
    let token = token_from_request(params, auth_header).ok_or_else(|| {
        tracing::debug!("resource request without access token");
        Error::Unauthorized
    })?;
    resolve_token(tokens, token).await
}

#[cfg(feature = "axum")]
pub mod axum_extractors {
    //! Axum extractor for requests to the resource API.

    use super::*;
    use axum::{
        body::to_bytes,
        extract::{FromRef, FromRequest, Request},
        http::header,
    };
    use std::sync::Arc;

    /// Upper bound on a resource request body.
    const MAX_BODY_BYTES: usize = 64 * 1024;

    /// State required for token resolution.
    #[derive(Clone)]
    pub struct AuthState {
        pub tokens: Arc<dyn TokenStore>,
    }

    /// A resource request whose access token resolved.
    ///
    /// The token is looked for in the query string, in a form body, then in
    /// the `Authorization: OAuth` header. Query parameters take precedence over
    /// form fields of the same name.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// async fn protected_handler(auth: Authenticated) -> String {
    ///     format!("Hello, {}!", auth.identity.user_id)
    /// }
    /// ```
    #[derive(Debug, Clone)]
    pub struct Authenticated {
        pub identity: TokenInfo,
        /// Query parameters merged with form body fields
        pub params: Params,
        /// Raw body, kept for JSON payloads
        pub body: String,
        pub json: bool,
    }

    impl<S> FromRequest<S> for Authenticated
    where
        S: Send + Sync,
        AuthState: FromRef<S>,
    {
        type Rejection = Error;

        async fn from_request(req: Request, state: &S) -> Result<Self> {
            let auth_state = AuthState::from_ref(state);
            let (parts, body) = req.into_parts();

            let mut params: Params = serde_urlencoded::from_str(parts.uri.query().unwrap_or_default())
                .map_err(|e| Error::BadRequest(format!("invalid query string: {}", e)))?;

            let json = params::is_json_content(
                parts
                    .headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok()),
            );
            let bytes = to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|e| Error::BadRequest(format!("unreadable body: {}", e)))?;
            let body = String::from_utf8(bytes.to_vec())
                .map_err(|_| Error::BadRequest("body is not UTF-8".to_string()))?;

            if !json && !body.is_empty() {
                let form: Params = serde_urlencoded::from_str(&body)
                    .map_err(|e| Error::BadRequest(format!("invalid form data: {}", e)))?;
                for (key, value) in form {
                    params.entry(key).or_insert(value);
                }
            }

            let auth_header = parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            let identity = authenticate(&*auth_state.tokens, &params, auth_header).await?;

            Ok(Authenticated {
                identity,
                params,
                body,
                json,
            })
        }
    }
}
