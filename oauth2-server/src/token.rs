//! The token endpoint flow.
//!
//! Each step consumes the output of the previous one:
//! [`TokenRequest`] (parameters checked, secret resolved) ->
//! [`AuthenticatedClient`] -> validated [`Grant`] -> [`TokenResponse`].
//! The grant is only consumed once every check has passed.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::grant::{GrantCode, generate_random_string};
use crate::params::{self, Params};
use crate::password::secrets_match;
use crate::store::{AccessToken, Client, ClientRegistry, Grant, GrantStore, TokenStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Where the client secret was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    /// `client_secret` request parameter
    Param,
    /// `Authorization: Basic <secret>` header
    BasicHeader,
}

/// The client secret, delivered through exactly one channel.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret {
    pub value: String,
    pub source: SecretSource,
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecret")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

impl ClientSecret {
    /// Pick the secret from the parameter or the `Authorization` header value.
    /// Both or neither is an `invalid_request`.
    pub fn resolve(param: Option<&str>, authorization: Option<&str>) -> Result<Self> {
        let param = param.filter(|s| !s.is_empty());
        let header = authorization.and_then(extract_basic_credentials);

        match (param, header) {
            (Some(value), None) => Ok(Self {
                value: value.to_string(),
                source: SecretSource::Param,
            }),
            (None, Some(value)) => Ok(Self {
                value: value.to_string(),
                source: SecretSource::BasicHeader,
            }),
            (Some(_), Some(_)) => {
                tracing::warn!("client secret supplied both as parameter and header");
                Err(Error::invalid_request())
            }
            (None, None) => {
                tracing::warn!("no client secret supplied");
                Err(Error::invalid_request())
            }
        }
    }
}

/// Extracts the credential from a `Basic` Authorization header value.
///
/// The credential is taken verbatim, it is not base64 decoded.
pub fn extract_basic_credentials(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Basic ")
        .or_else(|| auth_header.strip_prefix("basic "))
        .filter(|s| !s.is_empty())
}

/// A token request whose parameters passed validation.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub client_id: String,
    pub code: String,
    pub redirect_uri: String,
    pub secret: ClientSecret,
}

impl TokenRequest {
    /// Check mandatory parameters, `grant_type`, and resolve the secret.
    pub fn from_params(params: &Params, authorization: Option<&str>) -> Result<Self> {
        params::check_token(params)?;
        let secret = ClientSecret::resolve(params::get(params, "client_secret"), authorization)?;

        Ok(Self {
            client_id: params::get(params, "client_id").unwrap_or_default().to_string(),
            code: params::get(params, "code").unwrap_or_default().to_string(),
            redirect_uri: params::get(params, "redirect_uri")
                .unwrap_or_default()
                .to_string(),
            secret,
        })
    }
}

/// A token request from a client that proved knowledge of its secret.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    pub client: Client,
    pub request: TokenRequest,
}

/// Resolve the client and compare secrets, whichever channel carried it.
pub async fn authenticate_client<C>(clients: &C, request: TokenRequest) -> Result<AuthenticatedClient>
where
    C: ClientRegistry + ?Sized,
{
    let client = clients
        .find_client(&request.client_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("token request for unknown client_id: {}", request.client_id);
            Error::invalid_client()
        })?;

    if !secrets_match(&request.secret.value, &client.secret) {
        tracing::warn!(
            "bad client secret for client_id {} (via {:?})",
            client.id,
            request.secret.source
        );
        return Err(Error::invalid_client());
    }

    Ok(AuthenticatedClient { client, request })
}

/// Check the presented grant reference against the stored grant and consume
/// it. Every mismatch is an `invalid_grant`.
pub async fn redeem_grant<G>(
    grants: &G,
    config: &ServerConfig,
    authenticated: &AuthenticatedClient,
) -> Result<Grant>
where
    G: GrantStore + ?Sized,
{
    let request = &authenticated.request;
    let reference = GrantCode::parse(&request.code).ok_or_else(|| {
        tracing::warn!("malformed grant code from client {}", request.client_id);
        Error::invalid_grant()
    })?;

    let grant = grants
        .get_grant(&reference.grant_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("grant {} not found", reference.grant_id);
            Error::invalid_grant()
        })?;

    let rejection = if !secrets_match(&grant.code, &reference.code) {
        Some("code mismatch")
    } else if grant.client_id != authenticated.client.id {
        Some("issued to another client")
    } else if grant.redirect_uri != request.redirect_uri {
        Some("redirect_uri differs from authorization request")
    } else if grant.user_id.is_none() {
        Some("login never completed")
    } else if grant.is_expired(config.grant_lifetime, Utc::now()) {
        Some("expired")
    } else {
        None
    };

    if let Some(reason) = rejection {
        tracing::warn!("rejecting grant {}: {}", grant.id, reason);
        return Err(Error::invalid_grant());
    }

    // Whoever consumes first wins; a concurrent exchange sees nothing.
    grants.consume_grant(&grant.id).await?.ok_or_else(|| {
        tracing::warn!("grant {} already consumed", grant.id);
        Error::invalid_grant()
    })
}

/// Successful token endpoint response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Issues opaque access tokens
pub struct TokenManager {
    token_length: usize,
}

impl TokenManager {
    pub fn new(token_length: usize) -> Self {
        Self { token_length }
    }

    /// Mint and record a token bound to a user and client.
    pub async fn issue_access_token<T>(
        &self,
        tokens: &T,
        user_id: &str,
        client_id: &str,
    ) -> Result<AccessToken>
    where
        T: TokenStore + ?Sized,
    {
        let token = AccessToken {
            token: generate_random_string(self.token_length),
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            created_at: Utc::now(),
        };
        tokens.store_access_token(token.clone()).await?;
        Ok(token)
    }
}

/// Run the whole exchange for one token request.
pub async fn exchange<S>(
    store: &S,
    config: &ServerConfig,
    params: &Params,
    authorization: Option<&str>,
) -> Result<TokenResponse>
where
    S: ClientRegistry + GrantStore + TokenStore + ?Sized,
{
    let request = TokenRequest::from_params(params, authorization)?;
    let authenticated = authenticate_client(store, request).await?;
    let grant = redeem_grant(store, config, &authenticated).await?;

    let user_id = grant.user_id.as_deref().ok_or_else(Error::invalid_grant)?;
    let token = TokenManager::new(config.access_token_length)
        .issue_access_token(store, user_id, &grant.client_id)
        .await?;

    tracing::info!(
        "exchanged grant {} for an access token (client {}, user {})",
        grant.id,
        grant.client_id,
        user_id
    );

    Ok(TokenResponse {
        access_token: token.token,
    })
}
