use crate::{
    auth::axum_extractors::{AuthState, Authenticated},
    authorize::{self, validate_authorization},
    config::ServerConfig,
    contacts::{Contact, Envelope, Filter, NewContact, paging_from_params},
    error::{Error, Result},
    params::{self, Params},
    store::Backend,
    token,
};
use axum::{
    Json, Router,
    extract::{FromRef, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use std::sync::Arc;

/// Authorization server plus the Portable Contacts resource API, over a
/// pluggable storage backend.
pub struct OAuth2Server<S: Backend> {
    config: Arc<ServerConfig>,
    store: Arc<S>,
}

impl<S: Backend> Clone for OAuth2Server<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }
}

impl<S: Backend> OAuth2Server<S> {
    /// Create a new server builder.
    pub fn builder() -> OAuth2ServerBuilder<S> {
        OAuth2ServerBuilder::default()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create the axum router with the protocol and resource endpoints.
    pub fn router(&self) -> Router {
        let contacts = self.config.contacts_path.trim_end_matches('/');
        Router::new()
            .route(&self.config.authorize_path, get(handle_authorize))
            .route(
                &self.config.login_path,
                axum::routing::post(handle_login),
            )
            .route(
                &self.config.token_path,
                axum::routing::post(handle_token),
            )
            .route(
                &format!("{}/@me/@self", contacts),
                get(handle_self).post(handle_self),
            )
            .route(
                &format!("{}/@me/@all", contacts),
                get(handle_list_contacts).post(handle_create_contact),
            )
            .route(
                &format!("{}/@me/@all/{{id}}", contacts),
                get(handle_get_contact),
            )
            .with_state(self.clone())
    }
}

// OAuth handler functions

/// Handle authorization request - validate and show the login form.
async fn handle_authorize<S: Backend>(
    State(server): State<OAuth2Server<S>>,
    Query(params): Query<Params>,
) -> Result<Response> {
    tracing::info!("handling authorize request");

    let request = validate_authorization(&*server.store, &params).await?;
    let page = authorize::render_login_page(&server.config, &request)?;

    tracing::info!(
        "awaiting login for client_id: {}",
        request.client_id
    );
    Ok((StatusCode::OK, Html(page)).into_response())
}

/// Handle login form submission - redirect back to the client with a grant.
async fn handle_login<S: Backend>(
    State(server): State<OAuth2Server<S>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response> {
    tracing::info!("handling login request");

    let params = parse_params(&headers, &body)?;
    let redirect = authorize::complete_login(&*server.store, &server.config, &params).await?;

    Ok(Redirect::to(redirect.as_str()).into_response())
}

/// Handle token request (exchange a grant for an access token).
async fn handle_token<S: Backend>(
    State(server): State<OAuth2Server<S>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response> {
    tracing::info!("handling token request");

    let params = parse_params(&headers, &body)?;
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let response = token::exchange(&*server.store, &server.config, &params, authorization).await?;

    Ok((
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-store")],
        Json(response),
    )
        .into_response())
}

// Portable Contacts handler functions

/// Handle `@me/@self` - the authenticated user's own entry.
async fn handle_self<S: Backend>(
    State(server): State<OAuth2Server<S>>,
    auth: Authenticated,
) -> Result<Response> {
    let user = server
        .store
        .get_user(&auth.identity.user_id)
        .await?
        .ok_or(Error::Unauthorized)?;

    Ok(Json(Envelope::single(Contact::from(&user))).into_response())
}

/// Handle `@me/@all` - the user's contacts, filtered and paged.
async fn handle_list_contacts<S: Backend>(
    State(server): State<OAuth2Server<S>>,
    auth: Authenticated,
) -> Result<Response> {
    let mut contacts = server.store.list_contacts(&auth.identity.user_id).await?;
    if let Some(filter) = Filter::from_params(&auth.params)? {
        contacts = filter.apply(contacts)?;
    }
    let (start_index, count) = paging_from_params(&auth.params)?;

    Ok(Json(Envelope::page(contacts, start_index, count)).into_response())
}

/// Handle `@me/@all/{id}` - a single contact.
async fn handle_get_contact<S: Backend>(
    State(server): State<OAuth2Server<S>>,
    Path(id): Path<String>,
    auth: Authenticated,
) -> Result<Response> {
    let contact = server
        .store
        .get_contact(&auth.identity.user_id, &id)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(Json(Envelope::single(contact)).into_response())
}

/// Handle contact creation from a JSON or form body.
async fn handle_create_contact<S: Backend>(
    State(server): State<OAuth2Server<S>>,
    auth: Authenticated,
) -> Result<Response> {
    let new_contact: NewContact = if auth.json {
        serde_json::from_str(&auth.body)
            .map_err(|e| Error::BadRequest(format!("invalid contact: {}", e)))?
    } else {
        new_contact_from_form(&auth.params)?
    };

    let user_id = &auth.identity.user_id;
    let contact = server.store.create_contact(user_id, new_contact).await?;

    tracing::info!("created contact {} for user {}", contact.id, user_id);
    Ok((StatusCode::CREATED, Json(Envelope::single(contact))).into_response())
}

impl<S: Backend> FromRef<OAuth2Server<S>> for AuthState {
    fn from_ref(server: &OAuth2Server<S>) -> Self {
        AuthState {
            tokens: server.store.clone(),
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    params::is_json_content(
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    )
}

/// Parse a protocol request body - JSON object of strings or form-encoded.
fn parse_params(headers: &HeaderMap, body: &str) -> Result<Params> {
    if is_json(headers) {
        serde_json::from_str(body).map_err(|e| {
            tracing::warn!("invalid JSON body: {}", e);
            Error::invalid_request()
        })
    } else {
        serde_urlencoded::from_str(body).map_err(|e| {
            tracing::warn!("invalid form body: {}", e);
            Error::invalid_request()
        })
    }
}

fn new_contact_from_form(form: &Params) -> Result<NewContact> {
    let display_name = params::get(form, "displayName")
        .ok_or_else(|| Error::BadRequest("displayName is required".to_string()))?;
    Ok(NewContact {
        display_name: display_name.to_string(),
        emails: params::get(form, "email")
            .map(|email| vec![crate::contacts::ContactEmail::new(email)])
            .unwrap_or_default(),
    })
}

// Builder for OAuth2Server.
pub struct OAuth2ServerBuilder<S: Backend> {
    config: Option<ServerConfig>,
    store: Option<Arc<S>>,
}

impl<S: Backend> Default for OAuth2ServerBuilder<S> {
    fn default() -> Self {
        Self {
            config: None,
            store: None,
        }
    }
}

impl<S: Backend> OAuth2ServerBuilder<S> {
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// The store is required; the configuration falls back to defaults.
    pub fn build(self) -> Result<OAuth2Server<S>> {
        let store = self
            .store
            .ok_or_else(|| Error::Internal("store required".to_string()))?;

        Ok(OAuth2Server {
            config: Arc::new(self.config.unwrap_or_default()),
            store,
        })
    }
}
