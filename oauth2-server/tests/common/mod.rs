//! Shared fixtures for driving the router without a running server.
#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use oauth2_server::contacts::{ContactEmail, NewContact};
use oauth2_server::token::TokenManager;
use oauth2_server::{
    Client, ContactDirectory, MemoryStore, OAuth2Server, OAuthErrorCode, ServerConfig, User,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const CLIENT_ID: &str = "errornot";
pub const CLIENT_SECRET: &str = "some secret string";
pub const REDIRECT_URI: &str = "http://127.0.0.1:8888/login";
pub const EMAIL: &str = "pruyssen@af83.com";
pub const PASSWORD: &str = "1234";

pub const AUTHORIZE_URL: &str = "/oauth/authorize";
pub const LOGIN_URL: &str = "/oauth/login";
pub const TOKEN_URL: &str = "/oauth/token";
pub const CONTACTS_URL: &str = "/portable_contacts";

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
    pub user: User,
}

impl TestApp {
    /// One registered client, one user owning two contacts.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store
            .add_client(Client {
                id: CLIENT_ID.to_string(),
                secret: CLIENT_SECRET.to_string(),
                redirect_uri: REDIRECT_URI.to_string(),
            })
            .unwrap();
        let user = store
            .add_user(EMAIL, PASSWORD, "pruyssen", vec![EMAIL.to_string()])
            .unwrap();
        for (name, email) in [
            ("John Doe", "JDoe@example.com"),
            ("Jane Roe", "jane@example.com"),
        ] {
            store
                .create_contact(
                    &user.id,
                    NewContact {
                        display_name: name.to_string(),
                        emails: vec![ContactEmail::new(email)],
                    },
                )
                .await
                .unwrap();
        }

        let server = OAuth2Server::builder()
            .config(ServerConfig::new())
            .store(store.clone())
            .build()
            .unwrap();

        Self {
            router: server.router(),
            store,
            user,
        }
    }

    /// An access token for the fixture user, as the token endpoint would mint.
    pub async fn access_token(&self) -> String {
        TokenManager::new(64)
            .issue_access_token(&*self.store, &self.user.id, CLIENT_ID)
            .await
            .unwrap()
            .token
    }

    pub async fn send(&self, request: TestRequest) -> TestResponse {
        request.send(self.router.clone()).await
    }
}

/// Helper to build and execute HTTP requests against the router
pub struct TestRequest {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl TestRequest {
    pub fn get(uri: &str) -> Self {
        Self {
            method: Method::GET,
            uri: uri.to_owned(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(uri: &str) -> Self {
        Self {
            method: Method::POST,
            uri: uri.to_owned(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// GET with a query string built from `pairs`
    pub fn get_with(uri: &str, pairs: &[(&str, &str)]) -> Self {
        Self::get(&with_query(uri, pairs))
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_owned(), value.to_owned()));
        self
    }

    pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
        self.body = Some(serde_urlencoded::to_string(pairs).unwrap());
        self.headers.push((
            header::CONTENT_TYPE.as_str().to_owned(),
            "application/x-www-form-urlencoded".to_owned(),
        ));
        self
    }

    pub fn json(mut self, value: &Value) -> Self {
        self.body = Some(value.to_string());
        self.headers.push((
            header::CONTENT_TYPE.as_str().to_owned(),
            "application/json".to_owned(),
        ));
        self
    }

    pub async fn send(self, app: Router) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }
        let request = builder
            .body(Body::from(self.body.unwrap_or_default()))
            .expect("Failed to build request");

        let response = app
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body")
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Failed to deserialize JSON response")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("Failed to decode response as UTF-8")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Assert a 400 with the OAuthException envelope for `code`.
    pub fn assert_oauth_error(&self, code: OAuthErrorCode) {
        assert_eq!(self.status, StatusCode::BAD_REQUEST, "body: {}", self.text());
        assert_eq!(
            self.json(),
            serde_json::json!({
                "error": {
                    "type": "OAuthException",
                    "message": format!("{}: {}", code.as_str(), code.description()),
                }
            })
        );
    }
}

pub fn with_query(uri: &str, pairs: &[(&str, &str)]) -> String {
    if pairs.is_empty() {
        return uri.to_owned();
    }
    format!("{}?{}", uri, serde_urlencoded::to_string(pairs).unwrap())
}
