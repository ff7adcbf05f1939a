use chrono::Duration;

/// Configuration for the authorization server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path of the authorization endpoint
    pub authorize_path: String,

    /// Path the login form posts to
    pub login_path: String,

    /// Path of the token endpoint
    pub token_path: String,

    /// Base path of the Portable Contacts API
    pub contacts_path: String,

    /// How long a grant stays exchangeable after creation (default: 60 seconds)
    pub grant_lifetime: Duration,

    /// Length of the random verifier part of a grant code
    pub grant_code_length: usize,

    /// Length of issued access tokens
    pub access_token_length: usize,

    /// Title shown on the login page
    pub login_title: String,
}

impl ServerConfig {
    /// Create a new configuration with sensible defaults
    pub fn new() -> Self {
        Self {
            authorize_path: "/oauth/authorize".to_string(),
            login_path: "/oauth/login".to_string(),
            token_path: "/oauth/token".to_string(),
            contacts_path: "/portable_contacts".to_string(),
            grant_lifetime: Duration::seconds(60),
            grant_code_length: 32,
            access_token_length: 64,
            login_title: "Sign in".to_string(),
        }
    }

    /// Set the authorization endpoint path
    pub fn with_authorize_path(mut self, path: impl Into<String>) -> Self {
        self.authorize_path = path.into();
        self
    }

    /// Set the login form target path
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Set the token endpoint path
    pub fn with_token_path(mut self, path: impl Into<String>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Set the Portable Contacts base path
    pub fn with_contacts_path(mut self, path: impl Into<String>) -> Self {
        self.contacts_path = path.into();
        self
    }

    /// Set the grant lifetime
    pub fn with_grant_lifetime(mut self, lifetime: Duration) -> Self {
        self.grant_lifetime = lifetime;
        self
    }

    /// Set the login page title
    pub fn with_login_title(mut self, title: impl Into<String>) -> Self {
        self.login_title = title.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
