use crate::contacts::{Contact, NewContact};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// A registered client application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// Client identifier
    pub id: String,
    /// Shared secret the client authenticates with
    pub secret: String,
    /// The single redirect URI registered for this client
    pub redirect_uri: String,
}

impl Client {
    /// Exact string comparison, no prefix or scheme relaxation.
    pub fn redirect_uri_matches(&self, candidate: &str) -> bool {
        self.redirect_uri == candidate
    }
}

/// A short-lived, single-use authorization grant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Lookup key, first half of the composite code handed to the client
    pub id: String,
    /// Client the grant was issued to
    pub client_id: String,
    /// User who authorized the grant; absent until login completes
    pub user_id: Option<String>,
    /// Random verifier, second half of the composite code
    pub code: String,
    /// Redirect URI captured from the authorization request
    pub redirect_uri: String,
    /// When the grant was created
    pub created_at: DateTime<Utc>,
}

impl Grant {
    pub fn is_expired(&self, lifetime: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at) > lifetime
    }
}

/// An opaque bearer token bound to a user and a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub user_id: String,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
}

/// A resource owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    /// Unique login key
    pub email: String,
    pub display_name: String,
    /// Addresses exposed through the contacts API
    pub emails: Vec<String>,
}

/// Read-only view of registered clients
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Resolve a client identifier
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>>;
}

/// Grant persistence
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Persist a new grant
    async fn create_grant(&self, grant: Grant) -> Result<()>;

    /// Get a grant by its identifier without consuming it
    async fn get_grant(&self, id: &str) -> Result<Option<Grant>>;

    /// Get and remove a grant. Concurrent callers for the same identifier
    /// must observe at most one `Some`.
    async fn consume_grant(&self, id: &str) -> Result<Option<Grant>>;

    /// Remove grants created before the given instant, returning how many
    async fn purge_expired_grants(&self, created_before: DateTime<Utc>) -> Result<u64>;
}

/// Access token persistence
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Record an issued access token
    async fn store_access_token(&self, token: AccessToken) -> Result<()>;

    /// Look up an access token by its value
    async fn find_access_token(&self, token: &str) -> Result<Option<AccessToken>>;
}

/// Resource owners and their credentials
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Check credentials. Unknown email and wrong password both yield `None`.
    async fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>>;

    /// Get a user by identifier
    async fn get_user(&self, id: &str) -> Result<Option<User>>;
}

/// Per-user contact collections backing the Portable Contacts API
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// All contacts owned by a user
    async fn list_contacts(&self, owner_id: &str) -> Result<Vec<Contact>>;

    /// One contact owned by a user
    async fn get_contact(&self, owner_id: &str, contact_id: &str) -> Result<Option<Contact>>;

    /// Add a contact to a user's collection
    async fn create_contact(&self, owner_id: &str, contact: NewContact) -> Result<Contact>;
}

/// Everything the server needs from its storage layer.
pub trait Backend:
    ClientRegistry + GrantStore + TokenStore + UserStore + ContactDirectory + 'static
{
}

impl<T> Backend for T where
    T: ClientRegistry + GrantStore + TokenStore + UserStore + ContactDirectory + 'static
{
}
