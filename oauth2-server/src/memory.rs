//! In-process storage, for tests and for running without a database.

use crate::contacts::{Contact, NewContact};
use crate::error::{Error, Result};
use crate::grant::generate_random_string;
use crate::password::{hash_password, verify_password};
use crate::store::{
    AccessToken, Client, ClientRegistry, ContactDirectory, Grant, GrantStore, TokenStore, User,
    UserStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct UserRecord {
    user: User,
    password_digest: String,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    clients: Arc<RwLock<HashMap<String, Client>>>,
    grants: Arc<RwLock<HashMap<String, Grant>>>,
    tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
    users: Arc<RwLock<HashMap<String, UserRecord>>>, // user id -> record
    contacts: Arc<RwLock<HashMap<String, Vec<Contact>>>>, // owner id -> contacts
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client
    pub fn add_client(&self, client: Client) -> Result<()> {
        write(&self.clients)?.insert(client.id.clone(), client);
        Ok(())
    }

    /// Register a user with a plaintext password, returning the new user.
    pub fn add_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        emails: Vec<String>,
    ) -> Result<User> {
        let user = User {
            id: generate_random_string(16),
            email: email.to_string(),
            display_name: display_name.to_string(),
            emails,
        };
        write(&self.users)?.insert(
            user.id.clone(),
            UserRecord {
                user: user.clone(),
                password_digest: hash_password(password),
            },
        );
        Ok(user)
    }
}

#[async_trait]
impl ClientRegistry for MemoryStore {
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>> {
        Ok(read(&self.clients)?.get(client_id).cloned())
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn create_grant(&self, grant: Grant) -> Result<()> {
        write(&self.grants)?.insert(grant.id.clone(), grant);
        Ok(())
    }

    async fn get_grant(&self, id: &str) -> Result<Option<Grant>> {
        Ok(read(&self.grants)?.get(id).cloned())
    }

    async fn consume_grant(&self, id: &str) -> Result<Option<Grant>> {
        Ok(write(&self.grants)?.remove(id))
    }

    async fn purge_expired_grants(&self, created_before: DateTime<Utc>) -> Result<u64> {
        let mut grants = write(&self.grants)?;
        let before = grants.len();
        grants.retain(|_, grant| grant.created_at >= created_before);
        Ok((before - grants.len()) as u64)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn store_access_token(&self, token: AccessToken) -> Result<()> {
        write(&self.tokens)?.insert(token.token.clone(), token);
        Ok(())
    }

    async fn find_access_token(&self, token: &str) -> Result<Option<AccessToken>> {
        Ok(read(&self.tokens)?.get(token).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        Ok(read(&self.users)?
            .values()
            .find(|record| record.user.email == email)
            .filter(|record| verify_password(&record.password_digest, password))
            .map(|record| record.user.clone()))
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(read(&self.users)?.get(id).map(|record| record.user.clone()))
    }
}

#[async_trait]
impl ContactDirectory for MemoryStore {
    async fn list_contacts(&self, owner_id: &str) -> Result<Vec<Contact>> {
        Ok(read(&self.contacts)?
            .get(owner_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_contact(&self, owner_id: &str, contact_id: &str) -> Result<Option<Contact>> {
        Ok(read(&self.contacts)?
            .get(owner_id)
            .and_then(|contacts| contacts.iter().find(|c| c.id == contact_id).cloned()))
    }

    async fn create_contact(&self, owner_id: &str, contact: NewContact) -> Result<Contact> {
        let contact = Contact {
            id: generate_random_string(16),
            display_name: contact.display_name,
            emails: contact.emails,
        };
        write(&self.contacts)?
            .entry(owner_id.to_string())
            .or_default()
            .push(contact.clone());
        Ok(contact)
    }
}
