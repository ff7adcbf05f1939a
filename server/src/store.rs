use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use oauth2_server::{
    AccessToken, Client, ClientRegistry, ContactDirectory, Error, Grant, GrantStore, Result,
    TokenStore, User, UserStore,
    contacts::{Contact, ContactEmail, NewContact},
    grant::generate_random_string,
    password::{hash_password, verify_password},
};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::sync::Arc;

const ID_LENGTH: usize = 16;

#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Arc<Self> {
        Arc::new(Self { db })
    }

    /// Register a client, replacing any client with the same identifier.
    pub async fn upsert_client(&self, client: &Client) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, secret, redirect_uri)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                secret = excluded.secret,
                redirect_uri = excluded.redirect_uri
            "#,
        )
        .bind(&client.id)
        .bind(&client.secret)
        .bind(&client.redirect_uri)
        .execute(&self.db)
        .await
        .map_err(storage)?;

        Ok(())
    }

    /// Register a user with a plaintext password. An existing user with the
    /// same email is returned untouched.
    pub async fn ensure_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        emails: &[String],
    ) -> Result<(User, bool)> {
        if let Some(existing) = self.find_user_by_email(email).await? {
            return Ok((existing.0, false));
        }

        let user = User {
            id: generate_random_string(ID_LENGTH),
            email: email.to_string(),
            display_name: display_name.to_string(),
            emails: emails.to_vec(),
        };
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_digest, display_name, emails)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(hash_password(password))
        .bind(&user.display_name)
        .bind(serde_json::to_string(&user.emails)?)
        .execute(&self.db)
        .await
        .map_err(storage)?;

        Ok((user, true))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, password_digest, display_name, emails
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(storage)?;

        row.map(|row| -> Result<(User, String)> {
            let digest: String = row.try_get("password_digest").map_err(storage)?;
            Ok((user_from_row(&row)?, digest))
        })
        .transpose()
    }
}

fn storage(e: impl std::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}

/// Fixed-width UTC timestamps, so textual order is chronological order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(storage)?
        .with_timezone(&Utc))
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let emails: String = row.try_get("emails").map_err(storage)?;
    Ok(User {
        id: row.try_get("id").map_err(storage)?,
        email: row.try_get("email").map_err(storage)?,
        display_name: row.try_get("display_name").map_err(storage)?,
        emails: serde_json::from_str(&emails)?,
    })
}

fn grant_from_row(row: &SqliteRow) -> Result<Grant> {
    let created_at: String = row.try_get("created_at").map_err(storage)?;
    Ok(Grant {
        id: row.try_get("id").map_err(storage)?,
        client_id: row.try_get("client_id").map_err(storage)?,
        user_id: row.try_get("user_id").map_err(storage)?,
        code: row.try_get("code").map_err(storage)?,
        redirect_uri: row.try_get("redirect_uri").map_err(storage)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn contact_from_row(row: &SqliteRow) -> Result<Contact> {
    let emails: String = row.try_get("emails").map_err(storage)?;
    let emails: Vec<ContactEmail> = serde_json::from_str(&emails)?;
    Ok(Contact {
        id: row.try_get("id").map_err(storage)?,
        display_name: row.try_get("display_name").map_err(storage)?,
        emails,
    })
}

#[async_trait]
impl ClientRegistry for SqliteStore {
    async fn find_client(&self, client_id: &str) -> Result<Option<Client>> {
        let row = sqlx::query("SELECT id, secret, redirect_uri FROM clients WHERE id = ?")
            .bind(client_id)
            .fetch_optional(&self.db)
            .await
            .map_err(storage)?;

        row.map(|row| -> Result<Client> {
            Ok(Client {
                id: row.try_get("id").map_err(storage)?,
                secret: row.try_get("secret").map_err(storage)?,
                redirect_uri: row.try_get("redirect_uri").map_err(storage)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl GrantStore for SqliteStore {
    async fn create_grant(&self, grant: Grant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO grants (id, client_id, user_id, code, redirect_uri, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&grant.id)
        .bind(&grant.client_id)
        .bind(&grant.user_id)
        .bind(&grant.code)
        .bind(&grant.redirect_uri)
        .bind(timestamp(grant.created_at))
        .execute(&self.db)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn get_grant(&self, id: &str) -> Result<Option<Grant>> {
        let row = sqlx::query(
            r#"
            SELECT id, client_id, user_id, code, redirect_uri, created_at
            FROM grants
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(storage)?;

        row.as_ref().map(grant_from_row).transpose()
    }

    async fn consume_grant(&self, id: &str) -> Result<Option<Grant>> {
        // A single statement, so two racing exchanges cannot both see the row.
        let row = sqlx::query(
            r#"
            DELETE FROM grants
            WHERE id = ?
            RETURNING id, client_id, user_id, code, redirect_uri, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(storage)?;

        row.as_ref().map(grant_from_row).transpose()
    }

    async fn purge_expired_grants(&self, created_before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM grants WHERE created_at < ?")
            .bind(timestamp(created_before))
            .execute(&self.db)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn store_access_token(&self, token: AccessToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (token, user_id, client_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&token.token)
        .bind(&token.user_id)
        .bind(&token.client_id)
        .bind(timestamp(token.created_at))
        .execute(&self.db)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn find_access_token(&self, token: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query(
            r#"
            SELECT token, user_id, client_id, created_at
            FROM access_tokens
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .map_err(storage)?;

        row.map(|row| -> Result<AccessToken> {
            let created_at: String = row.try_get("created_at").map_err(storage)?;
            Ok(AccessToken {
                token: row.try_get("token").map_err(storage)?,
                user_id: row.try_get("user_id").map_err(storage)?,
                client_id: row.try_get("client_id").map_err(storage)?,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        Ok(self
            .find_user_by_email(email)
            .await?
            .filter(|(_, digest)| verify_password(digest, password))
            .map(|(user, _)| user))
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, email, display_name, emails FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(storage)?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl ContactDirectory for SqliteStore {
    async fn list_contacts(&self, owner_id: &str) -> Result<Vec<Contact>> {
        let rows = sqlx::query(
            r#"
            SELECT id, display_name, emails
            FROM contacts
            WHERE owner_id = ?
            ORDER BY seq
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await
        .map_err(storage)?;

        rows.iter().map(contact_from_row).collect()
    }

    async fn get_contact(&self, owner_id: &str, contact_id: &str) -> Result<Option<Contact>> {
        let row = sqlx::query(
            r#"
            SELECT id, display_name, emails
            FROM contacts
            WHERE owner_id = ? AND id = ?
            "#,
        )
        .bind(owner_id)
        .bind(contact_id)
        .fetch_optional(&self.db)
        .await
        .map_err(storage)?;

        row.as_ref().map(contact_from_row).transpose()
    }

    async fn create_contact(&self, owner_id: &str, contact: NewContact) -> Result<Contact> {
        let contact = Contact {
            id: generate_random_string(ID_LENGTH),
            display_name: contact.display_name,
            emails: contact.emails,
        };
        sqlx::query(
            r#"
            INSERT INTO contacts (id, owner_id, display_name, emails)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&contact.id)
        .bind(owner_id)
        .bind(&contact.display_name)
        .bind(serde_json::to_string(&contact.emails)?)
        .execute(&self.db)
        .await
        .map_err(storage)?;

        Ok(contact)
    }
}
