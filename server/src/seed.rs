//! Startup fixtures: clients, users and their contacts from a JSON file.

use crate::store::SqliteStore;
use miette::{IntoDiagnostic, Result, WrapErr};
use oauth2_server::{
    Client, ContactDirectory,
    contacts::{ContactEmail, NewContact},
};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub clients: Vec<SeedClient>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
pub struct SeedClient {
    pub id: String,
    pub secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// Defaults to the login email
    #[serde(default)]
    pub emails: Option<Vec<String>>,
    #[serde(default)]
    pub contacts: Vec<SeedContact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedContact {
    pub display_name: String,
    #[serde(default)]
    pub emails: Vec<String>,
}

impl Seed {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("reading seed file {}", path.display()))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .into_diagnostic()
            .wrap_err("seed file is not valid JSON")
    }

    /// Load into the store. Clients are upserted; users already present by
    /// email, and their contacts, are left alone.
    pub async fn apply(&self, store: &SqliteStore) -> Result<()> {
        for client in &self.clients {
            store
                .upsert_client(&Client {
                    id: client.id.clone(),
                    secret: client.secret.clone(),
                    redirect_uri: client.redirect_uri.clone(),
                })
                .await
                .into_diagnostic()?;
            tracing::info!("seeded client {}", client.id);
        }

        for seed_user in &self.users {
            let emails = seed_user
                .emails
                .clone()
                .unwrap_or_else(|| vec![seed_user.email.clone()]);
            let (user, created) = store
                .ensure_user(
                    &seed_user.email,
                    &seed_user.password,
                    &seed_user.display_name,
                    &emails,
                )
                .await
                .into_diagnostic()?;
            if !created {
                tracing::debug!("user {} already present", seed_user.email);
                continue;
            }

            for contact in &seed_user.contacts {
                store
                    .create_contact(
                        &user.id,
                        NewContact {
                            display_name: contact.display_name.clone(),
                            emails: contact.emails.iter().map(ContactEmail::new).collect(),
                        },
                    )
                    .await
                    .into_diagnostic()?;
            }
            tracing::info!(
                "seeded user {} with {} contacts",
                seed_user.email,
                seed_user.contacts.len()
            );
        }

        Ok(())
    }
}
