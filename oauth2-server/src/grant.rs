//! Grant minting and the composite `<id>.<code>` reference handed to clients.

use crate::store::Grant;
use chrono::{DateTime, Utc};
use std::fmt;

/// Separator between the grant identifier and its verifier.
pub const CODE_DELIMITER: char = '.';

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// The two halves of a grant reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantCode {
    pub grant_id: String,
    pub code: String,
}

impl GrantCode {
    /// Split `<grant_id>.<code>`. Anything other than exactly two non-empty
    /// parts is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(CODE_DELIMITER);
        let grant_id = parts.next().filter(|p| !p.is_empty())?;
        let code = parts.next().filter(|p| !p.is_empty())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            grant_id: grant_id.to_string(),
            code: code.to_string(),
        })
    }
}

impl From<&Grant> for GrantCode {
    fn from(grant: &Grant) -> Self {
        Self {
            grant_id: grant.id.clone(),
            code: grant.code.clone(),
        }
    }
}

impl fmt::Display for GrantCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.grant_id, CODE_DELIMITER, self.code)
    }
}

/// Build a fresh grant for a user who just authenticated.
pub fn mint_grant(
    client_id: &str,
    user_id: &str,
    redirect_uri: &str,
    code_length: usize,
    now: DateTime<Utc>,
) -> Grant {
    Grant {
        id: generate_random_string(24),
        client_id: client_id.to_string(),
        user_id: Some(user_id.to_string()),
        code: generate_random_string(code_length),
        redirect_uri: redirect_uri.to_string(),
        created_at: now,
    }
}

/// Alphanumeric only, so generated values never contain the code delimiter.
pub fn generate_random_string(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
