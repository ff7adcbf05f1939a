//! Presence and shape checks for protocol endpoint parameters.
//!
//! These run before any client or grant lookup.

use crate::error::{Error, OAuthErrorCode, Result};
use std::collections::HashMap;

/// Named string parameters of one request, merged from query and body.
pub type Params = HashMap<String, String>;

/// The two protocol operations with a mandatory parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// End-user authorization (`/oauth/authorize` and the login step)
    Authorize,
    /// Access token request (`/oauth/token`)
    Token,
}

impl Operation {
    pub fn mandatory(&self) -> &'static [&'static str] {
        match self {
            Operation::Authorize => &["client_id", "response_type", "redirect_uri"],
            Operation::Token => &["grant_type", "client_id", "code", "redirect_uri"],
        }
    }
}

/// Response types recognized at the authorization endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Code,
    Token,
    CodeAndToken,
}

impl ResponseType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code" => Some(ResponseType::Code),
            "token" => Some(ResponseType::Token),
            "code_and_token" => Some(ResponseType::CodeAndToken),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
            ResponseType::Token => "token",
            ResponseType::CodeAndToken => "code_and_token",
        }
    }
}

/// Non-empty value of a parameter.
pub fn get<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Whether a `Content-Type` value announces a JSON body.
pub fn is_json_content(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.contains("application/json"))
}

/// Fail with `invalid_request` unless every mandatory parameter of `operation`
/// is present and non-empty.
pub fn check_mandatory(operation: Operation, params: &Params) -> Result<()> {
    if let Some(missing) = operation
        .mandatory()
        .iter()
        .find(|name| get(params, name).is_none())
    {
        tracing::warn!("{:?} request missing parameter {}", operation, missing);
        return Err(Error::invalid_request());
    }
    Ok(())
}

/// Mandatory-parameter check plus `response_type` recognition.
///
/// Implicit and hybrid response types are recognized here and refused later
/// by the authorization flow with a distinct not-implemented signal.
pub fn check_authorize(params: &Params) -> Result<ResponseType> {
    check_mandatory(Operation::Authorize, params)?;
    let raw = get(params, "response_type").unwrap_or_default();
    ResponseType::parse(raw).ok_or_else(|| {
        tracing::warn!("unsupported response_type: {}", raw);
        Error::OAuth(OAuthErrorCode::UnsupportedResponseType)
    })
}

/// Mandatory-parameter check plus `grant_type` restriction.
pub fn check_token(params: &Params) -> Result<()> {
    check_mandatory(Operation::Token, params)?;
    match get(params, "grant_type") {
        Some("authorization_code") => Ok(()),
        other => {
            tracing::warn!("unsupported grant_type: {:?}", other);
            Err(Error::OAuth(OAuthErrorCode::UnsupportedGrantType))
        }
    }
}
