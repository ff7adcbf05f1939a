use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// The OAuth2 error vocabulary surfaced to clients in the `OAuthException`
/// envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnsupportedGrantType,
    UnsupportedResponseType,
    RedirectUriMismatch,
}

impl OAuthErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthErrorCode::InvalidRequest => "invalid_request",
            OAuthErrorCode::InvalidClient => "invalid_client",
            OAuthErrorCode::InvalidGrant => "invalid_grant",
            OAuthErrorCode::UnsupportedGrantType => "unsupported_grant_type",
            OAuthErrorCode::UnsupportedResponseType => "unsupported_response_type",
            OAuthErrorCode::RedirectUriMismatch => "redirect_uri_mismatch",
        }
    }

    /// Fixed human readable text for the code.
    pub fn description(&self) -> &'static str {
        match self {
            OAuthErrorCode::InvalidRequest => {
                "The request is missing a required parameter, includes an unsupported parameter or parameter value, or is otherwise malformed."
            }
            OAuthErrorCode::InvalidClient => {
                "The client identifier provided is invalid or client authentication failed."
            }
            OAuthErrorCode::InvalidGrant => {
                "The provided authorization grant is invalid, expired, revoked, or does not match the redirection URI."
            }
            OAuthErrorCode::UnsupportedGrantType => {
                "The authorization grant type is not supported by the authorization server."
            }
            OAuthErrorCode::UnsupportedResponseType => {
                "The requested response type is not supported by the authorization server."
            }
            OAuthErrorCode::RedirectUriMismatch => {
                "The redirection URI provided does not match a pre-registered value."
            }
        }
    }
}

impl fmt::Display for OAuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Protocol errors, reported with the OAuthException envelope
    #[error("{}: {}", .0.as_str(), .0.description())]
    OAuth(OAuthErrorCode),

    // Recognized but refused
    #[error("response_type {0} is not implemented")]
    ResponseTypeNotImplemented(String),
    #[error("filterOp {0} is not implemented")]
    FilterNotImplemented(String),

    // Authentication
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("unauthorized")]
    Unauthorized,

    // Resource API
    #[error("not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),

    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    // Generic errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_request() -> Self {
        Error::OAuth(OAuthErrorCode::InvalidRequest)
    }

    pub fn invalid_client() -> Self {
        Error::OAuth(OAuthErrorCode::InvalidClient)
    }

    pub fn invalid_grant() -> Self {
        Error::OAuth(OAuthErrorCode::InvalidGrant)
    }

    /// The OAuth2 error code carried by this error, if any.
    pub fn oauth_code(&self) -> Option<OAuthErrorCode> {
        match self {
            Error::OAuth(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<OAuthErrorCode> for Error {
    fn from(code: OAuthErrorCode) -> Self {
        Error::OAuth(code)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

// axum IntoResponse implementation
#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status = match self {
            Error::OAuth(_) => {
                let body = serde_json::json!({
                    "error": {
                        "type": "OAuthException",
                        "message": self.to_string(),
                    }
                });
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
            Error::ResponseTypeNotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Error::FilterNotImplemented(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::AuthenticationFailed | Error::Unauthorized => {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Storage(_) | Error::Internal(_) => {
                tracing::error!("request failed: {}", self);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        (status, self.to_string()).into_response()
    }
}
