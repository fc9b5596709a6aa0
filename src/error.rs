// Error type shared by every client call. Credential failures are split
// out of the generic HTTP failure so tests can match on them directly.

use thiserror::Error;

/// Errors returned by [`crate::api::ApiBase`] and [`crate::user::UserApi`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered 422 to a login: no account with that name.
    #[error("Could not log on as '{login_name}'.  Please check {login_type} name.")]
    UnknownIdentity {
        login_name: String,
        login_type: String,
    },

    /// The server answered 401 to a login.
    #[error("Could not log on as '{login_name}'.  Please check password.")]
    BadPassword { login_name: String },

    /// Any other unexpected status. `body` is the raw response text.
    #[error("request failed ({status}): {body}")]
    Http { status: u16, body: String },

    /// A query endpoint rejected its parameters (400) and listed why.
    #[error("request failed ({status}): {messages}")]
    BadQuery {
        status: u16,
        messages: serde_json::Value,
    },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("token is not a valid header value")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("not authenticated: call authenticate or register first")]
    NotAuthenticated,
}

impl ApiError {
    /// HTTP status carried by the error, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UnknownIdentity { .. } => Some(422),
            ApiError::BadPassword { .. } => Some(401),
            ApiError::Http { status, .. } | ApiError::BadQuery { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_messages_name_the_login() {
        let err = ApiError::UnknownIdentity {
            login_name: "alice".into(),
            login_type: "user".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("user name"));
        assert!(!msg.contains("422"));

        let err = ApiError::BadPassword {
            login_name: "alice".into(),
        };
        assert!(err.to_string().contains("check password"));
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_http_message_has_status_and_body() {
        let err = ApiError::Http {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "request failed (500): boom");
        assert_eq!(err.status(), Some(500));
        assert_eq!(ApiError::NotAuthenticated.status(), None);
    }
}
