// Client identity: who to log in as and where the API lives.

/// Password used when none is supplied.
pub const DEFAULT_PASSWORD: &str = "password";

/// Base URL used by [`ClientConfig::from_env`] when `API_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:1080";

/// Login type used by [`ClientConfig::from_env`] when `API_LOGIN_TYPE` is unset.
pub const DEFAULT_LOGIN_TYPE: &str = "user";

/// Identity and endpoint for one client. Immutable once the client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub login_type: String,
    pub login_name: String,
    pub password: String,
}

impl ClientConfig {
    pub fn new(
        login_type: impl Into<String>,
        base_url: impl Into<String>,
        login_name: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            login_type: login_type.into(),
            login_name: login_name.into(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Build a config from `API_BASE_URL`, `API_LOGIN_TYPE`,
    /// `API_LOGIN_NAME` and `API_PASSWORD`, falling back to defaults.
    /// The login name defaults to empty so an interactive caller can
    /// prompt for it.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            base_url: lookup("API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            login_type: lookup("API_LOGIN_TYPE").unwrap_or_else(|| DEFAULT_LOGIN_TYPE.into()),
            login_name: lookup("API_LOGIN_NAME").unwrap_or_default(),
            password: lookup("API_PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.into()),
        }
    }
}
