//! Authentication for service requests.
//!
//! The access manager accepts either a legacy auth key or an access token
//! issued by a grant call. Both travel in the `auth` query parameter; when both
//! are configured the token wins.

/// Credentials attached to every subscribe, heartbeat and leave request.
///
/// # Examples
///
/// ```rust
/// use pulse_link::AuthProvider;
///
/// // Legacy auth key
/// let auth = AuthProvider::auth_key("my-auth-key");
///
/// // Access token issued by the grant endpoint
/// let auth = AuthProvider::token("qEF2AkF0GmE...");
///
/// // No authentication (access manager disabled on the key set)
/// let auth = AuthProvider::none();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthProvider {
    auth_key: Option<String>,
    token: Option<String>,
}

impl AuthProvider {
    /// No authentication.
    pub fn none() -> Self {
        Self::default()
    }

    /// Legacy auth key authentication.
    pub fn auth_key(key: impl Into<String>) -> Self {
        Self {
            auth_key: Some(key.into()),
            token: None,
        }
    }

    /// Access token authentication.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            auth_key: None,
            token: Some(token.into()),
        }
    }

    /// Replace (or clear) the access token while keeping the auth key.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token.filter(|t| !t.is_empty());
    }

    /// The configured access token, if any.
    pub fn current_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The value sent as the `auth` query parameter.
    pub fn credential(&self) -> Option<&str> {
        self.token
            .as_deref()
            .or(self.auth_key.as_deref())
            .filter(|value| !value.is_empty())
    }

    /// Append the `auth` query parameter when credentials are configured.
    pub fn apply_to_query(&self, query: &mut Vec<(String, String)>) {
        if let Some(credential) = self.credential() {
            query.push(("auth".to_string(), credential.to_string()));
        }
    }

    /// Check if authentication is configured
    pub fn is_authenticated(&self) -> bool {
        self.credential().is_some()
    }
}
