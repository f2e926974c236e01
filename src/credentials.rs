//! Credential provider seam
//!
//! Credential storage and retrieval live outside this crate; the router only
//! needs a bearer token at connect time and never keeps it afterwards.

use crate::protocol::error::{ProtocolError, ProtocolResult};

/// Supplies the bearer token used for the connect handshake
pub trait CredentialProvider: Send + Sync {
    /// Produce the bearer token
    ///
    /// # Errors
    /// Returns `ProtocolError::Credential` when no usable token exists.
    fn bearer_token(&self) -> ProtocolResult<String>;
}

/// Reads the token from an environment variable
///
/// # Example
/// ```
/// use voxline::credentials::EnvCredentials;
///
/// let credentials = EnvCredentials::new();
/// // reads OPENAI_API_KEY at connect time
/// ```
pub struct EnvCredentials {
    var_name: String,
}

impl EnvCredentials {
    /// Use the default OPENAI_API_KEY variable
    pub fn new() -> Self {
        Self::from_var("OPENAI_API_KEY")
    }

    /// Use a custom environment variable
    pub fn from_var(var_name: impl Into<String>) -> Self {
        Self {
            var_name: var_name.into(),
        }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for EnvCredentials {
    fn bearer_token(&self) -> ProtocolResult<String> {
        match std::env::var(&self.var_name) {
            Ok(key) if key.trim().is_empty() => Err(ProtocolError::Credential(format!(
                "{} is empty",
                self.var_name
            ))),
            Ok(key) => Ok(key),
            Err(_) => Err(ProtocolError::Credential(format!(
                "{} is not set",
                self.var_name
            ))),
        }
    }
}

/// Holds a fixed token, for tests and embedding callers
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    /// Wrap an existing token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> ProtocolResult<String> {
        if self.token.is_empty() {
            return Err(ProtocolError::Credential("token is empty".to_string()));
        }
        Ok(self.token.clone())
    }
}
