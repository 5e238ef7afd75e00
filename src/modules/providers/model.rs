use std::fmt;

use serde::{Deserialize, Serialize};

/// Persisted provider entry; `secret` is always the sealed blob, never plaintext
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CredentialRecord {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(alias = "password")]
    pub secret: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub from: Option<String>,
    #[serde(default)]
    pub use_tls: bool,
}

impl CredentialRecord {
    pub fn summary(&self) -> ProviderSummary {
        ProviderSummary {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            from: self.from.clone(),
            use_tls: self.use_tls,
        }
    }
}

/// Provider as shown to callers: everything except the secret
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProviderSummary {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub from: Option<String>,
    pub use_tls: bool,
}

/// Upsert payload with the plaintext password
#[derive(Deserialize, Clone, Default)]
pub struct ProviderInput {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub from: Option<String>,
    #[serde(default)]
    pub use_tls: bool,
}

impl ProviderInput {
    /// Names of required fields that are blank or zero
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.host.trim().is_empty() {
            missing.push("host");
        }
        if self.port == 0 {
            missing.push("port");
        }
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        missing
    }
}

impl fmt::Debug for ProviderInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderInput")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("from", &self.from)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

/// Provider with its password decrypted for one immediate use
#[derive(Clone)]
pub struct ResolvedCredential {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: Option<String>,
    pub use_tls: bool,
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("from", &self.from)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
