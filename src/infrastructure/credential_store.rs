use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

pub const ACCESS_TOKEN_ENV: &str = "WEEKGRID_ACCESS_TOKEN";

/// Storage for the bearer token presented to the schedule store.
pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &str) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<String>, InfraError>;
    fn delete_token(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("weekgrid.schedule-api", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_token(&self, token: &str) -> Result<(), InfraError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(InfraError::Credential("access token must not be empty".to_string()));
        }
        self.entry()?
            .set_password(token)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_token(&self) -> Result<Option<String>, InfraError> {
        match self.entry()?.get_password() {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl InMemoryCredentialStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &str) -> Result<(), InfraError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(InfraError::Credential("access token must not be empty".to_string()));
        }
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<String>, InfraError> {
        let guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}

/// The environment token takes precedence over the stored one.
pub fn resolve_access_token<F>(store: &dyn CredentialStore, lookup: F) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(ACCESS_TOKEN_ENV)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    {
        return Ok(token);
    }
    store.load_token()?.ok_or(InfraError::MissingAccessToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_roundtrip() {
        let store = InMemoryCredentialStore::default();
        assert_eq!(store.load_token().expect("load"), None);
        store.save_token("  abc  ").expect("save");
        assert_eq!(store.load_token().expect("load").as_deref(), Some("abc"));
        store.delete_token().expect("delete");
        assert_eq!(store.load_token().expect("load"), None);
        assert!(store.save_token("   ").is_err());
    }

    #[test]
    fn env_token_wins_over_stored_token() {
        let store = InMemoryCredentialStore::with_token("stored");
        let token = resolve_access_token(&store, |key| match key {
            ACCESS_TOKEN_ENV => Some("from-env".to_string()),
            _ => None,
        })
        .expect("token");
        assert_eq!(token, "from-env");

        let token = resolve_access_token(&store, |_| Some("  ".to_string())).expect("token");
        assert_eq!(token, "stored");
    }

    #[test]
    fn missing_token_is_reported() {
        let store = InMemoryCredentialStore::default();
        assert!(matches!(
            resolve_access_token(&store, |_| None),
            Err(InfraError::MissingAccessToken)
        ));
    }
}
