use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::model::{CredentialRecord, ProviderInput, ProviderSummary, ResolvedCredential};
use crate::modules::encryption::{decrypt_data, encrypt_data, CipherError, MasterKey};
use crate::modules::error::ErrorKind;
use crate::modules::utils::logging::log_provider_event;

/// Error type for credential store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("missing required provider fields: {}", .0.join(", "))]
    InvalidProviderInput(Vec<&'static str>),

    #[error("credential for provider {name} cannot be decrypted: {source}")]
    CredentialCorrupted {
        name: String,
        #[source]
        source: CipherError,
    },

    #[error("failed to encrypt provider secret: {0}")]
    Encryption(#[source] CipherError),

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize providers: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::ProviderNotFound(_) => ErrorKind::ProviderNotFound,
            StoreError::InvalidProviderInput(_) => ErrorKind::InvalidProviderInput,
            StoreError::CredentialCorrupted { .. } => ErrorKind::CredentialCorrupted,
            StoreError::Encryption(e) => e.kind(),
            StoreError::Parse { .. } | StoreError::Serialize(_) | StoreError::Io { .. } => {
                ErrorKind::Storage
            }
        }
    }
}

/// Encrypted, file-backed map of provider name to credential record.
///
/// Records keep insertion order, which is also the default failover order.
/// Every mutation rewrites the whole file while holding the write lock, and
/// is rolled back in memory if the write fails.
pub struct CredentialStore {
    path: PathBuf,
    key: MasterKey,
    records: RwLock<Vec<CredentialRecord>>,
}

impl CredentialStore {
    /// Load the store from `path`; a missing or empty file is an empty store
    pub fn open(path: impl Into<PathBuf>, key: MasterKey) -> Result<Self, StoreError> {
        let path = path.into();
        let records = load_records(&path, &key)?;

        info!(
            "Credential store loaded: path={}, providers={}, key=AES-{}",
            path.display(),
            records.len(),
            key.bits()
        );

        Ok(Self {
            path,
            key,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn list_providers(&self) -> Vec<ProviderSummary> {
        self.records
            .read()
            .iter()
            .map(CredentialRecord::summary)
            .collect()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.records
            .read()
            .iter()
            .map(|record| record.name.clone())
            .collect()
    }

    /// Look up a provider and decrypt its password
    pub fn get_provider(&self, name: &str) -> Result<ResolvedCredential, StoreError> {
        let record = self
            .records
            .read()
            .iter()
            .find(|record| record.name == name)
            .cloned()
            .ok_or_else(|| StoreError::ProviderNotFound(name.to_string()))?;

        let password = decrypt_data(self.key.as_bytes(), &record.secret).map_err(|source| {
            StoreError::CredentialCorrupted {
                name: record.name.clone(),
                source,
            }
        })?;

        Ok(ResolvedCredential {
            name: record.name,
            host: record.host,
            port: record.port,
            username: record.username,
            password,
            from: record.from,
            use_tls: record.use_tls,
        })
    }

    /// Insert or replace a provider by name and persist the snapshot
    pub fn upsert_provider(&self, input: ProviderInput) -> Result<ProviderSummary, StoreError> {
        let missing = input.missing_fields();
        if !missing.is_empty() {
            return Err(StoreError::InvalidProviderInput(missing));
        }

        let secret =
            encrypt_data(self.key.as_bytes(), &input.password).map_err(StoreError::Encryption)?;

        let record = CredentialRecord {
            name: input.name,
            host: input.host,
            port: input.port,
            username: input.username,
            secret,
            from: input.from,
            use_tls: input.use_tls,
        };
        let summary = record.summary();

        let mut records = self.records.write();
        let position = records.iter().position(|r| r.name == record.name);
        let previous = match position {
            Some(index) => Some(std::mem::replace(&mut records[index], record)),
            None => {
                records.push(record);
                None
            }
        };

        if let Err(e) = self.persist(&records) {
            match (position, previous) {
                (Some(index), Some(previous)) => records[index] = previous,
                _ => {
                    records.pop();
                }
            }
            log_provider_event("upsert", &summary.name, false, Some(&e.to_string()));
            return Err(e);
        }
        drop(records);

        let action = if position.is_some() { "replaced" } else { "created" };
        log_provider_event("upsert", &summary.name, true, Some(action));
        Ok(summary)
    }

    /// Remove a provider and persist the snapshot
    pub fn delete_provider(&self, name: &str) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let index = records
            .iter()
            .position(|record| record.name == name)
            .ok_or_else(|| StoreError::ProviderNotFound(name.to_string()))?;

        let removed = records.remove(index);
        if let Err(e) = self.persist(&records) {
            records.insert(index, removed);
            log_provider_event("delete", name, false, Some(&e.to_string()));
            return Err(e);
        }
        drop(records);

        log_provider_event("delete", name, true, None);
        Ok(())
    }

    // Caller must hold the write lock.
    fn persist(&self, records: &[CredentialRecord]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(records).map_err(StoreError::Serialize)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        // NamedTempFile is created with 0600 on unix.
        let mut file = NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        file.write_all(&data).map_err(|e| self.io_error(e))?;
        file.as_file().sync_all().map_err(|e| self.io_error(e))?;
        file.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        Ok(())
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn load_records(path: &Path, key: &MasterKey) -> Result<Vec<CredentialRecord>, StoreError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No provider file at {}, starting empty", path.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if data.trim().is_empty() {
        return Ok(Vec::new());
    }

    let parsed: Vec<CredentialRecord> =
        serde_json::from_str(&data).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut records: Vec<CredentialRecord> = Vec::with_capacity(parsed.len());
    for record in parsed {
        if record.name.trim().is_empty() {
            warn!("Skipping provider entry without a name in {}", path.display());
            continue;
        }

        // Every stored secret must open under the current key.
        decrypt_data(key.as_bytes(), &record.secret).map_err(|source| {
            StoreError::CredentialCorrupted {
                name: record.name.clone(),
                source,
            }
        })?;

        match records.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => {
                warn!("Duplicate provider {} in {}, keeping the last entry", record.name, path.display());
                *existing = record;
            }
            None => records.push(record),
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_key() -> MasterKey {
        MasterKey::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap()
    }

    fn input(name: &str, password: &str) -> ProviderInput {
        ProviderInput {
            name: name.to_string(),
            host: format!("smtp.{}.example.com", name),
            port: 587,
            username: format!("{}@example.com", name),
            password: password.to_string(),
            from: None,
            use_tls: false,
        }
    }

    fn setup_store() -> (CredentialStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(dir.path().join("providers.json"), test_key()).unwrap();
        (store, dir)
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let (store, _dir) = setup_store();
        assert!(store.is_empty());
        assert!(store.list_providers().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_empty_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("providers.json");
        fs::write(&path, "  \n").unwrap();

        let store = CredentialStore::open(&path, test_key()).unwrap();
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_corrupt_json_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("providers.json");
        fs::write(&path, "{ not json").unwrap();

        let err = CredentialStore::open(&path, test_key()).err().unwrap();
        assert!(matches!(err, StoreError::Parse { .. }));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_upsert_and_get() {
        let (store, _dir) = setup_store();
        let mut provider = input("primary", "app-password");
        provider.from = Some("noreply@example.com".to_string());
        provider.use_tls = true;

        let summary = store.upsert_provider(provider).unwrap();
        assert_eq!(summary.name, "primary");

        let resolved = store.get_provider("primary").unwrap();
        assert_eq!(resolved.host, "smtp.primary.example.com");
        assert_eq!(resolved.password, "app-password");
        assert_eq!(resolved.from.as_deref(), Some("noreply@example.com"));
        assert!(resolved.use_tls);
    }

    #[test]
    fn test_secret_is_encrypted_on_disk() {
        let (store, _dir) = setup_store();
        store.upsert_provider(input("primary", "plaintext-secret")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("plaintext-secret"));

        let records: Vec<CredentialRecord> = serde_json::from_str(&raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            decrypt_data(test_key().as_bytes(), &records[0].secret).unwrap(),
            "plaintext-secret"
        );
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let (store, _dir) = setup_store();
        store.upsert_provider(input("first", "one")).unwrap();
        store.upsert_provider(input("primary", "old")).unwrap();
        store.upsert_provider(input("last", "three")).unwrap();

        let mut replacement = input("primary", "new");
        replacement.host = "smtp.replacement.example.com".to_string();
        replacement.port = 465;
        store.upsert_provider(replacement).unwrap();

        let resolved = store.get_provider("primary").unwrap();
        assert_eq!(resolved.password, "new");
        assert_eq!(resolved.host, "smtp.replacement.example.com");
        assert_eq!(resolved.port, 465);

        let listed = store.list_providers();
        assert_eq!(listed.iter().filter(|p| p.name == "primary").count(), 1);
        // Replacement keeps the original position
        assert_eq!(store.provider_names(), vec!["first", "primary", "last"]);
    }

    #[test]
    fn test_invalid_input_rejected_without_write() {
        let (store, _dir) = setup_store();
        let mut bad = input("primary", "");
        bad.port = 0;

        let err = store.upsert_provider(bad).unwrap_err();
        assert!(matches!(err, StoreError::InvalidProviderInput(ref f) if f == &vec!["port", "password"]));
        assert_eq!(err.kind(), ErrorKind::InvalidProviderInput);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_delete_provider() {
        let (store, _dir) = setup_store();

        let err = store.delete_provider("absent").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderNotFound);

        store.upsert_provider(input("primary", "secret")).unwrap();
        store.delete_provider("primary").unwrap();

        let err = store.get_provider("primary").unwrap_err();
        assert!(matches!(err, StoreError::ProviderNotFound(ref n) if n == "primary"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_reopen_preserves_order_and_secrets() {
        let (store, dir) = setup_store();
        for name in ["zeta", "alpha", "mid"] {
            store.upsert_provider(input(name, &format!("{}-pw", name))).unwrap();
        }
        store.delete_provider("alpha").unwrap();

        let reopened = CredentialStore::open(dir.path().join("providers.json"), test_key()).unwrap();
        assert_eq!(reopened.provider_names(), vec!["zeta", "mid"]);
        assert_eq!(reopened.get_provider("mid").unwrap().password, "mid-pw");
    }

    #[test]
    fn test_key_mismatch_is_fatal_at_load() {
        let (store, dir) = setup_store();
        store.upsert_provider(input("primary", "secret")).unwrap();

        let other_key = MasterKey::new(vec![9u8; 32]).unwrap();
        let err = CredentialStore::open(dir.path().join("providers.json"), other_key)
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::CredentialCorrupted { ref name, .. } if name == "primary"));
        assert_eq!(err.kind(), ErrorKind::CredentialCorrupted);
    }

    #[test]
    fn test_load_skips_nameless_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("providers.json");
        let key = test_key();
        let first = encrypt_data(key.as_bytes(), "first").unwrap();
        let second = encrypt_data(key.as_bytes(), "second").unwrap();
        let json = format!(
            r#"[
                {{"name":"","host":"h","port":25,"username":"u","secret":"{first}","from":null,"use_tls":false}},
                {{"name":"dup","host":"h1","port":25,"username":"u","secret":"{first}","from":null,"use_tls":false}},
                {{"name":"other","host":"h2","port":25,"username":"u","secret":"{first}","from":null,"use_tls":false}},
                {{"name":"dup","host":"h3","port":25,"username":"u","secret":"{second}","from":null,"use_tls":false}}
            ]"#
        );
        fs::write(&path, json).unwrap();

        let store = CredentialStore::open(&path, key).unwrap();
        assert_eq!(store.provider_names(), vec!["dup", "other"]);
        let dup = store.get_provider("dup").unwrap();
        assert_eq!(dup.host, "h3");
        assert_eq!(dup.password, "second");
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let (store, _dir) = setup_store();
        store.upsert_provider(input("primary", "secret")).unwrap();

        // Replace the file with a non-empty directory so the rename fails
        fs::remove_file(store.path()).unwrap();
        fs::create_dir(store.path()).unwrap();
        fs::write(store.path().join("blocker"), "x").unwrap();

        let err = store.upsert_provider(input("secondary", "pw")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(store.provider_names(), vec!["primary"]);

        let err = store.upsert_provider(input("primary", "changed")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(store.get_provider("primary").unwrap().password, "secret");

        assert!(store.delete_provider("primary").is_err());
        assert_eq!(store.provider_names(), vec!["primary"]);
    }

    #[test]
    fn test_concurrent_upserts_and_reads() {
        let (store, dir) = setup_store();
        let store = Arc::new(store);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    let name = format!("provider-{}", i);
                    store.upsert_provider(input(&name, &format!("pw-{}", i))).unwrap();
                });
            }
            for _ in 0..4 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..50 {
                        for summary in store.list_providers() {
                            let resolved = store.get_provider(&summary.name).unwrap();
                            let suffix = summary.name.trim_start_matches("provider-");
                            assert_eq!(resolved.password, format!("pw-{}", suffix));
                            assert_eq!(resolved.host, summary.host);
                        }
                    }
                });
            }
        });

        assert_eq!(store.len(), 8);
        let reopened = CredentialStore::open(dir.path().join("providers.json"), test_key()).unwrap();
        assert_eq!(reopened.len(), 8);
        for i in 0..8 {
            let resolved = reopened.get_provider(&format!("provider-{}", i)).unwrap();
            assert_eq!(resolved.password, format!("pw-{}", i));
        }
    }
}
