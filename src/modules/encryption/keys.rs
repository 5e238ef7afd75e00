use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;

use super::crypto::{check_key_length, CipherError};

/// AES-GCM nonce size in bytes
pub const NONCE_LEN: usize = 12;

/// Function to generate a random nonce for AES-GCM encryption
pub fn generate_random_nonce() -> Result<[u8; NONCE_LEN], CipherError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| CipherError::EntropyUnavailable(e.to_string()))?;
    Ok(nonce)
}

/// Symmetric key used to seal provider secrets.
///
/// Constructed once at startup and handed to the store by value; the length
/// is validated up front so later encrypt/decrypt calls cannot hit
/// `InvalidKeyLength`.
#[derive(Clone, PartialEq, Eq)]
pub struct MasterKey(Vec<u8>);

impl MasterKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, CipherError> {
        let bytes = bytes.into();
        check_key_length(&bytes)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key strength in bits
    pub fn bits(&self) -> usize {
        self.0.len() * 8
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey(AES-{}, ***)", self.bits())
    }
}
