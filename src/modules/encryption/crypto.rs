use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use thiserror::Error;

use super::keys::{generate_random_nonce, NONCE_LEN};
use crate::modules::error::ErrorKind;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Errors raised while sealing or opening a secret
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("key must be 16, 24, or 32 bytes (got {0})")]
    InvalidKeyLength(usize),

    #[error("ciphertext too short")]
    CiphertextTooShort,

    #[error("message authentication failed")]
    AuthenticationFailed,

    #[error("ciphertext is not valid base64: {0}")]
    InvalidEncoding(#[from] ::base64::DecodeError),

    #[error("decrypted data is not valid UTF-8")]
    InvalidUtf8,

    #[error("secure random source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("encryption failed")]
    EncryptionFailed,
}

impl CipherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CipherError::InvalidKeyLength(_) => ErrorKind::InvalidKeyLength,
            CipherError::CiphertextTooShort => ErrorKind::CiphertextTooShort,
            CipherError::AuthenticationFailed
            | CipherError::InvalidEncoding(_)
            | CipherError::InvalidUtf8 => ErrorKind::AuthenticationFailed,
            CipherError::EntropyUnavailable(_) | CipherError::EncryptionFailed => {
                ErrorKind::Internal
            }
        }
    }
}

/// Ensure a key selects one of the supported AES strengths
pub fn check_key_length(key: &[u8]) -> Result<(), CipherError> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        other => Err(CipherError::InvalidKeyLength(other)),
    }
}

fn seal<C: KeyInit + Aead>(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
    cipher
        .encrypt(aes_gcm::aead::Nonce::<C>::from_slice(nonce), plaintext)
        .map_err(|_| CipherError::EncryptionFailed)
}

fn open<C: KeyInit + Aead>(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
    cipher
        .decrypt(aes_gcm::aead::Nonce::<C>::from_slice(nonce), ciphertext)
        .map_err(|_| CipherError::AuthenticationFailed)
}

/// Encrypt a secret with AES-GCM, returning base64(nonce || ciphertext)
pub fn encrypt_data(key: &[u8], plaintext: &str) -> Result<String, CipherError> {
    check_key_length(key)?;
    let nonce = generate_random_nonce()?;

    let sealed = match key.len() {
        16 => seal::<Aes128Gcm>(key, &nonce, plaintext.as_bytes())?,
        24 => seal::<Aes192Gcm>(key, &nonce, plaintext.as_bytes())?,
        _ => seal::<Aes256Gcm>(key, &nonce, plaintext.as_bytes())?,
    };

    let mut blob = Vec::with_capacity(NONCE_LEN + sealed.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&sealed);
    Ok(base64.encode(blob))
}

/// Decrypt a blob produced by [`encrypt_data`]
pub fn decrypt_data(key: &[u8], blob: &str) -> Result<String, CipherError> {
    check_key_length(key)?;
    let raw = base64.decode(blob)?;

    if raw.len() < NONCE_LEN {
        return Err(CipherError::CiphertextTooShort);
    }
    let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

    let plaintext = match key.len() {
        16 => open::<Aes128Gcm>(key, nonce, ciphertext)?,
        24 => open::<Aes192Gcm>(key, nonce, ciphertext)?,
        _ => open::<Aes256Gcm>(key, nonce, ciphertext)?,
    };

    String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
}
