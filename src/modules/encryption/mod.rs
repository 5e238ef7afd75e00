mod crypto;
pub mod keys;

pub use crypto::{check_key_length, decrypt_data, encrypt_data, CipherError};
pub use keys::{generate_random_nonce, MasterKey, NONCE_LEN};
