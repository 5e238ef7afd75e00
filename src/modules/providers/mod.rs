pub mod model;
pub mod store;

pub use model::{CredentialRecord, ProviderInput, ProviderSummary, ResolvedCredential};
pub use store::{CredentialStore, StoreError};
