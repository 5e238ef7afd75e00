use std::fmt;

/// Stable, machine-checkable tag carried by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidKeyLength,
    CiphertextTooShort,
    AuthenticationFailed,
    CredentialCorrupted,
    ProviderNotFound,
    InvalidProviderInput,
    NoRecipients,
    MissingSubject,
    NoProvidersConfigured,
    MissingSenderAddress,
    InvalidAttachment,
    InvalidRecipient,
    Transport,
    DeadlineExceeded,
    AllProvidersFailed,
    Storage,
    Configuration,
    Internal,
}

/// Coarse grouping used by outer layers (an HTTP front end, the CLI exit code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidKeyLength => "invalid_key_length",
            ErrorKind::CiphertextTooShort => "ciphertext_too_short",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::CredentialCorrupted => "credential_corrupted",
            ErrorKind::ProviderNotFound => "provider_not_found",
            ErrorKind::InvalidProviderInput => "invalid_provider_input",
            ErrorKind::NoRecipients => "no_recipients",
            ErrorKind::MissingSubject => "missing_subject",
            ErrorKind::NoProvidersConfigured => "no_providers_configured",
            ErrorKind::MissingSenderAddress => "missing_sender_address",
            ErrorKind::InvalidAttachment => "invalid_attachment",
            ErrorKind::InvalidRecipient => "invalid_recipient",
            ErrorKind::Transport => "transport",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::AllProvidersFailed => "all_providers_failed",
            ErrorKind::Storage => "storage",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::ProviderNotFound => ErrorCategory::NotFound,
            ErrorKind::InvalidProviderInput
            | ErrorKind::NoRecipients
            | ErrorKind::MissingSubject
            | ErrorKind::NoProvidersConfigured
            | ErrorKind::MissingSenderAddress
            | ErrorKind::InvalidAttachment
            | ErrorKind::InvalidRecipient
            | ErrorKind::InvalidKeyLength => ErrorCategory::Validation,
            ErrorKind::AllProvidersFailed => ErrorCategory::Unavailable,
            _ => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
