use std::fmt;

use thiserror::Error;

use super::transport::TransportError;
use crate::modules::error::ErrorKind;
use crate::modules::providers::StoreError;

/// Why a single candidate provider could not deliver
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Resolve(#[from] StoreError),

    #[error("sender address is required (missing both request and provider 'from')")]
    MissingSenderAddress,

    #[error("invalid sender address {address}: {reason}")]
    InvalidSender { address: String, reason: String },

    #[error("failed to compose message: {0}")]
    Compose(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("transport task failed: {0}")]
    TaskFailed(String),
}

impl AttemptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AttemptError::Resolve(e) => e.kind(),
            AttemptError::MissingSenderAddress | AttemptError::InvalidSender { .. } => {
                ErrorKind::MissingSenderAddress
            }
            AttemptError::Transport(e) => e.kind(),
            AttemptError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            AttemptError::Compose(_) | AttemptError::TaskFailed(_) => ErrorKind::Internal,
        }
    }
}

/// One failed candidate, recorded during dispatch
#[derive(Debug)]
pub struct FailedAttempt {
    pub provider: String,
    pub error: AttemptError,
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

/// Terminal dispatch failure
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("at least one recipient is required")]
    NoRecipients,

    #[error("subject is required")]
    MissingSubject,

    #[error("invalid recipient address {address}: {reason}")]
    InvalidRecipient { address: String, reason: String },

    #[error("invalid attachment: {0}")]
    InvalidAttachment(String),

    #[error("no providers configured")]
    NoProvidersConfigured,

    #[error("all providers failed: {}", join_attempts(.0))]
    AllProvidersFailed(Vec<FailedAttempt>),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NoRecipients => ErrorKind::NoRecipients,
            DispatchError::MissingSubject => ErrorKind::MissingSubject,
            DispatchError::InvalidRecipient { .. } => ErrorKind::InvalidRecipient,
            DispatchError::InvalidAttachment(_) => ErrorKind::InvalidAttachment,
            DispatchError::NoProvidersConfigured => ErrorKind::NoProvidersConfigured,
            DispatchError::AllProvidersFailed(_) => ErrorKind::AllProvidersFailed,
        }
    }

    /// Per-candidate failures; empty for validation errors
    pub fn attempts(&self) -> &[FailedAttempt] {
        match self {
            DispatchError::AllProvidersFailed(attempts) => attempts,
            _ => &[],
        }
    }
}

fn join_attempts(attempts: &[FailedAttempt]) -> String {
    attempts
        .iter()
        .map(FailedAttempt::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_message_lists_every_attempt() {
        let err = DispatchError::AllProvidersFailed(vec![
            FailedAttempt {
                provider: "primary".to_string(),
                error: AttemptError::DeadlineExceeded,
            },
            FailedAttempt {
                provider: "backup".to_string(),
                error: AttemptError::Resolve(StoreError::ProviderNotFound("backup".to_string())),
            },
        ]);

        assert_eq!(
            err.to_string(),
            "all providers failed: primary: deadline exceeded; backup: provider not found: backup"
        );
        assert_eq!(err.kind(), ErrorKind::AllProvidersFailed);
        assert_eq!(err.attempts().len(), 2);
        assert_eq!(err.attempts()[1].error.kind(), ErrorKind::ProviderNotFound);
    }

    #[test]
    fn test_validation_errors_have_no_attempts() {
        assert!(DispatchError::NoRecipients.attempts().is_empty());
        assert_eq!(DispatchError::MissingSubject.kind(), ErrorKind::MissingSubject);
    }
}
