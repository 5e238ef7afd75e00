use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::error::{AttemptError, DispatchError, FailedAttempt};
use super::message::{PreparedMessage, SendRequest};
use super::transport::{MailTransport, SmtpEndpoint, TransportError};
use crate::modules::config::Settings;
use crate::modules::providers::CredentialStore;
use crate::modules::utils::logging::log_delivery_attempt;
use crate::{DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_SEND_TIMEOUT_SECS};

/// Caller-scoped deadline for one dispatcher operation.
///
/// When no deadline is set, each transport attempt gets the dispatcher's own
/// ceiling instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn effective_deadline(&self, ceiling: Duration) -> Instant {
        self.deadline.unwrap_or_else(|| Instant::now() + ceiling)
    }
}

/// Successful dispatch: the provider that delivered, plus any candidates that failed first
#[derive(Debug)]
pub struct Delivery {
    pub provider: String,
    pub failures: Vec<FailedAttempt>,
}

/// Result of a connect-and-authenticate probe
#[derive(Debug)]
pub enum ProviderHealth {
    Healthy,
    Unhealthy(AttemptError),
}

impl ProviderHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProviderHealth::Healthy)
    }

    pub fn error(&self) -> Option<&AttemptError> {
        match self {
            ProviderHealth::Healthy => None,
            ProviderHealth::Unhealthy(e) => Some(e),
        }
    }
}

/// Sends one message through an ordered list of providers until one succeeds
pub struct FailoverDispatcher {
    store: Arc<CredentialStore>,
    transport: Arc<dyn MailTransport>,
    send_timeout: Duration,
    probe_timeout: Duration,
}

impl FailoverDispatcher {
    pub fn new(store: Arc<CredentialStore>, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            store,
            transport,
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }

    pub fn from_settings(
        store: Arc<CredentialStore>,
        transport: Arc<dyn MailTransport>,
        settings: &Settings,
    ) -> Self {
        Self::new(store, transport).with_timeouts(settings.send_timeout(), settings.probe_timeout())
    }

    pub fn with_timeouts(mut self, send_timeout: Duration, probe_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Deliver `request` through the first provider that accepts it.
    ///
    /// Candidates come from `provider_priority` verbatim when given, otherwise
    /// from the store in insertion order, and are tried one at a time.
    pub async fn send(&self, ctx: &CallContext, request: &SendRequest) -> Result<Delivery, DispatchError> {
        let prepared = PreparedMessage::prepare(request)?;

        let candidates = if request.provider_priority.is_empty() {
            self.store.provider_names()
        } else {
            request.provider_priority.clone()
        };
        if candidates.is_empty() {
            return Err(DispatchError::NoProvidersConfigured);
        }

        let requested_from = request.from.as_deref().filter(|from| !from.trim().is_empty());
        let mut failures = Vec::new();

        for name in candidates {
            match self.attempt(ctx, &name, &prepared, requested_from).await {
                Ok(()) => {
                    info!(
                        "Email sent via provider {} after {} failed attempt(s)",
                        name,
                        failures.len()
                    );
                    return Ok(Delivery {
                        provider: name,
                        failures,
                    });
                }
                Err(e) => {
                    warn!("Send failed using provider {}: {}", name, e);
                    failures.push(FailedAttempt {
                        provider: name,
                        error: e,
                    });
                }
            }
        }

        let err = DispatchError::AllProvidersFailed(failures);
        error!("{}", err);
        Err(err)
    }

    async fn attempt(
        &self,
        ctx: &CallContext,
        name: &str,
        prepared: &PreparedMessage,
        requested_from: Option<&str>,
    ) -> Result<(), AttemptError> {
        let credential = self.store.get_provider(name)?;

        let from = requested_from
            .or(credential.from.as_deref())
            .ok_or(AttemptError::MissingSenderAddress)?;
        let message = prepared.compose(from)?;

        let username = credential.username.clone();
        let endpoint = SmtpEndpoint::from(credential);
        let transport = Arc::clone(&self.transport);
        let deadline = ctx.effective_deadline(self.send_timeout);

        let result = run_until(deadline, async move { transport.send(&endpoint, message).await }).await;

        let details = result.as_ref().err().map(ToString::to_string);
        log_delivery_attempt(name, &username, result.is_ok(), details.as_deref());
        result
    }

    /// Probe one provider with a connect-and-authenticate handshake
    pub async fn check_provider(&self, ctx: &CallContext, name: &str) -> ProviderHealth {
        let credential = match self.store.get_provider(name) {
            Ok(credential) => credential,
            Err(e) => return ProviderHealth::Unhealthy(e.into()),
        };

        let endpoint = SmtpEndpoint::from(credential);
        let transport = Arc::clone(&self.transport);
        let deadline = ctx.effective_deadline(self.probe_timeout);

        match run_until(deadline, async move { transport.handshake(&endpoint).await }).await {
            Ok(()) => {
                info!("Provider {} is healthy", name);
                ProviderHealth::Healthy
            }
            Err(e) => {
                warn!("Provider {} is unhealthy: {}", name, e);
                ProviderHealth::Unhealthy(e)
            }
        }
    }
}

// Aborts the spawned transport call if the waiting side goes away.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run transport work as its own task and wait for it no later than `deadline`
async fn run_until<F>(deadline: Instant, work: F) -> Result<(), AttemptError>
where
    F: Future<Output = Result<(), TransportError>> + Send + 'static,
{
    if Instant::now() >= deadline {
        return Err(AttemptError::DeadlineExceeded);
    }

    let mut task = AbortOnDrop(tokio::spawn(work));
    match tokio::time::timeout_at(deadline, &mut task.0).await {
        Ok(Ok(result)) => result.map_err(AttemptError::from),
        Ok(Err(join_error)) => Err(AttemptError::TaskFailed(join_error.to_string())),
        Err(_) => Err(AttemptError::DeadlineExceeded),
    }
}
