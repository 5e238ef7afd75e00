pub mod dispatcher;
mod error;
mod message;
pub mod transport;

pub use dispatcher::{CallContext, Delivery, FailoverDispatcher, ProviderHealth};
pub use error::{AttemptError, DispatchError, FailedAttempt};
pub use message::{Attachment, SendRequest};
pub use transport::{MailTransport, SmtpEndpoint, SmtpMailTransport, TransportError};
