use std::fs;
use std::io;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use serde::{Deserialize, Serialize};

use super::error::{AttemptError, DispatchError};

const DEFAULT_ATTACHMENT_TYPE: &str = "application/octet-stream";

/// Attachment payload with base64 content
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Attachment {
    pub filename: String,
    pub content: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Attachment {
    /// Read a local file and encode it as an attachment
    pub fn from_path(path: &Path, content_type: Option<String>) -> io::Result<Self> {
        let data = fs::read(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

        Ok(Self {
            filename,
            content: base64.encode(data),
            content_type,
        })
    }
}

/// A request to send one email through the failover dispatcher
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SendRequest {
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub provider_priority: Vec<String>,
    pub from: Option<String>,
}

struct DecodedAttachment {
    filename: String,
    data: Vec<u8>,
    content_type: ContentType,
}

/// Validated request, ready to be composed once per candidate sender
pub(crate) struct PreparedMessage {
    subject: String,
    body: String,
    is_html: bool,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    attachments: Vec<DecodedAttachment>,
}

impl PreparedMessage {
    /// Validate everything that does not depend on the provider
    pub fn prepare(request: &SendRequest) -> Result<Self, DispatchError> {
        if request.to.is_empty() {
            return Err(DispatchError::NoRecipients);
        }
        if request.subject.trim().is_empty() {
            return Err(DispatchError::MissingSubject);
        }

        let attachments = request
            .attachments
            .iter()
            .map(decode_attachment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            subject: request.subject.clone(),
            body: request.body.clone(),
            is_html: request.is_html,
            to: parse_mailboxes(&request.to)?,
            cc: parse_mailboxes(&request.cc)?,
            bcc: parse_mailboxes(&request.bcc)?,
            attachments,
        })
    }

    /// Build the wire message for a given sender address
    pub fn compose(&self, from: &str) -> Result<Message, AttemptError> {
        let sender: Mailbox = from.trim().parse().map_err(|e: lettre::address::AddressError| {
            AttemptError::InvalidSender {
                address: from.to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut builder = Message::builder().from(sender).subject(self.subject.clone());
        for mailbox in &self.to {
            builder = builder.to(mailbox.clone());
        }
        for mailbox in &self.cc {
            builder = builder.cc(mailbox.clone());
        }
        for mailbox in &self.bcc {
            builder = builder.bcc(mailbox.clone());
        }

        let body_type = if self.is_html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };

        let message = if self.attachments.is_empty() {
            builder.header(body_type).body(self.body.clone())
        } else {
            let mut parts = MultiPart::mixed().singlepart(
                SinglePart::builder()
                    .header(body_type)
                    .body(self.body.clone()),
            );
            for attachment in &self.attachments {
                parts = parts.singlepart(
                    MimeAttachment::new(attachment.filename.clone())
                        .body(attachment.data.clone(), attachment.content_type.clone()),
                );
            }
            builder.multipart(parts)
        };

        message.map_err(|e| AttemptError::Compose(e.to_string()))
    }
}

fn parse_mailboxes(addresses: &[String]) -> Result<Vec<Mailbox>, DispatchError> {
    addresses
        .iter()
        .map(|address| {
            address
                .trim()
                .parse::<Mailbox>()
                .map_err(|e| DispatchError::InvalidRecipient {
                    address: address.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

fn decode_attachment(attachment: &Attachment) -> Result<DecodedAttachment, DispatchError> {
    if attachment.filename.trim().is_empty() || attachment.content.is_empty() {
        return Err(DispatchError::InvalidAttachment(
            "attachment requires filename and base64 content".to_string(),
        ));
    }

    let data = base64.decode(&attachment.content).map_err(|e| {
        DispatchError::InvalidAttachment(format!("decode attachment {}: {}", attachment.filename, e))
    })?;

    let content_type = attachment
        .content_type
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(DEFAULT_ATTACHMENT_TYPE);
    let content_type = ContentType::parse(content_type).map_err(|e| {
        DispatchError::InvalidAttachment(format!(
            "content type {:?} for {}: {}",
            content_type, attachment.filename, e
        ))
    })?;

    Ok(DecodedAttachment {
        filename: attachment.filename.clone(),
        data,
        content_type,
    })
}
