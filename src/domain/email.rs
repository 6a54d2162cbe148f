use chrono::{DateTime, Utc};
use serde::Serialize;

/// Server-assigned UID, stable across sessions.
pub type EmailId = u32;

/// Sender shown when a message carries no usable From header.
pub const UNKNOWN_SENDER: &str = "Unknown sender";

/// One message as projected from its raw bytes for a single response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub id: EmailId,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub html: String,
    pub attachments: Vec<AttachmentMeta>,
}

/// Attachment description without its content; bytes are fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub content_type: String,
    pub size: usize,
    /// Lowercase hex MD5 of the decoded content.
    pub checksum: String,
}

/// Decoded attachment content returned by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}
