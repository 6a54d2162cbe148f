use log::info;

use crate::domain::email::{Email, EmailId, ResolvedAttachment};
use crate::error::Result;
use crate::mail::attachments::resolve_attachment;
use crate::mail::criteria::{Selection, plan};
use crate::mail::fetcher::fetch_raw;
use crate::mail::parser::parse_batch;
use crate::mail::session::{Connector, with_session};

/// Entry point for both retrieval paths. Every call opens its own session.
pub struct MailService<C: Connector> {
    connector: C,
    folder: String,
    recent_limit: u32,
}

impl<C: Connector> MailService<C> {
    pub fn new(connector: C, folder: impl Into<String>, recent_limit: u32) -> Self {
        Self {
            connector,
            folder: folder.into(),
            recent_limit,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Emails matching `selection`, newest first. All or nothing.
    pub fn list_emails(&self, selection: Selection) -> Result<Vec<Email>> {
        let raw = with_session(&self.connector, &self.folder, |session, exists| {
            let plan = plan(selection, exists, self.recent_limit)?;
            fetch_raw(session, &plan)
        })?;
        // The session is already closed here; parsing needs only the bytes.
        let emails = parse_batch(&raw)?;
        info!("Listed {} emails for {selection:?}", emails.len());
        Ok(emails)
    }

    pub fn attachment(&self, uid: EmailId, filename: &str) -> Result<ResolvedAttachment> {
        with_session(&self.connector, &self.folder, |session, _exists| {
            resolve_attachment(session, uid, filename)
        })
    }
}
