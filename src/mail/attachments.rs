use log::info;

use crate::domain::email::{EmailId, ResolvedAttachment};
use crate::error::{MailError, Result};
use crate::mail::fetcher::FETCH_ITEMS;
use crate::mail::parser::{attachment_filename, attachment_parts};
use crate::mail::session::MailSession;

/// Re-fetch message `uid` and return the decoded content of its first
/// attachment named exactly `filename`.
///
/// Lookup is by filename alone, so when two attachments share a name the
/// first one in document order wins.
pub fn resolve_attachment<S: MailSession>(
    session: &mut S,
    uid: EmailId,
    filename: &str,
) -> Result<ResolvedAttachment> {
    info!("Fetching attachment {filename:?} of UID {uid}");
    let fetched = session.uid_fetch(&uid.to_string(), FETCH_ITEMS)?;
    let raw = fetched
        .into_iter()
        .find(|m| m.uid == uid)
        .ok_or_else(|| MailError::NotFound(format!("message {uid}")))?;

    let parsed = mailparse::parse_mail(&raw.body).map_err(|e| MailError::Parse {
        uid,
        reason: e.to_string(),
    })?;

    let part = attachment_parts(&parsed)
        .into_iter()
        .find(|p| attachment_filename(p).as_deref() == Some(filename))
        .ok_or_else(|| MailError::NotFound(format!("attachment {filename:?} on message {uid}")))?;

    let data = part.get_body_raw().map_err(|e| MailError::Parse {
        uid,
        reason: e.to_string(),
    })?;
    Ok(ResolvedAttachment {
        filename: filename.to_string(),
        content_type: part.ctype.mimetype.to_ascii_lowercase(),
        data,
    })
}
