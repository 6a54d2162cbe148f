//! Decode raw RFC 822 bytes into an [`Email`].

use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use md5::{Digest, Md5};
use std::num::NonZeroUsize;
use std::thread;

use crate::domain::email::{AttachmentMeta, Email, EmailId, UNKNOWN_SENDER};
use crate::error::{MailError, Result};
use crate::mail::decoders::text_to_html;
use crate::mail::session::RawMessage;

fn parse_err(uid: EmailId, e: impl std::fmt::Display) -> MailError {
    MailError::Parse {
        uid,
        reason: e.to_string(),
    }
}

fn header(parsed: &ParsedMail, name: &str) -> Option<String> {
    parsed
        .headers
        .get_first_value(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Leaf parts that count as attachments, depth-first in document order.
///
/// A leaf is an attachment when its disposition says so, or when it is
/// anything other than a plain or HTML text part.
pub(crate) fn attachment_parts<'a, 'b>(part: &'b ParsedMail<'a>) -> Vec<&'b ParsedMail<'a>> {
    fn walk<'a, 'b>(part: &'b ParsedMail<'a>, out: &mut Vec<&'b ParsedMail<'a>>) {
        if !part.subparts.is_empty() {
            for sub in &part.subparts {
                walk(sub, out);
            }
            return;
        }
        if is_attachment(part) {
            out.push(part);
        }
    }
    let mut out = Vec::new();
    walk(part, &mut out);
    out
}

fn is_attachment(part: &ParsedMail) -> bool {
    let disposition = part.get_content_disposition().disposition;
    let mime = part.ctype.mimetype.to_ascii_lowercase();
    disposition == DispositionType::Attachment
        || !matches!(mime.as_str(), "text/plain" | "text/html")
}

pub(crate) fn attachment_filename(part: &ParsedMail) -> Option<String> {
    part.get_content_disposition()
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned()
}

#[derive(Default)]
struct TextBodies {
    html: Option<String>,
    plain: Option<String>,
}

fn collect_text(uid: EmailId, part: &ParsedMail, bodies: &mut TextBodies) -> Result<()> {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_text(uid, sub, bodies)?;
        }
        return Ok(());
    }
    if is_attachment(part) {
        return Ok(());
    }
    match part.ctype.mimetype.to_ascii_lowercase().as_str() {
        "text/html" if bodies.html.is_none() => {
            let html = part.get_body().map_err(|e| parse_err(uid, e))?;
            if !html.trim().is_empty() {
                bodies.html = Some(html);
            }
        }
        "text/plain" if bodies.plain.is_none() => {
            bodies.plain = Some(part.get_body().map_err(|e| parse_err(uid, e))?);
        }
        _ => {}
    }
    Ok(())
}

fn attachment_meta(uid: EmailId, part: &ParsedMail) -> Result<AttachmentMeta> {
    let data = part.get_body_raw().map_err(|e| parse_err(uid, e))?;
    Ok(AttachmentMeta {
        filename: attachment_filename(part),
        content_type: part.ctype.mimetype.to_ascii_lowercase(),
        size: data.len(),
        checksum: format!("{:x}", Md5::digest(&data)),
    })
}

/// RFC 2822 first, then mailparse's lenient parser. `dateparse` answers 0
/// for text it cannot read, so 0 counts as no date.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc2822(value) {
        return Some(d.with_timezone(&Utc));
    }
    mailparse::dateparse(value)
        .ok()
        .filter(|ts| *ts != 0)
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
}

/// Parse one message. Pure: the same `(uid, raw)` always yields the same
/// `Email`. Attachment content is measured and hashed, then dropped.
pub fn parse_message(uid: EmailId, raw: &[u8]) -> Result<Email> {
    let parsed = mailparse::parse_mail(raw).map_err(|e| parse_err(uid, e))?;

    let from = header(&parsed, "From").unwrap_or_else(|| UNKNOWN_SENDER.to_string());
    let subject = header(&parsed, "Subject");
    let date = header(&parsed, "Date").and_then(|d| parse_date(&d));

    let mut bodies = TextBodies::default();
    collect_text(uid, &parsed, &mut bodies)?;
    let html = match (bodies.html, bodies.plain) {
        (Some(html), _) => html,
        (None, Some(plain)) => text_to_html(&plain),
        (None, None) if parsed.subparts.is_empty() && !is_attachment(&parsed) => {
            parsed.get_body().map_err(|e| parse_err(uid, e))?
        }
        (None, None) => String::new(),
    };

    let attachments = attachment_parts(&parsed)
        .into_iter()
        .map(|part| attachment_meta(uid, part))
        .collect::<Result<Vec<_>>>()?;

    Ok(Email {
        id: uid,
        from,
        subject,
        date,
        html,
        attachments,
    })
}

/// Parse fetched messages across worker threads, keeping their order.
/// The first failure fails the whole batch.
pub fn parse_batch(messages: &[RawMessage]) -> Result<Vec<Email>> {
    let workers = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    if workers < 2 || messages.len() < 2 {
        return messages
            .iter()
            .map(|m| parse_message(m.uid, &m.body))
            .collect();
    }

    let chunk = messages.len().div_ceil(workers);
    thread::scope(|scope| {
        let handles: Vec<_> = messages
            .chunks(chunk)
            .map(|slice| {
                scope.spawn(move || {
                    slice
                        .iter()
                        .map(|m| parse_message(m.uid, &m.body))
                        .collect::<Result<Vec<_>>>()
                })
            })
            .collect();

        let mut out = Vec::with_capacity(messages.len());
        for handle in handles {
            let parsed = handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))?;
            out.extend(parsed);
        }
        Ok(out)
    })
}
