//! HTTP surface over [`MailService`]: list, attachment download, health.
//!
//! Every route answers both at `/…` and under `/api/…`.

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, SecondsFormat, Utc};
use log::{error, info};
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server};
use url::Url;

use crate::domain::email::{EmailId, ResolvedAttachment};
use crate::error::MailError;
use crate::mail::criteria::Selection;
use crate::mail::session::Connector;
use crate::service::MailService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    ListEmails(Selection),
    Attachment { uid: EmailId, filename: String },
    Health,
    Reject { status: u16, message: String },
}

fn reject(status: u16, message: impl Into<String>) -> Route {
    Route::Reject {
        status,
        message: message.into(),
    }
}

fn parse_day(name: &str, value: &str) -> std::result::Result<NaiveDate, Route> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| reject(400, format!("{name} must be YYYY-MM-DD, got {value:?}")))
}

fn selection_from_query(url: &Url) -> std::result::Result<Selection, Route> {
    let mut date = None;
    let mut start = None;
    let mut end = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "date" => date = Some(v.into_owned()),
            "startDate" => start = Some(v.into_owned()),
            "endDate" => end = Some(v.into_owned()),
            _ => {}
        }
    }

    match (date, start, end) {
        (Some(d), _, _) => Ok(Selection::SingleDate(parse_day("date", &d)?)),
        (None, Some(s), Some(e)) => {
            let start = parse_day("startDate", &s)?;
            let end = parse_day("endDate", &e)?;
            Selection::range(start, end).map_err(|err| reject(400, err.to_string()))
        }
        (None, Some(_), None) | (None, None, Some(_)) => {
            Err(reject(400, "startDate and endDate must be given together"))
        }
        (None, None, None) => Ok(Selection::Recent),
    }
}

/// Map a method and request target (`/path?query`) to a route.
pub fn route(method: &Method, target: &str) -> Route {
    let Ok(url) = Url::parse(&format!("http://localhost{target}")) else {
        return reject(400, "malformed request target");
    };
    let mut segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    if segments.first() == Some(&"api") {
        segments.remove(0);
    }

    let known = matches!(
        segments.as_slice(),
        ["health"] | ["emails"] | ["emails", _, "attachments", _]
    );
    if !known {
        return reject(404, "no such route");
    }
    if *method != Method::Get {
        return reject(405, "only GET is supported");
    }

    match segments.as_slice() {
        ["health"] => Route::Health,
        ["emails"] => match selection_from_query(&url) {
            Ok(sel) => Route::ListEmails(sel),
            Err(rejected) => rejected,
        },
        ["emails", uid, "attachments", name] => {
            let Ok(uid) = uid.parse::<EmailId>() else {
                return reject(400, format!("invalid uid {uid:?}"));
            };
            match percent_decode_str(name).decode_utf8() {
                Ok(filename) => Route::Attachment {
                    uid,
                    filename: filename.into_owned(),
                },
                Err(_) => reject(400, "filename is not valid UTF-8"),
            }
        }
        _ => reject(404, "no such route"),
    }
}

pub type Reply = Response<Cursor<Vec<u8>>>;

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn json_reply<T: Serialize>(status: u16, body: &T) -> Reply {
    let data = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut resp = Response::from_data(data).with_status_code(status);
    if let Some(h) = header("Content-Type", "application/json") {
        resp.add_header(h);
    }
    resp
}

fn error_reply(status: u16, message: &str) -> Reply {
    json_reply(status, &serde_json::json!({ "error": message }))
}

/// `Content-Disposition` for a download. Names that are not plain ASCII
/// are sent in the RFC 5987 `filename*` form.
pub fn content_disposition(filename: &str) -> String {
    let plain = filename
        .chars()
        .all(|c| (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ');
    if plain {
        format!("attachment; filename=\"{filename}\"")
    } else {
        format!(
            "attachment; filename*=UTF-8''{}",
            utf8_percent_encode(filename, NON_ALPHANUMERIC)
        )
    }
}

fn attachment_reply(att: ResolvedAttachment) -> Reply {
    let mut resp = Response::from_data(att.data);
    for h in [
        header("Content-Type", &att.content_type),
        header("Content-Disposition", &content_disposition(&att.filename)),
    ]
    .into_iter()
    .flatten()
    {
        resp.add_header(h);
    }
    resp
}

fn failure(err: &MailError) -> Reply {
    error!("request failed: {err}");
    error_reply(err.http_status(), &err.to_string())
}

pub fn handle<C: Connector>(service: &MailService<C>, route: Route) -> Reply {
    match route {
        Route::Health => json_reply(
            200,
            &serde_json::json!({
                "status": "ok",
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
        ),
        Route::ListEmails(selection) => match service.list_emails(selection) {
            Ok(emails) => json_reply(200, &emails),
            Err(e) => failure(&e),
        },
        Route::Attachment { uid, filename } => match service.attachment(uid, &filename) {
            Ok(att) => attachment_reply(att),
            Err(e) => failure(&e),
        },
        Route::Reject { status, message } => error_reply(status, &message),
    }
}

fn answer<C: Connector>(service: &MailService<C>, request: Request) {
    let route = route(request.method(), request.url());
    let line = format!("{} {}", request.method(), request.url());
    let reply = handle(service, route);
    info!("{line} -> {}", reply.status_code().0);
    if let Err(e) = request.respond(reply) {
        error!("could not send response for {line}: {e}");
    }
}

/// Serve until `running` turns false. Each request gets its own thread
/// and, through the service, its own IMAP session.
pub fn serve<C>(service: Arc<MailService<C>>, addr: &str, running: Arc<AtomicBool>) -> Result<()>
where
    C: Connector + 'static,
{
    let server =
        Server::http(addr).map_err(|e| anyhow!("Failed to bind HTTP server on {addr}: {e}"))?;
    info!("Listening on {addr}");

    while running.load(Ordering::SeqCst) {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        let Some(request) = maybe_request else {
            continue;
        };
        let service = Arc::clone(&service);
        thread::spawn(move || answer(&service, request));
    }

    info!("HTTP server stopped");
    Ok(())
}
