//! HTTP handlers answered against the scripted mailbox.

mod common;

use std::io::Read;

use common::{Mailbox, MockConnector, REPORT_PDF, mailbox_with, message_with_attachments};
use inbox_api::http::{handle, route};
use inbox_api::service::MailService;
use tiny_http::Method;

fn body_of(resp: tiny_http::Response<std::io::Cursor<Vec<u8>>>) -> Vec<u8> {
    let mut out = Vec::new();
    resp.into_reader().read_to_end(&mut out).unwrap();
    out
}

fn header_value(
    resp: &tiny_http::Response<std::io::Cursor<Vec<u8>>>,
    name: &'static str,
) -> Option<String> {
    resp.headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

#[test]
fn list_endpoint_serializes_emails() {
    let svc = MailService::new(MockConnector::new(mailbox_with(3)), "INBOX", 20);
    let resp = handle(&svc, route(&Method::Get, "/api/emails"));
    assert_eq!(resp.status_code().0, 200);

    let json: serde_json::Value = serde_json::from_slice(&body_of(resp)).unwrap();
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0]["id"], 102);
    assert_eq!(list[0]["from"], "sender3@example.com");
    assert_eq!(list[0]["date"], "2024-03-05T10:03:00Z");
    assert!(list[0]["attachments"].as_array().unwrap().is_empty());
}

#[test]
fn attachment_endpoint_streams_bytes_with_disposition() {
    let mailbox = Mailbox {
        messages: vec![(8, message_with_attachments())],
        ..Mailbox::default()
    };
    let svc = MailService::new(MockConnector::new(mailbox), "INBOX", 20);
    let resp = handle(&svc, route(&Method::Get, "/emails/8/attachments/report.pdf"));

    assert_eq!(resp.status_code().0, 200);
    assert_eq!(
        header_value(&resp, "Content-Disposition").as_deref(),
        Some("attachment; filename=\"report.pdf\"")
    );
    assert_eq!(header_value(&resp, "Content-Type").as_deref(), Some("application/pdf"));
    assert_eq!(body_of(resp), REPORT_PDF);
}

#[test]
fn missing_attachment_is_404() {
    let mailbox = Mailbox {
        messages: vec![(8, message_with_attachments())],
        ..Mailbox::default()
    };
    let svc = MailService::new(MockConnector::new(mailbox), "INBOX", 20);
    let resp = handle(&svc, route(&Method::Get, "/emails/8/attachments/missing.pdf"));
    assert_eq!(resp.status_code().0, 404);

    let json: serde_json::Value = serde_json::from_slice(&body_of(resp)).unwrap();
    assert!(json["error"].as_str().unwrap().contains("missing.pdf"));
}

#[test]
fn transport_failure_is_500() {
    let mut mailbox = mailbox_with(5);
    mailbox.fail_fetch = true;
    let svc = MailService::new(MockConnector::new(mailbox), "INBOX", 20);
    let resp = handle(&svc, route(&Method::Get, "/emails"));
    assert_eq!(resp.status_code().0, 500);
}

#[test]
fn health_reports_timestamp() {
    let svc = MailService::new(MockConnector::new(mailbox_with(0)), "INBOX", 20);
    let resp = handle(&svc, route(&Method::Get, "/health"));
    assert_eq!(resp.status_code().0, 200);

    let json: serde_json::Value = serde_json::from_slice(&body_of(resp)).unwrap();
    assert_eq!(json["status"], "ok");
    let ts = json["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    assert!(svc.connector().commands().is_empty());
}
