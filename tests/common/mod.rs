//! Scripted in-memory mailbox standing in for an IMAP server.
//!
//! Every command a session issues is recorded. Any FETCH that would set
//! `\Seen` is refused, so a read path that forgets PEEK fails loudly.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use inbox_api::error::{MailError, Result};
use inbox_api::mail::session::{Connector, MailSession, RawMessage};

#[derive(Default)]
pub struct Mailbox {
    /// Message at index `i` has sequence number `i + 1`.
    pub messages: Vec<(u32, Vec<u8>)>,
    /// UID SEARCH answers keyed by query text.
    pub searches: HashMap<String, Vec<u32>>,
    pub refuse_login: bool,
    pub fail_fetch: bool,
}

pub struct MockConnector {
    mailbox: Arc<Mailbox>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox: Arc::new(mailbox),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(verb))
            .count()
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    fn open(&self) -> Result<MockSession> {
        self.log.lock().unwrap().push("LOGIN".to_string());
        if self.mailbox.refuse_login {
            return Err(MailError::Authentication("[AUTHENTICATIONFAILED]".into()));
        }
        Ok(MockSession {
            mailbox: Arc::clone(&self.mailbox),
            log: Arc::clone(&self.log),
        })
    }
}

pub struct MockSession {
    mailbox: Arc<Mailbox>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockSession {
    fn record(&self, cmd: String) {
        self.log.lock().unwrap().push(cmd);
    }

    fn check_read_only(&self, items: &str) -> Result<()> {
        if items.contains("BODY[") || items.contains("RFC822") {
            self.record(format!("VIOLATION {items}"));
            return Err(MailError::Retrieval(format!("{items} would set \\Seen")));
        }
        Ok(())
    }

    fn message(&self, seq: u32) -> RawMessage {
        let (uid, body) = &self.mailbox.messages[seq as usize - 1];
        RawMessage {
            seq,
            uid: *uid,
            body: body.clone(),
        }
    }
}

impl MailSession for MockSession {
    fn examine(&mut self, folder: &str) -> Result<u32> {
        self.record(format!("EXAMINE {folder}"));
        Ok(self.mailbox.messages.len() as u32)
    }

    fn uid_search(&mut self, query: &str) -> Result<Vec<u32>> {
        self.record(format!("SEARCH {query}"));
        Ok(self.mailbox.searches.get(query).cloned().unwrap_or_default())
    }

    fn fetch(&mut self, sequence_set: &str, items: &str) -> Result<Vec<RawMessage>> {
        self.record(format!("FETCH {sequence_set} {items}"));
        self.check_read_only(items)?;
        if self.mailbox.fail_fetch {
            return Err(MailError::Retrieval("connection reset".into()));
        }
        let total = self.mailbox.messages.len() as u32;
        let (from, to) = sequence_set
            .split_once(':')
            .expect("mock only understands ranges");
        let from: u32 = from.parse().unwrap();
        let to: u32 = if to == "*" { total } else { to.parse().unwrap() };
        // Servers may answer in any order; hand them back reversed.
        Ok((from..=to).rev().map(|seq| self.message(seq)).collect())
    }

    fn uid_fetch(&mut self, uid_set: &str, items: &str) -> Result<Vec<RawMessage>> {
        self.record(format!("UIDFETCH {uid_set} {items}"));
        self.check_read_only(items)?;
        if self.mailbox.fail_fetch {
            return Err(MailError::Retrieval("connection reset".into()));
        }
        let wanted: Vec<u32> = uid_set.split(',').map(|u| u.parse().unwrap()).collect();
        Ok((1..=self.mailbox.messages.len() as u32)
            .map(|seq| self.message(seq))
            .filter(|m| wanted.contains(&m.uid))
            .collect())
    }

    fn logout(&mut self) -> Result<()> {
        self.record("LOGOUT".to_string());
        Ok(())
    }
}

pub fn simple_message(n: u32) -> Vec<u8> {
    format!(
        "From: sender{n}@example.com\r\n\
Subject: message {n}\r\n\
Date: Tue, 05 Mar 2024 10:{:02}:00 +0000\r\n\
\r\n\
body {n}\r\n",
        n % 60
    )
    .into_bytes()
}

/// Mailbox holding `count` plain messages; UIDs start at 100.
pub fn mailbox_with(count: u32) -> Mailbox {
    Mailbox {
        messages: (1..=count).map(|n| (99 + n, simple_message(n))).collect(),
        ..Mailbox::default()
    }
}

pub const REPORT_PDF: &[u8] = b"%PDF-1.4 fake report\n";

pub fn message_with_attachments() -> Vec<u8> {
    // The first report.pdf carries REPORT_PDF, base64 encoded.
    b"From: Reports <reports@example.com>\r\n\
Subject: Daily report\r\n\
Date: Wed, 10 Jan 2024 08:00:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
\r\n\
--sep\r\n\
Content-Type: text/plain\r\n\
\r\n\
See attached.\r\n\
--sep\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQgZmFrZSByZXBvcnQK\r\n\
--sep\r\n\
Content-Type: text/plain\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
\r\n\
second file with the same name\r\n\
--sep\r\n\
Content-Type: text/plain\r\n\
Content-Disposition: attachment; filename=\"Notes.txt\"\r\n\
\r\n\
notes\r\n\
--sep--\r\n"
        .to_vec()
}

/// Attachment declared as base64 whose body is not base64.
pub fn message_with_corrupt_attachment() -> Vec<u8> {
    b"From: broken@example.com\r\n\
Subject: broken\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
\r\n\
--sep\r\n\
Content-Type: text/plain\r\n\
\r\n\
see attached\r\n\
--sep\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"blob.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
!!!not base64!!!\r\n\
--sep--\r\n"
        .to_vec()
}
