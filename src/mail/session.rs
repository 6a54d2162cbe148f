//! Opening, using and releasing one IMAP session.
//!
//! A session belongs to exactly one retrieval operation. [`with_session`]
//! opens it, examines the folder read-only, runs the operation and always
//! logs out afterwards, whatever the operation returned.

use log::{debug, info, warn};
use native_tls::{TlsConnector, TlsStream};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{MailError, Result};

/// Connection settings, frozen at startup and passed in explicitly.
#[derive(Clone)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub accept_invalid_certs: bool,
    /// Applied to connect, read and write on the socket.
    pub timeout: Duration,
}

impl std::fmt::Debug for ImapSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// One raw message as returned by FETCH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Sequence number at fetch time.
    pub seq: u32,
    pub uid: u32,
    pub body: Vec<u8>,
}

/// The read-only command surface the retrieval paths need.
///
/// No STORE, COPY, EXPUNGE or APPEND: the folder is never mutated.
pub trait MailSession {
    /// EXAMINE the folder and return its message count.
    fn examine(&mut self, folder: &str) -> Result<u32>;
    /// UID SEARCH, returning the matching UIDs in any order.
    fn uid_search(&mut self, query: &str) -> Result<Vec<u32>>;
    /// FETCH by sequence set.
    fn fetch(&mut self, sequence_set: &str, items: &str) -> Result<Vec<RawMessage>>;
    /// FETCH by UID set.
    fn uid_fetch(&mut self, uid_set: &str, items: &str) -> Result<Vec<RawMessage>>;
    fn logout(&mut self) -> Result<()>;
}

/// Produces a fresh authenticated session per call.
pub trait Connector: Send + Sync {
    type Session: MailSession;

    fn open(&self) -> Result<Self::Session>;
}

/// Run `op` against a freshly opened session on `folder`.
///
/// `op` receives the session and the folder's message count at EXAMINE
/// time. LOGOUT is issued on every path; a failed LOGOUT is logged and
/// never replaces the operation's own result.
pub fn with_session<C, T, F>(connector: &C, folder: &str, op: F) -> Result<T>
where
    C: Connector,
    F: FnOnce(&mut C::Session, u32) -> Result<T>,
{
    let mut session = connector.open()?;
    let result = session
        .examine(folder)
        .and_then(|exists| {
            debug!("{folder} holds {exists} messages");
            op(&mut session, exists)
        });
    if let Err(e) = session.logout() {
        warn!("logout failed: {e}");
    }
    result
}

/// Connects to a real server over TLS with LOGIN authentication.
pub struct ImapConnector {
    settings: ImapSettings,
}

impl ImapConnector {
    pub fn new(settings: ImapSettings) -> Self {
        Self { settings }
    }

    fn connect_tcp(&self) -> Result<TcpStream> {
        let s = &self.settings;
        let addrs = (s.host.as_str(), s.port).to_socket_addrs()?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, s.timeout) {
                Ok(tcp) => {
                    tcp.set_read_timeout(Some(s.timeout))?;
                    tcp.set_write_timeout(Some(s.timeout))?;
                    return Ok(tcp);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => MailError::from(e),
            None => MailError::Connection(format!("{} did not resolve", s.host)),
        })
    }
}

impl Connector for ImapConnector {
    type Session = ImapSession;

    fn open(&self) -> Result<ImapSession> {
        let s = &self.settings;
        info!("Connecting to {}:{}", s.host, s.port);

        let tcp = self.connect_tcp()?;
        let tls = TlsConnector::builder()
            .danger_accept_invalid_certs(s.accept_invalid_certs)
            .build()
            .map_err(|e| MailError::Connection(e.to_string()))?;
        let stream = tls
            .connect(&s.host, tcp)
            .map_err(|e| MailError::Connection(format!("TLS handshake failed: {e}")))?;

        let mut client = imap::Client::new(stream);
        client.read_greeting().map_err(MailError::from_transport)?;

        let session = client
            .login(&s.username, &s.password)
            .map_err(|(e, _client)| MailError::from_login(e))?;
        debug!("Authenticated as {}", s.username);
        Ok(ImapSession { inner: session })
    }
}

pub struct ImapSession {
    inner: imap::Session<TlsStream<TcpStream>>,
}

/// Turn one FETCH response into a message. Responses without a body are
/// unsolicited flag updates from other clients and are skipped.
fn raw_message(seq: u32, uid: Option<u32>, body: Option<&[u8]>) -> Result<Option<RawMessage>> {
    let Some(body) = body else {
        debug!("Ignoring FETCH for message {seq} without a body section");
        return Ok(None);
    };
    let uid = uid.ok_or_else(|| {
        MailError::Retrieval(format!("message {seq} came back without a UID"))
    })?;
    Ok(Some(RawMessage {
        seq,
        uid,
        body: body.to_vec(),
    }))
}

fn collect_fetches(fetches: &[imap::types::Fetch]) -> Result<Vec<RawMessage>> {
    let mut out = Vec::with_capacity(fetches.len());
    for f in fetches {
        if let Some(msg) = raw_message(f.message, f.uid, f.body())? {
            out.push(msg);
        }
    }
    Ok(out)
}

impl MailSession for ImapSession {
    fn examine(&mut self, folder: &str) -> Result<u32> {
        let mailbox = self
            .inner
            .examine(folder)
            .map_err(|e| MailError::Connection(format!("cannot open {folder}: {e}")))?;
        Ok(mailbox.exists)
    }

    fn uid_search(&mut self, query: &str) -> Result<Vec<u32>> {
        let uids = self.inner.uid_search(query).map_err(|e| match e {
            imap::error::Error::No(m) | imap::error::Error::Bad(m) => MailError::Search(m),
            other => MailError::from_transport(other),
        })?;
        Ok(uids.into_iter().collect())
    }

    fn fetch(&mut self, sequence_set: &str, items: &str) -> Result<Vec<RawMessage>> {
        let fetches = self
            .inner
            .fetch(sequence_set, items)
            .map_err(|e| MailError::Retrieval(e.to_string()))?;
        collect_fetches(&fetches)
    }

    fn uid_fetch(&mut self, uid_set: &str, items: &str) -> Result<Vec<RawMessage>> {
        let fetches = self
            .inner
            .uid_fetch(uid_set, items)
            .map_err(|e| MailError::Retrieval(e.to_string()))?;
        collect_fetches(&fetches)
    }

    fn logout(&mut self) -> Result<()> {
        self.inner.logout().map_err(MailError::from_transport)
    }
}
