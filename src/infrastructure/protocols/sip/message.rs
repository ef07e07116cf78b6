//! SIP message types, serialization and response parsing

use super::uri::SipUri;
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

#[derive(Error, Debug)]
pub enum SipError {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid authentication challenge: {0}")]
    InvalidChallenge(String),

    #[error("Unsolveable authentication challenge")]
    UnsolveableChallenge,

    #[error("Round trip failed: {0}")]
    RoundTrip(String),

    #[error("Unexpected final status: {0}")]
    UnexpectedStatus(u16),

    #[error("Unexpected status from BYE: {0}")]
    UnexpectedByeStatus(u16),
}

/// SIP methods used by an outgoing call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SipMethod {
    Invite,
    Ack,
    Bye,
}

impl SipMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SipMethod::Invite => "INVITE",
            SipMethod::Ack => "ACK",
            SipMethod::Bye => "BYE",
        }
    }
}

impl fmt::Display for SipMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered header collection. Names keep their first-seen spelling and
/// compare case-insensitively; values keep insertion order per name.
#[derive(Debug, Clone, Default)]
pub struct Header {
    entries: Vec<(String, Vec<String>)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Replace all values for `name` with a single value.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(i) => self.entries[i].1 = vec![value.to_string()],
            None => self.entries.push((name.to_string(), vec![value.to_string()])),
        }
    }

    /// Append a value for `name`, keeping any existing ones.
    pub fn add(&mut self, name: &str, value: &str) {
        match self.position(name) {
            Some(i) => self.entries[i].1.push(value.to_string()),
            None => self.entries.push((name.to_string(), vec![value.to_string()])),
        }
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|i| self.entries[i].1.first())
            .map(|v| v.as_str())
    }

    pub fn parse_line(&mut self, line: &str) -> Result<(), SipError> {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| SipError::Parse(format!("invalid header line: {}", line)))?;

        self.add(name.trim(), value.trim());
        Ok(())
    }

    pub fn write(&self, out: &mut String) {
        for (name, values) in &self.entries {
            for value in values {
                out.push_str(name);
                out.push_str(": ");
                out.push_str(value);
                out.push_str("\r\n");
            }
        }
    }
}

/// Outgoing SIP request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: SipMethod,
    pub uri: SipUri,
    pub header: Header,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: SipMethod, uri: SipUri) -> Self {
        let mut header = Header::new();
        header.set("Content-Length", "0");

        Self {
            method,
            uri,
            header,
            body: Vec::new(),
        }
    }

    /// Set the body together with its `Content-Type` and `Content-Length`.
    pub fn set_body(&mut self, content_type: &str, body: Vec<u8>) {
        self.header.set("Content-Type", content_type);
        self.header.set("Content-Length", &body.len().to_string());
        self.body = body;
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = String::new();
        out.push_str(&format!("{} {} SIP/2.0\r\n", self.method, self.uri));
        self.header.write(&mut out);
        out.push_str("\r\n");

        let mut data = out.into_bytes();
        data.extend_from_slice(&self.body);
        Bytes::from(data)
    }
}

/// Incoming SIP response
#[derive(Debug, Clone)]
pub struct Response {
    pub protocol: String,
    pub status_code: u16,
    pub reason: String,
    pub header: Header,
    pub body: Vec<u8>,
    pub local_addr: Option<SocketAddr>,
    pub peer_addr: Option<SocketAddr>,
}

impl Response {
    /// Final responses end the wait loop; 1xx responses are provisional.
    pub fn is_final(&self) -> bool {
        self.status_code >= 200
    }

    /// Read one response from a buffered stream: status line, header lines
    /// up to the first blank line, then `Content-Length` bytes of body.
    pub async fn parse<R>(reader: &mut R) -> Result<Self, SipError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .map_err(|e| SipError::Parse(format!("error reading status line: {}", e)))?;

        let (protocol, status_code, reason) = parse_status_line(line.trim_end())?;

        let mut header = Header::new();
        loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .await
                .map_err(|e| SipError::Parse(format!("error reading header line: {}", e)))?;
            if n == 0 {
                break;
            }

            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                break;
            }

            header.parse_line(trimmed)?;
        }

        let content_length = match header.get("Content-Length") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|e| SipError::Parse(format!("invalid content length: {}", e)))?,
            None => 0,
        };

        let mut body = vec![0u8; content_length];
        if content_length > 0 {
            reader
                .read_exact(&mut body)
                .await
                .map_err(|e| SipError::Parse(format!("error reading body: {}", e)))?;
        }

        Ok(Self {
            protocol,
            status_code,
            reason,
            header,
            body,
            local_addr: None,
            peer_addr: None,
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {}\r\n",
            self.protocol, self.status_code, self.reason
        ));
        self.header.write(&mut out);
        out.push_str("\r\n");

        let mut data = out.into_bytes();
        data.extend_from_slice(&self.body);
        Bytes::from(data)
    }
}

fn parse_status_line(line: &str) -> Result<(String, u16, String), SipError> {
    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(protocol), Some(code), Some(reason)) => {
            let status_code = code
                .parse::<u16>()
                .map_err(|e| SipError::Parse(format!("invalid status code: {}", e)))?;
            Ok((protocol.to_string(), status_code, reason.trim().to_string()))
        }
        _ => Err(SipError::Parse(format!("invalid response line: {}", line))),
    }
}
