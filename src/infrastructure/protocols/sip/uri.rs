//! SIP endpoint addresses

use super::message::SipError;
use std::fmt;

const DEFAULT_PORT: u16 = 5060;

/// Address of a SIP endpoint (`sip:user@host:port`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SipUri {
    scheme: String,
    user: String,
    host: String,
    port: u16,
}

impl SipUri {
    pub fn new(user: &str, host: &str, port: u16) -> Self {
        Self {
            scheme: "sip".to_string(),
            user: user.to_string(),
            host: host.to_string(),
            port,
        }
    }

    /// Parse an address of the form `sip:user@host` or `sip:user@host:port`.
    /// The port defaults to 5060 when omitted.
    pub fn parse(uri: &str) -> Result<Self, SipError> {
        let uri = uri.trim();

        let (scheme, rest) = uri
            .split_once(':')
            .ok_or_else(|| SipError::InvalidUri("missing scheme".to_string()))?;
        if scheme != "sip" {
            return Err(SipError::InvalidUri(format!("unknown scheme: {}", scheme)));
        }

        let mut parts = rest.split('@');
        let (user, host_port) = match (parts.next(), parts.next(), parts.next()) {
            (Some(user), Some(host_port), None) => (user, host_port),
            _ => return Err(SipError::InvalidUri("missing host".to_string())),
        };

        let (host, port) = match host_port.split_once(':') {
            None => (host_port, DEFAULT_PORT),
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| SipError::InvalidUri(format!("invalid port: {}", e)))?;
                (host, port)
            }
        };

        Ok(Self {
            scheme: scheme.to_string(),
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}:{}", self.scheme, self.user, self.host, self.port)
    }
}
