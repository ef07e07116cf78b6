//! SIP Digest Authentication (client side)

use super::message::{Request, SipError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Challenge carried by a `WWW-Authenticate` header
#[derive(Debug, Clone, Default)]
pub struct AuthChallenge {
    pub scheme: String,
    pub properties: HashMap<String, String>,
}

/// Parse a `WWW-Authenticate` header value into scheme + properties.
/// A value without a property list still parses (empty properties).
pub fn parse_challenge(value: &str) -> Result<AuthChallenge, SipError> {
    let value = value.trim();

    let (scheme, props) = match value.split_once(' ') {
        Some((scheme, props)) => (scheme, props),
        None => {
            return Ok(AuthChallenge {
                scheme: value.to_string(),
                properties: HashMap::new(),
            })
        }
    };

    let mut properties = HashMap::new();
    for prop in props.split(',') {
        let (key, val) = prop.trim().split_once('=').ok_or_else(|| {
            SipError::InvalidChallenge(format!("property without value: {}", prop.trim()))
        })?;
        properties.insert(key.to_string(), val.trim_matches('"').to_string());
    }

    Ok(AuthChallenge {
        scheme: scheme.to_string(),
        properties,
    })
}

/// Answers an authentication challenge by mutating the request.
///
/// Returning [`SipError::UnsolveableChallenge`] means "not my scheme, try
/// the next handler"; any other error aborts the call.
pub trait AuthenticationHandler: Send + Sync {
    fn solve(&self, challenge: &AuthChallenge, request: &mut Request) -> Result<(), SipError>;
}

/// MD5 digest authentication (RFC 2617, no qop)
pub struct DigestHandler {
    username: String,
    password: String,
}

impl DigestHandler {
    pub fn new(username: &str, password: &str) -> Arc<dyn AuthenticationHandler> {
        Arc::new(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl AuthenticationHandler for DigestHandler {
    fn solve(&self, challenge: &AuthChallenge, request: &mut Request) -> Result<(), SipError> {
        if !challenge.scheme.eq_ignore_ascii_case("digest") {
            return Err(SipError::InvalidChallenge(format!(
                "unsupported scheme: {}",
                challenge.scheme
            )));
        }

        let empty = String::new();
        let realm = challenge.properties.get("realm").unwrap_or(&empty);
        let nonce = challenge.properties.get("nonce").unwrap_or(&empty);

        let ha1 = md5_hex(&format!("{}:{}:{}", self.username, realm, self.password));
        let ha2 = md5_hex(&format!("{}:{}", request.method, request.uri));
        let response = md5_hex(&format!("{}:{}:{}", ha1, nonce, ha2));

        debug!(username = %self.username, "solved digest challenge");

        request.header.set(
            "Authorization",
            &format!(
                r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
                self.username, realm, nonce, request.uri, response
            ),
        );

        Ok(())
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::protocols::sip::message::SipMethod;
    use crate::infrastructure::protocols::sip::uri::SipUri;

    #[test]
    fn test_parse_challenge() {
        let c = parse_challenge(r#" Digest realm="fritz.box", nonce="06FD8995AFA7E3EC""#).unwrap();

        assert_eq!(c.scheme, "Digest");
        assert_eq!(c.properties.len(), 2);
        assert_eq!(c.properties.get("realm").unwrap(), "fritz.box");
        assert_eq!(c.properties.get("nonce").unwrap(), "06FD8995AFA7E3EC");
    }

    #[test]
    fn test_parse_challenge_without_properties() {
        let c = parse_challenge("Digest").unwrap();
        assert_eq!(c.scheme, "Digest");
        assert!(c.properties.is_empty());
    }

    #[test]
    fn test_parse_challenge_rejects_property_without_value() {
        assert!(parse_challenge("Digest realm").is_err());
    }

    #[test]
    fn test_digest_handler_sets_authorization() {
        let uri = SipUri::parse("sip:test@localhost").unwrap();
        let mut request = Request::new(SipMethod::Invite, uri);

        let challenge = AuthChallenge {
            scheme: "Digest".to_string(),
            properties: HashMap::from([("nonce".to_string(), "123456789".to_string())]),
        };

        let handler = DigestHandler::new("user", "password");
        handler.solve(&challenge, &mut request).unwrap();

        assert_eq!(
            request.header.get("Authorization").unwrap(),
            r#"Digest username="user", realm="", nonce="123456789", uri="sip:test@localhost:5060", response="6f2dfa09fb298150e9195a987182a7e0""#
        );
    }

    #[test]
    fn test_digest_handler_rejects_other_schemes() {
        let uri = SipUri::parse("sip:test@localhost").unwrap();
        let mut request = Request::new(SipMethod::Invite, uri);

        let handler = DigestHandler::new("user", "password");
        let result = handler.solve(&AuthChallenge::default(), &mut request);

        assert!(matches!(result, Err(SipError::InvalidChallenge(_))));
        assert!(!request.header.contains("Authorization"));
    }
}
