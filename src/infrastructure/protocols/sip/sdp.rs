//! Minimal session description carried by the ACK

use chrono::Utc;
use std::fmt;
use std::net::IpAddr;

/// Five-line SDP body announcing the local endpoint of the call.
#[derive(Debug, Clone)]
pub struct SessionDescription {
    origin_user: String,
    session_id: i64,
    version: i64,
    address: IpAddr,
}

impl SessionDescription {
    /// Session id and version are the current millisecond timestamp.
    pub fn new(origin_user: &str, address: IpAddr) -> Self {
        let session_id = Utc::now().timestamp_millis();

        Self {
            origin_user: origin_user.to_string(),
            session_id,
            version: session_id,
            address,
        }
    }

    fn address_type(&self) -> &'static str {
        match self.address {
            IpAddr::V4(_) => "IP4",
            IpAddr::V6(_) => "IP6",
        }
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v=0\r\no={} {} {} IN {} {}\r\ns=\r\nc=IN {} {}\r\nt=0 0\r\n",
            self.origin_user,
            self.session_id,
            self.version,
            self.address_type(),
            self.address,
            self.address_type(),
            self.address
        )
    }
}
