//! TCP transport for outgoing calls

use super::message::{Request, Response, SipError};
use async_trait::async_trait;
use rand::Rng;
use std::net::SocketAddr;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// One open connection to a remote endpoint. All requests of a call are
/// sent over the connection opened by [`Transport::send`].
#[async_trait]
pub trait Connection: Send {
    /// Send a request, stamping its `Via` header.
    async fn send(&mut self, request: &mut Request) -> Result<(), SipError>;

    /// Receive the next response.
    async fn recv(&mut self) -> Result<Response, SipError>;

    /// Local address the connection dials from.
    fn local_addr(&self) -> SocketAddr;

    async fn close(&mut self) -> Result<(), SipError>;
}

/// Opens a connection to the request's target and sends the request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &mut Request) -> Result<Box<dyn Connection>, SipError>;
}

/// Receive responses until a final one arrives, discarding provisional
/// (1xx) responses.
pub async fn recv_final(con: &mut dyn Connection) -> Result<Response, SipError> {
    loop {
        let response = con.recv().await?;
        if response.is_final() {
            return Ok(response);
        }

        debug!(status = response.status_code, "discarding provisional response");
    }
}

/// TCP transport implementation
pub struct TcpTransport {
    debug_round_trips: bool,
}

impl TcpTransport {
    /// With `debug_round_trips` the serialized requests and responses are
    /// logged at debug level.
    pub fn new(debug_round_trips: bool) -> Self {
        Self { debug_round_trips }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, request: &mut Request) -> Result<Box<dyn Connection>, SipError> {
        let addr = format!("{}:{}", request.uri.host(), request.uri.port());

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| SipError::RoundTrip(format!("failed to connect to {}: {}", addr, e)))?;

        let local_addr = stream
            .local_addr()
            .map_err(|e| SipError::RoundTrip(format!("no local address: {}", e)))?;
        let peer_addr = stream
            .peer_addr()
            .map_err(|e| SipError::RoundTrip(format!("no peer address: {}", e)))?;

        debug!(%local_addr, %peer_addr, "connected");

        let mut connection = TcpConnection {
            stream: BufReader::new(stream),
            local_addr,
            peer_addr,
            debug_round_trips: self.debug_round_trips,
        };
        connection.send(request).await?;

        Ok(Box::new(connection))
    }
}

struct TcpConnection {
    stream: BufReader<TcpStream>,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    debug_round_trips: bool,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, request: &mut Request) -> Result<(), SipError> {
        request.header.set(
            "Via",
            &format!(
                "SIP/2.0/TCP {};branch=z9hG4bK{}",
                self.local_addr,
                branch_token()
            ),
        );

        let data = request.to_bytes();
        if self.debug_round_trips {
            debug!(request = %String::from_utf8_lossy(&data), "sending request");
        }

        self.stream
            .write_all(&data)
            .await
            .map_err(|e| SipError::RoundTrip(format!("failed to write request: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| SipError::RoundTrip(format!("failed to flush request: {}", e)))?;

        Ok(())
    }

    async fn recv(&mut self) -> Result<Response, SipError> {
        let mut response = Response::parse(&mut self.stream)
            .await
            .map_err(|e| SipError::RoundTrip(format!("failed to read response: {}", e)))?;

        response.local_addr = Some(self.local_addr);
        response.peer_addr = Some(self.peer_addr);

        if self.debug_round_trips {
            debug!(response = %String::from_utf8_lossy(&response.to_bytes()), "received response");
        }

        Ok(response)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn close(&mut self) -> Result<(), SipError> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| SipError::RoundTrip(format!("failed to close connection: {}", e)))
    }
}

fn branch_token() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..8).map(|_| rng.gen()).collect();
    hex::encode(random_bytes)
}
