//! Outgoing call state machine

use super::auth::{parse_challenge, AuthChallenge, AuthenticationHandler};
use super::message::{Request, SipError, SipMethod};
use super::sdp::SessionDescription;
use super::transport::{recv_final, Transport};
use super::uri::SipUri;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const STATUS_OK: u16 = 200;
const STATUS_UNAUTHORIZED: u16 = 401;
const STATUS_DECLINE: u16 = 603;

/// How the remote party answered the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Accepted,
    Declined,
}

/// A single outgoing call: INVITE, one authentication retry, then either
/// a decline or an accepted call that is acknowledged and hung up.
pub struct Dialog {
    transport: Arc<dyn Transport>,
    caller: SipUri,
    handlers: Vec<Arc<dyn AuthenticationHandler>>,
    cseq: u32,
    call_id: String,
}

impl Dialog {
    pub fn new(
        transport: Arc<dyn Transport>,
        caller: SipUri,
        handlers: Vec<Arc<dyn AuthenticationHandler>>,
    ) -> Self {
        Self {
            transport,
            caller,
            handlers,
            cseq: 1,
            call_id: new_call_id(),
        }
    }

    /// Place a call to `callee` and let it ring for up to
    /// `max_ringing_time` (advertised via `Expires`).
    ///
    /// No timeout is applied to the exchange itself: a remote that never
    /// answers stalls the calling task.
    pub async fn ring(
        &mut self,
        callee: &SipUri,
        max_ringing_time: Duration,
    ) -> Result<CallOutcome, SipError> {
        self.cseq = 1;
        self.call_id = new_call_id();

        debug!(call_id = %self.call_id, callee = %callee, "placing call");

        let mut invite = self.request(SipMethod::Invite, callee);
        invite
            .header
            .add("Expires", &max_ringing_time.as_secs().to_string());

        let mut con = self.transport.send(&mut invite).await?;
        let mut response = recv_final(con.as_mut()).await?;

        let mut challenge: Option<AuthChallenge> = None;
        if response.status_code == STATUS_UNAUTHORIZED {
            let c = parse_challenge(response.header.get("WWW-Authenticate").unwrap_or_default())?;
            self.authenticate(&mut invite, &c)?;
            challenge = Some(c);

            con.send(&mut invite).await?;
            response = recv_final(con.as_mut()).await?;
        }

        if response.status_code == STATUS_DECLINE {
            debug!(call_id = %self.call_id, "call declined");
            con.close().await?;
            return Ok(CallOutcome::Declined);
        }

        if response.status_code != STATUS_OK {
            return Err(SipError::UnexpectedStatus(response.status_code));
        }

        let to = response.header.get("To").unwrap_or_default().to_string();

        let mut ack = self.request(SipMethod::Ack, callee);
        ack.header.set("To", &to);

        let sdp = SessionDescription::new(self.caller.user(), con.local_addr().ip());
        ack.set_body("application/sdp", sdp.to_string().into_bytes());

        if let Some(challenge) = &challenge {
            self.authenticate(&mut ack, challenge)?;
        }

        con.send(&mut ack).await?;

        self.cseq += 1;
        let mut bye = self.request(SipMethod::Bye, callee);
        bye.header.set("To", &to);
        con.send(&mut bye).await?;

        let bye_response = recv_final(con.as_mut()).await?;
        con.close().await?;

        if bye_response.status_code != STATUS_OK {
            return Err(SipError::UnexpectedByeStatus(bye_response.status_code));
        }

        Ok(CallOutcome::Accepted)
    }

    fn request(&self, method: SipMethod, callee: &SipUri) -> Request {
        let mut req = Request::new(method, callee.clone());
        req.header.set("From", &self.caller.to_string());
        req.header.set("To", &callee.to_string());
        req.header.set("Contact", &self.caller.to_string());
        req.header.set("Max-Forwards", "70");
        req.header.set("CSeq", &format!("{} {}", self.cseq, method));
        req.header.set("Call-ID", &self.call_id);
        req
    }

    /// Run the handler chain over `challenge`. The first handler that
    /// solves it wins; the sequence number is bumped and the request's
    /// `CSeq` rewritten for the retry.
    fn authenticate(
        &mut self,
        request: &mut Request,
        challenge: &AuthChallenge,
    ) -> Result<(), SipError> {
        for handler in &self.handlers {
            match handler.solve(challenge, request) {
                Ok(()) => {
                    self.cseq += 1;
                    request
                        .header
                        .set("CSeq", &format!("{} {}", self.cseq, request.method));
                    return Ok(());
                }
                Err(SipError::UnsolveableChallenge) => continue,
                Err(err) => return Err(err),
            }
        }

        Err(SipError::UnsolveableChallenge)
    }
}

fn new_call_id() -> String {
    format!("c{}-{}", Utc::now().timestamp(), Uuid::new_v4().simple())
}
