//! Things that can ring when a bell push is pressed

use crate::domain::shared::DomainError;
use crate::infrastructure::gpio::{on_for, DigitalOutput};
use crate::infrastructure::protocols::sip::{AuthenticationHandler, Dialog, SipUri, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// A bell. Ringing must not block the caller; failures are logged, not
/// reported back to the press that triggered them.
#[async_trait]
pub trait Ringer: Send + Sync {
    async fn ring(&self);

    fn close(&self) -> Result<(), DomainError>;
}

/// Conventional bell behind a relay, pulsed for a fixed duration.
pub struct ExternalBell {
    output: Arc<dyn DigitalOutput>,
    duration: Duration,
}

impl ExternalBell {
    pub fn new(output: Arc<dyn DigitalOutput>, duration: Duration) -> Self {
        Self { output, duration }
    }
}

#[async_trait]
impl Ringer for ExternalBell {
    async fn ring(&self) {
        if let Err(e) = on_for(Arc::clone(&self.output), self.duration) {
            error!(error = %e, "failed to pulse bell relay");
        }
    }

    fn close(&self) -> Result<(), DomainError> {
        self.output.close()?;
        Ok(())
    }
}

/// Phone extension rung by placing a call and hanging up once answered
/// or after the ringing time expires.
pub struct PhoneBell {
    transport: Arc<dyn Transport>,
    caller: SipUri,
    callee: SipUri,
    handlers: Vec<Arc<dyn AuthenticationHandler>>,
    max_ringing_time: Duration,
}

impl PhoneBell {
    pub fn new(
        transport: Arc<dyn Transport>,
        caller: SipUri,
        callee: SipUri,
        handlers: Vec<Arc<dyn AuthenticationHandler>>,
        max_ringing_time: Duration,
    ) -> Self {
        Self {
            transport,
            caller,
            callee,
            handlers,
            max_ringing_time,
        }
    }
}

#[async_trait]
impl Ringer for PhoneBell {
    async fn ring(&self) {
        let mut dialog = Dialog::new(
            Arc::clone(&self.transport),
            self.caller.clone(),
            self.handlers.clone(),
        );
        let callee = self.callee.clone();
        let max_ringing_time = self.max_ringing_time;

        tokio::spawn(async move {
            match dialog.ring(&callee, max_ringing_time).await {
                Ok(outcome) => info!(%callee, ?outcome, "call finished"),
                Err(e) => error!(%callee, error = %e, "call failed"),
            }
        });
    }

    fn close(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
