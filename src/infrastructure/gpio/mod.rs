//! Digital I/O abstraction for the door panel
//!
//! The gatekeeper only ever sees these traits; whether a pin is backed by
//! real hardware, a remote I/O expander or a test double is decided at
//! wiring time.

pub mod led;

pub use led::Led;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Errors raised by digital pins and the schedulers built on them
#[derive(Error, Debug)]
pub enum GpioError {
    #[error("Already blinking")]
    AlreadyBlinking,

    #[error("I/O error: {0}")]
    Io(String),
}

/// A single writable pin (LED, relay coil)
#[cfg_attr(test, automock)]
pub trait DigitalOutput: Send + Sync {
    fn on(&self) -> Result<(), GpioError>;

    fn off(&self) -> Result<(), GpioError>;

    /// Current driven state, `true` meaning on.
    fn state(&self) -> Result<bool, GpioError>;

    fn close(&self) -> Result<(), GpioError>;
}

/// A single readable pin (bell push contact)
///
/// Callbacks fire with the new level on every edge.
pub trait DigitalInput: Send + Sync {
    fn add_callback(&self, callback: Box<dyn Fn(bool) + Send + Sync>) -> Result<(), GpioError>;

    fn close(&self) -> Result<(), GpioError>;
}

/// Flip the output to the opposite of its current state.
pub fn toggle(output: &dyn DigitalOutput) -> Result<(), GpioError> {
    if output.state()? {
        output.off()
    } else {
        output.on()
    }
}

/// Turn the output on and schedule it off after `duration`.
///
/// Returns as soon as the pin is on; the switch-off happens in a spawned
/// task, and its error is only logged.
pub fn on_for(output: Arc<dyn DigitalOutput>, duration: Duration) -> Result<(), GpioError> {
    let scheduled = Arc::clone(&output);
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        if let Err(e) = scheduled.off() {
            tracing::error!(error = %e, "failed to switch output off");
        }
    });

    output.on()
}

/// Output that drives nothing but remembers its state.
///
/// Used for panels wired without a status LED or relay.
#[derive(Default)]
pub struct NoopOutput {
    state: AtomicBool,
}

impl NoopOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DigitalOutput for NoopOutput {
    fn on(&self) -> Result<(), GpioError> {
        self.state.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn off(&self) -> Result<(), GpioError> {
        self.state.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn state(&self) -> Result<bool, GpioError> {
        Ok(self.state.load(Ordering::SeqCst))
    }

    fn close(&self) -> Result<(), GpioError> {
        Ok(())
    }
}

/// Input that never fires.
pub struct NoopInput;

impl DigitalInput for NoopInput {
    fn add_callback(&self, _callback: Box<dyn Fn(bool) + Send + Sync>) -> Result<(), GpioError> {
        Ok(())
    }

    fn close(&self) -> Result<(), GpioError> {
        Ok(())
    }
}
