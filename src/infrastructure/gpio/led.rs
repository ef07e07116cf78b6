//! Blink scheduling on top of a digital output

use super::{DigitalOutput, GpioError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};

/// An output with an attached blink scheduler.
///
/// At most one blink session runs at a time; starting a second one fails
/// with [`GpioError::AlreadyBlinking`]. Steady [`Led::on`]/[`Led::off`]
/// calls are passed straight through to the pin.
#[derive(Clone)]
pub struct Led {
    output: Arc<dyn DigitalOutput>,
    blinking: Arc<Mutex<()>>,
}

impl Led {
    pub fn new(output: Arc<dyn DigitalOutput>) -> Self {
        Self {
            output,
            blinking: Arc::new(Mutex::new(())),
        }
    }

    pub fn on(&self) -> Result<(), GpioError> {
        self.output.on()
    }

    pub fn off(&self) -> Result<(), GpioError> {
        self.output.off()
    }

    pub fn state(&self) -> Result<bool, GpioError> {
        self.output.state()
    }

    pub fn close(&self) -> Result<(), GpioError> {
        self.output.close()
    }

    /// Start blinking with the given interval between toggles.
    ///
    /// Returns a sender; dropping it or sending a unit stops the session
    /// and restores the state the pin had before the session started.
    pub fn blink(&self, interval: Duration) -> Result<mpsc::Sender<()>, GpioError> {
        let guard = Arc::clone(&self.blinking)
            .try_lock_owned()
            .map_err(|_| GpioError::AlreadyBlinking)?;

        let initial_state = self.output.state()?;
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let output = Arc::clone(&self.output);

        tokio::spawn(async move {
            let _guard = guard;
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = super::toggle(output.as_ref()) {
                            error!(error = %e, "failed to toggle led");
                            break;
                        }
                    }
                    _ = stop_rx.recv() => {
                        break;
                    }
                }
            }

            let restore = if initial_state {
                output.on()
            } else {
                output.off()
            };
            if let Err(e) = restore {
                error!(error = %e, "failed to restore led state");
            }

            debug!("blink session ended");
        });

        Ok(stop_tx)
    }

    /// Blink for a fixed duration, then stop on its own.
    pub fn blink_for(&self, duration: Duration, interval: Duration) -> Result<(), GpioError> {
        let stop = self.blink(interval)?;

        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = stop.send(()).await;
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::gpio::NoopOutput;

    #[tokio::test]
    async fn test_second_blink_session_is_rejected_until_expiry() {
        let led = Led::new(Arc::new(NoopOutput::new()));

        led.blink_for(Duration::from_millis(40), Duration::from_millis(10))
            .unwrap();
        assert!(matches!(
            led.blink(Duration::from_millis(10)),
            Err(GpioError::AlreadyBlinking)
        ));

        tokio::time::sleep(Duration::from_millis(120)).await;

        led.blink(Duration::from_millis(10)).unwrap();
    }

    #[tokio::test]
    async fn test_stop_signal_ends_session_early() {
        let led = Led::new(Arc::new(NoopOutput::new()));

        let stop = led.blink(Duration::from_millis(10)).unwrap();
        stop.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        led.blink(Duration::from_millis(10)).unwrap();
    }

    #[tokio::test]
    async fn test_blink_for_restores_prior_state() {
        let output = Arc::new(NoopOutput::new());
        let led = Led::new(Arc::clone(&output) as Arc<dyn DigitalOutput>);
        led.on().unwrap();

        led.blink_for(Duration::from_millis(40), Duration::from_millis(5))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(output.state().unwrap());
    }

    #[tokio::test]
    async fn test_steady_calls_drive_the_pin() {
        let output = Arc::new(NoopOutput::new());
        let led = Led::new(Arc::clone(&output) as Arc<dyn DigitalOutput>);

        led.on().unwrap();
        assert!(led.state().unwrap());

        led.off().unwrap();
        assert!(!output.state().unwrap());
    }
}
