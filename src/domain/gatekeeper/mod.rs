//! Doorbell orchestration
//!
//! The gatekeeper owns the bell pushes, the bells and the status LED and
//! connects them: a press on an enabled push blinks the LED and rings
//! every enabled bell.
//!
//! ```text
//! ┌──────────┐ press ┌────────────┐ ring ┌──────────────┐
//! │ BellPush ├───────▶ Gatekeeper ├──────▶ Bell (relay, │
//! │ (input)  │       │            │      │  phone, ...) │
//! └──────────┘       └─────┬──────┘      └──────────────┘
//!                          │ blink
//!                    ┌─────▼──────┐
//!                    │ status LED │
//!                    └────────────┘
//! ```

pub mod bell;

pub use bell::{ExternalBell, PhoneBell, Ringer};

use crate::domain::shared::{DomainError, Result};
use crate::infrastructure::gpio::{DigitalInput, Led};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info};

/// A bell push wired to a digital input.
pub struct BellPush {
    pub label: String,
    pub enabled: bool,
    pub input: Arc<dyn DigitalInput>,
}

/// A bell with its ringer.
pub struct Bell {
    pub label: String,
    pub enabled: bool,
    pub ringer: Arc<dyn Ringer>,
}

/// Everything the gatekeeper needs at construction time.
pub struct Options {
    pub status_led: Led,
    pub blink_duration: Duration,
    pub blink_interval: Duration,
    pub bell_pushes: Vec<BellPush>,
    pub bells: Vec<Bell>,
}

/// State of one bell or bell push as reported by [`Gatekeeper::info`].
#[derive(Debug, Clone, Serialize)]
pub struct ItemInfo {
    pub label: String,
    pub enabled: bool,
}

/// Snapshot of the gatekeeper's configuration.
#[derive(Debug, Clone, Serialize)]
pub struct GatekeeperInfo {
    pub bell_pushes: Vec<ItemInfo>,
    pub bells: Vec<ItemInfo>,
}

struct State {
    bells: Vec<Bell>,
    bell_pushes: Vec<BellPush>,
}

struct Core {
    status_led: Led,
    blink_duration: Duration,
    blink_interval: Duration,
    state: RwLock<State>,
}

/// Central mediator between pushes, bells and the status LED.
pub struct Gatekeeper {
    core: Arc<Core>,
    presses: Option<mpsc::UnboundedReceiver<usize>>,
}

impl Gatekeeper {
    /// Wire up the pushes. Every enabled-or-not push gets a callback;
    /// enablement is checked at press time so it can change at runtime.
    pub fn new(options: Options) -> Result<Self> {
        let (press_tx, press_rx) = mpsc::unbounded_channel();

        for (index, push) in options.bell_pushes.iter().enumerate() {
            let tx = press_tx.clone();
            push.input.add_callback(Box::new(move |pressed| {
                if pressed {
                    let _ = tx.send(index);
                }
            }))?;
        }

        let core = Arc::new(Core {
            status_led: options.status_led,
            blink_duration: options.blink_duration,
            blink_interval: options.blink_interval,
            state: RwLock::new(State {
                bells: options.bells,
                bell_pushes: options.bell_pushes,
            }),
        });

        Ok(Self {
            core,
            presses: Some(press_rx),
        })
    }

    /// Turn the status LED on and start reacting to presses.
    pub fn start(&mut self) -> Result<()> {
        self.core.status_led.on()?;

        if let Some(mut presses) = self.presses.take() {
            let core = Arc::clone(&self.core);
            tokio::spawn(async move {
                while let Some(index) = presses.recv().await {
                    core.bell_push_pressed(index).await;
                }
            });
        }

        info!("gatekeeper started");
        Ok(())
    }

    /// Enable or disable the bell push at `index`.
    pub async fn set_bell_push_state(&self, index: usize, enabled: bool) -> Result<()> {
        let mut state = self.core.state.write().await;
        let push = state
            .bell_pushes
            .get_mut(index)
            .ok_or_else(|| DomainError::NotFound(format!("bell push {}", index)))?;

        push.enabled = enabled;
        info!(label = %push.label, enabled, "bell push state changed");
        Ok(())
    }

    /// Enable or disable the bell at `index`.
    pub async fn set_bell_state(&self, index: usize, enabled: bool) -> Result<()> {
        let mut state = self.core.state.write().await;
        let bell = state
            .bells
            .get_mut(index)
            .ok_or_else(|| DomainError::NotFound(format!("bell {}", index)))?;

        bell.enabled = enabled;
        info!(label = %bell.label, enabled, "bell state changed");
        Ok(())
    }

    pub async fn info(&self) -> GatekeeperInfo {
        let state = self.core.state.read().await;

        GatekeeperInfo {
            bell_pushes: state
                .bell_pushes
                .iter()
                .map(|p| ItemInfo {
                    label: p.label.clone(),
                    enabled: p.enabled,
                })
                .collect(),
            bells: state
                .bells
                .iter()
                .map(|b| ItemInfo {
                    label: b.label.clone(),
                    enabled: b.enabled,
                })
                .collect(),
        }
    }

    /// Ring the enabled bells as if a push had been pressed.
    pub async fn ring(&self) {
        self.core.ring().await;
    }

    /// Release the LED, the inputs and the bells, in that order. The
    /// first failure aborts the shutdown.
    pub async fn close(&self) -> Result<()> {
        let state = self.core.state.write().await;

        self.core.status_led.off()?;
        self.core.status_led.close()?;

        for push in &state.bell_pushes {
            push.input.close()?;
        }

        for bell in &state.bells {
            bell.ringer.close()?;
        }

        info!("gatekeeper closed");
        Ok(())
    }
}

impl Core {
    async fn bell_push_pressed(&self, index: usize) {
        {
            let state = self.state.read().await;
            let push = match state.bell_pushes.get(index) {
                Some(push) => push,
                None => return,
            };

            if !push.enabled {
                debug!(label = %push.label, "ignoring press on disabled bell push");
                return;
            }

            info!(label = %push.label, "bell push pressed");
        }

        self.ring().await;
    }

    async fn ring(&self) {
        if let Err(e) = self
            .status_led
            .blink_for(self.blink_duration, self.blink_interval)
        {
            error!(error = %e, "failed to blink status led");
        }

        let ringers: Vec<Arc<dyn Ringer>> = {
            let state = self.state.read().await;
            state
                .bells
                .iter()
                .filter(|b| b.enabled)
                .map(|b| Arc::clone(&b.ringer))
                .collect()
        };

        for ringer in ringers {
            ringer.ring().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::gpio::{GpioError, MockDigitalOutput, NoopOutput};
    use crate::infrastructure::protocols::sip::{
        Connection, Header, Request, Response, SipError, SipUri, Transport,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Callback = Box<dyn Fn(bool) + Send + Sync>;

    #[derive(Default)]
    struct FakeInput {
        callbacks: Mutex<Vec<Callback>>,
        closed: Mutex<bool>,
    }

    impl FakeInput {
        fn press(&self) {
            for callback in self.callbacks.lock().unwrap().iter() {
                callback(true);
                callback(false);
            }
        }
    }

    impl DigitalInput for FakeInput {
        fn add_callback(&self, callback: Callback) -> std::result::Result<(), GpioError> {
            self.callbacks.lock().unwrap().push(callback);
            Ok(())
        }

        fn close(&self) -> std::result::Result<(), GpioError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingRinger {
        rings: AtomicUsize,
    }

    #[async_trait]
    impl Ringer for CountingRinger {
        async fn ring(&self) {
            self.rings.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn led() -> Led {
        Led::new(Arc::new(NoopOutput::new()))
    }

    fn options(bell_pushes: Vec<BellPush>, bells: Vec<Bell>) -> Options {
        Options {
            status_led: led(),
            blink_duration: Duration::from_millis(20),
            blink_interval: Duration::from_millis(5),
            bell_pushes,
            bells,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_press_rings_only_enabled_bells() {
        let input = Arc::new(FakeInput::default());
        let enabled = Arc::new(CountingRinger::default());
        let disabled = Arc::new(CountingRinger::default());

        let mut gatekeeper = Gatekeeper::new(options(
            vec![BellPush {
                label: "front door".to_string(),
                enabled: true,
                input: Arc::clone(&input) as Arc<dyn DigitalInput>,
            }],
            vec![
                Bell {
                    label: "hallway".to_string(),
                    enabled: true,
                    ringer: Arc::clone(&enabled) as Arc<dyn Ringer>,
                },
                Bell {
                    label: "workshop".to_string(),
                    enabled: false,
                    ringer: Arc::clone(&disabled) as Arc<dyn Ringer>,
                },
            ],
        ))
        .unwrap();
        gatekeeper.start().unwrap();

        input.press();
        settle().await;

        assert_eq!(enabled.rings.load(Ordering::SeqCst), 1);
        assert_eq!(disabled.rings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_press_on_disabled_push_is_dropped() {
        let input = Arc::new(FakeInput::default());
        let ringer = Arc::new(CountingRinger::default());

        let mut gatekeeper = Gatekeeper::new(options(
            vec![BellPush {
                label: "front door".to_string(),
                enabled: false,
                input: Arc::clone(&input) as Arc<dyn DigitalInput>,
            }],
            vec![Bell {
                label: "hallway".to_string(),
                enabled: true,
                ringer: Arc::clone(&ringer) as Arc<dyn Ringer>,
            }],
        ))
        .unwrap();
        gatekeeper.start().unwrap();

        input.press();
        settle().await;

        assert_eq!(ringer.rings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_push_can_be_reenabled_at_runtime() {
        let input = Arc::new(FakeInput::default());
        let ringer = Arc::new(CountingRinger::default());

        let mut gatekeeper = Gatekeeper::new(options(
            vec![BellPush {
                label: "front door".to_string(),
                enabled: false,
                input: Arc::clone(&input) as Arc<dyn DigitalInput>,
            }],
            vec![Bell {
                label: "hallway".to_string(),
                enabled: true,
                ringer: Arc::clone(&ringer) as Arc<dyn Ringer>,
            }],
        ))
        .unwrap();
        gatekeeper.start().unwrap();

        gatekeeper.set_bell_push_state(0, true).await.unwrap();

        input.press();
        settle().await;

        assert_eq!(ringer.rings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_set_state_out_of_range_is_not_found() {
        let gatekeeper = Gatekeeper::new(options(
            vec![BellPush {
                label: "front door".to_string(),
                enabled: true,
                input: Arc::new(FakeInput::default()),
            }],
            vec![Bell {
                label: "hallway".to_string(),
                enabled: true,
                ringer: Arc::new(CountingRinger::default()),
            }],
        ))
        .unwrap();

        assert!(matches!(
            gatekeeper.set_bell_state(1, false).await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            gatekeeper.set_bell_push_state(3, false).await,
            Err(DomainError::NotFound(_))
        ));

        let info = gatekeeper.info().await;
        assert!(info.bell_pushes[0].enabled);
        assert!(info.bells[0].enabled);
    }

    #[tokio::test]
    async fn test_info_reflects_state_changes() {
        let gatekeeper = Gatekeeper::new(options(
            vec![BellPush {
                label: "front door".to_string(),
                enabled: true,
                input: Arc::new(FakeInput::default()),
            }],
            vec![Bell {
                label: "hallway".to_string(),
                enabled: true,
                ringer: Arc::new(CountingRinger::default()),
            }],
        ))
        .unwrap();

        gatekeeper.set_bell_state(0, false).await.unwrap();

        let info = gatekeeper.info().await;
        assert_eq!(info.bell_pushes.len(), 1);
        assert_eq!(info.bell_pushes[0].label, "front door");
        assert!(info.bell_pushes[0].enabled);
        assert_eq!(info.bells[0].label, "hallway");
        assert!(!info.bells[0].enabled);
    }

    struct CountingTransport {
        dials: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(
            &self,
            _request: &mut Request,
        ) -> std::result::Result<Box<dyn Connection>, SipError> {
            self.dials.fetch_add(1, Ordering::SeqCst);

            Ok(Box::new(ScriptedConnection {
                responses: VecDeque::from([ok_response(true), ok_response(false)]),
            }))
        }
    }

    struct ScriptedConnection {
        responses: VecDeque<Response>,
    }

    #[async_trait]
    impl Connection for ScriptedConnection {
        async fn send(&mut self, _request: &mut Request) -> std::result::Result<(), SipError> {
            Ok(())
        }

        async fn recv(&mut self) -> std::result::Result<Response, SipError> {
            self.responses
                .pop_front()
                .ok_or_else(|| SipError::RoundTrip("script exhausted".to_string()))
        }

        fn local_addr(&self) -> SocketAddr {
            "192.168.1.20:49152".parse().unwrap()
        }

        async fn close(&mut self) -> std::result::Result<(), SipError> {
            Ok(())
        }
    }

    fn ok_response(with_to: bool) -> Response {
        let mut header = Header::new();
        header.set("Content-Length", "0");
        if with_to {
            header.set("To", "<sip:**612@10.0.0.1:5060>;tag=abc123");
        }

        Response {
            protocol: "SIP/2.0".to_string(),
            status_code: 200,
            reason: "OK".to_string(),
            header,
            body: Vec::new(),
            local_addr: None,
            peer_addr: None,
        }
    }

    #[tokio::test]
    async fn test_disabled_relay_bell_is_untouched_while_phone_rings() {
        // any relay call would trip an unexpected-call panic
        let relay = MockDigitalOutput::new();

        let dials = Arc::new(AtomicUsize::new(0));
        let transport: Arc<dyn Transport> = Arc::new(CountingTransport {
            dials: Arc::clone(&dials),
        });

        let gatekeeper = Gatekeeper::new(options(
            vec![],
            vec![
                Bell {
                    label: "External bell".to_string(),
                    enabled: false,
                    ringer: Arc::new(ExternalBell::new(
                        Arc::new(relay),
                        Duration::from_millis(20),
                    )),
                },
                Bell {
                    label: "Phone".to_string(),
                    enabled: true,
                    ringer: Arc::new(PhoneBell::new(
                        transport,
                        SipUri::parse("sip:door@10.0.0.1").unwrap(),
                        SipUri::parse("sip:**612@10.0.0.1").unwrap(),
                        vec![],
                        Duration::from_secs(10),
                    )),
                },
            ],
        ))
        .unwrap();

        gatekeeper.ring().await;
        settle().await;

        assert_eq!(dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_releases_led_inputs_and_bells() {
        let mut led_output = MockDigitalOutput::new();
        led_output.expect_on().returning(|| Ok(()));
        led_output.expect_off().once().returning(|| Ok(()));
        led_output.expect_close().once().returning(|| Ok(()));

        let input = Arc::new(FakeInput::default());

        let mut gatekeeper = Gatekeeper::new(Options {
            status_led: Led::new(Arc::new(led_output)),
            blink_duration: Duration::from_millis(20),
            blink_interval: Duration::from_millis(5),
            bell_pushes: vec![BellPush {
                label: "front door".to_string(),
                enabled: true,
                input: Arc::clone(&input) as Arc<dyn DigitalInput>,
            }],
            bells: vec![Bell {
                label: "hallway".to_string(),
                enabled: true,
                ringer: Arc::new(CountingRinger::default()),
            }],
        })
        .unwrap();
        gatekeeper.start().unwrap();

        gatekeeper.close().await.unwrap();
        assert!(*input.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_ring_ignores_led_blink_failure() {
        let mut led_output = MockDigitalOutput::new();
        led_output
            .expect_state()
            .returning(|| Err(GpioError::Io("led gone".to_string())));

        let ringer = Arc::new(CountingRinger::default());

        let gatekeeper = Gatekeeper::new(Options {
            status_led: Led::new(Arc::new(led_output)),
            blink_duration: Duration::from_millis(20),
            blink_interval: Duration::from_millis(5),
            bell_pushes: vec![],
            bells: vec![Bell {
                label: "hallway".to_string(),
                enabled: true,
                ringer: Arc::clone(&ringer) as Arc<dyn Ringer>,
            }],
        })
        .unwrap();

        gatekeeper.ring().await;

        assert_eq!(ringer.rings.load(Ordering::SeqCst), 1);
    }
}
