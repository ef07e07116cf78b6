use bellgate::config::Config;
use bellgate::domain::gatekeeper::{
    Bell, BellPush, ExternalBell, Gatekeeper, Options, PhoneBell,
};
use bellgate::infrastructure::gpio::{
    DigitalInput, DigitalOutput, Led, NoopInput, NoopOutput,
};
use bellgate::infrastructure::protocols::sip::{DigestHandler, SipUri, TcpTransport, Transport};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => Config::load(Path::new(path))?,
        None => Config::default(),
    };

    // Initialize tracing; the SIP debug flag lowers the default filter
    let default_filter = if config.sip.server.debug {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    info!("Starting bellgate");
    match &config_path {
        Some(path) => info!(path = %path, "Configuration loaded"),
        None => warn!("No configuration file given, using defaults"),
    }

    let caller = SipUri::parse(&config.sip.caller)?;
    let callee = SipUri::parse(&config.sip.callee)?;
    info!(%caller, %callee, "SIP addresses configured");

    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::new(config.sip.server.debug));
    let handlers = vec![DigestHandler::new(
        &config.sip.server.user,
        &config.sip.server.password,
    )];

    // Pin numbers stay in the configuration for the operator; this build
    // binds them to no-op stand-ins.
    if config.gpio.disabled {
        info!("GPIO disabled, running headless");
    }

    let status_led = Led::new(Arc::new(NoopOutput::new()) as Arc<dyn DigitalOutput>);
    info!(gpio = config.status_led.gpio, "status LED configured");

    let relay: Arc<dyn DigitalOutput> = Arc::new(NoopOutput::new());
    info!(gpio = config.external_bell.gpio, "external bell configured");

    let bells = vec![
        Bell {
            label: "External bell".to_string(),
            enabled: true,
            ringer: Arc::new(ExternalBell::new(relay, config.external_bell.ring_duration())),
        },
        Bell {
            label: "Phone".to_string(),
            enabled: true,
            ringer: Arc::new(PhoneBell::new(
                Arc::clone(&transport),
                caller,
                callee,
                handlers,
                config.sip.max_ringing_time(),
            )),
        },
    ];

    let bell_pushes = config
        .bell_pushes
        .iter()
        .map(|push| {
            info!(label = %push.label, gpio = push.gpio, "bell push configured");
            BellPush {
                label: push.label.clone(),
                enabled: true,
                input: Arc::new(NoopInput) as Arc<dyn DigitalInput>,
            }
        })
        .collect();

    let mut gatekeeper = Gatekeeper::new(Options {
        status_led,
        blink_duration: config.status_led.blink_duration(),
        blink_interval: config.status_led.blink_interval(),
        bell_pushes,
        bells,
    })?;

    gatekeeper.start()?;
    info!("Bellgate started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    gatekeeper.close().await?;

    Ok(())
}
