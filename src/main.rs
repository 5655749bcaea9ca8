use color_eyre::Result;
use cul2mqtt::bridge::Bridge;
use cul2mqtt::config::{Config, ConfigSource, Verbosity};
use cul2mqtt::cul::CulHandle;
use cul2mqtt::mqtt::mqtt_handler::{self, MqttHandler};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

const EVENT_CAPACITY: usize = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;

    let (config, origin) = Config::load(&ConfigSource::from_env()).await?;
    setup_logging(config.verbosity);
    info!(
        "{} {} starting as '{}'",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.name
    );
    if origin.is_defaults() {
        warn!("Configuration {}", origin);
    } else {
        info!("Configuration {}", origin);
    }

    let topics = config.load_topic_map().await?;
    let settings = config.bridge_settings();

    let (event_sender, event_receiver) = mpsc::channel(EVENT_CAPACITY);

    let handler = MqttHandler::new(
        config.mqtt.clone(),
        mqtt_handler::client_id(&config.mqtt, &config.name),
        &settings.status_topic(),
    )?;
    let publisher = handler.publisher();
    let _mqtt_task = handler.spawn(event_sender.clone());

    let cul_link = CulHandle::spawn(config.cul.clone(), event_sender)?;

    let bridge = Bridge::new(settings, topics, publisher, cul_link);
    tokio::select! {
        _ = bridge.run(event_receiver) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
    Ok(())
}

fn setup_logging(verbosity: Verbosity) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", verbosity.as_filter())
    }
    FmtSubscriber::builder()
        .with_max_level(verbosity.level())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
