//! Command-line interface for the hydrolink B-hyve client.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::warn;

use hydrolink_cloud::{CloudClient, CloudService, CloudSession, ServiceTiming};
use hydrolink_core::config::env_vars;
use hydrolink_core::{
    ClientRequest, CloudConfig, Device, DeviceEvent, DeviceHandler, DeviceRegistry,
    StationRunTime, WateringMode,
};
use hydrolink_stream::{EventStream, StreamConfig, WsTransport};

/// Talk to Orbit B-hyve sprinkler timers through the Orbit cloud.
#[derive(Parser, Debug)]
#[command(name = "hydrolink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Orbit account email.
    #[arg(long, env = env_vars::EMAIL)]
    email: String,

    /// Orbit account password.
    #[arg(long, env = env_vars::PASSWORD, hide_env_values = true)]
    password: String,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List the devices on the account.
    Devices,
    /// Show the watering programs of a sprinkler timer.
    Programs {
        /// Device id, from `devices`.
        device_id: String,
    },
    /// Stream live events for a device until Ctrl-C.
    Watch {
        /// Device id, from `devices`.
        device_id: String,
    },
    /// Change the run mode of a sprinkler timer.
    SetMode {
        /// Device id, from `devices`.
        device_id: String,
        /// One of: auto, manual, off.
        mode: WateringMode,
        /// Station to run (manual mode).
        #[arg(long)]
        station: Option<u32>,
        /// Minutes to run the station for (manual mode).
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Set a rain delay, in hours. 0 clears an active delay.
    RainDelay {
        /// Device id, from `devices`.
        device_id: String,
        /// Delay in hours.
        hours: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hydrolink=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        Command::Devices => {
            let (client, session) = login(&args).await?;
            list_devices(&client, &session).await
        }
        Command::Programs { ref device_id } => {
            let (client, session) = login(&args).await?;
            show_programs(&client, &session, device_id).await
        }
        Command::Watch { device_id } => watch(args.email, args.password, device_id).await,
        Command::SetMode {
            ref device_id,
            mode,
            station,
            minutes,
        } => {
            let stations = manual_stations(mode, station, minutes)?;
            let (_client, session) = login(&args).await?;
            run_one_shot(
                &session,
                device_id.clone(),
                ClientRequest::ChangeMode {
                    device_id: device_id.clone(),
                    mode,
                    stations,
                },
            )
            .await
        }
        Command::RainDelay { ref device_id, hours } => {
            let (_client, session) = login(&args).await?;
            run_one_shot(
                &session,
                device_id.clone(),
                ClientRequest::RainDelay {
                    device_id: device_id.clone(),
                    delay: hours,
                },
            )
            .await
        }
    }
}

async fn login(args: &Args) -> Result<(CloudClient, CloudSession)> {
    let client = CloudClient::new();
    let session = client
        .login(&args.email, &args.password)
        .await
        .context("login failed")?;
    Ok((client, session))
}

async fn list_devices(client: &CloudClient, session: &CloudSession) -> Result<()> {
    let devices = client.devices(session).await?;
    if devices.is_empty() {
        println!("no devices on this account");
        return Ok(());
    }
    for device in devices {
        println!("{}", describe_device(&device));
    }
    Ok(())
}

fn describe_device(device: &Device) -> String {
    let connected = match device.is_connected {
        Some(true) => "online",
        Some(false) => "offline",
        None => "unknown",
    };
    let mode = device
        .status
        .as_ref()
        .and_then(|s| s.run_mode.as_deref())
        .unwrap_or("-");
    let battery = device
        .battery
        .as_ref()
        .map(|b| format!(", battery {:.0}%", b.percent))
        .unwrap_or_default();
    format!(
        "{}  {}  ({:?}, mode {}, {}{})",
        device.id, device.name, device.kind, mode, connected, battery
    )
}

async fn show_programs(client: &CloudClient, session: &CloudSession, device_id: &str) -> Result<()> {
    let programs = client.programs(session, device_id).await?;
    if programs.is_empty() {
        println!("no programs for device {device_id}");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&programs)?);
    Ok(())
}

/// Run the full stack for one device: cloud service (login job, periodic
/// device refresh into the registry) plus the event stream, until Ctrl-C.
async fn watch(email: String, password: String, device_id: String) -> Result<()> {
    let registry = Arc::new(DeviceRegistry::new());
    let service = CloudService::with_timing(
        CloudConfig::new(email, password),
        CloudClient::new(),
        registry.clone(),
        ServiceTiming {
            // interactive command; log in right away
            login_delay: Duration::ZERO,
            ..ServiceTiming::default()
        },
    );
    let handler = Arc::new(PrintHandler {
        device_id,
        token: TokenSource::Service(service.clone()),
    });
    registry.register_handler(handler.clone()).await;

    service.start().await;
    wait_logged_in(&service, Duration::from_secs(30)).await?;

    let config = StreamConfig::default();
    let transport = Arc::new(WsTransport::new(config.endpoint.clone()));
    let stream = EventStream::new(config, transport, handler);
    stream.start().await;

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;
    stream.stop().await;
    service.stop().await;
    Ok(())
}

/// Connect, send one request, and tear the stream down.
async fn run_one_shot(
    session: &CloudSession,
    device_id: String,
    request: ClientRequest,
) -> Result<()> {
    let config = StreamConfig {
        // No reason to sit out the bootstrap delay for a single command.
        reconnect_delay: Duration::from_millis(250),
        ..StreamConfig::default()
    };
    let transport = Arc::new(WsTransport::new(config.endpoint.clone()));
    let handler = Arc::new(PrintHandler {
        device_id,
        token: TokenSource::Static(session.token.clone()),
    });
    let stream = EventStream::new(config, transport, handler);
    stream.start().await;
    let result = async {
        wait_connected(&stream, Duration::from_secs(15)).await?;
        stream.send_request(&request).await?;
        // Let the writer flush before the connection goes away.
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }
    .await;
    stream.stop().await;
    result
}

async fn wait_logged_in(service: &CloudService, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !service.is_logged_in().await {
        if tokio::time::Instant::now() >= deadline {
            bail!("timed out waiting for cloud login");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    Ok(())
}

async fn wait_connected(stream: &EventStream, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !stream.is_connected().await {
        if tokio::time::Instant::now() >= deadline {
            bail!("timed out waiting for the event stream to connect");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    Ok(())
}

fn manual_stations(
    mode: WateringMode,
    station: Option<u32>,
    minutes: Option<u32>,
) -> Result<Option<Vec<StationRunTime>>> {
    if mode != WateringMode::Manual {
        if station.is_some() || minutes.is_some() {
            bail!("--station and --minutes only apply to manual mode");
        }
        return Ok(None);
    }
    match (station, minutes) {
        (Some(station), Some(minutes)) => Ok(Some(vec![StationRunTime {
            station,
            run_time: minutes,
        }])),
        (None, None) => bail!("manual mode needs --station and --minutes"),
        _ => bail!("--station and --minutes must be given together"),
    }
}

/// Where the handler gets the session token for the subscribe handshake.
enum TokenSource {
    /// A token obtained by an up-front login.
    Static(String),
    /// The cloud service's current token, None until its login job lands.
    Service(CloudService),
}

/// Handler that prints events and device snapshots to stdout.
struct PrintHandler {
    device_id: String,
    token: TokenSource,
}

#[async_trait]
impl DeviceHandler for PrintHandler {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    async fn session_token(&self) -> Option<String> {
        match &self.token {
            TokenSource::Static(token) => Some(token.clone()),
            TokenSource::Service(service) => service.session_token().await,
        }
    }

    async fn on_event(&self, event_type: &str, raw: &str) {
        match DeviceEvent::parse(raw) {
            Ok(event) => println!("{event:?}"),
            Err(err) => warn!(event = event_type, %err, "undecodable event"),
        }
    }

    async fn on_device_update(&self, device: &Device) {
        println!("device update: {}", describe_device(device));
    }

    async fn on_online(&self) {
        println!("-- connected --");
    }

    async fn on_offline(&self, reason: &str) {
        println!("-- offline: {reason} --");
    }
}
