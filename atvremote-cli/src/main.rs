//! Command-line Android TV remote.
//!
//! Discovers TVs, runs the PIN pairing flow, and sends key presses over the
//! control channel. State (client identity, paired devices) lives under the
//! platform data directory.

use anyhow::{bail, Context, Result};
use atvremote_protocol::{
    ClientConfig, ControllerEvent, DeviceRegistry, Discovery, DiscoveryEvent, IdentityStore,
    KeyCode, RemoteController, TVDevice, DEFAULT_CONTROL_PORT,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, timeout, Duration};
use tracing::debug;

#[derive(Parser)]
#[command(name = "atvremote", about = "Remote control for Android TVs", version)]
struct Cli {
    /// Data directory (identity, paired devices); defaults to the platform
    /// data dir
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose protocol logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Browse the LAN for Android TVs
    Discover {
        /// How long to browse, in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
    /// List paired devices
    Devices,
    /// Pair with a TV (shows a PIN on its screen)
    Pair {
        /// TV host or IP
        host: String,
        /// Control port the TV advertised
        #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
        port: u16,
        /// Name for the device record
        #[arg(long, default_value = "Android TV")]
        name: String,
    },
    /// Remove a paired TV
    Unpair {
        /// Device id (host:port) as shown by `devices`
        id: String,
    },
    /// Send one or more key presses to a paired TV
    Key {
        /// Device id (host:port) as shown by `devices`
        id: String,
        /// Keys to press in order (e.g. up down ok back)
        #[arg(required = true)]
        keys: Vec<KeyCode>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("no platform data directory")?
            .join("atvremote"),
    };
    debug!(?data_dir, "using data directory");

    match cli.command {
        Command::Discover { timeout } => discover(timeout).await,
        Command::Devices => devices(&data_dir),
        Command::Pair { host, port, name } => pair(&data_dir, name, host, port).await,
        Command::Unpair { id } => unpair(&data_dir, &id).await,
        Command::Key { id, keys } => send_keys(&data_dir, &id, &keys).await,
    }
}

fn controller(data_dir: &Path) -> Result<RemoteController> {
    let identity_store = IdentityStore::open_dir(data_dir.join("identity"))?;
    let registry = DeviceRegistry::new(data_dir.join("devices.json"))?;
    Ok(RemoteController::new(
        ClientConfig::default(),
        identity_store,
        registry,
    ))
}

async fn discover(browse_secs: u64) -> Result<()> {
    let discovery = Discovery::new()?;
    let mut events = discovery.browse()?;

    println!("browsing for {} seconds...", browse_secs);
    let deadline = sleep(Duration::from_secs(browse_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(DiscoveryEvent::Found(device)) => {
                    println!("{}  {} (port {})", device.id, device.name, device.control_port);
                }
                Some(DiscoveryEvent::Lost { instance }) => {
                    println!("lost: {}", instance);
                }
                None => break,
            },
        }
    }

    discovery.shutdown();
    Ok(())
}

fn devices(data_dir: &Path) -> Result<()> {
    let registry = DeviceRegistry::new(data_dir.join("devices.json"))?;
    if registry.is_empty() {
        println!("no devices; pair one with `atvremote pair <host>`");
        return Ok(());
    }
    for device in registry.devices() {
        let status = if device.paired { "paired" } else { "unpaired" };
        println!("{}  {}  [{}]", device.id, device.name, status);
    }
    Ok(())
}

async fn pair(data_dir: &Path, name: String, host: String, port: u16) -> Result<()> {
    let mut controller = controller(data_dir)?;
    let mut events = controller.subscribe().await;

    let device = TVDevice::new(name, host, port);
    println!("pairing with {} ...", device.id);
    controller.start_pairing(&device).await;

    loop {
        let Some(event) = events.recv().await else {
            bail!("controller event stream closed");
        };
        match event {
            ControllerEvent::PairingCodeRequired { .. } => {
                println!("enter the PIN shown on the TV:");
                let mut line = String::new();
                BufReader::new(tokio::io::stdin())
                    .read_line(&mut line)
                    .await
                    .context("reading PIN")?;
                controller.submit_code(line.trim())?;
            }
            ControllerEvent::DevicePaired { device } => {
                println!("paired with {}", device.id);
                return Ok(());
            }
            ControllerEvent::Error { message } => bail!("pairing failed: {}", message),
            other => debug!(?other, "event"),
        }
    }
}

async fn unpair(data_dir: &Path, id: &str) -> Result<()> {
    let mut controller = controller(data_dir)?;
    controller.remove_paired(id).await?;
    println!("removed {}", id);
    Ok(())
}

async fn send_keys(data_dir: &Path, id: &str, keys: &[KeyCode]) -> Result<()> {
    let mut controller = controller(data_dir)?;

    let device = controller
        .paired_devices()
        .await
        .into_iter()
        .find(|d| d.id == id)
        .with_context(|| format!("{} is not a paired device", id))?;

    let mut events = controller.subscribe().await;
    controller.connect(&device).await?;

    for key in keys {
        controller.send_command(*key)?;
        // pace the presses so the TV registers each one
        sleep(Duration::from_millis(150)).await;
    }

    controller.disconnect().await;

    // drain the disconnect notification so errors surface
    while let Ok(Some(event)) = timeout(Duration::from_secs(1), events.recv()).await {
        if let ControllerEvent::Disconnected {
            reason: Some(reason),
            ..
        } = event
        {
            bail!("session ended with error: {}", reason);
        }
    }
    Ok(())
}
