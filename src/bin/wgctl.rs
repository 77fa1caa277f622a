//! wgctl - WireGuard tunnel control CLI
//!
//! Thin harness driving the lifecycle controller against the real wg-quick
//! engine, the sysfs VPN probe, and systemd service control.

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use libwgctl::{
    CommandDispatcher, CtlConfig, EuidBroker, LifecycleController, SystemVpnProbe, SystemdControl,
    WgQuickEngine,
};

#[derive(Parser)]
#[command(name = "wgctl", about = "WireGuard tunnel lifecycle control", version)]
struct Cli {
    /// Controller configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bring a tunnel up from a wg-quick config file
    Up {
        /// Tunnel name
        name: String,
        /// Path to the wg-quick configuration file
        config_file: PathBuf,
    },
    /// Tear the VPN down, escalating until the OS agrees it is off
    Down {
        /// Tunnel name
        #[arg(default_value = "wg0")]
        name: String,
    },
    /// Show engine and OS view of the VPN
    Status,
    /// Show traffic counters for a tunnel
    Stats {
        /// Tunnel name
        name: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let ctl_config = match &cli.config {
        Some(path) => match CtlConfig::load(path).await {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => CtlConfig::default(),
    };

    let engine = Arc::new(WgQuickEngine::new());
    let probe = Arc::new(SystemVpnProbe::new());
    let controller = Arc::new(LifecycleController::new(
        engine.clone(),
        probe.clone(),
        Arc::new(SystemdControl),
        Arc::new(EuidBroker),
        ctl_config,
    ));
    let dispatcher = CommandDispatcher::new(controller);

    if let Err(e) = run(&cli, &dispatcher, engine, probe).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(
    cli: &Cli,
    dispatcher: &CommandDispatcher,
    engine: Arc<WgQuickEngine>,
    probe: Arc<SystemVpnProbe>,
) -> Result<(), Box<dyn std::error::Error>> {
    use libwgctl::{TunnelEngine, VpnProbe};

    match &cli.command {
        Command::Up { name, config_file } => {
            let config_text = tokio::fs::read_to_string(config_file).await?;

            let (tx, mut rx) = mpsc::unbounded_channel();
            dispatcher.on_listen(tx).await;

            dispatcher
                .handle("initialize", &json!({ "localizedDescription": name }))
                .await?;
            // Let the permission flow resolve before the gate is checked
            tokio::time::sleep(Duration::from_millis(50)).await;

            dispatcher
                .handle("start", &json!({ "wgQuickConfig": config_text }))
                .await?;

            // Follow stage events until the engine settles
            while let Ok(Some(stage)) =
                tokio::time::timeout(Duration::from_secs(10), rx.recv()).await
            {
                println!("{}", stage);
                if stage == "connected" || stage == "disconnected" {
                    break;
                }
            }
            Ok(())
        }
        Command::Down { name } => {
            dispatcher
                .handle("initialize", &json!({ "localizedDescription": name }))
                .await?;
            dispatcher.handle("stop", &json!({})).await?;
            println!("disconnected");
            Ok(())
        }
        Command::Status => {
            let running = engine.running_tunnels().await.unwrap_or_default();
            let active = probe.vpn_active().await;
            println!("engine tunnels: {:?}", running);
            println!("os vpn active: {}", active);
            Ok(())
        }
        Command::Stats { name } => {
            dispatcher
                .handle("initialize", &json!({ "localizedDescription": name }))
                .await?;
            let rx = dispatcher.handle("getDownloadData", &json!({})).await?;
            let tx = dispatcher.handle("getUploadData", &json!({})).await?;
            println!("rx bytes: {}", rx);
            println!("tx bytes: {}", tx);
            Ok(())
        }
    }
}
