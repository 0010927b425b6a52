//! Doxie CLI - command line client for Doxie Wi-Fi scanners
//!
//! This binary can:
//! - Find the scanner on its own Wi-Fi network or on a joined network
//! - Show scanner status, firmware and power source
//! - List, download and delete scans

mod download;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use doxie_core::{config, DeviceSession, Discovery, DiscoveryConfig, NetworkMode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doxie")]
#[command(version)]
#[command(about = "Find a Doxie scanner on Wi-Fi and manage its scans")]
#[command(long_about = "
Doxie CLI talks to a Doxie Go Wi-Fi scanner. It finds the scanner either on
the network the scanner creates itself, or on the Wi-Fi network it joined.

Examples:
  Find the scanner:          doxie hello
  List all scans:            doxie scans
  Delete scans:              doxie delete img_001.jpg,img_002.jpg
  Download a thumbnail:      doxie get-thumbnail img_002.jpg
  Download a scan:           doxie get-scan img_019.jpg
  Download all scans:        doxie get-scans -o ~/Scans
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Password to authenticate with the scanner
    #[arg(short = 'a', long = "auth", global = true)]
    pub password: Option<String>,

    /// Address of the scanner on a joined network (skips discovery guessing)
    #[arg(long, global = true)]
    pub static_ip: Option<String>,

    /// Scanner HTTP port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Directory downloaded scans are written to
    #[arg(short, long, global = true, default_value = ".")]
    pub output_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find the scanner on Wi-Fi and show its status
    Hello,

    /// Show firmware version and power source
    Status,

    /// List all scans in the scanner's memory
    Scans,

    /// Show the name of the most recent scan
    Recent,

    /// Delete scans (comma separated names)
    Delete {
        #[arg(required = true, value_delimiter = ',')]
        names: Vec<String>,
    },

    /// Download a scan
    GetScan { name: String },

    /// Download a scan as a 240x240 thumbnail
    GetThumbnail { name: String },

    /// Download all scans
    GetScans,

    /// Restart the scanner's Wi-Fi system
    Restart,

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("doxie={},doxie_core={}", log_level, log_level).into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config => cmd_config(&cli),
        command => {
            let scanner = connect(&cli).await?;
            run(&cli, &scanner, command).await
        }
    }
}

async fn run(cli: &Cli, scanner: &DeviceSession, command: &Commands) -> Result<()> {
    match command {
        Commands::Hello => cmd_hello(cli, scanner),
        Commands::Status => cmd_status(cli, scanner).await,
        Commands::Scans => cmd_scans(cli, scanner).await,
        Commands::Recent => cmd_recent(cli, scanner).await,
        Commands::Delete { names } => cmd_delete(cli, scanner, names).await,
        Commands::GetScan { name } => download::get_scan(cli, scanner, name).await,
        Commands::GetThumbnail { name } => download::get_thumbnail(cli, scanner, name).await,
        Commands::GetScans => download::get_scans(cli, scanner).await,
        Commands::Restart => cmd_restart(cli, scanner).await,
        Commands::Config => cmd_config(cli),
    }
}

/// The loaded config with command line overrides applied.
fn discovery_config(cli: &Cli) -> DiscoveryConfig {
    apply_overrides(cli, config::load_discovery_config())
}

fn apply_overrides(cli: &Cli, mut discovery_config: DiscoveryConfig) -> DiscoveryConfig {
    if let Some(ip) = &cli.static_ip {
        discovery_config.static_ip = Some(ip.clone());
    }
    if let Some(port) = cli.port {
        discovery_config.port = port;
    }
    discovery_config
}

/// Discover the scanner.
async fn connect(cli: &Cli) -> Result<DeviceSession> {
    let mut scanner = Discovery::new(discovery_config(cli)).discover().await?;
    if cli.password.is_some() {
        scanner.set_password(cli.password.clone());
    }
    Ok(scanner)
}

fn cmd_hello(cli: &Cli, scanner: &DeviceSession) -> Result<()> {
    let status = scanner.status();

    match cli.format {
        OutputFormat::Text => {
            println!("Name:           {}", status.name);
            println!("Model:          {}", status.model);
            println!("Has Password:   {}", status.has_password);
            println!("Wi-Fi Firmware: {}", status.firmware_wifi);
            println!("MAC:            {}", status.mac);
            match status.network_mode() {
                NetworkMode::AccessPoint => {
                    println!("Mode:           AP (scanner's own Wi-Fi network)");
                }
                NetworkMode::Client => {
                    println!("Mode:           Client (joined existing Wi-Fi network)");
                    println!("Network:        {}", status.network);
                    println!("IP:             {}", status.ip);
                }
                NetworkMode::Unknown(mode) => println!("Mode:           {}", mode),
            }
            println!("URL:            {}", scanner.base_url());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "status": status,
                "url": scanner.base_url().as_str(),
            }));
        }
    }

    Ok(())
}

async fn cmd_status(cli: &Cli, scanner: &DeviceSession) -> Result<()> {
    let extra = scanner.extended_status().await?;

    match cli.format {
        OutputFormat::Text => {
            println!("Firmware: {}", extra.firmware);
            println!(
                "Power:    {}",
                if extra.connected_to_external_power { "AC adapter" } else { "battery" }
            );
        }
        OutputFormat::Json => println!("{}", serde_json::json!(extra)),
    }

    Ok(())
}

async fn cmd_scans(cli: &Cli, scanner: &DeviceSession) -> Result<()> {
    let items = scanner.scans().await?;

    match cli.format {
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No scans on the scanner.");
            }
            for item in &items {
                println!("- name: {} size: {} modified: {}", item.name, item.size, item.modified);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::json!({ "scans": items })),
    }

    Ok(())
}

async fn cmd_recent(cli: &Cli, scanner: &DeviceSession) -> Result<()> {
    let recent = scanner.recent().await?;

    match cli.format {
        OutputFormat::Text => match &recent {
            Some(name) => println!("{}", name),
            None => println!("No recent scan."),
        },
        OutputFormat::Json => println!("{}", serde_json::json!({ "recent": recent })),
    }

    Ok(())
}

async fn cmd_delete(cli: &Cli, scanner: &DeviceSession, names: &[String]) -> Result<()> {
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        anyhow::bail!("no scan names given");
    }

    scanner.delete(names.as_slice()).await?;

    match cli.format {
        OutputFormat::Text => {
            for name in &names {
                println!("deleted scan {}", name);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::json!({ "deleted": names })),
    }

    Ok(())
}

async fn cmd_restart(cli: &Cli, scanner: &DeviceSession) -> Result<()> {
    scanner.restart().await?;

    match cli.format {
        OutputFormat::Text => println!("Restarting {} Wi-Fi...", scanner.status().name),
        OutputFormat::Json => println!("{}", serde_json::json!({ "status": "restarting" })),
    }

    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let discovery_config = discovery_config(cli);
    let config_path = config::get_config_file_path_string();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:    {}", config_path);
            println!("Source:         {}", discovery_config.source);
            println!("AP address:     {}", discovery_config.ap_host);
            println!(
                "Static IP:      {}",
                discovery_config.static_ip.as_deref().unwrap_or("-")
            );
            println!("Port:           {}", discovery_config.port);
            println!("Timeout:        {:?}", discovery_config.request_timeout);
            println!("Library:        doxie-core {}", doxie_core::version());
            println!();
            println!("Environment variables:");
            println!("  DOXIE_STATIC_IP - Fixed scanner address on a joined network");
            println!("  DOXIE_AP_HOST   - Scanner address in access-point mode");
            println!("  DOXIE_PORT      - Scanner HTTP port");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "config_file": config_path,
                "source": discovery_config.source.to_string(),
                "ap_host": discovery_config.ap_host,
                "static_ip": discovery_config.static_ip,
                "port": discovery_config.port,
                "timeout_secs": discovery_config.request_timeout.as_secs_f64(),
                "version": doxie_core::version(),
            }));
        }
    }

    Ok(())
}
