//! CLI application for controlling Magic Home controllers.
//!
//! Run with: cargo run --example magichome_cli -- --help

use clap::{Parser, Subcommand};
use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::Local;
use magichome_rs::{
    ChannelSet, Color, Device, DeviceFamily, DiscoveryConfig, Error, MacAddress, PresetMode,
    discover_devices,
};

#[derive(Parser)]
#[command(name = "magichome-cli")]
#[command(about = "Control Magic Home LED controllers from the command line", long_about = None)]
struct Cli {
    /// IP address of the controller
    #[arg(short, long, global = true, conflicts_with = "mac")]
    ip: Option<Ipv4Addr>,

    /// MAC address of the controller, resolved with discovery
    #[arg(short, long, global = true)]
    mac: Option<MacAddress>,

    /// Controller family (Rgb, RgbWarmWhite, RgbWarmWhiteColdWhite, DimmableBulb, LegacyBulb)
    #[arg(short, long, global = true, default_value = "RgbWarmWhite")]
    family: DeviceFamily,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover all controllers on the network
    Discover {
        /// Discovery timeout in seconds (default: 5)
        #[arg(short, long, default_value = "5")]
        timeout: u64,
    },

    /// Get the current status of the controller
    Status,

    /// Turn the output on
    On,

    /// Turn the output off
    Off,

    /// Set the color, e.g. `color 255,0,128`
    Color {
        /// Red, green and blue (0-255 each)
        rgb: Option<Color>,
        /// Warm white level (0-255)
        #[arg(long)]
        warm: Option<u8>,
        /// Cold white level (0-255)
        #[arg(long)]
        cold: Option<u8>,
        /// Do not keep the color across power cycles
        #[arg(long)]
        transient: bool,
    },

    /// Run a built-in animation
    Preset {
        /// Mode name (e.g. RgbFade, WhitePulse, ColorChange)
        mode: PresetMode,
        /// Speed, 1 (fastest) to 24 (slowest)
        #[arg(short, long, default_value = "10")]
        delay: u8,
    },

    /// Show the controller clock
    Time,

    /// Set the controller clock to local time
    SyncTime,

    /// List the timers
    Timers {
        /// Include one-shot timers that already fired
        #[arg(long)]
        all: bool,
    },

    /// Clear all timers
    ClearTimers,
}

async fn connect(cli: &Cli) -> Result<Device, Box<dyn std::error::Error>> {
    if let Some(ip) = cli.ip {
        return Ok(Device::new(ip, cli.family));
    }
    let mac = cli
        .mac
        .ok_or("An address is required for this command. Use --ip <IP> or --mac <MAC>")?;
    println!("Looking for {}...", mac);
    let device = Device::find_by_mac(mac, cli.family, DiscoveryConfig::default())
        .await?
        .ok_or(Error::DeviceNotFound(mac))?;
    println!("Found {}", device);
    Ok(device)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Discover { timeout } = cli.command {
        println!(
            "Discovering controllers on the network (timeout: {}s)...",
            timeout
        );
        let devices = discover_devices(Duration::from_secs(timeout)).await?;
        if devices.is_empty() {
            println!("No controllers found on the network.");
        } else {
            println!("\nFound {} controller(s):", devices.len());
            for found in devices {
                println!(
                    "  IP: {:15}  MAC: {}  Model: {}",
                    found.ip.to_string(),
                    found.mac,
                    found.model
                );
            }
        }
        return Ok(());
    }

    let mut device = connect(&cli).await?;

    match cli.command {
        Commands::Discover { .. } => unreachable!(),

        Commands::Status => {
            let status = device.get_status().await?;
            println!("\n{}:", device);
            println!("  Power: {}", if status.is_on() { "ON" } else { "OFF" });
            println!("  Mode: {}", status.mode());
            let color = status.color();
            println!(
                "  Color: RGB({}, {}, {})",
                color.red(),
                color.green(),
                color.blue()
            );
            if let Some(white) = status.white1() {
                println!("  Warm white: {}", white);
            }
            if let Some(white) = status.white2() {
                println!("  Cold white: {}", white);
            }
            if status.mode().is_animation() {
                println!("  Delay: {}", status.preset_delay());
            }
            if let Some(version) = status.version() {
                println!("  Firmware: {}", version);
            }
        }

        Commands::On => {
            device.turn_on().await?;
            println!("Turned on");
        }

        Commands::Off => {
            device.turn_off().await?;
            println!("Turned off");
        }

        Commands::Color {
            rgb,
            warm,
            cold,
            transient,
        } => {
            let mut channels = ChannelSet::new();
            if let Some(color) = rgb {
                channels = ChannelSet::from(color);
            }
            if let Some(warm) = warm {
                channels = channels.with_white1(warm);
            }
            if let Some(cold) = cold {
                channels = channels.with_white2(cold);
            }
            device.set_color(&channels, !transient, true).await?;
            println!("Color set");
        }

        Commands::Preset { mode, delay } => {
            device.set_preset(mode, delay).await?;
            println!("Running {}", mode);
        }

        Commands::Time => {
            println!("Controller time: {}", device.get_time().await?);
        }

        Commands::SyncTime => {
            let now = Local::now().naive_local();
            device.set_time(now).await?;
            println!("Clock set to {}", now);
        }

        Commands::Timers { all } => {
            let mut device = device.with_keep_expired_timers(all);
            let timers = device.get_timers().await?;
            if timers.is_empty() {
                println!("No timers set.");
            }
            for (i, timer) in timers.iter().enumerate() {
                println!("  {}. {}", i + 1, timer);
            }
        }

        Commands::ClearTimers => {
            device.set_timers(&[]).await?;
            println!("Timers cleared");
        }
    }

    Ok(())
}
