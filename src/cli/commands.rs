//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::camera::properties::{codes, PROPERTY_TABLE};
use crate::camera::{CameraSession, ChannelSink, DeviceDirectory};
use crate::cli::output::format_bytes;
use crate::cli::{Args, Commands, PropAction};
use crate::core::config::{get_config_path, Config};
use crate::sdk::backend::{
    ConnectionType, DeviceDescriptor, PropertyKind, RawProperty, ReconnectPolicy,
};
use crate::sdk::mock::{MockSdk, MockSdkConfig};
use crate::sdk::runtime::SdkRuntime;
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        Some(Commands::Config { path, reset }) => handle_config_command(*path, *reset),
        Some(Commands::ShowConfig) => show_config(config),
        Some(Commands::List { json }) => list_devices(config, args.simulate, *json),
        Some(Commands::Info { json }) => show_info(config, args, *json),
        Some(Commands::Capture {
            count,
            interval_ms,
            timeout,
        }) => capture(config, args, *count, *interval_ms, *timeout, shutdown_flag),
        Some(Commands::Liveview { frames, output }) => {
            live_view(config, args, *frames, output.as_deref(), shutdown_flag)
        }
        Some(Commands::Prop { action }) => property_command(config, args, action),
        None => list_devices(config, args.simulate, false),
    }
}

/// Build the SDK runtime for the selected backend.
///
/// `--simulate` wires up a mock camera with plausible settings so every
/// command can be exercised without hardware.
fn build_runtime(config: &Config, simulate: bool) -> Result<Arc<SdkRuntime>> {
    if simulate {
        let sdk = MockSdk::with_config(MockSdkConfig {
            auto_complete_capture: true,
            ..Default::default()
        });
        sdk.push_device(DeviceDescriptor::new(
            "ILCE-7M4",
            ConnectionType::Usb,
            &[0xAA, 0x01, 0x02, 0x03],
        ));
        sdk.set_properties(vec![
            RawProperty {
                code: codes::ISO,
                kind: PropertyKind::U32,
                value: 800,
            },
            RawProperty {
                code: codes::APERTURE,
                kind: PropertyKind::U16,
                value: 280,
            },
            RawProperty {
                code: codes::SHUTTER_SPEED,
                kind: PropertyKind::U32,
                value: 125,
            },
            RawProperty {
                code: codes::WHITE_BALANCE,
                kind: PropertyKind::U16,
                value: 2,
            },
            RawProperty {
                code: codes::FIRMWARE_VERSION,
                kind: PropertyKind::U16,
                value: 0x0131,
            },
        ]);
        info!("Using simulated camera backend");
        return Ok(SdkRuntime::new(sdk));
    }

    vendor_runtime(config)
}

#[cfg(feature = "vendor-sdk")]
fn vendor_runtime(config: &Config) -> Result<Arc<SdkRuntime>> {
    use crate::sdk::ffi::CrSdk;
    Ok(SdkRuntime::new(Arc::new(CrSdk::new(
        config.sdk.sdk_dir.clone(),
    ))))
}

#[cfg(not(feature = "vendor-sdk"))]
fn vendor_runtime(_config: &Config) -> Result<Arc<SdkRuntime>> {
    anyhow::bail!(
        "built without vendor SDK support; use --simulate, \
         or rebuild with the vendor-sdk feature"
    )
}

/// Pick a camera per config/CLI selection and open a session
fn connect(config: &Config, args: &Args) -> Result<(Arc<SdkRuntime>, CameraSession)> {
    let runtime = build_runtime(config, args.simulate)?;
    let directory = DeviceDirectory::new(Arc::clone(&runtime));

    let selector = args
        .device_id
        .as_deref()
        .or(config.device.device_id.as_deref());
    let descriptor = directory
        .find(selector)?
        .with_context(|| match selector {
            Some(s) => format!("no camera matching '{}'", s),
            None => "no camera found".to_string(),
        })?;

    let reconnect = if config.device.auto_reconnect {
        ReconnectPolicy::On
    } else {
        ReconnectPolicy::Off
    };

    let session = CameraSession::connect(&runtime, descriptor, reconnect)?;
    Ok((runtime, session))
}

fn list_devices(config: &Config, simulate: bool, json: bool) -> Result<()> {
    let runtime = build_runtime(config, simulate)?;
    let devices = DeviceDirectory::new(runtime).enumerate()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No cameras detected.");
        return Ok(());
    }

    println!("Found {} camera(s):", devices.len());
    for (index, device) in devices.iter().enumerate() {
        println!(
            "  [{}] {} ({}, id {})",
            index,
            device.model,
            device.connection,
            device.id_hex()
        );
    }
    Ok(())
}

fn show_info(config: &Config, args: &Args, json: bool) -> Result<()> {
    let (_runtime, session) = connect(config, args)?;

    let info = session.info();
    let settings = session.properties().get_all()?;

    if json {
        let report = serde_json::json!({
            "device": info,
            "properties": settings.iter().map(|(n, v)| (*n, *v)).collect::<std::collections::BTreeMap<_, _>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Model:      {}", info.model);
        println!("Serial:     {}", info.serial);
        println!("Connection: {}", info.connection);
        if let Some(ref firmware) = info.firmware {
            println!("Firmware:   {}", firmware);
        }
        println!("State:      {}", info.state);
        if !settings.is_empty() {
            println!("Settings:");
            for (name, value) in settings {
                println!("  {:<18} {}", name, value);
            }
        }
    }

    session.disconnect()?;
    Ok(())
}

fn capture(
    config: &Config,
    args: &Args,
    count: u32,
    interval_ms: u64,
    timeout: Option<u64>,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }

    let (_runtime, session) = connect(config, args)?;
    let timeout = Duration::from_secs(timeout.unwrap_or(config.capture.timeout_secs));

    for shot in 1..=count {
        if shutdown_flag.load(Ordering::SeqCst) {
            warn!("Shutdown requested, stopping after {} shot(s)", shot - 1);
            break;
        }

        let path = session.capture()?.wait_timeout(timeout)?;
        println!("[{}/{}] captured {}", shot, count, path.display());

        if shot < count && interval_ms > 0 {
            std::thread::sleep(Duration::from_millis(interval_ms));
        }
    }

    session.disconnect()?;
    Ok(())
}

fn live_view(
    config: &Config,
    args: &Args,
    frames: u64,
    output: Option<&std::path::Path>,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<()> {
    let (_runtime, session) = connect(config, args)?;

    if let Some(dir) = output {
        fs::create_dir_all(dir)
            .with_context(|| format!("cannot create output directory {}", dir.display()))?;
    }

    let (sink, receiver) = ChannelSink::bounded(8);
    session.live_view().start(Box::new(sink))?;

    let mut received: u64 = 0;
    let mut bytes: u64 = 0;

    while frames == 0 || received < frames {
        if shutdown_flag.load(Ordering::SeqCst) {
            break;
        }
        if !session.is_connected() {
            warn!("Camera gone, stopping live view");
            break;
        }

        let frame = match receiver.recv_timeout(Duration::from_millis(500)) {
            Ok(frame) => frame,
            Err(_) => continue,
        };

        received += 1;
        bytes += frame.data.len() as u64;

        if let Some(dir) = output {
            let path = dir.join(format!("frame_{:06}.bin", frame.sequence));
            fs::write(&path, &frame.data)
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
    }

    session.live_view().stop()?;
    let stats = session.live_view().stats();
    println!(
        "Received {} frame(s), {} ({} dropped by consumer)",
        received,
        format_bytes(bytes),
        stats.dropped
    );

    session.disconnect()?;
    Ok(())
}

fn property_command(config: &Config, args: &Args, action: &PropAction) -> Result<()> {
    let (_runtime, session) = connect(config, args)?;

    match action {
        PropAction::Get { name } => match session.properties().get(name)? {
            Some(value) => println!("{} = {}", name, value),
            None => println!("{} not reported by this camera", name),
        },
        PropAction::Set { name, value } => {
            session.properties().set(name, *value)?;
            println!("{} = {}", name, value);
        }
        PropAction::List => {
            let settings = session.properties().get_all()?;
            for def in PROPERTY_TABLE {
                let value = settings
                    .iter()
                    .find(|(name, _)| *name == def.name)
                    .map(|(_, v)| v.to_string());
                println!(
                    "  {:<18} {:<10} {}",
                    def.name,
                    value.as_deref().unwrap_or("-"),
                    if def.writable { "rw" } else { "ro" }
                );
            }
        }
    }

    session.disconnect()?;
    Ok(())
}

fn handle_config_command(path_only: bool, reset: bool) -> Result<()> {
    let path = get_config_path().context("could not determine configuration directory")?;

    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    if reset {
        Config::default().save(&path)?;
        println!("Config reset to defaults: {}", path.display());
        return Ok(());
    }

    if path.exists() {
        println!("Config file: {}", path.display());
        println!("{}", fs::read_to_string(&path)?);
    } else {
        println!("No config file yet; defaults are in effect.");
        println!("Run with `config --reset` to create {}", path.display());
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
