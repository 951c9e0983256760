// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the capture daemon
//!
//! This module provides command-line functionality for:
//! - Running the scheduled capture pipeline with a terminal status line
//! - Running a single capture cycle
//! - Listing cameras
//! - Listing reports from the classifier

use chrono::Local;
use clap::Args;
use intruder_cam::backends::camera::{CameraSource, FileCameraSource};
use intruder_cam::backends::permission::{PermissionProvider, StaticPermission};
use intruder_cam::config::CameraSourceConfig;
use intruder_cam::constants::timing::CLOCK_REFRESH;
use intruder_cam::errors::{AppResult, ConfigError};
use intruder_cam::remote::{HttpTransport, ReportsClient, ReqwestTransport, UploadClient};
use intruder_cam::storage::{ArtifactStore, Filesystem, TokioFilesystem};
use intruder_cam::{
    CameraFacing, CaptureCycle, CapturePipeline, Config, CycleResult, FlashPolicy, PermissionGate,
    PipelineSnapshot, RetentionPolicy,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[cfg(target_os = "linux")]
use intruder_cam::backends::camera::{V4l2CameraSource, v4l2_utils};
#[cfg(target_os = "linux")]
use intruder_cam::backends::permission::DeviceNodePermission;

/// Settings that override the config file
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// JSON config file
    #[arg(short, long, env = "INTRUDER_CAM_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Classifier server base URL
    #[arg(long, env = "INTRUDER_CAM_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Milliseconds between capture cycles
    #[arg(long, env = "INTRUDER_CAM_INTERVAL_MS", global = true)]
    pub interval_ms: Option<u64>,

    /// Camera used at startup (front or back)
    #[arg(long, env = "INTRUDER_CAM_FACING", global = true)]
    pub facing: Option<CameraFacing>,

    /// Flash policy (off, on, auto)
    #[arg(long, env = "INTRUDER_CAM_FLASH", global = true)]
    pub flash: Option<FlashPolicy>,

    /// Retention policy (rotate, rotate-eager, overwrite, overwrite:<name>)
    #[arg(long, env = "INTRUDER_CAM_RETENTION", global = true)]
    pub retention: Option<RetentionPolicy>,

    /// Directory for captured images
    #[arg(long, env = "INTRUDER_CAM_STORAGE_DIR", global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Camera source (v4l2[:front[,back]] or file:front[,back])
    #[arg(long, env = "INTRUDER_CAM_SOURCE", global = true)]
    pub source: Option<CameraSourceConfig>,
}

impl Overrides {
    /// Config file (or defaults) with the overrides applied, validated
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.capture_interval_ms = interval_ms;
        }
        if let Some(facing) = self.facing {
            config.facing = facing;
        }
        if let Some(flash) = self.flash {
            config.flash = flash;
        }
        if let Some(retention) = &self.retention {
            config.retention = retention.clone();
        }
        if let Some(dir) = &self.storage_dir {
            config.storage_dir = Some(dir.clone());
        }
        if let Some(source) = &self.source {
            config.source = source.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

/// Camera source and matching permission provider for the configured source
fn build_camera(
    config: &Config,
) -> Result<(Arc<dyn CameraSource>, Arc<dyn PermissionProvider>), ConfigError> {
    match &config.source {
        CameraSourceConfig::File { front, back } => {
            let camera: Arc<dyn CameraSource> =
                Arc::new(FileCameraSource::new(front.clone(), back.clone()));
            let permission: Arc<dyn PermissionProvider> = Arc::new(StaticPermission::granted());
            Ok((camera, permission))
        }
        #[cfg(target_os = "linux")]
        CameraSourceConfig::V4l2 { front, back } => {
            let configured: Vec<PathBuf> =
                front.iter().chain(back.iter()).map(PathBuf::from).collect();
            let permission: Arc<dyn PermissionProvider> = if configured.is_empty() {
                Arc::new(DeviceNodePermission::default())
            } else {
                Arc::new(DeviceNodePermission::for_nodes(configured))
            };
            let camera: Arc<dyn CameraSource> =
                Arc::new(V4l2CameraSource::new(front.clone(), back.clone()));
            Ok((camera, permission))
        }
        #[cfg(not(target_os = "linux"))]
        CameraSourceConfig::V4l2 { .. } => Err(ConfigError::InvalidSource(
            "V4L2 capture is only available on Linux".to_string(),
        )),
    }
}

async fn build_pipeline(config: &Config) -> AppResult<CapturePipeline> {
    let base = config.api_base()?;
    let (camera, provider) = build_camera(config)?;

    let fs: Arc<dyn Filesystem> = Arc::new(TokioFilesystem);
    let store = ArtifactStore::new(fs.clone(), config.storage_dir(), config.retention.clone());
    store.prepare().await?;

    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(config.request_timeout())?);
    let uploader = UploadClient::new(transport, fs, &base, config.upload.clone());
    let permission = Arc::new(PermissionGate::new(provider));

    info!(
        base_url = %base,
        storage = %store.dir().display(),
        retention = %config.retention,
        flash = %config.flash,
        "Capture pipeline configured"
    );

    let cycle = CaptureCycle::new(camera, store, uploader, permission, config.flash);
    Ok(CapturePipeline::new(cycle, config.facing))
}

/// Input from the terminal and signal handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    ToggleFacing,
    RetryPermission,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "f" | "flip" => Some(Command::ToggleFacing),
            "p" | "permission" => Some(Command::RetryPermission),
            "q" | "quit" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Run the pipeline until `q` or Ctrl+C
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut pipeline = build_pipeline(&config).await?;
    let handle = pipeline.handle();

    let (commands_tx, mut commands) = mpsc::unbounded_channel();

    // Set up Ctrl+C handler
    let ctrlc_tx = commands_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Command::Quit);
    })?;

    // Blocking stdin reader; ends quietly when stdin is not a terminal
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match Command::parse(&line) {
                Some(command) => {
                    if commands_tx.send(command).is_err() {
                        break;
                    }
                }
                None => debug!(input = %line, "Ignoring unknown command"),
            }
        }
    });

    pipeline.start(config.capture_interval())?;

    println!(
        "Capturing every {} ms to {} (f: switch camera, p: retry permission, q: quit)",
        config.capture_interval_ms,
        config.base_url
    );

    let mut clock = tokio::time::interval(CLOCK_REFRESH);
    let mut snapshots = handle.subscribe();

    loop {
        tokio::select! {
            _ = clock.tick() => {
                print_status(&snapshots.borrow())?;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                print_status(&snapshots.borrow_and_update())?;
            }
            command = commands.recv() => match command {
                Some(Command::ToggleFacing) => {
                    let facing = handle.toggle_facing();
                    info!(%facing, "Switching camera for the next capture");
                }
                Some(Command::RetryPermission) => {
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        handle.retry_permission().await;
                    });
                }
                Some(Command::Quit) | None => break,
            },
        }
    }

    println!();
    println!("Stopping...");
    pipeline.stop().await?;

    let snapshot = pipeline.snapshot();
    println!(
        "Stopped after {} cycles ({} uploaded, {} skipped, {} failed captures, {} failed uploads)",
        snapshot.stats.cycles_completed,
        snapshot.stats.successes,
        snapshot.stats.skipped,
        snapshot.stats.capture_failures,
        snapshot.stats.upload_failures
    );
    Ok(())
}

fn print_status(snapshot: &PipelineSnapshot) -> std::io::Result<()> {
    let last = snapshot
        .last_result
        .as_ref()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "waiting for first capture".to_string());
    let preview = snapshot
        .preview
        .as_ref()
        .map(|a| a.preview_uri())
        .unwrap_or_else(|| "-".to_string());

    let mut stdout = std::io::stdout().lock();
    write!(
        stdout,
        "\r\x1b[2K{} | {} camera: {} | permission {} | {} | {} | preview: {}",
        Local::now().format("%H:%M:%S"),
        snapshot.facing,
        snapshot.device_status,
        snapshot.permission,
        snapshot.state,
        last,
        preview
    )?;
    stdout.flush()
}

/// Run exactly one cycle
pub async fn capture_once(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut pipeline = build_pipeline(&config).await?;
    println!("Capturing with the {} camera...", config.facing);

    let result = pipeline.run_once().await?;
    println!("Result: {}", result);
    if let Some(artifact) = result.artifact() {
        println!("Saved: {}", artifact.path.display());
    }
    if let CycleResult::Success { response, .. } = &result {
        if let Some(is_intruder) = response.is_intruder() {
            println!("Intruder: {}", if is_intruder { "yes" } else { "no" });
        }
    }
    Ok(())
}

/// List the cameras the configured source can serve
pub async fn list_devices(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let (camera, _) = build_camera(&config)?;
    let devices = camera.list_devices().await;

    if devices.is_empty() {
        println!("No cameras found.");
    } else {
        println!("Assigned cameras:");
        println!();
        for device in &devices {
            println!("  [{}] {}", device.facing, device.name);
            println!("      Path: {}", device.path);
            if let Some(info) = &device.device_info {
                println!("      Driver: {} ({})", info.driver, info.real_path);
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        if matches!(config.source, CameraSourceConfig::V4l2 { .. }) {
            let nodes = tokio::task::spawn_blocking(v4l2_utils::enumerate_capture_nodes).await?;
            println!();
            println!("MJPEG capture nodes:");
            for node in nodes {
                println!("  {} - {} [{}]", node.path, node.card, node.driver);
            }
        }
    }

    Ok(())
}

/// Print the classifier's reports
pub async fn show_reports(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let base = config.api_base()?;
    let transport: Arc<dyn HttpTransport> =
        Arc::new(ReqwestTransport::new(config.request_timeout())?);
    let reports = ReportsClient::new(transport, base).fetch().await?;

    if reports.is_empty() {
        println!("No reports.");
        return Ok(());
    }

    println!("{:>6}  {:<8}  {:<19}  Image", "ID", "Intruder", "Created");
    for report in &reports {
        println!(
            "{:>6}  {:<8}  {:<19}  {}",
            report.id,
            if report.is_intruder { "yes" } else { "no" },
            report.created_local().format("%Y-%m-%d %H:%M:%S"),
            report.image
        );
    }
    Ok(())
}
