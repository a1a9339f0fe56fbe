use anyhow::Result;
use clap::Parser;
use lcdscope::audio::FRAME_LEN;
use lcdscope::{
    App, ConfigManager, DeviceWriter, EndpointTransport, ImonLcd, MonitorCapture,
    PactlVolumeSource, SpectrumAnalyzer,
};
use log::{debug, error, info};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// lcdscope - spectrum analyzer for the iMON LCD
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Config file to use instead of the default location
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// ALSA capture PCM, overrides the config file
    #[clap(long)]
    audio_device: Option<String>,

    /// Write the effective settings to the config file and exit
    #[clap(long)]
    save_config: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

// One thread runs every callback; nothing here may block after startup
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configure logging based on debug flag
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
        debug!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut config = match args.config {
        Some(path) => ConfigManager::with_file(path)?,
        None => ConfigManager::new()?,
    };
    if let Some(device) = args.audio_device {
        config.settings_mut().audio_device = Some(device);
    }
    if args.save_config {
        config.save()?;
        info!("Saved settings to {}", config.config_file().display());
        return Ok(());
    }
    let settings = config.settings().clone();
    info!("Starting lcdscope");

    // Setup failures are fatal: without the FFT, the panel or the stream there is nothing to do
    let analyzer = SpectrumAnalyzer::new(FRAME_LEN)?;
    let (fault_tx, fault_rx) = mpsc::unbounded_channel();
    // Capture first: it sets the source variable before any worker thread exists
    let (capture, samples) = MonitorCapture::open(
        settings.audio_device.as_deref(),
        &settings.monitor_source,
        fault_tx.clone(),
    )?;
    let transport = EndpointTransport::spawn(ImonLcd::open()?, fault_tx);
    let writer = DeviceWriter::with_timeout(transport, settings.transfer_timeout());
    info!(
        "Capturing '{}' from {}",
        capture.device_name(),
        settings.monitor_source
    );
    let volume = PactlVolumeSource::new(settings.volume_sink.clone()).spawn();

    let mut app = App::new(analyzer, writer, capture, settings.overlay_timeout());
    let result = app.run(samples, volume, fault_rx, shutdown_signal()).await;
    if let Err(e) = &result {
        error!("{}", e);
    }

    // The device is released even after a fatal error
    app.close().await?;
    result?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
