use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod audio;
mod config;
mod pipeline;
mod selection;
mod transcription;

use crate::config::Config;
use crate::pipeline::BatchProcessor;
use crate::selection::{save_selection, DialogProvider, InputProvider};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("mp3-captioner")
        .version("0.1.0")
        .about("Generates SRT subtitles for MP3 recordings via Whisper")
        .arg(
            Arg::new("files")
                .value_name("FILE")
                .num_args(0..)
                .help("MP3 files to caption (opens a file picker when omitted)"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("NAME")
                .help("Whisper model selector (prompted interactively when omitted)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    config.validate()?;

    init_logging(&config, matches.get_flag("verbose"))?;

    info!("🚀 mp3-captioner starting...");

    let provider = DialogProvider;

    let cli_files: Vec<PathBuf> = matches
        .get_many::<String>("files")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();

    let files = if cli_files.is_empty() {
        println!("Select the MP3 files to caption...");
        provider.select_files()?
    } else {
        cli_files
    };

    save_selection(&config.output.selection_file, &files)?;

    if files.is_empty() {
        println!("No files selected.");
        return Ok(());
    }

    let model = match matches.get_one::<String>("model") {
        Some(model) => model.clone(),
        None => provider.choose_model(&config.transcription.model)?,
    };

    let processor = BatchProcessor::new(config);

    let start_time = std::time::Instant::now();
    let report = processor.process_batch(&files, &model).await;
    let duration = start_time.elapsed();

    info!("🎉 Processing completed in {:.2}s", duration.as_secs_f64());
    info!("✅ Successful: {}", report.successful);
    info!("❌ Failed: {}", report.failed);
    info!(
        "📊 Success rate: {:.1}%",
        if report.total > 0 {
            report.successful as f64 / report.total as f64 * 100.0
        } else {
            0.0
        }
    );

    Ok(())
}

/// Console logging mirrored into the configured append-only log file.
fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "mp3_captioner=debug,info"
    } else {
        "mp3_captioner=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.output.log_file)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    Ok(())
}
