use anyhow::Result;
use mp3_captioner::{Config, WhisperTranscriber};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("check_backends=info,mp3_captioner=info")
        .init();

    let config = Config::load().unwrap_or_default();

    info!("🔍 Checking external toolchain availability...");

    for tool in [&config.audio.ffmpeg_path, &config.audio.ffprobe_path] {
        let available = tokio::process::Command::new(tool)
            .arg("-version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false);

        if available {
            info!("✅ {} available", tool.display());
        } else {
            info!("❌ {} not found", tool.display());
            info!("💡 Install ffmpeg, or point mp3-captioner.toml at its location");
        }
    }

    match WhisperTranscriber::check_availability().await {
        Ok(backend_info) => {
            info!("✅ {}", backend_info);
        }
        Err(e) => {
            info!("❌ {}", e);
            return Ok(());
        }
    }

    info!("📋 Known Whisper models:");
    for model in WhisperTranscriber::known_models() {
        info!("   - {}", model);
    }

    info!("🎉 All captioning components ready!");
    Ok(())
}
