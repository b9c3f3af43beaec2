use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Supplies the interactive answers a run needs: which files to process
/// and which model selector to use. Injectable so the flow can run
/// headlessly without a display or terminal attached.
pub trait InputProvider {
    /// Ordered list of input files; empty when the user cancels.
    fn select_files(&self) -> Result<Vec<PathBuf>>;

    /// Model selector, falling back to `default` on blank input.
    fn choose_model(&self, default: &str) -> Result<String>;
}

/// Interactive provider: native file dialog plus a console prompt
#[derive(Debug, Default)]
pub struct DialogProvider;

impl InputProvider for DialogProvider {
    fn select_files(&self) -> Result<Vec<PathBuf>> {
        let picked = rfd::FileDialog::new()
            .set_title("Select MP3 Files")
            .add_filter("MP3 Files", &["mp3"])
            .add_filter("All Files", &["*"])
            .pick_files();

        Ok(picked.unwrap_or_default())
    }

    fn choose_model(&self, default: &str) -> Result<String> {
        println!("Select a Whisper model: (base, small, medium, large)");
        print!("Enter model name (default: {}): ", default);
        std::io::stdout().flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;

        let chosen = line.trim();
        Ok(if chosen.is_empty() {
            default.to_string()
        } else {
            chosen.to_string()
        })
    }
}

/// Canned answers for headless runs and tests
#[derive(Debug, Clone, Default)]
pub struct FixedProvider {
    pub files: Vec<PathBuf>,
    pub model: Option<String>,
}

impl InputProvider for FixedProvider {
    fn select_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.files.clone())
    }

    fn choose_model(&self, default: &str) -> Result<String> {
        Ok(self
            .model
            .clone()
            .unwrap_or_else(|| default.to_string()))
    }
}

/// Persist the selection list so a later invocation can inspect or reuse it.
pub fn save_selection(path: &Path, files: &[PathBuf]) -> Result<()> {
    let json_data = serde_json::to_string_pretty(files)?;
    std::fs::write(path, json_data)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if files.is_empty() {
        warn!("no MP3 files selected");
    } else {
        info!(
            "selected {} file(s), list saved to {}",
            files.len(),
            path.display()
        );
    }

    Ok(())
}

/// Load a previously persisted selection list.
pub fn load_selection(path: &Path) -> Result<Vec<PathBuf>> {
    let json_data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json_data)
        .with_context(|| format!("failed to parse {}", path.display()))
}
