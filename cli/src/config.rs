use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use nutrack_core::advisor::DEFAULT_MODEL;
use nutrack_core::aggregate::DayBoundary;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub day_boundary: DayBoundary,
    pub openai_api_key: Option<String>,
    pub openai_url: String,
    pub openai_model: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "nutrack").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("nutrack.db");

        let day_boundary = match env_var("NUTRACK_UTC_OFFSET") {
            Some(offset) => DayBoundary::from_offset(&offset).context("NUTRACK_UTC_OFFSET")?,
            None => DayBoundary::Local,
        };

        Ok(Config {
            db_path,
            data_dir,
            day_boundary,
            openai_api_key: env_var("OPENAI_API_KEY"),
            openai_url: env_var("NUTRACK_OPENAI_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            openai_model: env_var("NUTRACK_OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}

/// Unset and blank variables are treated the same.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
