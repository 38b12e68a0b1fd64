use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use client_core::controller::DEFAULT_PAGE_SIZE;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "coursefinder.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub token_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "https://localhost:7236/api".into(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 15,
            token_file: default_token_file(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    page_size: Option<u32>,
    request_timeout_secs: Option<u64>,
    token_file: Option<PathBuf>,
}

fn default_token_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coursefinder")
        .join("token")
}

/// Defaults, then `path` (if readable), then environment variables.
pub fn load_settings(path: &Path) -> Settings {
    let raw = fs::read_to_string(path).ok();
    layer_settings(raw.as_deref(), |key| std::env::var(key).ok())
}

pub(crate) fn layer_settings(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.api_base_url {
                    settings.api_base_url = v;
                }
                if let Some(v) = file_cfg.page_size {
                    settings.page_size = v;
                }
                if let Some(v) = file_cfg.request_timeout_secs {
                    settings.request_timeout_secs = v;
                }
                if let Some(v) = file_cfg.token_file {
                    settings.token_file = v;
                }
            }
            Err(err) => tracing::warn!(error = %err, "ignoring malformed config file"),
        }
    }

    if let Some(v) = env("COURSEFINDER_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("APP__PAGE_SIZE") {
        if let Ok(parsed) = v.trim().parse::<u32>() {
            settings.page_size = parsed;
        }
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = env("APP__TOKEN_FILE") {
        settings.token_file = PathBuf::from(v);
    }

    settings.page_size = settings.page_size.max(1);
    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
