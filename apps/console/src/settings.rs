//! Persisted console settings: which device to talk to and the opaque admin
//! token, the console-side analog of the browser's localStorage entry.
//! Resolution order is defaults, then the config file, then environment.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const URL_ENV: &str = "ALARM_CONSOLE_URL";
pub const TOKEN_ENV: &str = "ALARM_CONSOLE_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Defaulted so a hand-edited file carrying only the token still loads.
    #[serde(default = "default_device_url")]
    pub device_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

/// The device's AP-mode address; a configured device is usually reached by
/// its LAN address instead.
fn default_device_url() -> String {
    "http://192.168.4.1".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_url: default_device_url(),
            admin_token: None,
        }
    }
}

pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("alarm-console").join("config.toml"))
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Some(path) = settings_path() {
        if let Ok(raw) = fs::read_to_string(&path) {
            match toml::from_str::<Settings>(&raw) {
                Ok(file_cfg) => settings = file_cfg,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "ignoring unreadable settings file")
                }
            }
        }
    }

    if let Ok(v) = std::env::var(URL_ENV) {
        if !v.is_empty() {
            settings.device_url = v;
        }
    }
    if let Ok(v) = std::env::var(TOKEN_ENV) {
        settings.admin_token = if v.is_empty() { None } else { Some(v) };
    }

    settings
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let path = settings_path().context("no user config directory on this system")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    let raw = toml::to_string_pretty(settings).context("failed to encode settings")?;
    fs::write(&path, raw).with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_toml() {
        let settings = Settings {
            device_url: "http://192.168.1.40".into(),
            admin_token: Some("opaque-token".into()),
        };
        let raw = toml::to_string_pretty(&settings).unwrap();
        let back: Settings = toml::from_str(&raw).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn missing_token_key_reads_as_none() {
        let back: Settings = toml::from_str("device_url = \"http://device\"").unwrap();
        assert_eq!(back.admin_token, None);
        assert_eq!(back.device_url, "http://device");
    }

    #[test]
    fn default_points_at_ap_mode_address() {
        assert_eq!(Settings::default().device_url, "http://192.168.4.1");
    }

    #[test]
    fn token_only_file_keeps_the_token() {
        let back: Settings = toml::from_str("admin_token = \"opaque-token\"").unwrap();
        assert_eq!(back.admin_token.as_deref(), Some("opaque-token"));
        assert_eq!(back.device_url, Settings::default().device_url);
    }
}
