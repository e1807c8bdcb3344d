use crate::config::{validate_policy_id, Config, Network};
use crate::retry::RetryPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "tokendrop_settings.json";

/// A policy the user looks up holders for regularly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedPolicy {
    /// Display name, e.g. the collection name
    pub label: String,
    /// 56-char hex policy ID, lowercase
    pub policy_id: String,
}

fn default_retry() -> RetryPolicy {
    RetryPolicy::default()
}

/// User settings that persist between sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSettings {
    #[serde(default)]
    pub network: Network,
    /// Blacklist service endpoint, if any
    #[serde(default)]
    pub blacklist_url: Option<String>,
    #[serde(default)]
    pub koios_url: Option<String>,
    #[serde(default)]
    pub saved_policies: Vec<SavedPolicy>,
    #[serde(default = "default_retry")]
    pub retry: RetryPolicy,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            network: Network::default(),
            blacklist_url: None,
            koios_url: None,
            saved_policies: Vec::new(),
            retry: default_retry(),
        }
    }
}

impl UserSettings {
    /// Get the settings file path
    pub fn settings_path() -> PathBuf {
        // App data directory, falling back to the current directory
        if let Some(config_dir) = dirs::config_dir() {
            let app_dir = config_dir.join("tokendrop");
            if !app_dir.exists() {
                let _ = fs::create_dir_all(&app_dir);
            }
            app_dir.join(SETTINGS_FILE)
        } else {
            PathBuf::from(SETTINGS_FILE)
        }
    }

    /// Load settings from the default location, or defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::settings_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => {
                        tracing::info!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse settings file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read settings file: {}", e);
                }
            }
        }
        tracing::info!("Using default settings");
        Self::default()
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        tracing::info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn settings_path_display() -> String {
        Self::settings_path().display().to_string()
    }

    /// Base configuration from saved settings; env vars and flags go on top.
    pub fn to_config(&self) -> Result<Config> {
        let mut config = Config::new(self.network);
        config.retry = self.retry.clone();
        if let Some(url) = self.koios_url.as_deref().filter(|u| !u.trim().is_empty()) {
            config.set_koios_url(url)?;
        }
        if let Some(url) = self.blacklist_url.as_deref().filter(|u| !u.trim().is_empty()) {
            config.set_blacklist_url(url)?;
        }
        Ok(config)
    }

    /// Save a policy; returns false if the ID is already saved.
    pub fn add_policy(&mut self, label: &str, policy_id: &str) -> Result<bool> {
        let policy_id = validate_policy_id(policy_id)?;
        if self.saved_policies.iter().any(|p| p.policy_id == policy_id) {
            return Ok(false);
        }
        self.saved_policies.push(SavedPolicy {
            label: label.trim().to_string(),
            policy_id,
        });
        Ok(true)
    }

    /// Remove by policy ID or label
    pub fn remove_policy(&mut self, key: &str) -> bool {
        let key = key.trim();
        let before = self.saved_policies.len();
        self.saved_policies
            .retain(|p| !p.policy_id.eq_ignore_ascii_case(key) && p.label != key);
        self.saved_policies.len() < before
    }

    /// Resolve a label to its policy ID; anything else is passed through.
    pub fn resolve_policy(&self, key: &str) -> String {
        self.saved_policies
            .iter()
            .find(|p| p.label == key)
            .map(|p| p.policy_id.clone())
            .unwrap_or_else(|| key.to_string())
    }
}
