use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context};
use url::Url;

pub const SETTINGS_FILE: &str = "receiving.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub facility_id: String,
    pub api_token: Option<String>,
    pub view_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080/api".into(),
            facility_id: String::new(),
            api_token: None,
            view_size: 20,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server_url '{}'", self.server_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("server_url must start with http:// or https://");
        }
        if self.view_size == 0 {
            bail!("view_size must be greater than zero");
        }
        Ok(())
    }
}

/// Defaults, then `receiving.toml`, then environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string(Path::new(SETTINGS_FILE)) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// File values are flat strings; unknown keys and unparsable files are ignored.
pub fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = v.clone();
    }
    if let Some(v) = file_cfg.get("facility_id") {
        settings.facility_id = v.clone();
    }
    if let Some(v) = file_cfg.get("api_token") {
        settings.api_token = Some(v.clone());
    }
    if let Some(parsed) = file_cfg.get("view_size").and_then(|v| v.parse().ok()) {
        settings.view_size = parsed;
    }
}

pub fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("RECEIVING_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__FACILITY_ID") {
        settings.facility_id = v;
    }
    if let Some(v) = lookup("APP__API_TOKEN") {
        settings.api_token = Some(v);
    }
    if let Some(parsed) = lookup("APP__VIEW_SIZE").and_then(|v| v.parse().ok()) {
        settings.view_size = parsed;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
