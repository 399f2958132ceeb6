use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "pager.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub origin: String,
    pub base_path: String,
    pub hidden_columns: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8080".into(),
            base_path: "/query".into(),
            hidden_columns: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    origin: Option<String>,
    base_path: Option<String>,
    hidden_columns: Option<Vec<String>>,
}

/// Defaults, then the TOML file, then environment variables.
///
/// An explicitly given `config_path` must exist; the default file is
/// optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if required => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.origin {
        settings.origin = v;
    }
    if let Some(v) = file_cfg.base_path {
        settings.base_path = v;
    }
    if let Some(v) = file_cfg.hidden_columns {
        settings.hidden_columns = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("PAGER_ORIGIN") {
        settings.origin = v;
    }
    if let Some(v) = var("APP__ORIGIN") {
        settings.origin = v;
    }

    if let Some(v) = var("PAGER_BASE_PATH") {
        settings.base_path = v;
    }
    if let Some(v) = var("APP__BASE_PATH") {
        settings.base_path = v;
    }

    if let Some(v) = var("APP__HIDDEN_COLUMNS") {
        settings.hidden_columns = v
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
    }
}

impl Settings {
    /// Command-line flags win over everything else.
    pub fn with_overrides(
        mut self,
        origin: Option<String>,
        base_path: Option<String>,
        hidden_columns: Vec<String>,
    ) -> Self {
        if let Some(origin) = origin {
            self.origin = origin;
        }
        if let Some(base_path) = base_path {
            self.base_path = base_path;
        }
        if !hidden_columns.is_empty() {
            self.hidden_columns = hidden_columns;
        }
        self
    }
}
