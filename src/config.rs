use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mail::session::ImapSettings;

const DEFAULT_SERVER: &str = "imap.gmail.com";
const DEFAULT_PORT: u16 = 993;
const DEFAULT_FOLDER: &str = "INBOX";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_LISTEN: &str = "0.0.0.0:3001";
pub const DEFAULT_RECENT_LIMIT: u32 = 20;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub user_email: String,
    pub imap_server: Option<String>,
    pub imap_port: Option<u16>,
    pub folder: Option<String>,
    /// Skip certificate verification. Only for servers with self-signed certs.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    pub timeout_secs: Option<u64>,
    pub listen_addr: Option<String>,
    pub recent_limit: Option<u32>,
}

impl Config {
    pub fn server(&self) -> &str {
        self.imap_server.as_deref().unwrap_or(DEFAULT_SERVER)
    }

    pub fn folder(&self) -> &str {
        self.folder.as_deref().unwrap_or(DEFAULT_FOLDER)
    }

    pub fn listen_addr(&self) -> &str {
        self.listen_addr.as_deref().unwrap_or(DEFAULT_LISTEN)
    }

    pub fn recent_limit(&self) -> u32 {
        self.recent_limit.unwrap_or(DEFAULT_RECENT_LIMIT)
    }

    /// Freeze the connection settings handed to the connector.
    pub fn imap_settings(&self, password: String) -> ImapSettings {
        ImapSettings {
            host: self.server().to_string(),
            port: self.imap_port.unwrap_or(DEFAULT_PORT),
            username: self.user_email.clone(),
            password,
            accept_invalid_certs: self.accept_invalid_certs,
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join("inbox_api"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

fn template() -> Config {
    Config {
        user_email: "you@example.com".to_string(),
        imap_server: Some(DEFAULT_SERVER.to_string()),
        imap_port: Some(DEFAULT_PORT),
        folder: Some(DEFAULT_FOLDER.to_string()),
        accept_invalid_certs: false,
        timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
        listen_addr: Some(DEFAULT_LISTEN.to_string()),
        recent_limit: Some(DEFAULT_RECENT_LIMIT),
    }
}

/// Load the config from `explicit`, or from the per-user config dir.
/// A missing default file is replaced by a template to edit.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let path = config_path()?;
            if !path.exists() {
                let tom = toml::to_string_pretty(&template())?;
                fs::write(&path, tom)?;
                return Err(anyhow!(
                    "Created template config at {} — edit it and run again",
                    path.display()
                ));
            }
            path
        }
    };
    let s = fs::read_to_string(&path)
        .map_err(|e| anyhow!("cannot read config {}: {e}", path.display()))?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(s)?;
    if cfg.recent_limit == Some(0) {
        return Err(anyhow!("recent_limit must be at least 1"));
    }
    Ok(cfg)
}
