// src/host/rcon.rs

//! [`Host`] implementation for a Minecraft server reachable over RCON.
//!
//! RCON cannot answer permission queries, so session capabilities come from
//! the `[host.capabilities]` table of the config. Minecraft has no per-world
//! autosave switch over RCON either: `save-off` / `save-on` act on the whole
//! server, which is reported as a single region named after `level-name`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, anyhow};
use minecraft_client_rs::Client;
use tokio::fs;
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::config::HostSection;
use crate::errors::{BackupError, Result};

use super::{Host, HostFuture, Region, Session};

const DEFAULT_RCON_PORT: u16 = 25575;
const DEFAULT_LEVEL_NAME: &str = "world";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RconSettings {
    pub address: String,
    pub password: String,
}

/// Settings read from `server.properties`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerProperties {
    pub rcon: Option<RconSettings>,
    pub level_name: Option<String>,
}

pub struct RconHost {
    address: String,
    password: String,
    level_name: String,
    capabilities: BTreeMap<String, Vec<String>>,
}

impl std::fmt::Debug for RconHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconHost")
            .field("address", &self.address)
            .field("level_name", &self.level_name)
            .finish_non_exhaustive()
    }
}

impl RconHost {
    pub fn new(settings: RconSettings, level_name: String) -> Self {
        Self {
            address: settings.address,
            password: settings.password,
            level_name,
            capabilities: BTreeMap::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: BTreeMap<String, Vec<String>>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Build a host from `[host]`, falling back to `server.properties` in
    /// `server_root` for anything not configured explicitly.
    ///
    /// Returns `Ok(None)` when RCON is neither configured nor enabled.
    pub async fn from_config(section: &HostSection, server_root: &Path) -> Result<Option<Self>> {
        let props = load_server_properties(server_root).await?;
        let level_name = props
            .level_name
            .unwrap_or_else(|| DEFAULT_LEVEL_NAME.to_string());

        let settings = match (&section.rcon_address, &section.rcon_password) {
            (Some(address), Some(password)) => Some(RconSettings {
                address: address.clone(),
                password: password.clone(),
            }),
            (address, password) => props.rcon.map(|found| RconSettings {
                address: address.clone().unwrap_or(found.address),
                password: password.clone().unwrap_or(found.password),
            }),
        };

        Ok(settings.map(|s| Self::new(s, level_name).with_capabilities(section.capabilities.clone())))
    }

    pub async fn execute(&self, command: &str) -> Result<String> {
        let address = self.address.clone();
        let password = self.password.clone();
        let command = command.to_string();
        debug!(%command, "sending RCON command");

        let body = spawn_blocking(move || {
            let mut client = Client::new(address).map_err(|err| anyhow!(err.to_string()))?;
            client
                .authenticate(password)
                .map_err(|err| anyhow!(err.to_string()))?;
            let response = client
                .send_command(command)
                .map_err(|err| anyhow!(err.to_string()))?;
            client.close().map_err(|err| anyhow!(err.to_string()))?;
            Ok::<_, anyhow::Error>(response.body)
        })
        .await
        .context("RCON task failed")?
        .map_err(|err| BackupError::HostError(format!("{err:#}")))?;

        Ok(body)
    }

    fn session_for(&self, name: &str) -> Session {
        let capabilities: BTreeSet<String> = self
            .capabilities
            .iter()
            .filter(|(_, holders)| holders.iter().any(|h| h.eq_ignore_ascii_case(name)))
            .map(|(cap, _)| cap.clone())
            .collect();
        Session {
            name: name.to_string(),
            capabilities,
        }
    }
}

impl Host for RconHost {
    fn sessions(&self) -> HostFuture<'_, Vec<Session>> {
        Box::pin(async move {
            let body = self.execute("list").await?;
            Ok(parse_player_list(&body)
                .into_iter()
                .map(|name| self.session_for(&name))
                .collect())
        })
    }

    fn save_sessions(&self) -> HostFuture<'_, ()> {
        Box::pin(async move {
            self.execute("save-all").await?;
            Ok(())
        })
    }

    fn regions(&self) -> HostFuture<'_, Vec<Region>> {
        Box::pin(async move { Ok(vec![Region::new(self.level_name.clone())]) })
    }

    fn set_autosave<'a>(&'a self, _region: &'a Region, enabled: bool) -> HostFuture<'a, ()> {
        Box::pin(async move {
            self.execute(if enabled { "save-on" } else { "save-off" })
                .await?;
            Ok(())
        })
    }

    fn force_save<'a>(&'a self, _region: &'a Region) -> HostFuture<'a, ()> {
        Box::pin(async move {
            self.execute("save-all flush").await?;
            Ok(())
        })
    }

    fn broadcast<'a>(&'a self, message: &'a str) -> HostFuture<'a, ()> {
        Box::pin(async move {
            self.execute(&format!("say {message}")).await?;
            Ok(())
        })
    }

    fn notify_with_capability<'a>(
        &'a self,
        message: &'a str,
        capability: &'a str,
    ) -> HostFuture<'a, ()> {
        Box::pin(async move {
            for session in self.sessions().await? {
                if session.has_capability(capability) {
                    self.execute(&format!("tell {} {message}", session.name))
                        .await?;
                }
            }
            Ok(())
        })
    }
}

/// Extract player names from the response to `list`, e.g.
/// `There are 2 of a max of 20 players online: alex, steve`.
pub fn parse_player_list(body: &str) -> Vec<String> {
    let Some((_, names)) = body.split_once(':') else {
        return Vec::new();
    };
    names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn load_server_properties(server_root: &Path) -> Result<ServerProperties> {
    let properties_path = server_root.join("server.properties");
    let content = match fs::read_to_string(&properties_path).await {
        Ok(value) => value,
        Err(_) => return Ok(ServerProperties::default()),
    };
    parse_server_properties(&content)
}

pub fn parse_server_properties(content: &str) -> Result<ServerProperties> {
    let mut enabled = false;
    let mut port: Option<u16> = None;
    let mut password: Option<String> = None;
    let mut level_name: Option<String> = None;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "enable-rcon" => enabled = value.eq_ignore_ascii_case("true"),
            "rcon.port" => port = value.parse::<u16>().ok(),
            "rcon.password" if !value.is_empty() => password = Some(value.to_string()),
            "level-name" if !value.is_empty() => level_name = Some(value.to_string()),
            _ => {}
        }
    }

    let rcon = if enabled {
        let password = password.ok_or_else(|| {
            BackupError::ConfigError("server.properties enables RCON without rcon.password".into())
        })?;
        Some(RconSettings {
            address: format!("127.0.0.1:{}", port.unwrap_or(DEFAULT_RCON_PORT)),
            password,
        })
    } else {
        None
    };

    Ok(ServerProperties { rcon, level_name })
}
