// src/cfg/config.rs

use eyre::{eyre, Result};
use log::{debug, error};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What happens to uidValidity/uidNext when a mailbox is renamed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenamePolicy {
    /// Keep both; UIDs carry over unchanged.
    #[default]
    Preserve,
    /// New uidValidity, UIDs renumbered from 1.
    Reset,
}

/// What happens to children when a mailbox is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletePolicy {
    /// Only the named mailbox goes away.
    #[default]
    KeepChildren,
    /// The mailbox and every descendant go away.
    Subtree,
    /// Deleting a mailbox that has children fails.
    RefuseWithChildren,
}

macro_rules! plain_enum_str {
    ($ty:ty) => {
        impl FromStr for $ty {
            type Err = serde_plain::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                serde_plain::from_str(s)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = serde_plain::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&s)
            }
        }
    };
}

plain_enum_str!(RenamePolicy);
plain_enum_str!(DeletePolicy);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreConfig {
    #[default]
    Memory,
    Fs(PathBuf),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub delimiter: String,

    #[serde(alias = "rename_policy", rename = "rename-policy")]
    pub rename_policy: RenamePolicy,

    #[serde(alias = "delete_policy", rename = "delete-policy")]
    pub delete_policy: DeletePolicy,

    /// Largest message accepted by append/copy, in bytes.
    #[serde(alias = "append_limit", rename = "append-limit")]
    pub append_limit: Option<u32>,

    #[serde(deserialize_with = "deserialize_store")]
    pub store: StoreConfig,

    /// Users created at startup, each with an INBOX.
    pub users: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: ".".to_string(),
            rename_policy: RenamePolicy::default(),
            delete_policy: DeletePolicy::default(),
            append_limit: None,
            store: StoreConfig::default(),
            users: Vec::new(),
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("imap-mailstore").join("config.yml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.delimiter.chars().count() != 1 {
            return Err(eyre!(
                "delimiter must be a single character, got '{}'",
                self.delimiter
            ));
        }
        if let Some(dup) = self
            .users
            .iter()
            .enumerate()
            .find(|(ix, u)| self.users[..*ix].contains(u))
            .map(|(_, u)| u)
        {
            return Err(eyre!("user '{}' is listed more than once", dup));
        }
        Ok(())
    }
}

pub fn load_config(config_path: &Path) -> Result<Config> {
    debug!("Loading configuration from {:?}", config_path);

    let content = fs::read_to_string(config_path).map_err(|e| {
        error!("Failed to read config file {}: {}", config_path.display(), e);
        eyre!("Failed to read config file {}: {}", config_path.display(), e)
    })?;

    let cfg: Config = serde_yaml::from_str(&content).map_err(|e| {
        error!("Failed to parse YAML: {}", e);
        eyre!("Failed to parse YAML: {}", e)
    })?;
    cfg.validate()?;

    debug!("Successfully loaded configuration");
    Ok(cfg)
}

/// Accepts `memory`, `fs` (platform data dir) or `{ fs: <dir> }`.
fn deserialize_store<'de, D>(deserializer: D) -> std::result::Result<StoreConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer).map_err(de::Error::custom)?;
    match v {
        Value::Null => Ok(StoreConfig::Memory),
        Value::String(s) => match s.as_str() {
            "memory" => Ok(StoreConfig::Memory),
            "fs" => Ok(StoreConfig::Fs(crate::store::FsStore::default_root())),
            other => Err(de::Error::custom(format!("unknown store '{}'", other))),
        },
        Value::Mapping(map) => {
            if map.len() != 1 {
                return Err(de::Error::custom("`store` must have exactly one kind→settings"));
            }
            let Some((k, v)) = map.into_iter().next() else {
                return Err(de::Error::custom("`store` is empty"));
            };
            match (k, v) {
                (Value::String(k), Value::String(dir)) if k == "fs" => Ok(StoreConfig::Fs(PathBuf::from(dir))),
                (Value::String(k), Value::Null) if k == "memory" => Ok(StoreConfig::Memory),
                _ => Err(de::Error::custom("`store` must be `memory` or `{ fs: <dir> }`")),
            }
        }
        _ => Err(de::Error::custom("Invalid `store` entry")),
    }
}
