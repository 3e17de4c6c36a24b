use burrow_session::SessionConfig;
use burrow_types::PackId;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub packs: Vec<PackEntry>,
}

/// One pack archive to serve.
#[derive(Debug, Deserialize)]
pub struct PackEntry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub id: PackId,
    #[serde(default)]
    pub content_key: String,
    #[serde(default)]
    pub download_url: String,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    19132
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            session: SessionConfig::default(),
            packs: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: ServerConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
