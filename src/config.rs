use serde::Deserialize;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_file_size: usize,
    /// SQLite file; `None` keeps the word store in memory.
    pub database_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_file_size: default_max_file_size(),
            database_path: None,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(addr) = lookup("VOCAB_BIND_ADDR") {
            config.bind_addr = addr.parse()
                .with_context(|| format!("Invalid VOCAB_BIND_ADDR: {}", addr))?;
        }

        if let Some(size) = lookup("VOCAB_MAX_FILE_SIZE") {
            config.max_file_size = size.parse()
                .with_context(|| format!("Invalid VOCAB_MAX_FILE_SIZE: {}", size))?;
        }

        config.database_path = lookup("VOCAB_DATABASE_PATH")
            .filter(|path| !path.trim().is_empty());

        Ok(config)
    }
}

pub fn load_config() -> Result<Config> {
    Config::new()
}
