use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_RPC_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_DIFFICULTY: u32 = 4;
/// Hex digests are 64 characters long
pub const MAX_DIFFICULTY: u32 = 64;
pub const DEFAULT_MINING_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CHAIN_ID: u64 = 14006;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: String,
    pub rpc_addr: String,
    pub node_rpc_url: String,
    pub difficulty: u32,
    pub max_mining_attempts: Option<u64>,
    pub mining_timeout_secs: u64,
    pub chain_id: u64,
}

impl Config {
    fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path);
        PathBuf::from(expanded.into_owned())
    }

    fn base_dir() -> PathBuf {
        // Use a Windows-friendly folder to avoid tilde expansion issues.
        if cfg!(target_os = "windows") {
            if let Some(base) = dirs::data_dir() {
                return base.join("wChain");
            }
        }
        match dirs::home_dir() {
            Some(home) => home.join(".wchain"),
            None => PathBuf::from(".wchain"),
        }
    }

    fn default_data_dir() -> String {
        Self::base_dir().join("data").to_string_lossy().into_owned()
    }

    pub fn default_path() -> PathBuf {
        Self::base_dir().join("config.json")
    }

    /// Data directory with tilde expansion applied.
    pub fn data_dir_resolved(&self) -> PathBuf {
        Self::expand_path(&self.data_dir)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Read the config at `path`, writing defaults there first when the file
    /// does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        let path = Self::expand_path(&path.to_string_lossy());
        if !path.exists() {
            log::info!(
                "Configuration file not found. Creating default configuration: {}",
                path.display()
            );
            let cfg = Self::default();
            cfg.save_to(&path)?;
            return Ok(cfg);
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&data)
            .with_context(|| format!("configuration file format error in {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        check_difficulty(self.difficulty)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Update one key in memory. Numeric keys are parsed; `max_mining_attempts`
    /// accepts `none` to clear the bound.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "data_dir" => self.data_dir = value.to_string(),
            "rpc_addr" => self.rpc_addr = value.to_string(),
            "node_rpc_url" => self.node_rpc_url = value.to_string(),
            "difficulty" => {
                let difficulty = parse_number(key, value)?;
                check_difficulty(difficulty)?;
                self.difficulty = difficulty;
            }
            "max_mining_attempts" => {
                self.max_mining_attempts = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(parse_number(key, value)?)
                }
            }
            "mining_timeout_secs" => self.mining_timeout_secs = parse_number(key, value)?,
            "chain_id" => self.chain_id = parse_number(key, value)?,
            _ => bail!("Unknown configuration key: {}", key),
        }
        Ok(())
    }

    pub fn view(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn init_default(path: &Path) -> Result<Self> {
        let cfg = Self::default();
        cfg.save_to(path)?;
        Ok(cfg)
    }
}

fn check_difficulty(difficulty: u32) -> Result<()> {
    if !(1..=MAX_DIFFICULTY).contains(&difficulty) {
        bail!(
            "difficulty must be between 1 and {}, got {}",
            MAX_DIFFICULTY,
            difficulty
        );
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} expects a non-negative integer, got {:?}", key, value))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            rpc_addr: DEFAULT_RPC_ADDR.to_string(),
            node_rpc_url: format!("http://{}", DEFAULT_RPC_ADDR),
            difficulty: DEFAULT_DIFFICULTY,
            max_mining_attempts: None,
            mining_timeout_secs: DEFAULT_MINING_TIMEOUT_SECS,
            chain_id: DEFAULT_CHAIN_ID,
        }
    }
}
