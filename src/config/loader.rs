//! Configuration loader with tier-based merging.
//!
//! Tiers, lowest priority first: embedded defaults, user file, project file,
//! explicit file, environment variables.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    /// `~/.wiki-graph/config.yaml`
    User = 1,
    /// `$CWD/wiki-graph/config.yaml`
    Project = 2,
    /// `--config` or `WIKI_GRAPH_CONFIG_PATH`
    Explicit = 3,
    Environment = 4,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::Explicit => write!(f, "explicit"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Where each file tier is read from.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub user_dir: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub explicit_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover tier locations from the process environment.
    pub fn discover(explicit_file: Option<PathBuf>) -> Self {
        let user_dir = std::env::var("WIKI_GRAPH_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".wiki-graph")));

        let project_dir = std::env::var("WIKI_GRAPH_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("wiki-graph")));

        let explicit_file = explicit_file.or_else(|| {
            std::env::var("WIKI_GRAPH_CONFIG_PATH")
                .ok()
                .map(PathBuf::from)
        });

        Self {
            user_dir,
            project_dir,
            explicit_file,
        }
    }
}

/// Loads and merges every configuration tier.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, in merge order.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load from discovered locations and the process environment.
    pub fn load(explicit_file: Option<PathBuf>) -> Result<Self> {
        Self::load_with(ConfigPaths::discover(explicit_file), |key| {
            std::env::var(key).ok()
        })
    }

    /// Load with explicit tier locations and an environment lookup.
    pub fn load_with<F>(paths: ConfigPaths, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut layers: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut sources = Vec::new();

        let file_tiers = [
            (
                ConfigTier::User,
                paths.user_dir.as_ref().map(|d| d.join(CONFIG_FILE_NAME)),
            ),
            (
                ConfigTier::Project,
                paths.project_dir.as_ref().map(|d| d.join(CONFIG_FILE_NAME)),
            ),
        ];

        for (tier, file) in file_tiers {
            let Some(file) = file else { continue };
            if !file.exists() {
                continue;
            }
            match read_yaml(&file) {
                Ok(value) => {
                    layers.push(value);
                    sources.push((tier, file));
                }
                Err(e) => warn!("Ignoring {} config {}: {:#}", tier, file.display(), e),
            }
        }

        // An explicit file was asked for by name, so failing to read it is fatal
        if let Some(file) = &paths.explicit_file {
            let value = read_yaml(file)
                .with_context(|| format!("failed to load config file {}", file.display()))?;
            layers.push(value);
            sources.push((ConfigTier::Explicit, file.clone()));
        }

        let merged = deep_merge_all(layers);
        let mut config: Config = serde_json::from_value(merged)?;

        apply_env_overrides(&mut config, env)?;
        config.validate()?;

        for (tier, file) in &sources {
            debug!("Loaded {} config from {}", tier, file.display());
        }

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&content)?;
    Ok(value)
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("invalid value '{}' for {}: {}", raw, key, e))
}

/// Apply environment variable overrides (highest tier).
fn apply_env_overrides<F>(config: &mut Config, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = env("WIKI_GRAPH_DB_PATH") {
        config.database.path = PathBuf::from(path);
    }

    if let Some(key) = env("WIKI_GRAPH_ROUTING_KEY") {
        config.queue.routing_key = key;
    }

    if let Some(url) = env("WIKIPEDIA_API_URL") {
        config.wiki.api_url = url;
    }

    if let Some(raw) = env("WIKIPEDIA_API_RPS") {
        config.wiki.max_rps = parse_env("WIKIPEDIA_API_RPS", &raw)?;
    }

    if let Some(raw) = env("BFS_DISTANCE_THRESHOLD") {
        config.algorithm.distance_threshold = parse_env("BFS_DISTANCE_THRESHOLD", &raw)?;
    }

    if let Some(raw) = env("BFS_WORKER_COUNT") {
        config.algorithm.worker_count = parse_env("BFS_WORKER_COUNT", &raw)?;
    }

    if let Some(addr) = env("WIKI_GRAPH_SERVER_ADDR") {
        config.server.addr = addr;
    }

    if let Some(url) = env("WIKI_GRAPH_SERVER_URL") {
        config.client.server_url = url;
    }

    Ok(())
}
