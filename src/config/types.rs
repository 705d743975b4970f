//! Configuration types and their defaults.

use crate::bfs::BfsConfig;
use crate::links::ENGLISH_WIKIPEDIA_URL;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default address of the request server.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:9000";

/// SQLite storage shared by the task store and the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("wiki-graph/wiki-graph.db")
}

/// Durable task queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Routing key every task message is published under (default: "task").
    #[serde(default = "default_routing_key")]
    pub routing_key: String,

    /// Seconds an unsettled delivery stays hidden before redelivery (default: 900).
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_seconds: u64,

    /// Milliseconds between polls of an empty queue (default: 500).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Milliseconds a requeued message waits before it is visible again (default: 1000).
    #[serde(default = "default_requeue_delay_ms")]
    pub requeue_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            routing_key: default_routing_key(),
            visibility_timeout_seconds: default_visibility_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            requeue_delay_ms: default_requeue_delay_ms(),
        }
    }
}

impl QueueConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn requeue_delay(&self) -> Duration {
        Duration::from_millis(self.requeue_delay_ms)
    }
}

fn default_routing_key() -> String {
    "task".to_string()
}

fn default_visibility_timeout() -> u64 {
    900
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_requeue_delay_ms() -> u64 {
    1000
}

/// MediaWiki link source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Requests per second shared by all lookups of one worker process (default: 50).
    #[serde(default = "default_max_rps")]
    pub max_rps: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            max_rps: default_max_rps(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl WikiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn default_api_url() -> String {
    ENGLISH_WIKIPEDIA_URL.to_string()
}

fn default_max_rps() -> u32 {
    50
}

fn default_request_timeout() -> u64 {
    30
}

/// Search limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    /// Maximum hops before a target is declared unreachable (default: 2).
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: u32,

    /// Concurrent lookups per search (default: 100).
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_distance_threshold(),
            worker_count: default_worker_count(),
        }
    }
}

impl AlgorithmConfig {
    pub fn bfs(&self) -> BfsConfig {
        BfsConfig {
            distance_threshold: self.distance_threshold,
            worker_count: self.worker_count,
        }
    }
}

fn default_distance_threshold() -> u32 {
    2
}

fn default_worker_count() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Seconds after which a processing claim may be taken over by a redelivery (default: 600).
    #[serde(default = "default_stale_after")]
    pub stale_after_seconds: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            stale_after_seconds: default_stale_after(),
        }
    }
}

impl HandlerConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_seconds)
    }
}

fn default_stale_after() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address of the request server (default: 127.0.0.1:9000).
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.addr
            .parse()
            .map_err(|e| anyhow!("invalid server address '{}': {}", self.addr, e))
    }
}

fn default_server_addr() -> String {
    DEFAULT_SERVER_ADDR.to_string()
}

/// Command-line client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Milliseconds between status polls with `--wait` (default: 1000).
    #[serde(default = "default_client_poll_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting after this many seconds (default: 600).
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            poll_interval_ms: default_client_poll_ms(),
            wait_timeout_seconds: default_wait_timeout(),
        }
    }
}

fn default_server_url() -> String {
    format!("http://{}", DEFAULT_SERVER_ADDR)
}

fn default_client_poll_ms() -> u64 {
    1000
}

fn default_wait_timeout() -> u64 {
    600
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub wiki: WikiConfig,

    #[serde(default)]
    pub algorithm: AlgorithmConfig,

    #[serde(default)]
    pub handler: HandlerConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<()> {
        if self.algorithm.worker_count == 0 {
            return Err(anyhow!("algorithm.worker_count must be at least 1"));
        }
        if self.wiki.max_rps == 0 {
            return Err(anyhow!("wiki.max_rps must be at least 1"));
        }
        if self.queue.routing_key.trim().is_empty() {
            return Err(anyhow!("queue.routing_key must not be empty"));
        }
        // A claim must go stale before its message is redelivered, or recovery never runs
        if self.handler.stale_after_seconds >= self.queue.visibility_timeout_seconds {
            return Err(anyhow!(
                "handler.stale_after_seconds ({}) must be less than queue.visibility_timeout_seconds ({})",
                self.handler.stale_after_seconds,
                self.queue.visibility_timeout_seconds
            ));
        }
        Ok(())
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.database.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.algorithm.distance_threshold, 2);
        assert_eq!(config.algorithm.worker_count, 100);
        assert_eq!(config.wiki.max_rps, 50);
        assert_eq!(config.wiki.api_url, "https://en.wikipedia.org/w/api.php");
        assert_eq!(config.queue.routing_key, "task");
        assert_eq!(config.queue.visibility_timeout(), Duration::from_secs(900));
        assert_eq!(config.handler.stale_after(), Duration::from_secs(600));
        assert_eq!(config.server.socket_addr().unwrap().port(), 9000);
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: Config = serde_yaml::from_str("algorithm:\n  worker_count: 8\n").unwrap();
        assert_eq!(config.algorithm.worker_count, 8);
        assert_eq!(config.algorithm.distance_threshold, 2);
        assert_eq!(config.queue.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn zero_workers_fail_validation() {
        let mut config = Config::default();
        config.algorithm.worker_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn stale_after_must_be_shorter_than_visibility_timeout() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.handler.stale_after_seconds = config.queue.visibility_timeout_seconds;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stale_after_seconds"));

        config.handler.stale_after_seconds = 60;
        config.queue.visibility_timeout_seconds = 30;
        assert!(config.validate().is_err());
    }
}
