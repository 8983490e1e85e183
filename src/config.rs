//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - urdf.toml (default configuration)
//! - urdf.local.toml (git-ignored local overrides)
//! - Environment variables (URDF_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # urdf.toml
//! [paths]
//! dictionary_path = "./data/zurl.json"
//!
//! [graphs]
//! application = "urn:nrua:g:application"
//!
//! [host]
//! base_url = "http://127.0.0.1:1880"
//! instance_id = "factory-7"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! URDF_HOST__BASE_URL=http://nodered:1880
//! URDF_RUNTIME__DEBOUNCE_MS=500
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub graphs: GraphsConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Startup input files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Ordered IRI list defining the z:<n> token set
    #[serde(default = "default_dictionary_path")]
    pub dictionary_path: PathBuf,

    /// Ontology JSON-LD, loaded once at startup
    #[serde(default = "default_ontology_path")]
    pub ontology_path: PathBuf,

    /// Rules JSON-LD, loaded once at startup
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,
}

/// Identifiers of the five named graphs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphsConfig {
    #[serde(default = "default_ontology_gid")]
    pub ontology: String,
    #[serde(default = "default_rules_gid")]
    pub rules: String,
    #[serde(default = "default_application_gid")]
    pub application: String,
    #[serde(default = "default_environment_gid")]
    pub environment: String,
    #[serde(default = "default_inferred_gid")]
    pub inferred: String,
}

/// Host flow-engine admin surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Base URL of the admin API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Host instance id; feeds the application IRI
    #[serde(default = "default_instance_id")]
    pub instance_id: String,

    /// Readiness probe attempts before the environment load is abandoned
    #[serde(default = "default_ready_attempts")]
    pub ready_attempts: u32,

    /// Seconds between readiness probes
    #[serde(default = "default_ready_interval_secs")]
    pub ready_interval_secs: u64,

    /// Seconds between /flows revision polls (0 disables the watcher;
    /// embedded deployments feed flow events directly)
    #[serde(default)]
    pub poll_interval_secs: u64,
}

/// Runtime task tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Coalescing window for host flow events, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// HTTP facade settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Explicit dev-mode opt-in: allow all origins
    #[serde(default)]
    pub cors_allow_all: bool,

    /// Explicit allowed origins (takes precedence over cors_allow_all)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_dictionary_path() -> PathBuf {
    PathBuf::from("./data/zurl.json")
}
fn default_ontology_path() -> PathBuf {
    PathBuf::from("./data/ontology.json")
}
fn default_rules_path() -> PathBuf {
    PathBuf::from("./data/rules.json")
}
fn default_ontology_gid() -> String {
    "urn:nrua:g:ontology".to_string()
}
fn default_rules_gid() -> String {
    "urn:nrua:g:rules".to_string()
}
fn default_application_gid() -> String {
    "urn:nrua:g:application".to_string()
}
fn default_environment_gid() -> String {
    "urn:nrua:g:environment".to_string()
}
fn default_inferred_gid() -> String {
    "urn:nrua:g:inferred".to_string()
}
fn default_base_url() -> String {
    "http://127.0.0.1:1880".to_string()
}
fn default_instance_id() -> String {
    "default".to_string()
}
fn default_ready_attempts() -> u32 {
    30
}
fn default_ready_interval_secs() -> u64 {
    1
}
fn default_debounce_ms() -> u64 {
    250
}
fn default_http_host() -> String {
    "127.0.0.1".to_string()
}
fn default_http_port() -> u16 {
    8890
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. urdf.toml (base configuration)
    /// 2. urdf.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (URDF_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("urdf.toml"))
            .merge(Toml::file("urdf.local.toml"))
            .merge(Env::prefixed("URDF_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("URDF_").split("__"))
            .extract()
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            dictionary_path: default_dictionary_path(),
            ontology_path: default_ontology_path(),
            rules_path: default_rules_path(),
        }
    }
}

impl Default for GraphsConfig {
    fn default() -> Self {
        GraphsConfig {
            ontology: default_ontology_gid(),
            rules: default_rules_gid(),
            application: default_application_gid(),
            environment: default_environment_gid(),
            inferred: default_inferred_gid(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            base_url: default_base_url(),
            instance_id: default_instance_id(),
            ready_attempts: default_ready_attempts(),
            ready_interval_secs: default_ready_interval_secs(),
            poll_interval_secs: 0,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: default_http_host(),
            port: default_http_port(),
            cors_allow_all: false,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
