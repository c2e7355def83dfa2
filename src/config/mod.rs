//! Configuration module for the assistant gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use assistant_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Server configuration
///
/// Contains everything needed to run the gateway:
/// - Server settings (host, port)
/// - Inference backend endpoints (STT, TTS, TTT)
/// - Per-session turn behaviour (timeouts, queue sizes, audio framing)
/// - Connection limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Backend endpoints
    /// Speech-to-text service, e.g. `http://127.0.0.1:50051`
    pub stt_url: String,
    /// Text-to-speech service, e.g. `http://127.0.0.1:50052`
    pub tts_url: String,
    /// Answer retrieval service, e.g. `http://127.0.0.1:50054`
    pub ttt_url: String,
    pub backend_connect_timeout_seconds: u64,

    // Session behaviour
    /// Deadline for one answer lookup
    pub query_timeout_ms: u64,
    /// How long recognition may take to settle after `finalize`
    pub finalize_timeout_ms: u64,
    /// Items buffered per backend stream before the oldest is dropped
    pub stream_queue_capacity: usize,
    /// Send an `audio.metadata` frame before every synthesized audio frame
    pub send_audio_metadata: bool,
    /// Sample rate reported when the synthesizer does not send one
    pub tts_sample_rate: u32,
    /// Close sessions that send nothing for this long
    pub idle_timeout_seconds: u64,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            stt_url: "http://127.0.0.1:50051".to_string(),
            tts_url: "http://127.0.0.1:50052".to_string(),
            ttt_url: "http://127.0.0.1:50054".to_string(),
            backend_connect_timeout_seconds: 5,
            query_timeout_ms: 10_000,
            finalize_timeout_ms: 10_000,
            stream_queue_capacity: crate::core::streaming::DEFAULT_QUEUE_CAPACITY,
            send_audio_metadata: false,
            tts_sample_rate: crate::core::tts::DEFAULT_SAMPLE_RATE,
            idle_timeout_seconds: 300,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded into the environment by `main` before this runs,
    /// so actual environment variables win over .env values.
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_millis(self.finalize_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}
