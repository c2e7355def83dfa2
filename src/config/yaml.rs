use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///
/// backends:
///   stt_url: "http://127.0.0.1:50051"
///   tts_url: "http://127.0.0.1:50052"
///   ttt_url: "http://127.0.0.1:50054"
///   connect_timeout_seconds: 5
///
/// session:
///   query_timeout_ms: 10000
///   finalize_timeout_ms: 10000
///   stream_queue_capacity: 512
///   send_audio_metadata: false
///   tts_sample_rate: 24000
///   idle_timeout_seconds: 300
///
/// limits:
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub backends: Option<BackendsYaml>,
    pub session: Option<SessionYaml>,
    pub limits: Option<LimitsYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Inference backend endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BackendsYaml {
    pub stt_url: Option<String>,
    pub tts_url: Option<String>,
    pub ttt_url: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Per-session behaviour from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub query_timeout_ms: Option<u64>,
    pub finalize_timeout_ms: Option<u64>,
    pub stream_queue_capacity: Option<usize>,
    pub send_audio_metadata: Option<bool>,
    pub tts_sample_rate: Option<u32>,
    pub idle_timeout_seconds: Option<u64>,
}

/// Connection limits from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LimitsYaml {
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
