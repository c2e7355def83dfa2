use std::env;
use std::str::FromStr;

use super::ServerConfig;

/// Read an optional environment variable, parsing it when set.
///
/// Empty values are treated as unset.
pub(super) fn parse_env<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: {e}").into()),
        _ => Ok(None),
    }
}

/// Parse a boolean flag: `true/false`, `1/0`, `yes/no`, `on/off`.
pub(super) fn parse_env_bool(name: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    let Ok(value) = env::var(name) else {
        return Ok(None);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        other => Err(format!("Invalid value for {name}: {other}").into()),
    }
}

/// Build a configuration from environment variables on top of the defaults.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let defaults = ServerConfig::default();

    Ok(ServerConfig {
        host: parse_env("HOST")?.unwrap_or(defaults.host),
        port: parse_env("PORT")?.unwrap_or(defaults.port),
        stt_url: parse_env("STT_URL")?.unwrap_or(defaults.stt_url),
        tts_url: parse_env("TTS_URL")?.unwrap_or(defaults.tts_url),
        ttt_url: parse_env("TTT_URL")?.unwrap_or(defaults.ttt_url),
        backend_connect_timeout_seconds: parse_env("BACKEND_CONNECT_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.backend_connect_timeout_seconds),
        query_timeout_ms: parse_env("QUERY_TIMEOUT_MS")?.unwrap_or(defaults.query_timeout_ms),
        finalize_timeout_ms: parse_env("FINALIZE_TIMEOUT_MS")?
            .unwrap_or(defaults.finalize_timeout_ms),
        stream_queue_capacity: parse_env("STREAM_QUEUE_CAPACITY")?
            .unwrap_or(defaults.stream_queue_capacity),
        send_audio_metadata: parse_env_bool("SEND_AUDIO_METADATA")?
            .unwrap_or(defaults.send_audio_metadata),
        tts_sample_rate: parse_env("TTS_SAMPLE_RATE")?.unwrap_or(defaults.tts_sample_rate),
        idle_timeout_seconds: parse_env("IDLE_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.idle_timeout_seconds),
        max_websocket_connections: parse_env("MAX_WEBSOCKET_CONNECTIONS")?
            .or(defaults.max_websocket_connections),
        max_connections_per_ip: parse_env("MAX_CONNECTIONS_PER_IP")?
            .unwrap_or(defaults.max_connections_per_ip),
    })
}
