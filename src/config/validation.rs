use super::ServerConfig;

/// Backend endpoints must be plain http(s) URLs with a host.
pub(super) fn validate_endpoint(name: &str, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| format!("{name} must start with http:// or https://, got '{url}'"))?;

    if rest.is_empty() || rest.starts_with('/') || rest.starts_with(':') {
        return Err(format!("{name} has no host: '{url}'").into());
    }

    Ok(())
}

fn validate_non_zero(name: &str, value: u64) -> Result<(), Box<dyn std::error::Error>> {
    if value == 0 {
        return Err(format!("{name} must be greater than zero").into());
    }
    Ok(())
}

/// Validate the merged configuration.
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_endpoint("STT_URL", &config.stt_url)?;
    validate_endpoint("TTS_URL", &config.tts_url)?;
    validate_endpoint("TTT_URL", &config.ttt_url)?;

    validate_non_zero(
        "BACKEND_CONNECT_TIMEOUT_SECONDS",
        config.backend_connect_timeout_seconds,
    )?;
    validate_non_zero("QUERY_TIMEOUT_MS", config.query_timeout_ms)?;
    validate_non_zero("FINALIZE_TIMEOUT_MS", config.finalize_timeout_ms)?;
    validate_non_zero("STREAM_QUEUE_CAPACITY", config.stream_queue_capacity as u64)?;
    validate_non_zero("TTS_SAMPLE_RATE", u64::from(config.tts_sample_rate))?;
    validate_non_zero("IDLE_TIMEOUT_SECONDS", config.idle_timeout_seconds)?;
    validate_non_zero(
        "MAX_CONNECTIONS_PER_IP",
        u64::from(config.max_connections_per_ip),
    )?;

    if config.max_websocket_connections == Some(0) {
        return Err("MAX_WEBSOCKET_CONNECTIONS must be greater than zero when set".into());
    }

    Ok(())
}
