use super::ServerConfig;
use super::env::load_from_env;
use super::yaml::YamlConfig;

/// Environment configuration with YAML values layered on top.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
    }

    if let Some(backends) = yaml.backends {
        if let Some(url) = backends.stt_url {
            config.stt_url = url;
        }
        if let Some(url) = backends.tts_url {
            config.tts_url = url;
        }
        if let Some(url) = backends.ttt_url {
            config.ttt_url = url;
        }
        if let Some(timeout) = backends.connect_timeout_seconds {
            config.backend_connect_timeout_seconds = timeout;
        }
    }

    if let Some(session) = yaml.session {
        if let Some(timeout) = session.query_timeout_ms {
            config.query_timeout_ms = timeout;
        }
        if let Some(timeout) = session.finalize_timeout_ms {
            config.finalize_timeout_ms = timeout;
        }
        if let Some(capacity) = session.stream_queue_capacity {
            config.stream_queue_capacity = capacity;
        }
        if let Some(enabled) = session.send_audio_metadata {
            config.send_audio_metadata = enabled;
        }
        if let Some(rate) = session.tts_sample_rate {
            config.tts_sample_rate = rate;
        }
        if let Some(timeout) = session.idle_timeout_seconds {
            config.idle_timeout_seconds = timeout;
        }
    }

    if let Some(limits) = yaml.limits {
        if limits.max_websocket_connections.is_some() {
            config.max_websocket_connections = limits.max_websocket_connections;
        }
        if let Some(per_ip) = limits.max_connections_per_ip {
            config.max_connections_per_ip = per_ip;
        }
    }

    Ok(config)
}
