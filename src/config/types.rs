use serde::Deserialize;

/// Optional settings read from `runboard.toml`. CLI flags override any
/// value set here.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub api_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub reconnect_delay_ms: Option<u64>,
    pub follow_log: Option<String>,
    pub verbose: Option<bool>,
}
