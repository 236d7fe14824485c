use std::time::Duration;

use reqwest::Url;

use crate::args::ConsoleArgs;
use crate::channel::RECONNECT_DELAY;
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fully resolved runtime settings: CLI flags win over the config file,
/// which wins over the defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: Url,
    pub request_timeout: Duration,
    pub reconnect_delay: Duration,
    pub follow_log: Option<String>,
    pub verbose: bool,
}

/// # Errors
///
/// Returns an error when no API URL is given anywhere or the URL does
/// not parse.
pub fn resolve_settings(args: &ConsoleArgs, file: Option<ConfigFile>) -> AppResult<Settings> {
    let file = file.unwrap_or_default();

    let raw_url = args
        .api_url
        .clone()
        .or(file.api_url)
        .ok_or_else(|| AppError::config(ConfigError::MissingApiUrl))?;
    let api_url = Url::parse(&raw_url).map_err(|err| {
        AppError::config(ConfigError::InvalidApiUrl {
            value: raw_url.clone(),
            source: err,
        })
    })?;

    let request_timeout = args
        .request_timeout_ms
        .or(file.request_timeout_ms)
        .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_millis);
    let reconnect_delay = args
        .reconnect_delay_ms
        .or(file.reconnect_delay_ms)
        .map_or(RECONNECT_DELAY, Duration::from_millis);

    Ok(Settings {
        api_url,
        request_timeout,
        reconnect_delay,
        follow_log: args.follow_log.clone().or(file.follow_log),
        verbose: args.verbose || file.verbose.unwrap_or(false),
    })
}
