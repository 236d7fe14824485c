use std::io::Write;
use std::time::Duration;

use crate::args::ConsoleArgs;
use crate::error::{AppError, AppResult, ConfigError};

use super::apply::resolve_settings;
use super::loader::load_config_file;
use super::types::ConfigFile;

fn write_temp_config(content: &str) -> AppResult<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

#[test]
fn config_file_parses_known_keys() -> AppResult<()> {
    let file = write_temp_config(
        r#"
api_url = "https://controller.example:8443/api/"
request_timeout_ms = 10000
reconnect_delay_ms = 500
verbose = true
"#,
    )?;
    let config = load_config_file(file.path())?;
    if config.api_url.as_deref() != Some("https://controller.example:8443/api/") {
        return Err(AppError::config("Unexpected api_url"));
    }
    if config.request_timeout_ms != Some(10_000) || config.reconnect_delay_ms != Some(500) {
        return Err(AppError::config("Unexpected timing values"));
    }
    if config.verbose != Some(true) {
        return Err(AppError::config("Unexpected verbose flag"));
    }
    Ok(())
}

#[test]
fn malformed_config_is_an_error() -> AppResult<()> {
    let file = write_temp_config("api_url = [not a string")?;
    match load_config_file(file.path()) {
        Err(AppError::Config(ConfigError::ParseToml { .. })) => Ok(()),
        Err(other) => Err(AppError::config(format!("Unexpected error: {other}"))),
        Ok(_) => Err(AppError::config("Expected a parse error")),
    }
}

#[test]
fn cli_flags_override_the_config_file() -> AppResult<()> {
    let args = ConsoleArgs {
        api_url: Some("https://cli.example/api/".to_owned()),
        reconnect_delay_ms: Some(100),
        ..ConsoleArgs::default()
    };
    let file = ConfigFile {
        api_url: Some("https://file.example/api/".to_owned()),
        reconnect_delay_ms: Some(9_000),
        request_timeout_ms: Some(1_000),
        ..ConfigFile::default()
    };
    let settings = resolve_settings(&args, Some(file))?;

    if settings.api_url.as_str() != "https://cli.example/api/" {
        return Err(AppError::config("Expected the CLI URL to win"));
    }
    if settings.reconnect_delay != Duration::from_millis(100) {
        return Err(AppError::config("Expected the CLI delay to win"));
    }
    if settings.request_timeout != Duration::from_millis(1_000) {
        return Err(AppError::config("Expected the file timeout to apply"));
    }
    Ok(())
}

#[test]
fn missing_api_url_is_rejected() -> AppResult<()> {
    let args = ConsoleArgs::default();
    match resolve_settings(&args, None) {
        Err(AppError::Config(ConfigError::MissingApiUrl)) => Ok(()),
        Err(other) => Err(AppError::config(format!("Unexpected error: {other}"))),
        Ok(_) => Err(AppError::config("Expected a missing URL to be rejected")),
    }
}

#[test]
fn invalid_api_url_is_rejected() -> AppResult<()> {
    let args = ConsoleArgs {
        api_url: Some("not a url".to_owned()),
        ..ConsoleArgs::default()
    };
    match resolve_settings(&args, None) {
        Err(AppError::Config(ConfigError::InvalidApiUrl { .. })) => Ok(()),
        Err(other) => Err(AppError::config(format!("Unexpected error: {other}"))),
        Ok(_) => Err(AppError::config("Expected an invalid URL to be rejected")),
    }
}

#[test]
fn defaults_apply_when_nothing_is_configured() -> AppResult<()> {
    let args = ConsoleArgs {
        api_url: Some("https://controller.example/api/".to_owned()),
        ..ConsoleArgs::default()
    };
    let settings = resolve_settings(&args, None)?;
    if settings.reconnect_delay != Duration::from_secs(2) {
        return Err(AppError::config("Expected the stock reconnect delay"));
    }
    if settings.verbose {
        return Err(AppError::config("Expected verbose off by default"));
    }
    Ok(())
}
