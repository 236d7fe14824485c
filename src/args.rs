use clap::Parser;

/// Operator console for a distributed load-testing controller: keeps a
/// live local model of test runs and lets you compose and schedule new
/// ones.
#[derive(Parser, Debug, Default)]
#[command(name = "runboard", version, about)]
pub struct ConsoleArgs {
    /// Controller API base URL, e.g. https://controller.example:8443/api/
    #[arg(long, env = "RUNBOARD_API_URL")]
    pub api_url: Option<String>,

    /// Path to a TOML config file (default: ./runboard.toml if present).
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Timeout for one-shot controller requests, in milliseconds.
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// Delay between reconnect attempts, in milliseconds.
    #[arg(long)]
    pub reconnect_delay_ms: Option<u64>,

    /// Subscribe to this run's log once connected and print the chunks.
    #[arg(long)]
    pub follow_log: Option<String>,

    /// Verbose (debug) logging.
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}
