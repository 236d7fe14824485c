use std::sync::Arc;

use clap::Parser;

use crate::api::HttpControllerApi;
use crate::args::ConsoleArgs;
use crate::channel::{BackoffPolicy, FixedDelay};
use crate::config::{Settings, load_config, resolve_settings};
use crate::error::AppResult;
use crate::notify::{Notice, NoticeKind};
use crate::service::ConsoleService;

/// Binary entry point: parse arguments, resolve settings, and drive the
/// console until interrupted.
///
/// # Errors
///
/// Returns an error when the configuration is unusable or the event
/// loop dies unexpectedly.
pub fn run() -> AppResult<()> {
    let args = ConsoleArgs::parse();
    let file = load_config(args.config.as_deref())?;
    let settings = resolve_settings(&args, file)?;

    crate::logger::init_logging(settings.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_console(settings))
}

async fn run_console(settings: Settings) -> AppResult<()> {
    let api = Arc::new(HttpControllerApi::new(
        settings.api_url,
        settings.request_timeout,
    )?);
    let backoff: Arc<dyn BackoffPolicy> = Arc::new(FixedDelay::new(settings.reconnect_delay));
    let (mut service, mut notices) = ConsoleService::new(api, backoff);

    if let Some(id) = settings.follow_log.as_deref() {
        service.subscribe_run_log(id);
    }

    // How much of the followed log has been printed already.
    let mut printed: usize = 0;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Shutting down");
                service.shutdown();
                return Ok(());
            }
            result = service.tick() => {
                result?;
                while let Ok(notice) = notices.try_recv() {
                    print_notice(&notice);
                }
                if let Some(id) = settings.follow_log.as_deref() {
                    printed = print_log_tail(&service, id, printed);
                }
            }
        }
    }
}

fn print_notice(notice: &Notice) {
    match notice.kind {
        NoticeKind::Success | NoticeKind::Info => tracing::info!("{}", notice.message),
        NoticeKind::Error => tracing::error!("{}", notice.message),
    }
}

fn print_log_tail<TApi>(service: &ConsoleService<TApi>, id: &str, printed: usize) -> usize
where
    TApi: crate::api::ControllerApi + Send + Sync + 'static,
{
    let Some(log) = service.store().log(id) else {
        return printed;
    };
    if let Some(fresh) = log.get(printed..)
        && !fresh.is_empty()
    {
        print!("{fresh}");
    }
    log.len()
}
