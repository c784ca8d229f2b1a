use std::io::{self, IsTerminal};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    config::{AppConfig, LogRotation},
    infrastructure::directories::ResolvedPaths,
};

const LOG_FILE_PREFIX: &str = "router.log";

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Console plus rolling file output under the logs directory. `RUST_LOG` wins
/// over `LOG_LEVEL`; an unparsable level falls back to `info`.
pub fn init_tracing(config: &AppConfig, paths: &ResolvedPaths) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.logging.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let file_appender = RollingFileAppender::new(
            rotation_for(config.logging.rotation),
            &paths.logs_dir,
            LOG_FILE_PREFIX,
        );
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        let console_layer = fmt::layer()
            .with_writer(io::stdout)
            .with_target(true)
            .with_ansi(io::stdout().is_terminal());

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!(
            target: "lifecycle",
            logs = %paths.logs_dir.display(),
            level = %config.logging.level,
            rotation = ?config.logging.rotation,
            "tracing initialized"
        );
        Ok(())
    })?;
    Ok(())
}

fn rotation_for(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}
