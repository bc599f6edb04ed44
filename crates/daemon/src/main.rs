// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ameliad, the Amelia orchestrator daemon.

use am_daemon::lifecycle::Daemon;
use am_daemon::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> std::process::ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ameliad: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("ameliad: could not create log dir: {e}");
        return std::process::ExitCode::FAILURE;
    }
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "ameliad.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("ameliad: could not start runtime: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let daemon = Daemon::startup(config)?;
        daemon.run().await
    });

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "daemon exited with error");
            eprintln!("ameliad: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
