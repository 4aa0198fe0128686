//! `dropkeep serve`: the long-running bot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use dropkeep_core::config::AppConfig;
use dropkeep_core::error::AppError;
use dropkeep_scanner::create_scanner;
use dropkeep_storage::PathResolver;
use dropkeep_telegram::{Dispatcher, UpdatePoller};
use dropkeep_worker::jobs::DownloadWorker;
use dropkeep_worker::runner::SHUTDOWN_GRACE;
use dropkeep_worker::{CronScheduler, Engine, JobExecutor, SchedulerState, WorkerRunner};

use crate::app::App;

/// Wire every component, run until Ctrl+C or SIGTERM, then shut down.
pub async fn execute(config: AppConfig) -> Result<(), AppError> {
    if config.telegram.bot_token.trim().is_empty() {
        return Err(AppError::configuration(
            "telegram.bot_token must be set to run the bot",
        ));
    }
    tracing::info!("Starting Dropkeep v{}", env!("CARGO_PKG_VERSION"));

    let app = App::build(config).await?;
    let config = &app.config;

    // ── Step 1: Check the bot token ──────────────────────────────
    let me = app
        .bot
        .client()
        .get_me()
        .await
        .map_err(|e| AppError::external(format!("Telegram getMe failed: {}", e)))?;
    tracing::info!(
        bot = me.username.as_deref().unwrap_or("unknown"),
        "Connected to Telegram"
    );
    if config.telegram.operator_chat_id == 0 {
        tracing::info!("Operator channel not configured; operator notices are disabled");
    }

    // ── Step 2: Antivirus gateway ────────────────────────────────
    let scanner = create_scanner(&config.antivirus);
    if config.antivirus.enabled && !scanner.health_check().await {
        tracing::warn!(
            host = %config.antivirus.host,
            port = config.antivirus.port,
            "Antivirus daemon not answering; scans will report errors until it does"
        );
    }

    // ── Step 3: Job store, download worker and scheduler loop ────
    let state = Arc::new(SchedulerState::new());
    let worker = DownloadWorker::new(
        Arc::clone(&state),
        app.bot.clone(),
        scanner,
        app.notifier.clone(),
        app.recorder.clone(),
        app.files.clone(),
    )
    .with_config(config.worker.clone())
    .with_retention_days(config.retention.period_days);
    let runner = WorkerRunner::new(
        Arc::clone(&state),
        JobExecutor::new(Arc::new(worker)),
        config.worker.clone(),
    );

    let engine = Arc::new(Engine::new(
        Arc::clone(&state),
        PathResolver::new(app.files.root()),
        app.files.clone(),
        app.notifier.clone(),
    ));

    // ── Step 4: Periodic jobs ────────────────────────────────────
    let scheduler = CronScheduler::new().await?;
    scheduler
        .register_retention_sweep(Arc::new(app.sweeper()), &config.retention.sweep_cron)
        .await?;
    if config.report.enabled {
        scheduler
            .register_weekly_report(Arc::new(app.report_job()), &config.report.cron)
            .await?;
    } else {
        tracing::info!("Weekly report disabled");
    }
    scheduler.start().await?;

    // ── Step 5: Start the loops ──────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner_cancel = shutdown_rx.clone();
    let runner_handle = tokio::spawn(async move {
        runner.run(runner_cancel).await;
    });

    let dispatcher = Dispatcher::new(engine, app.notifier.clone(), config.telegram.clone());
    let poller = UpdatePoller::new(
        app.bot.client().clone(),
        dispatcher,
        config.telegram.poll_timeout_secs,
    );
    let poller_handle = tokio::spawn(async move {
        poller.run(shutdown_rx).await;
    });

    tracing::info!(
        max_concurrency = config.worker.max_concurrency,
        root = %app.files.root().display(),
        "Dropkeep is running"
    );

    // ── Step 6: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("{}", e);
    }
    let _ = tokio::time::timeout(Duration::from_secs(10), poller_handle).await;
    // The runner itself waits up to SHUTDOWN_GRACE for in-flight jobs.
    let _ = tokio::time::timeout(SHUTDOWN_GRACE + Duration::from_secs(5), runner_handle).await;

    tracing::info!("Dropkeep shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
