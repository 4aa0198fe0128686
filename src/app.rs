//! Shared wiring of the storage root, metrics and messaging.

use std::sync::Arc;

use dropkeep_core::config::AppConfig;
use dropkeep_core::error::AppError;
use dropkeep_metrics::{ClientRegistry, MetricsRecorder, MetricsStore, ReportBuilder};
use dropkeep_storage::LocalStore;
use dropkeep_telegram::{BotClient, TelegramBot};
use dropkeep_worker::Notifier;
use dropkeep_worker::jobs::{RetentionSweeper, WeeklyReportJob};

/// Components every command needs.
#[derive(Debug)]
pub struct App {
    pub config: AppConfig,
    pub files: LocalStore,
    pub bot: Arc<TelegramBot>,
    pub notifier: Notifier,
    pub recorder: Arc<MetricsRecorder>,
    pub reports: ReportBuilder,
}

impl App {
    pub async fn build(config: AppConfig) -> Result<Self, AppError> {
        let files = LocalStore::new(&config.storage.root, config.storage.create_dirs).await?;
        tracing::info!(root = %files.root().display(), "Storage root ready");

        let metrics_dir = config.storage.metrics_dir();
        let store = Arc::new(MetricsStore::open(&metrics_dir).await?);
        let clients = Arc::new(ClientRegistry::new(&metrics_dir));
        let recorder = Arc::new(MetricsRecorder::new(Arc::clone(&store), Arc::clone(&clients)));

        let client = BotClient::new(&config.telegram)
            .map_err(|e| AppError::external(format!("Failed to create Telegram client: {}", e)))?;
        let bot = Arc::new(TelegramBot::new(client));
        let notifier = Notifier::new(
            bot.clone(),
            config.telegram.operator_chat_id,
            config.worker.notify_timeout(),
        );

        let reports = ReportBuilder::new(
            store,
            clients,
            files.clone(),
            config.retention.clone(),
            config.report.clone(),
        );

        Ok(Self {
            config,
            files,
            bot,
            notifier,
            recorder,
            reports,
        })
    }

    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(
            self.files.clone(),
            self.notifier.clone(),
            self.recorder.clone(),
            self.config.retention.clone(),
        )
    }

    pub fn report_job(&self) -> WeeklyReportJob {
        WeeklyReportJob::new(self.reports.clone(), self.notifier.clone())
    }
}
