//! Weekly report job: builds the report and posts it to the operator channel.

use tracing::info;

use dropkeep_core::result::AppResult;
use dropkeep_core::types::week::IsoWeekKey;
use dropkeep_metrics::{ReportBuilder, WeeklyReport};

use crate::notify::{Delivery, Notifier};

/// Generates and delivers weekly reports.
#[derive(Debug, Clone)]
pub struct WeeklyReportJob {
    builder: ReportBuilder,
    notifier: Notifier,
}

impl WeeklyReportJob {
    /// Create the job.
    pub fn new(builder: ReportBuilder, notifier: Notifier) -> Self {
        Self { builder, notifier }
    }

    /// The report of the current week, without sending it.
    pub async fn generate(&self) -> AppResult<WeeklyReport> {
        self.builder.build_current().await
    }

    /// The report of a given week, without sending it.
    pub async fn generate_for(&self, week: IsoWeekKey) -> AppResult<WeeklyReport> {
        self.builder.build(week, chrono::Utc::now()).await
    }

    /// Post a report to the operator channel.
    pub async fn send(&self, report: &WeeklyReport) -> Delivery {
        self.notifier
            .operator(&report.text, report.keyboard.as_ref())
            .await
    }

    /// Build the current week's report and send it to the operator channel.
    pub async fn run(&self) -> AppResult<Delivery> {
        let report = self.generate().await?;
        let delivery = self.send(&report).await;
        info!(week = %report.week, delivery = ?delivery, "Weekly report generated");
        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use dropkeep_core::config::{ReportConfig, RetentionConfig};
    use dropkeep_core::traits::{ChatRef, Keyboard, MessageRef, Messenger, NotifyError};
    use dropkeep_metrics::{ClientRegistry, MetricsStore};
    use dropkeep_storage::LocalStore;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(i64, String)>>);

    #[async_trait]
    impl Messenger for Outbox {
        async fn send_message(
            &self,
            chat: &ChatRef,
            text: &str,
            _keyboard: Option<&Keyboard>,
            _reply_to: Option<i64>,
        ) -> Result<MessageRef, NotifyError> {
            self.0.lock().unwrap().push((chat.0, text.to_string()));
            Ok(MessageRef::new(*chat, 1))
        }

        async fn edit_message(
            &self,
            _message: &MessageRef,
            _text: &str,
            _keyboard: Option<&Keyboard>,
        ) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_report_goes_to_operator_channel() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = dir.path().join("metrics");
        let store = Arc::new(MetricsStore::open(&metrics).await.unwrap());
        let clients = Arc::new(ClientRegistry::new(&metrics));
        let files = LocalStore::new(dir.path().join("data"), true).await.unwrap();
        let builder = ReportBuilder::new(
            store,
            clients,
            files,
            RetentionConfig::default(),
            ReportConfig::default(),
        );
        let outbox = Arc::new(Outbox::default());
        let job = WeeklyReportJob::new(
            builder,
            Notifier::new(outbox.clone(), -500, Duration::from_secs(1)),
        );

        assert_eq!(job.run().await.unwrap(), Delivery::Sent);
        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, -500);
        assert!(sent[0].1.starts_with("📊 **Weekly Report**"));
    }
}
