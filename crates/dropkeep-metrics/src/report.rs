//! Weekly report: gathering inputs and rendering text.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use dropkeep_core::config::{ReportConfig, RetentionConfig};
use dropkeep_core::result::AppResult;
use dropkeep_core::traits::messenger::{Button, Keyboard};
use dropkeep_core::types::format::{escape_md, human_size, plural};
use dropkeep_core::types::media::contact_url_for;
use dropkeep_core::types::week::IsoWeekKey;
use dropkeep_storage::{DiskUsage, LocalStore, StoredFile};

use crate::clients::ClientRegistry;
use crate::rollup::{WeekRollup, rollup_week};
use crate::store::MetricsStore;

/// Files about to expire and the oldest file still kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionOutlook {
    /// Files inside the notice window.
    pub in_notice_window: u64,
    /// Age of the oldest stored file, in days.
    pub oldest_kept_days: Option<u32>,
}

impl RetentionOutlook {
    /// Compute the outlook for `files` at `now`.
    pub fn from_files(
        files: &[StoredFile],
        now: DateTime<Utc>,
        retention: &RetentionConfig,
    ) -> Self {
        let start = retention.notice_start();
        let mut outlook = Self::default();
        for file in files {
            let age = file.age_days(now);
            if age >= start && age < retention.period_days {
                outlook.in_notice_window += 1;
            }
            if outlook.oldest_kept_days.is_none_or(|oldest| age > oldest) {
                outlook.oldest_kept_days = Some(age);
            }
        }
        outlook
    }
}

/// Everything the renderer needs; assembled by [`ReportBuilder`].
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Rollup of the reported week.
    pub this: WeekRollup,
    /// Rollup of the week before.
    pub previous: WeekRollup,
    /// Mean net growth over the trailing weeks, bytes per week.
    pub avg_net_growth: Option<f64>,
    /// Number of weeks averaged.
    pub trailing_weeks: u32,
    /// Clients first seen during the reported week.
    pub new_clients: Vec<String>,
    /// Filesystem capacity, when it could be determined.
    pub usage: Option<DiskUsage>,
    /// Retention outlook.
    pub outlook: RetentionOutlook,
    /// Length of the notice window.
    pub notice_days: u32,
    /// Rows per top-N table.
    pub top_n: usize,
}

/// Rendered report.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    /// Reported week.
    pub week: IsoWeekKey,
    /// Markdown text.
    pub text: String,
    /// Optional "message top client" button.
    pub keyboard: Option<Keyboard>,
}

/// Week-over-week change: `↑ 25%`, `↓ 10%`, `→ 0%`, or `n/a` without a baseline.
pub fn wow_delta(current: u64, previous: u64) -> String {
    if previous == 0 {
        return "n/a".to_string();
    }
    let change = (current as f64 - previous as f64) / previous as f64 * 100.0;
    let sign = if change > 0.0 {
        "↑"
    } else if change < 0.0 {
        "↓"
    } else {
        "→"
    };
    format!("{sign} {:.0}%", change.abs())
}

fn signed_size(bytes: f64) -> String {
    if bytes < 0.0 {
        format!("-{}", human_size(-bytes))
    } else {
        human_size(bytes)
    }
}

/// Render the report text and keyboard.
pub fn render(ctx: &ReportContext) -> WeeklyReport {
    let this = &ctx.this;
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "📊 **Weekly Report** ISO {} ({})",
        this.week,
        this.week.date_range()
    ));
    lines.push(String::new());

    lines.push("**Capacity**".into());
    match &ctx.usage {
        Some(usage) => lines.push(format!("• Used / Total: {}", usage.used_of_total())),
        None => lines.push("• Used / Total: unknown".into()),
    }
    lines.push(format!(
        "• New data this week: {} ({})",
        human_size(this.total_clean_bytes as f64),
        wow_delta(this.total_clean_bytes, ctx.previous.total_clean_bytes)
    ));
    if let Some(avg) = ctx.avg_net_growth {
        lines.push(format!(
            "• Avg net growth ({} wk): {}/week",
            ctx.trailing_weeks,
            signed_size(avg)
        ));
        if let Some(usage) = ctx.usage.filter(|_| avg > 0.0) {
            let weeks = usage.available as f64 / avg;
            lines.push(format!("• Full in: ~{weeks:.0} weeks at this rate"));
        }
    }
    lines.push(String::new());

    lines.push("**Volume**".into());
    lines.push(format!(
        "• Results: clean {} • infected {} • cancelled {} • failed {}",
        plural(this.clean_count, "file"),
        plural(this.infected_count, "file"),
        plural(this.cancelled_count, "file"),
        plural(this.error_count, "file"),
    ));
    lines.push(format!(
        "• Started: {} • Finished: {}",
        this.uploads_started, this.uploads_finished
    ));
    if let Some(hour) = this.busiest_hour() {
        lines.push(format!("• Busiest hour: {hour:02}:00 UTC"));
    }
    if let Some(median) = this.speed_percentile(0.5) {
        lines.push(format!("• Median speed: {median:.1} MiB/s"));
    }
    if this.missing_desc_count > 0 {
        lines.push(format!("• Missing descriptions: {}", this.missing_desc_count));
    }
    lines.push(String::new());

    lines.push("**Clients**".into());
    let by_bytes = this.top_clients_by_bytes(ctx.top_n);
    if !by_bytes.is_empty() {
        let txt: Vec<_> = by_bytes
            .iter()
            .map(|(k, v)| format!("{k} {}", human_size(*v as f64)))
            .collect();
        lines.push(format!("• By data: {}", txt.join(" • ")));
    }
    let by_count = this.top_clients_by_count(ctx.top_n);
    if !by_count.is_empty() {
        let txt: Vec<_> = by_count.iter().map(|(k, v)| format!("{k} {v}")).collect();
        lines.push(format!("• By count: {}", txt.join(" • ")));
    }
    if !ctx.new_clients.is_empty() {
        lines.push(format!("• New this week: {}", ctx.new_clients.join(", ")));
    }
    lines.push(String::new());

    lines.push("**File mix**".into());
    let exts = this.top_extensions(ctx.top_n + 1);
    if !exts.is_empty() {
        let txt: Vec<_> = exts.iter().map(|(k, v)| format!("{k} {v}")).collect();
        lines.push(format!("• Types: {}", txt.join(" • ")));
    }
    if !this.size_buckets.is_empty() {
        let txt: Vec<_> = this
            .size_buckets
            .iter()
            .map(|(bucket, count)| format!("{} {count}", bucket.label()))
            .collect();
        lines.push(format!("• Sizes: {}", txt.join(" • ")));
    }
    for file in &this.largest_files {
        lines.push(format!(
            "• Largest: `{}` {} by {}",
            escape_md(&file.filename),
            human_size(file.size as f64),
            file.client
        ));
    }
    lines.push(String::new());

    lines.push("**Retention**".into());
    lines.push(format!(
        "• Purging soon (T-{}d): {}",
        ctx.notice_days,
        plural(ctx.outlook.in_notice_window, "file")
    ));
    lines.push(format!(
        "• Deleted this week: {} ({})",
        plural(this.deleted_files_count, "file"),
        human_size(this.deleted_bytes as f64)
    ));
    if let Some(oldest) = ctx.outlook.oldest_kept_days {
        lines.push(format!("• Oldest kept: {}", plural(u64::from(oldest), "day")));
    }
    lines.push(String::new());

    let mut alerts = Vec::new();
    if this.infected_count > 0 {
        alerts.push("⚠️ Infected uploads detected");
    }
    if this.scan_error_count > 0 {
        alerts.push("⚠️ Antivirus scan errors occurred");
    }
    if !alerts.is_empty() {
        lines.push("**Alerts**".into());
        for alert in alerts {
            lines.push(format!("• {alert}"));
        }
    }

    let keyboard = this
        .top_client()
        .and_then(|client| contact_url_for(&client))
        .map(|url| Keyboard::single(Button::url("Message top client", url)));

    WeeklyReport {
        week: this.week,
        text: lines.join("\n").trim().to_string(),
        keyboard,
    }
}

/// Assembles report inputs from the metrics store and the storage root.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    store: Arc<MetricsStore>,
    clients: Arc<ClientRegistry>,
    files: LocalStore,
    retention: RetentionConfig,
    config: ReportConfig,
}

impl ReportBuilder {
    /// Create a builder.
    pub fn new(
        store: Arc<MetricsStore>,
        clients: Arc<ClientRegistry>,
        files: LocalStore,
        retention: RetentionConfig,
        config: ReportConfig,
    ) -> Self {
        Self {
            store,
            clients,
            files,
            retention,
            config,
        }
    }

    /// Recompute the rollup of `week`.
    pub async fn rollup(&self, week: IsoWeekKey) -> AppResult<WeekRollup> {
        let events = self.store.load_week(week).await?;
        Ok(rollup_week(week, &events))
    }

    /// Mean net growth over the partitioned weeks ending at `week`.
    pub async fn average_net_growth(&self, week: IsoWeekKey) -> AppResult<Option<f64>> {
        let keys = self
            .store
            .trailing_weeks(week, self.config.trailing_weeks as usize)
            .await?;
        let mut growths = Vec::new();
        for key in keys {
            match self.rollup(key).await {
                Ok(roll) => growths.push(roll.net_growth() as f64),
                Err(e) => warn!(week = %key, error = %e, "Skipping unreadable partition"),
            }
        }
        if growths.is_empty() {
            return Ok(None);
        }
        Ok(Some(growths.iter().sum::<f64>() / growths.len() as f64))
    }

    /// Build the report of `week` as seen at `now`.
    pub async fn build(&self, week: IsoWeekKey, now: DateTime<Utc>) -> AppResult<WeeklyReport> {
        let this = self.rollup(week).await?;
        let previous = match self.rollup(week.previous()).await {
            Ok(roll) => roll,
            Err(e) => {
                warn!(week = %week.previous(), error = %e, "Previous week unreadable");
                WeekRollup {
                    week: week.previous(),
                    ..Default::default()
                }
            }
        };
        let avg_net_growth = self.average_net_growth(week).await?;
        let new_clients = self.clients.first_seen_in(week).await;

        let usage = match DiskUsage::probe(self.files.root().to_path_buf()).await {
            Ok(usage) => Some(usage),
            Err(e) => {
                warn!(error = %e, "Disk usage unavailable");
                None
            }
        };
        let outlook = match self.files.list_files().await {
            Ok(files) => RetentionOutlook::from_files(&files, now, &self.retention),
            Err(e) => {
                warn!(error = %e, "Failed to list storage root for report");
                RetentionOutlook::default()
            }
        };

        Ok(render(&ReportContext {
            this,
            previous,
            avg_net_growth,
            trailing_weeks: self.config.trailing_weeks,
            new_clients,
            usage,
            outlook,
            notice_days: self.retention.notice_days,
            top_n: self.config.top_n,
        }))
    }

    /// Build the report of the current week.
    pub async fn build_current(&self) -> AppResult<WeeklyReport> {
        let now = Utc::now();
        self.build(IsoWeekKey::from_datetime(now), now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use dropkeep_core::events::{EventKind, MetricEvent, UploadResult};
    use dropkeep_core::traits::messenger::ButtonAction;

    #[test]
    fn test_wow_delta() {
        assert_eq!(wow_delta(150, 100), "↑ 50%");
        assert_eq!(wow_delta(50, 100), "↓ 50%");
        assert_eq!(wow_delta(100, 100), "→ 0%");
        assert_eq!(wow_delta(100, 0), "n/a");
    }

    #[test]
    fn test_outlook_counts_notice_window() {
        let now = Utc::now();
        let retention = RetentionConfig::default();
        let file = |days: i64| StoredFile {
            path: format!("/d/{days}").into(),
            name: days.to_string(),
            size: 1,
            modified: now - Duration::days(days) - Duration::minutes(1),
            warned: false,
        };
        let files = vec![file(1), file(28), file(29), file(30)];
        let outlook = RetentionOutlook::from_files(&files, now, &retention);
        assert_eq!(outlook.in_notice_window, 2);
        assert_eq!(outlook.oldest_kept_days, Some(30));
    }

    #[test]
    fn test_outlook_reports_same_day_files() {
        let now = Utc::now();
        let retention = RetentionConfig::default();
        let files = vec![StoredFile {
            path: "/d/fresh".into(),
            name: "fresh".into(),
            size: 1,
            modified: now - Duration::hours(3),
            warned: false,
        }];
        let outlook = RetentionOutlook::from_files(&files, now, &retention);
        assert_eq!(outlook.in_notice_window, 0);
        assert_eq!(outlook.oldest_kept_days, Some(0));

        let empty = RetentionOutlook::from_files(&[], now, &retention);
        assert_eq!(empty.oldest_kept_days, None);
    }

    fn context(this: WeekRollup) -> ReportContext {
        ReportContext {
            previous: WeekRollup::default(),
            this,
            avg_net_growth: Some(1024.0),
            trailing_weeks: 4,
            new_clients: vec!["@new".into()],
            usage: Some(DiskUsage {
                total: 4096,
                available: 2048,
            }),
            outlook: RetentionOutlook {
                in_notice_window: 1,
                oldest_kept_days: Some(12),
            },
            notice_days: 2,
            top_n: 5,
        }
    }

    #[test]
    fn test_render_sections_and_button() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        let events = vec![
            MetricEvent::at(
                ts,
                EventKind::UploadFinished {
                    client: "@ann".into(),
                    filename: "clip`1.mp4".into(),
                    size_bytes: 2048,
                    result: UploadResult::Clean,
                    duration_sec: 2.0,
                    speed_mb_s: 0.5,
                },
            ),
            MetricEvent::at(
                ts,
                EventKind::UploadFinished {
                    client: "@bob".into(),
                    filename: "bad.exe".into(),
                    size_bytes: 10,
                    result: UploadResult::Infected,
                    duration_sec: 1.0,
                    speed_mb_s: 0.1,
                },
            ),
        ];
        let report = render(&context(rollup_week(IsoWeekKey::new(2024, 10), &events)));

        assert!(report.text.starts_with("📊 **Weekly Report** ISO 2024-W10 (Mar 04–Mar 10, 2024)"));
        assert!(report.text.contains("• Used / Total: 2.0 KiB / 4.0 KiB"));
        assert!(report.text.contains("• New data this week: 2.0 KiB (n/a)"));
        assert!(report.text.contains("• Full in: ~2 weeks at this rate"));
        assert!(report.text.contains("clean 1 file • infected 1 file"));
        assert!(report.text.contains("• New this week: @new"));
        assert!(report.text.contains("`clipʼ1.mp4`"));
        assert!(report.text.contains("• Purging soon (T-2d): 1 file"));
        assert!(report.text.contains("⚠️ Infected uploads detected"));
        assert!(!report.text.contains("scan errors"));

        let keyboard = report.keyboard.unwrap();
        assert_eq!(
            keyboard.rows[0][0].action,
            ButtonAction::Url("https://t.me/ann".into())
        );
    }

    #[test]
    fn test_render_empty_week_has_no_button() {
        let report = render(&context(WeekRollup {
            week: IsoWeekKey::new(2024, 10),
            ..Default::default()
        }));
        assert!(report.keyboard.is_none());
        assert!(report.text.contains("clean 0 files"));
        assert!(!report.text.contains("**Alerts**"));
    }

    #[tokio::test]
    async fn test_builder_compares_with_previous_week() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = dir.path().join("metrics");
        let store = Arc::new(MetricsStore::open(&metrics).await.unwrap());
        let clients = Arc::new(ClientRegistry::new(&metrics));
        let files = LocalStore::new(dir.path().join("data"), true).await.unwrap();

        for (day, size) in [(27u32, 100u64), (5, 150)] {
            let month = if day == 27 { 2 } else { 3 };
            store
                .append(&MetricEvent::at(
                    Utc.with_ymd_and_hms(2024, month, day, 12, 0, 0).unwrap(),
                    EventKind::UploadFinished {
                        client: "@ann".into(),
                        filename: "a.bin".into(),
                        size_bytes: size,
                        result: UploadResult::Clean,
                        duration_sec: 1.0,
                        speed_mb_s: 1.0,
                    },
                ))
                .await
                .unwrap();
        }

        let builder = ReportBuilder::new(
            store,
            clients,
            files,
            RetentionConfig::default(),
            ReportConfig::default(),
        );
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap();
        let report = builder.build(IsoWeekKey::new(2024, 10), now).await.unwrap();
        assert!(report.text.contains("(↑ 50%)"));
        assert_eq!(
            builder.average_net_growth(IsoWeekKey::new(2024, 10)).await.unwrap(),
            Some(125.0)
        );
    }
}
