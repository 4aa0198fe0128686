//! Folding one week of events into aggregate statistics.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Timelike;

use dropkeep_core::events::{EventKind, MetricEvent, UploadResult};
use dropkeep_core::types::week::IsoWeekKey;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Number of entries kept in [`WeekRollup::largest_files`].
pub const LARGEST_FILES: usize = 5;

/// Size class of a clean upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SizeBucket {
    /// Below 10 MiB.
    Small,
    /// 10 MiB up to 100 MiB.
    Medium,
    /// 100 MiB up to 1 GiB.
    Large,
    /// 1 GiB and above.
    Huge,
}

impl SizeBucket {
    /// Bucket for `size` bytes.
    pub fn of(size: u64) -> Self {
        if size < 10 * MIB {
            Self::Small
        } else if size < 100 * MIB {
            Self::Medium
        } else if size < GIB {
            Self::Large
        } else {
            Self::Huge
        }
    }

    /// Report label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Small => "<10MB",
            Self::Medium => "10–100MB",
            Self::Large => "100MB–1GB",
            Self::Huge => ">1GB",
        }
    }
}

/// One entry of the largest-files table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargestFile {
    /// File name.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Client key of the uploader.
    pub client: String,
}

/// Aggregates of one ISO week. Always recomputed, never stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeekRollup {
    /// The week.
    pub week: IsoWeekKey,
    /// `upload_started` events.
    pub uploads_started: u64,
    /// `upload_finished` events.
    pub uploads_finished: u64,
    /// Finished clean.
    pub clean_count: u64,
    /// Finished infected.
    pub infected_count: u64,
    /// Cancelled by the requester.
    pub cancelled_count: u64,
    /// Failed transfers.
    pub error_count: u64,
    /// Kept without a verdict.
    pub scan_error_count: u64,
    /// Bytes of clean uploads.
    pub total_clean_bytes: u64,
    /// Durations of clean uploads, ascending.
    pub durations: Vec<f64>,
    /// Speeds of clean uploads in MiB/s, ascending.
    pub speeds: Vec<f64>,
    /// Clean bytes per client.
    pub per_client_bytes: BTreeMap<String, u64>,
    /// Clean uploads per client.
    pub per_client_count: BTreeMap<String, u64>,
    /// Started uploads without a description.
    pub missing_desc_count: u64,
    /// Started uploads per UTC hour.
    pub started_by_hour: BTreeMap<u32, u64>,
    /// Clean bytes per extension.
    pub by_ext_bytes: BTreeMap<String, u64>,
    /// Clean uploads per extension.
    pub by_ext_count: BTreeMap<String, u64>,
    /// Clean uploads per size class.
    pub size_buckets: BTreeMap<SizeBucket, u64>,
    /// Largest clean uploads, biggest first.
    pub largest_files: Vec<LargestFile>,
    /// Files removed by retention.
    pub deleted_files_count: u64,
    /// Bytes removed by retention.
    pub deleted_bytes: u64,
}

impl WeekRollup {
    /// Clean bytes added minus bytes deleted by retention.
    pub fn net_growth(&self) -> i64 {
        self.total_clean_bytes as i64 - self.deleted_bytes as i64
    }

    /// Hour with the most started uploads; earliest hour wins ties.
    pub fn busiest_hour(&self) -> Option<u32> {
        let mut best: Option<(u32, u64)> = None;
        for (&hour, &count) in &self.started_by_hour {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((hour, count));
            }
        }
        best.map(|(hour, _)| hour)
    }

    /// Top `n` clients by clean bytes.
    pub fn top_clients_by_bytes(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.per_client_bytes, n)
    }

    /// Top `n` clients by clean upload count.
    pub fn top_clients_by_count(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.per_client_count, n)
    }

    /// Top `n` extensions by clean upload count.
    pub fn top_extensions(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.by_ext_count, n)
    }

    /// Client with the most clean bytes.
    pub fn top_client(&self) -> Option<String> {
        self.top_clients_by_bytes(1).into_iter().next().map(|(k, _)| k)
    }

    /// Nearest-rank percentile of the clean upload durations.
    pub fn duration_percentile(&self, p: f64) -> Option<f64> {
        percentile(&self.durations, p)
    }

    /// Nearest-rank percentile of the clean upload speeds.
    pub fn speed_percentile(&self, p: f64) -> Option<f64> {
        percentile(&self.speeds, p)
    }
}

/// Fold `events` into the rollup of `week`.
///
/// The result depends only on the multiset of events: every table is keyed
/// or sorted, and ties are broken on names.
pub fn rollup_week(week: IsoWeekKey, events: &[MetricEvent]) -> WeekRollup {
    let mut roll = WeekRollup {
        week,
        ..Default::default()
    };
    let mut candidates = Vec::new();

    for event in events {
        match &event.kind {
            EventKind::UploadStarted {
                has_description, ..
            } => {
                roll.uploads_started += 1;
                if !has_description {
                    roll.missing_desc_count += 1;
                }
                *roll.started_by_hour.entry(event.ts.hour()).or_default() += 1;
            }
            EventKind::UploadFinished {
                client,
                filename,
                size_bytes,
                result,
                duration_sec,
                speed_mb_s,
            } => {
                roll.uploads_finished += 1;
                match result {
                    UploadResult::Clean => {
                        roll.clean_count += 1;
                        roll.total_clean_bytes += size_bytes;
                        *roll.per_client_bytes.entry(client.clone()).or_default() += size_bytes;
                        *roll.per_client_count.entry(client.clone()).or_default() += 1;
                        roll.durations.push(*duration_sec);
                        roll.speeds.push(*speed_mb_s);
                        let ext = extension_of(filename);
                        *roll.by_ext_bytes.entry(ext.clone()).or_default() += size_bytes;
                        *roll.by_ext_count.entry(ext).or_default() += 1;
                        *roll.size_buckets.entry(SizeBucket::of(*size_bytes)).or_default() += 1;
                        candidates.push(LargestFile {
                            filename: filename.clone(),
                            size: *size_bytes,
                            client: client.clone(),
                        });
                    }
                    UploadResult::Infected => roll.infected_count += 1,
                    UploadResult::ScanError => roll.scan_error_count += 1,
                    UploadResult::Error => roll.error_count += 1,
                }
            }
            EventKind::UploadCancelled { .. } => roll.cancelled_count += 1,
            EventKind::RetentionDeleted { size_bytes, .. } => {
                roll.deleted_files_count += 1;
                roll.deleted_bytes += size_bytes;
            }
        }
    }

    roll.durations.sort_by(f64::total_cmp);
    roll.speeds.sort_by(f64::total_cmp);
    candidates.sort_by(|a, b| {
        b.size
            .cmp(&a.size)
            .then_with(|| a.filename.cmp(&b.filename))
            .then_with(|| a.client.cmp(&b.client))
    });
    candidates.truncate(LARGEST_FILES);
    roll.largest_files = candidates;
    roll
}

/// Lower-cased extension, or `noext`.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "noext".to_string())
}

fn top_n(map: &BTreeMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut items: Vec<_> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items.truncate(n);
    items
}

fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted.get(idx).copied()
}
