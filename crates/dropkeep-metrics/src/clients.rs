//! First-seen client registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use dropkeep_core::result::AppResult;
use dropkeep_core::types::week::IsoWeekKey;

/// File name of the registry inside the metrics directory.
pub const CLIENTS_FILE: &str = "clients_seen.json";

/// Maps client keys to the unix time they were first seen.
///
/// Read-modify-write cycles run under one lock, and the file is replaced
/// by writing a temporary sibling and renaming it over the original.
#[derive(Debug)]
pub struct ClientRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ClientRegistry {
    /// Registry stored in `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CLIENTS_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Path of the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents. A missing or unreadable file reads as empty.
    pub async fn load(&self) -> BTreeMap<String, i64> {
        match fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "Client registry unreadable, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read client registry");
                BTreeMap::new()
            }
        }
    }

    /// Record `client` as seen at `ts` unless an earlier sighting exists.
    ///
    /// Returns `true` when the client was new.
    pub async fn record_first_seen(&self, client: &str, ts: DateTime<Utc>) -> AppResult<bool> {
        let _guard = self.lock.lock().await;
        let mut seen = self.load().await;
        let ts = ts.timestamp();
        let is_new = match seen.get(client) {
            Some(existing) if *existing <= ts => return Ok(false),
            Some(_) => false,
            None => true,
        };
        seen.insert(client.to_string(), ts);
        self.save(&seen).await?;
        debug!(client, is_new, "Client first-seen recorded");
        Ok(is_new)
    }

    /// Clients whose first sighting falls inside `week`, sorted.
    pub async fn first_seen_in(&self, week: IsoWeekKey) -> Vec<String> {
        self.load()
            .await
            .into_iter()
            .filter(|(_, ts)| {
                Utc.timestamp_opt(*ts, 0)
                    .single()
                    .is_some_and(|dt| IsoWeekKey::from_datetime(dt) == week)
            })
            .map(|(client, _)| client)
            .collect()
    }

    async fn save(&self, seen: &BTreeMap<String, i64>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(seen)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
