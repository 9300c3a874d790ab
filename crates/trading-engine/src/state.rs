//! Durable state shared by the mirror and redeem loops.
//!
//! The mirror loop owns cursors, seen trades and the daily counter; the redeem
//! loop owns the redeem-attempt log. Each loop works on its own ledger and
//! commits it through [`StateHandle`], which persists the combined snapshot.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polymarket_core::types::TradeFingerprint;
use risk_manager::DailyVolumeCounter;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Mirror-loop region of the persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorLedger {
    /// Latest processed trade timestamp per trader.
    #[serde(default)]
    pub trader_cursors: BTreeMap<String, i64>,
    /// Fingerprint key -> timestamp of the trade it identifies.
    #[serde(default)]
    pub seen_trades: HashMap<String, i64>,
    #[serde(default)]
    pub daily_volume: DailyVolumeCounter,
}

impl MirrorLedger {
    pub fn is_seen(&self, fingerprint: &TradeFingerprint) -> bool {
        self.seen_trades.contains_key(&fingerprint.key())
    }

    /// Record a fingerprint as evaluated. Returns false if it was already present.
    pub fn note_seen(&mut self, fingerprint: &TradeFingerprint, observed_at: i64) -> bool {
        match self.seen_trades.entry(fingerprint.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(observed_at);
                true
            }
        }
    }

    pub fn cursor(&self, trader: &str) -> Option<i64> {
        self.trader_cursors.get(&trader.to_lowercase()).copied()
    }

    /// Move a trader's cursor forward. Never moves it backwards.
    pub fn advance_cursor(&mut self, trader: &str, timestamp: i64) -> i64 {
        let cursor = self
            .trader_cursors
            .entry(trader.to_lowercase())
            .or_insert(timestamp);
        if timestamp > *cursor {
            *cursor = timestamp;
        }
        *cursor
    }

    /// Lower time bound for the next poll of `trader`.
    pub fn start_time(&self, trader: &str, now: DateTime<Utc>, lookback_secs: i64) -> i64 {
        match self.cursor(trader) {
            Some(cursor) => cursor + 1,
            None => now.timestamp() - lookback_secs,
        }
    }

    /// Drop seen entries older than `retention_secs`. Returns the number removed.
    pub fn prune_seen(&mut self, now: DateTime<Utc>, retention_secs: i64) -> usize {
        let threshold = now.timestamp() - retention_secs;
        let before = self.seen_trades.len();
        self.seen_trades.retain(|_, observed_at| *observed_at >= threshold);
        let removed = before - self.seen_trades.len();
        if removed > 0 {
            debug!(removed, remaining = self.seen_trades.len(), "Pruned seen trades");
        }
        removed
    }
}

/// Redeem-loop region of the persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedeemLedger {
    /// Condition id -> last attempt timestamp.
    #[serde(default)]
    pub redeem_attempts: HashMap<String, i64>,
}

impl RedeemLedger {
    pub fn record_attempt(&mut self, condition_id: &str, now: DateTime<Utc>) {
        self.redeem_attempts
            .insert(condition_id.to_string(), now.timestamp());
    }

    pub fn last_attempt(&self, condition_id: &str) -> Option<i64> {
        self.redeem_attempts.get(condition_id).copied()
    }

    pub fn on_cooldown(&self, condition_id: &str, now: DateTime<Utc>, cooldown_secs: i64) -> bool {
        self.last_attempt(condition_id)
            .map(|last| now.timestamp() - last < cooldown_secs)
            .unwrap_or(false)
    }
}

/// The full persisted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(flatten)]
    pub mirror: MirrorLedger,
    #[serde(flatten)]
    pub redeem: RedeemLedger,
}

/// Durable persistence for [`PersistedState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last saved state. Missing state loads as the default.
    async fn load(&self) -> Result<PersistedState>;

    /// Replace the saved state with `state`.
    async fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON file store with replace-on-write.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<PersistedState> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(PersistedState::default()),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Invalid state file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No saved state, starting fresh");
                Ok(PersistedState::default())
            }
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read state file {}", self.path.display())),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let body = serde_json::to_vec_pretty(state)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, &body)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e)
                .with_context(|| format!("Failed to replace {}", self.path.display()));
        }

        debug!(path = %self.path.display(), bytes = body.len(), "State saved");
        Ok(())
    }
}

/// In-memory state store for testing.
pub struct MemoryStateStore {
    state: Arc<RwLock<Option<PersistedState>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Arc::new(RwLock::new(Some(state))),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Last saved snapshot, if any.
    pub async fn snapshot(&self) -> Option<PersistedState> {
        self.state.read().await.clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<PersistedState> {
        Ok(self.state.read().await.clone().unwrap_or_default())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.write().await = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared owner of the in-memory snapshot and its store.
///
/// Each commit replaces one loop's region and saves the whole snapshot while
/// holding the lock, so concurrent commits never persist a stale region.
pub struct StateHandle {
    store: Arc<dyn StateStore>,
    state: Mutex<PersistedState>,
}

impl StateHandle {
    /// Load state from `store`.
    pub async fn load(store: Arc<dyn StateStore>) -> Result<Self> {
        let state = store.load().await?;
        info!(
            traders = state.mirror.trader_cursors.len(),
            seen = state.mirror.seen_trades.len(),
            redeem_attempts = state.redeem.redeem_attempts.len(),
            "State loaded"
        );
        Ok(Self {
            store,
            state: Mutex::new(state),
        })
    }

    pub async fn mirror(&self) -> MirrorLedger {
        self.state.lock().await.mirror.clone()
    }

    pub async fn redeem(&self) -> RedeemLedger {
        self.state.lock().await.redeem.clone()
    }

    pub async fn snapshot(&self) -> PersistedState {
        self.state.lock().await.clone()
    }

    pub async fn commit_mirror(&self, ledger: &MirrorLedger) -> Result<()> {
        let mut state = self.state.lock().await;
        state.mirror = ledger.clone();
        self.store.save(&state).await
    }

    pub async fn commit_redeem(&self, ledger: &RedeemLedger) -> Result<()> {
        let mut state = self.state.lock().await;
        state.redeem = ledger.clone();
        self.store.save(&state).await
    }
}
