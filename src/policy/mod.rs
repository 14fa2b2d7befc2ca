//! Epsilon-greedy adaptive parameter policy.
//!
//! Tunes two downstream knobs (search breadth, chat randomness) from
//! observed success. Each decision point owns a set of parameter
//! dimensions with a bounded list of allowed values; [`AdaptivePolicy::choose`]
//! picks one value per dimension (explore with probability epsilon,
//! otherwise exploit the best running mean) and [`AdaptivePolicy::reward`]
//! feeds back a binary outcome. State is one JSON document rewritten
//! atomically after every update, with an optional append-only CSV of
//! reward observations.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PolicyConfig;
use crate::error::{Result, ValetError};

/// Declared arms: (decision point, parameter dimension, allowed values).
/// Values are kept as strings end to end; handlers parse what they need.
const ARMS: &[(&str, &str, &[&str])] = &[
    ("search", "retrieval_k", &["3", "5"]),
    ("search", "tie_breaker", &["prefer_realtime", "prefer_general"]),
    ("chat", "temperature", &["0.3", "0.7"]),
];

/// Tie-break weight favoring the more-observed arm at equal mean reward.
const COUNT_TIE_WEIGHT: f64 = 1e-6;

/// Running statistics for one (decision point, parameter, value) arm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmStats {
    /// Number of rewards observed. Monotonically non-decreasing.
    pub count: u64,
    /// Arithmetic mean of all observed rewards, rounded to 4 decimals.
    pub mean_reward: f64,
}

/// Whole persisted policy document: decision point -> parameter -> value -> stats.
pub type PolicyState = BTreeMap<String, BTreeMap<String, BTreeMap<String, ArmStats>>>;

/// Epsilon-greedy multi-armed bandit over the declared arm table.
///
/// A single mutex guards the state across choose/reward/store, so
/// concurrent rewards serialize and every choose sees a consistent table.
pub struct AdaptivePolicy {
    epsilon: f64,
    metrics_log: bool,
    state_path: PathBuf,
    metrics_path: PathBuf,
    state: Mutex<PolicyState>,
}

impl AdaptivePolicy {
    /// Create a policy persisting under the default data dir, loading any
    /// existing state document (falling back to the built-in arm table on
    /// a missing or corrupt file).
    #[must_use]
    pub fn new(config: &PolicyConfig) -> Self {
        Self::with_paths(
            config,
            crate::valet_dirs::policy_file(),
            crate::valet_dirs::metrics_file(),
        )
    }

    /// Create a policy persisting at explicit paths.
    #[must_use]
    pub fn with_paths(config: &PolicyConfig, state_path: PathBuf, metrics_path: PathBuf) -> Self {
        let state = load_state(&state_path);
        Self {
            epsilon: config.epsilon,
            metrics_log: config.metrics_log,
            state_path,
            metrics_path,
            state: Mutex::new(state),
        }
    }

    /// Pick one value per parameter dimension of `decision_point`.
    ///
    /// Each dimension independently explores with probability epsilon
    /// (uniform over allowed values) and otherwise exploits the highest
    /// mean reward, ties broken toward the more-observed arm. An unknown
    /// decision point yields an empty map.
    pub fn choose(&self, decision_point: &str) -> BTreeMap<String, String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut rng = rand::thread_rng();
        let mut choice = BTreeMap::new();
        for &(dp, param, values) in ARMS {
            if dp != decision_point {
                continue;
            }
            let value = if rng.r#gen::<f64>() < self.epsilon {
                // Declared value lists are non-empty const arrays.
                values.choose(&mut rng).copied().unwrap_or(values[0])
            } else {
                best_value(&state, decision_point, param, values)
            };
            choice.insert(param.to_string(), value.to_string());
        }
        debug!(decision_point, ?choice, "policy choice");
        choice
    }

    /// Record a binary outcome for a prior [`choose`](Self::choose) result.
    ///
    /// Updates the online mean for every dimension present in `chosen`,
    /// appends one metrics row per dimension, and rewrites the persisted
    /// document. Persistence failures are logged and ignored.
    pub fn reward(&self, decision_point: &str, chosen: &BTreeMap<String, String>, success: bool) {
        let r = if success { 1.0 } else { 0.0 };
        let ts = chrono::Utc::now().timestamp();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut rows = Vec::new();
        for &(dp, param, _values) in ARMS {
            if dp != decision_point {
                continue;
            }
            let Some(value) = chosen.get(param) else {
                continue;
            };
            let slot = state
                .entry(decision_point.to_string())
                .or_default()
                .entry(param.to_string())
                .or_default()
                .entry(value.clone())
                .or_default();
            let mean = slot.mean_reward + (r - slot.mean_reward) / (slot.count as f64 + 1.0);
            slot.mean_reward = (mean * 10_000.0).round() / 10_000.0;
            slot.count += 1;
            rows.push(format!(
                "{ts},{decision_point},{param},{value},{reward},{epsilon}",
                reward = i32::from(success),
                epsilon = self.epsilon
            ));
        }
        if self.metrics_log {
            for row in &rows {
                if let Err(e) = append_metric(&self.metrics_path, row) {
                    warn!("metrics append failed: {e}");
                }
            }
        }
        if let Err(e) = store_state(&self.state_path, &state) {
            warn!("policy state store failed: {e}");
        }
    }

    /// Current state of every arm, for reporting.
    #[must_use]
    pub fn snapshot(&self) -> PolicyState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Exploit step: highest mean reward wins, equal means fall to the arm
/// with more observations, remaining ties keep declaration order.
fn best_value(
    state: &PolicyState,
    decision_point: &str,
    param: &str,
    values: &[&'static str],
) -> &'static str {
    let mut best = values[0];
    let mut best_score = f64::NEG_INFINITY;
    for v in values {
        let stats = state
            .get(decision_point)
            .and_then(|dims| dims.get(param))
            .and_then(|slots| slots.get(*v))
            .cloned()
            .unwrap_or_default();
        let score = stats.mean_reward + COUNT_TIE_WEIGHT * stats.count as f64;
        if score > best_score {
            best = v;
            best_score = score;
        }
    }
    best
}

/// Load the persisted document, falling back to the built-in table on a
/// missing or unreadable file. Arms declared since the document was
/// written are merged in with zeroed stats.
fn load_state(path: &Path) -> PolicyState {
    let mut state = if path.exists() {
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<PolicyState>(&text) {
                Ok(state) => state,
                Err(e) => {
                    warn!("policy state unreadable, starting fresh: {e}");
                    PolicyState::new()
                }
            },
            Err(e) => {
                warn!("policy state unreadable, starting fresh: {e}");
                PolicyState::new()
            }
        }
    } else {
        PolicyState::new()
    };
    for &(dp, param, values) in ARMS {
        let slots = state
            .entry(dp.to_string())
            .or_default()
            .entry(param.to_string())
            .or_default();
        for v in values {
            slots.entry((*v).to_string()).or_default();
        }
    }
    state
}

/// Rewrite the whole document atomically (temp file, fsync, rename).
fn store_state(path: &Path, state: &PolicyState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| ValetError::Policy(format!("failed to serialize policy state: {e}")))?;
    let tmp_path = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Append one observation row, writing the header on first creation.
fn append_metric(path: &Path, row: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let new_file = !path.exists();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if new_file {
        writeln!(file, "ts,decision_point,param,value,reward,epsilon")?;
    }
    writeln!(file, "{row}")?;
    Ok(())
}
