//! Concurrent dispatch of normalized commands.
//!
//! Every batch goes through the same pipeline: normalize, map freeform
//! phrasing, parse intents, then start one task per intent. Non-system
//! intents start in input order; system intents start after them, in
//! ascending priority order, so audio changes land before the screen
//! locks. The whole batch is awaited as one barrier and each unit gets
//! its own result slot.

pub mod handlers;

pub use handlers::{
    ChatModel, ChatParams, HandlerSet, RealtimeSearch, SearchParams, StubChatModel,
    StubRealtimeSearch, TieBreaker, UnconfiguredChatModel, UnconfiguredSearch,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::{Result, ValetError};
use crate::intent::{Intent, IntentKind};
use crate::normalize::{map_freeform, normalize_commands};
use crate::system::{SystemEngine, priority};

/// One result slot per scheduled unit. `started_seq` records the order
/// in which the dispatcher initiated the unit.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub intent: Intent,
    pub started_seq: u64,
    pub result: Result<String>,
}

/// Routes intents to handlers and runs each batch concurrently.
pub struct Dispatcher {
    handlers: Arc<HandlerSet>,
    system: Arc<SystemEngine>,
    freeform_mapping: bool,
}

impl Dispatcher {
    #[must_use]
    pub fn new(handlers: HandlerSet, system: Arc<SystemEngine>, config: &DispatchConfig) -> Self {
        Self {
            handlers: Arc::new(handlers),
            system,
            freeform_mapping: config.freeform_mapping,
        }
    }

    /// Run a batch of free-text commands to completion.
    ///
    /// Returns once every scheduled unit has finished; a failure or
    /// panic in one unit only marks that unit's slot.
    pub async fn dispatch(&self, commands: &[String]) -> Vec<DispatchOutcome> {
        let mut regular = Vec::new();
        let mut system_units: Vec<(u8, Intent)> = Vec::new();

        for fragment in normalize_commands(commands) {
            let mapped = if self.freeform_mapping {
                map_freeform(&fragment).unwrap_or(fragment)
            } else {
                fragment
            };
            let intent = Intent::parse(&mapped);
            match intent.kind {
                IntentKind::Unknown => {
                    warn!("no function found for '{}'", intent.raw);
                }
                // A contextual "open it" refers to something only the
                // chat layer knows about; there is nothing to launch.
                IntentKind::Open if mapped.contains("open it") || mapped == "open file" => {
                    debug!("skipping contextual open: '{mapped}'");
                }
                IntentKind::System => {
                    system_units.push((priority(&intent.payload), intent));
                }
                _ => regular.push(intent),
            }
        }
        system_units.sort_by_key(|(rank, _)| *rank);

        let seq = AtomicU64::new(0);
        let mut units: Vec<(Intent, u64, JoinHandle<Result<String>>)> = Vec::new();
        for intent in regular {
            let started_seq = seq.fetch_add(1, Ordering::SeqCst);
            let handlers = Arc::clone(&self.handlers);
            let unit_intent = intent.clone();
            let handle = tokio::spawn(async move { handlers.run(&unit_intent).await });
            units.push((intent, started_seq, handle));
        }
        for (_, intent) in system_units {
            let started_seq = seq.fetch_add(1, Ordering::SeqCst);
            let engine = Arc::clone(&self.system);
            let payload = intent.payload.clone();
            let handle = tokio::spawn(async move { engine.handle(&payload).await });
            units.push((intent, started_seq, handle));
        }

        let (meta, handles): (Vec<_>, Vec<_>) = units
            .into_iter()
            .map(|(intent, started_seq, handle)| ((intent, started_seq), handle))
            .unzip();
        let joined = join_all(handles).await;

        meta.into_iter()
            .zip(joined)
            .map(|((intent, started_seq), joined_result)| {
                let result = joined_result.unwrap_or_else(|e| {
                    Err(ValetError::Dispatch(format!(
                        "unit for '{}' crashed: {e}",
                        intent.raw
                    )))
                });
                DispatchOutcome {
                    intent,
                    started_seq,
                    result,
                }
            })
            .collect()
    }
}
