//! Valet: a concurrent command router for a personal desktop assistant.
//!
//! Free-text commands flow through one pipeline:
//! normalize → map freeform phrasing → parse intents → dispatch
//!
//! # Architecture
//!
//! - **Normalizer**: splits composite input and rewrites loose phrasing
//!   onto canonical intent prefixes
//! - **Dispatcher**: one concurrent unit per intent, system actions
//!   started in priority order, batch awaited as a barrier
//! - **System engine**: volume, power, alarms with registry-based
//!   cancellation, timers and a stopwatch
//! - **Adaptive policy**: epsilon-greedy parameter selection for the
//!   chat and search collaborators, persisted as JSON with a CSV
//!   metrics trail
//!
//! External capabilities (chat completion, web search, app launching,
//! desktop control) sit behind traits in [`dispatch::handlers`],
//! [`apps`] and [`platform`].

pub mod apps;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod normalize;
pub mod platform;
pub mod policy;
pub mod system;
pub mod valet_dirs;

pub use config::ValetConfig;
pub use dispatch::{DispatchOutcome, Dispatcher, HandlerSet};
pub use error::{Result, ValetError};
pub use intent::{Intent, IntentKind};
pub use policy::AdaptivePolicy;
pub use system::{AlertEvent, SystemEngine};
