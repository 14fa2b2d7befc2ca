//! Per-intent handlers behind capability traits.
//!
//! The dispatcher matches once on [`IntentKind`](crate::intent::IntentKind)
//! and hands the payload to the owning capability: app control, link
//! opening, chat completion or search. Chat and search consult the
//! adaptive policy around every call.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::apps::AppControl;
use crate::error::{Result, ValetError};
use crate::intent::{Intent, IntentKind};
use crate::normalize::safe_label;
use crate::platform::LinkOpener;
use crate::policy::AdaptivePolicy;
use crate::valet_dirs;

/// Sampled parameters for a chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatParams {
    pub temperature: f64,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self { temperature: 0.7 }
    }
}

impl ChatParams {
    /// Overlay a policy choice onto the defaults.
    #[must_use]
    pub fn from_choice(choice: &BTreeMap<String, String>) -> Self {
        let mut params = Self::default();
        if let Some(t) = choice.get("temperature").and_then(|v| v.parse().ok()) {
            params.temperature = t;
        }
        params
    }
}

/// Which answer family wins when search confidence is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreaker {
    PreferRealtime,
    PreferGeneral,
}

/// Sampled parameters for a search-augmented answer.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub retrieval_k: u32,
    pub tie_breaker: TieBreaker,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            retrieval_k: 5,
            tie_breaker: TieBreaker::PreferRealtime,
        }
    }
}

impl SearchParams {
    /// Overlay a policy choice onto the defaults.
    #[must_use]
    pub fn from_choice(choice: &BTreeMap<String, String>) -> Self {
        let mut params = Self::default();
        if let Some(k) = choice.get("retrieval_k").and_then(|v| v.parse().ok()) {
            params.retrieval_k = k;
        }
        if let Some(t) = choice.get("tie_breaker") {
            params.tie_breaker = match t.as_str() {
                "prefer_general" => TieBreaker::PreferGeneral,
                _ => TieBreaker::PreferRealtime,
            };
        }
        params
    }
}

/// Conversational completion collaborator.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str, params: &ChatParams) -> Result<String>;
}

/// Search-augmented answering collaborator.
#[async_trait]
pub trait RealtimeSearch: Send + Sync {
    async fn answer(&self, query: &str, params: &SearchParams) -> Result<String>;
}

/// Placeholder chat model for hosts with no completion backend wired up.
pub struct UnconfiguredChatModel;

#[async_trait]
impl ChatModel for UnconfiguredChatModel {
    async fn complete(&self, _prompt: &str, _params: &ChatParams) -> Result<String> {
        Err(ValetError::Dispatch(
            "no chat model is configured on this host".to_string(),
        ))
    }
}

/// Placeholder search backend.
pub struct UnconfiguredSearch;

#[async_trait]
impl RealtimeSearch for UnconfiguredSearch {
    async fn answer(&self, _query: &str, _params: &SearchParams) -> Result<String> {
        Err(ValetError::Dispatch(
            "no search backend is configured on this host".to_string(),
        ))
    }
}

/// Chat model that returns a canned reply and records every call.
pub struct StubChatModel {
    reply: String,
    calls: std::sync::Mutex<Vec<(String, ChatParams)>>,
}

impl StubChatModel {
    #[must_use]
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<(String, ChatParams)> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ChatModel for StubChatModel {
    async fn complete(&self, prompt: &str, params: &ChatParams) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((prompt.to_string(), params.clone()));
        Ok(self.reply.clone())
    }
}

/// Search backend that returns a canned answer and records every call.
pub struct StubRealtimeSearch {
    answer: String,
    calls: std::sync::Mutex<Vec<(String, SearchParams)>>,
}

impl StubRealtimeSearch {
    #[must_use]
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<(String, SearchParams)> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RealtimeSearch for StubRealtimeSearch {
    async fn answer(&self, query: &str, params: &SearchParams) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((query.to_string(), params.clone()));
        Ok(self.answer.clone())
    }
}

/// One capability per intent family.
pub struct HandlerSet {
    pub apps: Arc<dyn AppControl>,
    pub links: Arc<dyn LinkOpener>,
    pub chat: Arc<dyn ChatModel>,
    pub search: Arc<dyn RealtimeSearch>,
    pub policy: Arc<AdaptivePolicy>,
}

impl HandlerSet {
    /// Execute one non-system intent to completion.
    pub async fn run(&self, intent: &Intent) -> Result<String> {
        let payload = intent.payload.as_str();
        match intent.kind {
            IntentKind::Open => {
                if self.apps.launch(payload).await {
                    Ok(format!("opened {payload}"))
                } else {
                    Err(ValetError::Dispatch(format!("could not open {payload}")))
                }
            }
            IntentKind::Close => {
                if self.apps.close(payload).await {
                    Ok(format!("closed {payload}"))
                } else {
                    Err(ValetError::Dispatch(format!("could not close {payload}")))
                }
            }
            IntentKind::Play => {
                self.links.open(&youtube_results_url(payload)).await?;
                Ok(format!("playing {payload} on youtube"))
            }
            IntentKind::YoutubeSearch => {
                self.links.open(&youtube_results_url(payload)).await?;
                Ok(format!("searched youtube for {payload}"))
            }
            IntentKind::GoogleSearch => {
                self.links.open(&google_search_url(payload)).await?;
                Ok(format!("searched google for {payload}"))
            }
            IntentKind::Image => {
                self.links.open(&image_create_url(payload)).await?;
                Ok(format!("opened image generator for {payload}"))
            }
            IntentKind::Content => self.write_content(payload).await,
            IntentKind::General => {
                let choice = self.policy.choose("chat");
                let params = ChatParams::from_choice(&choice);
                let outcome = self.chat.complete(payload, &params).await;
                let success = matches!(&outcome, Ok(answer) if !answer.trim().is_empty());
                self.policy.reward("chat", &choice, success);
                outcome
            }
            IntentKind::Realtime => {
                let choice = self.policy.choose("search");
                let params = SearchParams::from_choice(&choice);
                let outcome = self.search.answer(payload, &params).await;
                let success = matches!(&outcome, Ok(answer) if !answer.trim().is_empty());
                self.policy.reward("search", &choice, success);
                outcome
            }
            IntentKind::Exit => Ok("Okay, Bye!".to_string()),
            IntentKind::System | IntentKind::Unknown => Err(ValetError::Dispatch(format!(
                "no handler for {} intents",
                intent.kind.name()
            ))),
        }
    }

    /// Generate a piece of content, save it under the data dir and open
    /// it with the default editor.
    async fn write_content(&self, topic: &str) -> Result<String> {
        let text = self
            .chat
            .complete(&content_prompt(topic), &ChatParams::default())
            .await?;
        let dir = valet_dirs::content_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.txt", safe_label(topic).to_lowercase()));
        tokio::fs::write(&path, &text).await?;
        info!("content for '{topic}' written to {}", path.display());
        if let Err(e) = self.links.open(&path.to_string_lossy()).await {
            warn!("could not open the written content: {e}");
        }
        Ok(format!("content written to {}", path.display()))
    }
}

fn content_prompt(topic: &str) -> String {
    format!(
        "You are a content writer for letters, applications, essays, notes, songs, poems and code. Write: {topic}"
    )
}

fn youtube_results_url(query: &str) -> String {
    format!(
        "https://www.youtube.com/results?search_query={}",
        urlencoding::encode(query)
    )
}

fn google_search_url(query: &str) -> String {
    format!(
        "https://www.google.com/search?q={}",
        urlencoding::encode(query)
    )
}

fn image_create_url(prompt: &str) -> String {
    format!(
        "https://www.bing.com/images/create?q={}",
        urlencoding::encode(prompt)
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use tempfile::TempDir;

    use super::*;
    use crate::apps::StubAppControl;
    use crate::config::PolicyConfig;
    use crate::intent::Intent;
    use crate::platform::StubLinkOpener;

    struct Fixture {
        set: HandlerSet,
        apps: Arc<StubAppControl>,
        links: Arc<StubLinkOpener>,
        chat: Arc<StubChatModel>,
        search: Arc<StubRealtimeSearch>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let apps = Arc::new(StubAppControl::new());
        let links = Arc::new(StubLinkOpener::default());
        let chat = Arc::new(StubChatModel::replying("a fine answer"));
        let search = Arc::new(StubRealtimeSearch::answering("fresh news"));
        let policy = Arc::new(AdaptivePolicy::with_paths(
            &PolicyConfig::default(),
            dir.path().join("policy.json"),
            dir.path().join("metrics.csv"),
        ));
        let set = HandlerSet {
            apps: apps.clone(),
            links: links.clone(),
            chat: chat.clone(),
            search: search.clone(),
            policy,
        };
        Fixture {
            set,
            apps,
            links,
            chat,
            search,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn open_and_close_route_to_app_control() {
        let f = fixture();
        let ok = f.set.run(&Intent::parse("open chrome")).await.unwrap();
        assert_eq!(ok, "opened chrome");
        // The stub always fails closes.
        let err = f.set.run(&Intent::parse("close chrome")).await.unwrap_err();
        assert!(err.to_string().contains("could not close"));
        assert_eq!(f.apps.calls(), vec!["launch(chrome)", "close(chrome)"]);
    }

    #[tokio::test]
    async fn search_intents_open_encoded_urls() {
        let f = fixture();
        f.set
            .run(&Intent::parse("google search rust async book"))
            .await
            .unwrap();
        f.set
            .run(&Intent::parse("youtube search lofi beats"))
            .await
            .unwrap();
        f.set.run(&Intent::parse("play night drive")).await.unwrap();
        let targets = f.links.targets();
        assert_eq!(targets.len(), 3);
        assert!(targets[0].starts_with("https://www.google.com/search?q=rust%20async%20book"));
        assert!(targets[1].starts_with("https://www.youtube.com/results?search_query=lofi%20beats"));
        assert!(targets[2].starts_with("https://www.youtube.com/results?search_query=night%20drive"));
    }

    #[tokio::test]
    async fn image_intent_opens_the_generator() {
        let f = fixture();
        let ok = f
            .set
            .run(&Intent::parse("generate image of a red fox"))
            .await
            .unwrap();
        assert!(ok.contains("image generator"));
        let targets = f.links.targets();
        assert!(targets[0].starts_with("https://www.bing.com/images/create?q="));
        assert!(targets[0].contains("red%20fox"));
    }

    #[tokio::test]
    async fn general_consults_and_rewards_the_chat_policy() {
        let f = fixture();
        let answer = f
            .set
            .run(&Intent::parse("general what is borrowing"))
            .await
            .unwrap();
        assert_eq!(answer, "a fine answer");
        let calls = f.chat.calls();
        assert_eq!(calls.len(), 1);
        assert!([0.3, 0.7].contains(&calls[0].1.temperature));
        let snapshot = f.set.policy.snapshot();
        let temps = &snapshot["chat"]["temperature"];
        let total: u64 = temps.values().map(|s| s.count).sum();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn realtime_consults_and_rewards_the_search_policy() {
        let f = fixture();
        let answer = f
            .set
            .run(&Intent::parse("realtime weather in tokyo"))
            .await
            .unwrap();
        assert_eq!(answer, "fresh news");
        let calls = f.search.calls();
        assert_eq!(calls.len(), 1);
        assert!([3, 5].contains(&calls[0].1.retrieval_k));
        let snapshot = f.set.policy.snapshot();
        let ks = &snapshot["search"]["retrieval_k"];
        let total: u64 = ks.values().map(|s| s.count).sum();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn content_writes_a_file_and_opens_it() {
        let f = fixture();
        let data = TempDir::new().unwrap();
        let original = std::env::var_os("VALET_DATA_DIR");
        {
            let _env = valet_dirs::env_lock();
            // SAFETY: env_lock serializes all VALET_* mutation in this binary.
            unsafe {
                std::env::set_var("VALET_DATA_DIR", data.path());
            }
            let ok = f
                .set
                .run(&Intent::parse("content a leave application"))
                .await
                .unwrap();
            match original {
                Some(val) => unsafe { std::env::set_var("VALET_DATA_DIR", val) },
                None => unsafe { std::env::remove_var("VALET_DATA_DIR") },
            }
            assert!(ok.contains("content written"));
        }
        let path = data.path().join("content/a_leave_application.txt");
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, "a fine answer");
        // The editor open is the last recorded link target.
        assert!(f.links.targets().last().unwrap().ends_with(".txt"));
    }

    #[tokio::test]
    async fn exit_returns_the_farewell() {
        let f = fixture();
        let ok = f.set.run(&Intent::parse("exit")).await.unwrap();
        assert_eq!(ok, "Okay, Bye!");
    }

    #[tokio::test]
    async fn unconfigured_backends_error_cleanly() {
        let f = fixture();
        let set = HandlerSet {
            chat: Arc::new(UnconfiguredChatModel),
            search: Arc::new(UnconfiguredSearch),
            ..f.set
        };
        let err = set.run(&Intent::parse("general hello")).await.unwrap_err();
        assert!(err.to_string().contains("no chat model"));
        let err = set
            .run(&Intent::parse("realtime hello"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no search backend"));
    }

    #[test]
    fn params_overlay_policy_choices() {
        let mut choice = BTreeMap::new();
        choice.insert("temperature".to_string(), "0.3".to_string());
        assert_eq!(ChatParams::from_choice(&choice).temperature, 0.3);

        let mut choice = BTreeMap::new();
        choice.insert("retrieval_k".to_string(), "3".to_string());
        choice.insert("tie_breaker".to_string(), "prefer_general".to_string());
        let params = SearchParams::from_choice(&choice);
        assert_eq!(params.retrieval_k, 3);
        assert_eq!(params.tie_breaker, TieBreaker::PreferGeneral);

        // Junk values keep the defaults.
        let mut choice = BTreeMap::new();
        choice.insert("retrieval_k".to_string(), "many".to_string());
        assert_eq!(SearchParams::from_choice(&choice).retrieval_k, 5);
    }
}
