//! Intent model: each normalized command fragment is parsed exactly once
//! into a tagged [`Intent`]; all downstream dispatch matches on
//! [`IntentKind`] rather than re-inspecting strings.

use serde::{Deserialize, Serialize};

/// What family of handler a command fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Launch a named application.
    Open,
    /// Close a named application.
    Close,
    /// Play media (resolved through a media search URL).
    Play,
    /// Author a piece of content (letter, essay, code) via the chat model.
    Content,
    /// Open a Google query.
    GoogleSearch,
    /// Open a YouTube query.
    YoutubeSearch,
    /// Open an image-generation request.
    Image,
    /// OS-level action: volume, power, alarms, timers, stopwatch.
    System,
    /// Conversational question answered by the chat model.
    General,
    /// Question needing fresh information, answered by realtime search.
    Realtime,
    /// Terminate the session.
    Exit,
    /// No handler matches; reported and dropped.
    Unknown,
}

impl IntentKind {
    /// System intents are ordered by priority before execution; everything
    /// else runs in input order.
    #[must_use]
    pub fn is_system(self) -> bool {
        matches!(self, IntentKind::System)
    }

    /// Human-readable handler family name, used in logs and outcome reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            IntentKind::Open => "open",
            IntentKind::Close => "close",
            IntentKind::Play => "play",
            IntentKind::Content => "content",
            IntentKind::GoogleSearch => "google search",
            IntentKind::YoutubeSearch => "youtube search",
            IntentKind::Image => "image",
            IntentKind::System => "system",
            IntentKind::General => "general",
            IntentKind::Realtime => "realtime",
            IntentKind::Exit => "exit",
            IntentKind::Unknown => "unknown",
        }
    }
}

/// A single parsed command fragment.
///
/// `raw` keeps the normalized text the parse saw; `payload` is the text
/// after the matched prefix, trimmed. Parsed once, then immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub raw: String,
    pub kind: IntentKind,
    pub payload: String,
}

/// Canonical prefix table, longest prefix first so `youtube search x`
/// never parses as an unknown fragment starting with `you...`.
const PREFIXES: &[(&str, IntentKind)] = &[
    ("youtube search ", IntentKind::YoutubeSearch),
    ("google search ", IntentKind::GoogleSearch),
    ("generate image", IntentKind::Image),
    ("create image", IntentKind::Image),
    ("realtime ", IntentKind::Realtime),
    ("content ", IntentKind::Content),
    ("general ", IntentKind::General),
    ("system ", IntentKind::System),
    ("image ", IntentKind::Image),
    ("close ", IntentKind::Close),
    ("open ", IntentKind::Open),
    ("play ", IntentKind::Play),
];

impl Intent {
    /// Parse one normalized fragment by longest-matching canonical prefix.
    ///
    /// Unmatched text yields [`IntentKind::Unknown`] with the full text as
    /// payload; `exit` (exact) yields [`IntentKind::Exit`].
    #[must_use]
    pub fn parse(fragment: &str) -> Self {
        let raw = fragment.trim().to_lowercase();
        if raw == "exit" {
            return Self {
                raw: raw.clone(),
                kind: IntentKind::Exit,
                payload: String::new(),
            };
        }
        for (prefix, kind) in PREFIXES {
            if let Some(rest) = raw.strip_prefix(prefix) {
                let mut payload = rest.trim().to_string();
                if *kind == IntentKind::Image {
                    // Accepts bare "generate image of a cat" as well as the
                    // mapped "image ..." form.
                    if let Some(rest) = payload.strip_prefix("of ") {
                        payload = rest.trim().to_string();
                    }
                    if payload.is_empty() {
                        payload = "an image".to_string();
                    }
                }
                return Self {
                    raw,
                    kind: *kind,
                    payload,
                };
            }
        }
        Self {
            payload: raw.clone(),
            raw,
            kind: IntentKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn parses_open_with_payload() {
        let intent = Intent::parse("open firefox");
        assert_eq!(intent.kind, IntentKind::Open);
        assert_eq!(intent.payload, "firefox");
    }

    #[test]
    fn longest_prefix_wins_for_youtube_search() {
        let intent = Intent::parse("youtube search lo-fi beats");
        assert_eq!(intent.kind, IntentKind::YoutubeSearch);
        assert_eq!(intent.payload, "lo-fi beats");
    }

    #[test]
    fn google_search_not_shadowed_by_general() {
        let intent = Intent::parse("google search rust atomics");
        assert_eq!(intent.kind, IntentKind::GoogleSearch);
        assert_eq!(intent.payload, "rust atomics");
    }

    #[test]
    fn system_fragment_keeps_subcommand_payload() {
        let intent = Intent::parse("system alarm 09:00 standup");
        assert_eq!(intent.kind, IntentKind::System);
        assert_eq!(intent.payload, "alarm 09:00 standup");
    }

    #[test]
    fn exit_is_exact_match_only() {
        assert_eq!(Intent::parse("exit").kind, IntentKind::Exit);
        assert_eq!(Intent::parse("exit now").kind, IntentKind::Unknown);
    }

    #[test]
    fn unknown_keeps_full_text() {
        let intent = Intent::parse("make me a sandwich");
        assert_eq!(intent.kind, IntentKind::Unknown);
        assert_eq!(intent.payload, "make me a sandwich");
    }

    #[test]
    fn parse_lowercases_and_trims() {
        let intent = Intent::parse("  OPEN Firefox  ");
        assert_eq!(intent.kind, IntentKind::Open);
        assert_eq!(intent.raw, "open firefox");
        assert_eq!(intent.payload, "firefox");
    }

    #[test]
    fn bare_generate_image_defaults_prompt() {
        let intent = Intent::parse("generate image");
        assert_eq!(intent.kind, IntentKind::Image);
        assert_eq!(intent.payload, "an image");
    }

    #[test]
    fn generate_image_of_strips_connector() {
        let intent = Intent::parse("generate image of a red fox");
        assert_eq!(intent.kind, IntentKind::Image);
        assert_eq!(intent.payload, "a red fox");
    }

    #[test]
    fn mapped_image_prefix_parses() {
        let intent = Intent::parse("image a castle at dusk");
        assert_eq!(intent.kind, IntentKind::Image);
        assert_eq!(intent.payload, "a castle at dusk");
    }

    #[test]
    fn only_system_is_system() {
        assert!(IntentKind::System.is_system());
        assert!(!IntentKind::Open.is_system());
        assert!(!IntentKind::Exit.is_system());
    }
}
