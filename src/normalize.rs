//! Intent normalization: composite-command splitting, freeform-to-canonical
//! rewriting, and the token helpers shared by the system action engine
//! (label sanitizing, clock-time and duration parsing).
//!
//! Everything here is a pure text transform; the normalizer holds no state.

/// Prefixes that already name a handler family and pass through unmapped.
const CANONICAL_PREFIXES: &[&str] = &[
    "open ",
    "close ",
    "play ",
    "content ",
    "google search ",
    "youtube search ",
    "system ",
    "image ",
    "general ",
    "realtime ",
];

/// Content-authoring prefixes whose payload may legitimately contain
/// "and", so the fragment is never split further.
const CONTENT_PREFIXES: &[&str] = &["content ", "write ", "create "];

fn starts_with_any(text: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| text.starts_with(p))
}

/// Split possibly-composite command strings into atomic fragments.
///
/// Each input splits on commas; each comma part splits again on the literal
/// `" and "` separator unless it is a content-authoring request ("write a
/// letter and send it" stays whole). Parts that vanish entirely under
/// splitting keep the original string, and an empty overall expansion
/// returns the input unchanged. Idempotent.
#[must_use]
pub fn normalize_commands(commands: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    for command in commands {
        let parts: Vec<&str> = command
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        let mut further: Vec<String> = Vec::new();
        for part in &parts {
            if starts_with_any(&part.to_lowercase(), CONTENT_PREFIXES) {
                further.push((*part).to_string());
            } else {
                further.extend(
                    part.split(" and ")
                        .map(str::trim)
                        .filter(|x| !x.is_empty())
                        .map(String::from),
                );
            }
        }
        if further.is_empty() {
            expanded.push(command.clone());
        } else {
            expanded.append(&mut further);
        }
    }
    if expanded.is_empty() {
        commands.to_vec()
    } else {
        expanded
    }
}

/// Rewrite loosely phrased input onto a canonical handler prefix.
///
/// Returns `None` when the text already carries a canonical prefix or no
/// rewrite applies (the dispatcher then reports unmatched text itself).
#[must_use]
pub fn map_freeform(text: &str) -> Option<String> {
    let t = text.trim().to_lowercase();

    // Social shorthand expands before the generic "open " passthrough,
    // otherwise "open insta" would launch an app literally named "insta".
    if t.starts_with("open instagram") || t.starts_with("open insta") {
        return (t != "open instagram").then(|| "open instagram".to_string());
    }
    if t.starts_with("open facebook") || t.starts_with("open fb") {
        return (t != "open facebook").then(|| "open facebook".to_string());
    }

    if starts_with_any(&t, CANONICAL_PREFIXES) {
        return None;
    }
    if starts_with_any(&t, &["write ", "compose ", "draft "]) {
        return Some(format!("content {t}"));
    }
    // Strict: only these two image phrasings map.
    for form in ["generate image", "create image"] {
        if let Some(rest) = t.strip_prefix(form) {
            let rest = rest.trim().trim_start_matches("of ").trim();
            let prompt = if rest.is_empty() { "an image" } else { rest };
            return Some(format!("image {prompt}"));
        }
    }
    if starts_with_any(
        &t,
        &[
            "lock ",
            "sleep ",
            "screen off",
            "turn off screen",
            "display off",
            "alarm ",
            "delete alarm",
            "delete task",
        ],
    ) {
        return Some(format!("system {t}"));
    }
    for prefix in ["search youtube for ", "youtube "] {
        if let Some(rest) = t.strip_prefix(prefix) {
            return Some(format!("youtube search {rest}"));
        }
    }
    for prefix in ["search google for ", "google "] {
        if let Some(rest) = t.strip_prefix(prefix) {
            return Some(format!("google search {rest}"));
        }
    }
    if let Some(rest) = t.strip_prefix("listen to ") {
        return Some(format!("play {rest}"));
    }
    None
}

/// Sanitize an alarm label into a registry/task identifier: keep
/// alphanumerics, spaces, underscores and hyphens, trim, replace spaces
/// with underscores, truncate to 64 characters.
#[must_use]
pub fn safe_label(label: &str) -> String {
    label
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, ' ' | '_' | '-'))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
        .chars()
        .take(64)
        .collect()
}

/// Zero-padded `HH:MM` from a single colon-delimited token ("9:5" →
/// "09:05"), or `None` if the token is not a valid clock time.
#[must_use]
pub fn clock_token(token: &str) -> Option<String> {
    let (h, m) = token.split_once(':')?;
    if h.is_empty()
        || m.is_empty()
        || !h.chars().all(|c| c.is_ascii_digit())
        || !m.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    format_clock(h.parse().ok()?, m.parse().ok()?)
}

/// Recover a zero-padded `HH:MM` clock time from already-split tokens.
///
/// Accepts `"20:14"`, `"20 14"` (two tokens), or `"2014"`, all yielding
/// `"20:14"`. Returns `None` when no token combination forms a valid time.
#[must_use]
pub fn normalize_time_tokens(tokens: &[&str]) -> Option<String> {
    for t in tokens {
        if let Some(clock) = clock_token(t) {
            return Some(clock);
        }
    }
    let nums: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .collect();
    if nums.len() >= 2 && nums[0].len() <= 2 && nums[1].len() <= 2 {
        return format_clock(nums[0].parse().ok()?, nums[1].parse().ok()?);
    }
    if nums.len() == 1 && (nums[0].len() == 3 || nums[0].len() == 4) {
        let padded = format!("{:0>4}", nums[0]);
        return format_clock(padded[..2].parse().ok()?, padded[2..].parse().ok()?);
    }
    None
}

fn format_clock(hour: u32, minute: u32) -> Option<String> {
    (hour < 24 && minute < 60).then(|| format!("{hour:02}:{minute:02}"))
}

/// True when a token is a duration term: bare digits (seconds) or digits
/// followed by an `h`/`m`/`s` unit, long unit names included. Word tokens
/// that merely end in a unit letter ("dishes") are label text, not
/// durations.
#[must_use]
pub fn is_duration_token(token: &str) -> bool {
    duration_token_secs(token).is_some()
}

fn duration_token_secs(token: &str) -> Option<u64> {
    let t = canonical_unit(token);
    if !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()) {
        return t.parse().ok();
    }
    let unit = t.chars().last()?;
    let digits = &t[..t.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;
    match unit {
        'h' => Some(value * 3600),
        'm' => Some(value * 60),
        's' => Some(value),
        _ => None,
    }
}

fn canonical_unit(token: &str) -> String {
    let mut t = token.to_string();
    for (long, short) in [
        ("hours", "h"),
        ("hour", "h"),
        ("hrs", "h"),
        ("hr", "h"),
        ("minutes", "m"),
        ("minute", "m"),
        ("mins", "m"),
        ("min", "m"),
        ("seconds", "s"),
        ("second", "s"),
        ("secs", "s"),
        ("sec", "s"),
    ] {
        if let Some(head) = t.strip_suffix(long) {
            t = format!("{head}{short}");
            break;
        }
    }
    t
}

/// Sum a duration expression ("1h 30m", "10m", "45") into whole seconds,
/// floored at one second. Non-duration tokens contribute nothing.
#[must_use]
pub fn parse_duration_secs(text: &str) -> u64 {
    let total: u64 = text.split_whitespace().filter_map(duration_token_secs).sum();
    total.max(1)
}
