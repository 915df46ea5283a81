//! Canonical key grammar: modifiers, chords, and two-key sequences.
//!
//! A binding's keys are stored as a canonical string. A chord is a set of
//! modifiers plus exactly one non-modifier key, joined with `+` in the fixed
//! order `mod, ctrl, meta, shift, alt` (e.g. `mod+shift+k`). A sequence is
//! two to four chords joined with `>` (e.g. `g>d`), pressed one after the
//! other within a timing window.
//!
//! The `mod` token is symbolic: it names the platform primary modifier and
//! resolves to `meta` (Command) on macOS and `ctrl` everywhere else. Strings
//! keep the symbolic form so persisted customizations stay portable across
//! machines; resolution happens only when comparing against concrete input.
//!
//! # Examples
//!
//! ```
//! use keyscope::keys::KeySpec;
//!
//! let spec = KeySpec::parse("Mod + Shift + K").unwrap();
//! assert_eq!(spec.canonical(), "mod+shift+k");
//!
//! let seq = KeySpec::parse("g>d").unwrap();
//! assert!(seq.is_sequence());
//! ```

use std::fmt;

use smallvec::SmallVec;
use thiserror::Error;

/// Upper bound on chords in one sequence. Two is the common case, anything
/// past four is unusable from muscle memory.
pub const MAX_SEQUENCE_HOPS: usize = 4;

// ============================================================================
// Errors
// ============================================================================

/// Errors from parsing a key string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("empty key string")]
    Empty,

    #[error("chord '{0}' has modifiers but no key")]
    MissingKey(String),

    #[error("chord '{0}' has more than one non-modifier key")]
    ExtraKey(String),

    #[error("unknown key '{0}'")]
    UnknownKey(String),

    #[error("sequence '{0}' has an empty hop")]
    EmptyHop(String),

    #[error("sequence has {0} hops, the maximum is {MAX_SEQUENCE_HOPS}")]
    TooManyHops(usize),
}

// ============================================================================
// Platform
// ============================================================================

/// Target platform, used to resolve the symbolic `mod` modifier and to pick
/// display conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        {
            Platform::MacOs
        }
        #[cfg(target_os = "windows")]
        {
            Platform::Windows
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            Platform::Linux
        }
    }

    /// Whether `mod` resolves to the meta key (Command) rather than ctrl.
    pub fn primary_is_meta(self) -> bool {
        matches!(self, Platform::MacOs)
    }
}

// ============================================================================
// Modifiers
// ============================================================================

/// Modifier flags as written in a key string. `primary` is the symbolic
/// `mod` token; the concrete flags name physical modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub primary: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

/// Modifier flags after `mod` has been folded into a concrete key for one
/// platform. This is the form input events are compared in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResolvedModifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.primary || self.ctrl || self.meta || self.shift || self.alt
    }

    /// Fold the symbolic `mod` flag into the platform primary modifier.
    pub fn resolved(&self, platform: Platform) -> ResolvedModifiers {
        let mut out = ResolvedModifiers {
            ctrl: self.ctrl,
            meta: self.meta,
            shift: self.shift,
            alt: self.alt,
        };
        if self.primary {
            if platform.primary_is_meta() {
                out.meta = true;
            } else {
                out.ctrl = true;
            }
        }
        out
    }

    /// Canonical token order: `mod, ctrl, meta, shift, alt`.
    fn canonical_tokens(&self) -> Vec<&'static str> {
        let mut tokens = Vec::new();
        if self.primary {
            tokens.push("mod");
        }
        if self.ctrl {
            tokens.push("ctrl");
        }
        if self.meta {
            tokens.push("meta");
        }
        if self.shift {
            tokens.push("shift");
        }
        if self.alt {
            tokens.push("alt");
        }
        tokens
    }
}

// ============================================================================
// Key name canonicalization
// ============================================================================

/// Normalize a key name to its canonical form. Accepts the common aliases
/// hosts produce (browser `event.key` values, `esc`, `return`) and maps
/// punctuation characters to word names so canonical strings stay `+`/`>`
/// safe.
pub fn canonicalize_key(key: &str) -> String {
    let lower = key.trim().to_lowercase();
    match lower.as_str() {
        "esc" => "escape".to_string(),
        "return" => "enter".to_string(),
        "spacebar" | " " => "space".to_string(),
        "del" => "delete".to_string(),
        "ins" => "insert".to_string(),
        "arrowup" => "up".to_string(),
        "arrowdown" => "down".to_string(),
        "arrowleft" => "left".to_string(),
        "arrowright" => "right".to_string(),
        "pgup" | "pageup" => "pageup".to_string(),
        "pgdn" | "pgdown" | "pagedown" => "pagedown".to_string(),
        "/" => "slash".to_string(),
        "?" => "question".to_string(),
        "\\" => "backslash".to_string(),
        "," => "comma".to_string(),
        "." => "period".to_string(),
        ";" => "semicolon".to_string(),
        "'" => "quote".to_string(),
        "`" => "backquote".to_string(),
        "[" => "bracketleft".to_string(),
        "]" => "bracketright".to_string(),
        "-" => "minus".to_string(),
        "=" => "equal".to_string(),
        _ => lower,
    }
}

/// Whether a canonical key name is one the grammar accepts.
pub fn is_known_key(key: &str) -> bool {
    // Letters and digits
    if key.len() == 1 && key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return true;
    }

    // Function keys f1..f12
    if let Some(n) = key.strip_prefix('f') {
        if let Ok(n) = n.parse::<u8>() {
            return (1..=12).contains(&n);
        }
    }

    matches!(
        key,
        // Named keys
        "escape" | "enter" | "tab" | "space" | "backspace" | "delete" | "insert"
            | "up" | "down" | "left" | "right"
            | "home" | "end" | "pageup" | "pagedown"
            // Punctuation by word name
            | "slash" | "question" | "backslash" | "comma" | "period" | "semicolon"
            | "quote" | "backquote" | "bracketleft" | "bracketright" | "minus" | "equal"
    )
}

/// Punctuation keys whose character identity is what users mean. Reaching
/// them needs shift on some layouts and not on others, so shift is ignored
/// when comparing chords built on them (`?` matches with or without shift,
/// while `ctrl+/` still requires ctrl).
pub fn is_layout_symbol(key: &str) -> bool {
    matches!(
        key,
        "slash" | "question" | "backslash" | "comma" | "period" | "semicolon"
            | "quote" | "backquote" | "bracketleft" | "bracketright" | "minus" | "equal"
    )
}

// ============================================================================
// Chord
// ============================================================================

/// One simultaneous key press: modifiers plus a single non-modifier key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chord {
    pub mods: Modifiers,
    pub key: String,
}

impl Chord {
    /// Parse a single chord like `mod+shift+k`. Tokens are case-insensitive
    /// and surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, KeyParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(KeyParseError::Empty);
        }

        let mut mods = Modifiers::none();
        let mut key: Option<String> = None;

        for part in trimmed.split('+') {
            let token = part.trim().to_lowercase();
            if token.is_empty() {
                continue;
            }
            match token.as_str() {
                "mod" | "cmd" | "command" => mods.primary = true,
                "ctrl" | "control" => mods.ctrl = true,
                "meta" | "super" | "win" => mods.meta = true,
                "shift" => mods.shift = true,
                "alt" | "option" | "opt" => mods.alt = true,
                _ => {
                    let canonical = canonicalize_key(&token);
                    if !is_known_key(&canonical) {
                        return Err(KeyParseError::UnknownKey(token));
                    }
                    if key.is_some() {
                        return Err(KeyParseError::ExtraKey(trimmed.to_string()));
                    }
                    key = Some(canonical);
                }
            }
        }

        match key {
            Some(key) => Ok(Chord { mods, key }),
            None => Err(KeyParseError::MissingKey(trimmed.to_string())),
        }
    }

    /// Build a chord from concrete input-event state. The key name is
    /// canonicalized; modifier flags are taken as-is, so the result never
    /// uses the symbolic `mod` flag.
    pub fn from_event(event: &RawKeyEvent) -> Self {
        Chord {
            mods: Modifiers {
                primary: false,
                ctrl: event.ctrl,
                meta: event.meta,
                shift: event.shift,
                alt: event.alt,
            },
            key: canonicalize_key(&event.key),
        }
    }

    /// Canonical string form, e.g. `mod+shift+k`.
    pub fn canonical(&self) -> String {
        let mut tokens = self.mods.canonical_tokens();
        tokens.push(&self.key);
        tokens.join("+")
    }

    /// Whether this chord (binding side, possibly using `mod`) matches a
    /// concrete chord taken from input. Shift is ignored for layout symbol
    /// keys.
    pub fn matches(&self, event: &Chord, platform: Platform) -> bool {
        if self.key != event.key {
            return false;
        }
        let mut ours = self.mods.resolved(platform);
        let mut theirs = event.mods.resolved(platform);
        if is_layout_symbol(&self.key) {
            ours.shift = false;
            theirs.shift = false;
        }
        ours == theirs
    }

    /// Whether two binding-side chords land on the same physical keys once
    /// `mod` is resolved for `platform`.
    pub fn same_effective(&self, other: &Chord, platform: Platform) -> bool {
        self.key == other.key && self.mods.resolved(platform) == other.mods.resolved(platform)
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

// ============================================================================
// KeySpec
// ============================================================================

/// The effective keys of one binding: a single chord, or a short sequence of
/// chords pressed within the timing window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySpec {
    Chord(Chord),
    Sequence(SmallVec<[Chord; MAX_SEQUENCE_HOPS]>),
}

impl KeySpec {
    /// Parse a canonical key string. A `>` anywhere makes it a sequence;
    /// every hop must itself be a valid chord.
    pub fn parse(input: &str) -> Result<Self, KeyParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(KeyParseError::Empty);
        }

        if !trimmed.contains('>') {
            return Ok(KeySpec::Chord(Chord::parse(trimmed)?));
        }

        let mut hops: SmallVec<[Chord; MAX_SEQUENCE_HOPS]> = SmallVec::new();
        for hop in trimmed.split('>') {
            if hop.trim().is_empty() {
                return Err(KeyParseError::EmptyHop(trimmed.to_string()));
            }
            if hops.len() == MAX_SEQUENCE_HOPS {
                return Err(KeyParseError::TooManyHops(trimmed.split('>').count()));
            }
            hops.push(Chord::parse(hop)?);
        }
        debug_assert!(hops.len() >= 2);
        Ok(KeySpec::Sequence(hops))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, KeySpec::Sequence(_))
    }

    /// Hops in order. A chord is a one-hop slice.
    pub fn hops(&self) -> &[Chord] {
        match self {
            KeySpec::Chord(chord) => std::slice::from_ref(chord),
            KeySpec::Sequence(hops) => hops,
        }
    }

    /// Canonical string form (`mod+k`, `g>d`).
    pub fn canonical(&self) -> String {
        match self {
            KeySpec::Chord(chord) => chord.canonical(),
            KeySpec::Sequence(hops) => hops
                .iter()
                .map(Chord::canonical)
                .collect::<Vec<_>>()
                .join(">"),
        }
    }

    /// Canonical form with `mod` folded into its concrete modifier. Two
    /// specs that collide at runtime on `platform` have equal resolved
    /// strings even when their symbolic spellings differ.
    pub fn resolved_canonical(&self, platform: Platform) -> String {
        self.hops()
            .iter()
            .map(|chord| {
                let resolved = chord.mods.resolved(platform);
                let symbolic = Modifiers {
                    primary: false,
                    ctrl: resolved.ctrl,
                    meta: resolved.meta,
                    shift: resolved.shift,
                    alt: resolved.alt,
                };
                Chord {
                    mods: symbolic,
                    key: chord.key.clone(),
                }
                .canonical()
            })
            .collect::<Vec<_>>()
            .join(">")
    }

    /// Chord-type spec matching a concrete input chord.
    pub fn matches_chord(&self, event: &Chord, platform: Platform) -> bool {
        match self {
            KeySpec::Chord(chord) => chord.matches(event, platform),
            KeySpec::Sequence(_) => false,
        }
    }

    /// Sequence-type spec matching a complete run of input chords.
    pub fn matches_hops(&self, events: &[Chord], platform: Platform) -> bool {
        match self {
            KeySpec::Chord(_) => false,
            KeySpec::Sequence(hops) => {
                hops.len() == events.len()
                    && hops
                        .iter()
                        .zip(events)
                        .all(|(hop, event)| hop.matches(event, platform))
            }
        }
    }

    /// Sequence-type spec for which `events` is a strict prefix, meaning at
    /// least one more hop is still expected.
    pub fn has_hop_prefix(&self, events: &[Chord], platform: Platform) -> bool {
        match self {
            KeySpec::Chord(_) => false,
            KeySpec::Sequence(hops) => {
                hops.len() > events.len()
                    && hops
                        .iter()
                        .zip(events)
                        .all(|(hop, event)| hop.matches(event, platform))
            }
        }
    }

    /// Whether this spec matches a completed input unit: a lone chord or a
    /// full sequence run.
    pub fn matches_input(&self, unit: &KeySpec, platform: Platform) -> bool {
        match unit {
            KeySpec::Chord(chord) => self.matches_chord(chord, platform),
            KeySpec::Sequence(hops) => self.matches_hops(hops, platform),
        }
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

// ============================================================================
// Raw input events
// ============================================================================

/// A key press as delivered by the host shell, before any interpretation.
/// `key` accepts browser-style names (`"k"`, `"?"`, `"Escape"`, `"ArrowUp"`);
/// the modifier flags are the concrete state at press time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
    /// True when focus is in a text-entry control. Bindings without the
    /// text-input allowance are skipped for these events.
    pub in_text_input: bool,
}

impl RawKeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        RawKeyEvent {
            key: key.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_key() {
        let spec = KeySpec::parse("k").unwrap();
        assert_eq!(spec.canonical(), "k");
        assert!(!spec.is_sequence());
    }

    #[test]
    fn parses_chord_with_modifiers_in_any_order() {
        let spec = KeySpec::parse("shift+mod+k").unwrap();
        assert_eq!(spec.canonical(), "mod+shift+k");
    }

    #[test]
    fn canonical_modifier_order_is_fixed() {
        let spec = KeySpec::parse("alt+shift+meta+ctrl+mod+x").unwrap();
        assert_eq!(spec.canonical(), "mod+ctrl+meta+shift+alt+x");
    }

    #[test]
    fn parse_is_case_and_whitespace_insensitive() {
        let spec = KeySpec::parse("  Mod + Shift + K  ").unwrap();
        assert_eq!(spec.canonical(), "mod+shift+k");
    }

    #[test]
    fn parses_modifier_aliases() {
        assert_eq!(KeySpec::parse("cmd+k").unwrap().canonical(), "mod+k");
        assert_eq!(KeySpec::parse("control+k").unwrap().canonical(), "ctrl+k");
        assert_eq!(KeySpec::parse("option+k").unwrap().canonical(), "alt+k");
        assert_eq!(KeySpec::parse("super+k").unwrap().canonical(), "meta+k");
    }

    #[test]
    fn canonicalizes_key_aliases() {
        assert_eq!(KeySpec::parse("esc").unwrap().canonical(), "escape");
        assert_eq!(KeySpec::parse("Return").unwrap().canonical(), "enter");
        assert_eq!(KeySpec::parse("ArrowUp").unwrap().canonical(), "up");
        assert_eq!(KeySpec::parse("?").unwrap().canonical(), "question");
        assert_eq!(KeySpec::parse("/").unwrap().canonical(), "slash");
    }

    #[test]
    fn rejects_bad_chords() {
        assert_eq!(KeySpec::parse(""), Err(KeyParseError::Empty));
        assert_eq!(KeySpec::parse("   "), Err(KeyParseError::Empty));
        assert!(matches!(
            KeySpec::parse("mod+shift"),
            Err(KeyParseError::MissingKey(_))
        ));
        assert!(matches!(
            KeySpec::parse("mod+k+j"),
            Err(KeyParseError::ExtraKey(_))
        ));
        assert!(matches!(
            KeySpec::parse("mod+bogus"),
            Err(KeyParseError::UnknownKey(_))
        ));
    }

    #[test]
    fn parses_two_hop_sequence() {
        let spec = KeySpec::parse("g>d").unwrap();
        assert!(spec.is_sequence());
        assert_eq!(spec.hops().len(), 2);
        assert_eq!(spec.canonical(), "g>d");
    }

    #[test]
    fn sequence_hops_may_carry_modifiers() {
        let spec = KeySpec::parse("g > Mod+D").unwrap();
        assert_eq!(spec.canonical(), "g>mod+d");
    }

    #[test]
    fn rejects_bad_sequences() {
        assert!(matches!(
            KeySpec::parse("g>"),
            Err(KeyParseError::EmptyHop(_))
        ));
        assert!(matches!(
            KeySpec::parse(">d"),
            Err(KeyParseError::EmptyHop(_))
        ));
        assert!(matches!(
            KeySpec::parse("a>b>c>d>e"),
            Err(KeyParseError::TooManyHops(5))
        ));
    }

    #[test]
    fn four_hops_is_the_limit() {
        assert!(KeySpec::parse("a>b>c>d").is_ok());
    }

    #[test]
    fn mod_resolves_to_meta_on_macos_and_ctrl_elsewhere() {
        let chord = Chord::parse("mod+k").unwrap();

        let mac = chord.mods.resolved(Platform::MacOs);
        assert!(mac.meta && !mac.ctrl);

        let linux = chord.mods.resolved(Platform::Linux);
        assert!(linux.ctrl && !linux.meta);
    }

    #[test]
    fn chord_matches_concrete_event_per_platform() {
        let chord = Chord::parse("mod+k").unwrap();

        let cmd_k = Chord::from_event(&RawKeyEvent {
            key: "k".into(),
            meta: true,
            ..Default::default()
        });
        let ctrl_k = Chord::from_event(&RawKeyEvent {
            key: "k".into(),
            ctrl: true,
            ..Default::default()
        });

        assert!(chord.matches(&cmd_k, Platform::MacOs));
        assert!(!chord.matches(&ctrl_k, Platform::MacOs));
        assert!(chord.matches(&ctrl_k, Platform::Linux));
        assert!(!chord.matches(&cmd_k, Platform::Linux));
    }

    #[test]
    fn extra_modifiers_do_not_match() {
        let chord = Chord::parse("k").unwrap();
        let shift_k = Chord::from_event(&RawKeyEvent {
            key: "k".into(),
            shift: true,
            ..Default::default()
        });
        assert!(!chord.matches(&shift_k, Platform::Linux));
    }

    #[test]
    fn shift_is_ignored_for_layout_symbols() {
        let question = Chord::parse("?").unwrap();
        let with_shift = Chord::from_event(&RawKeyEvent {
            key: "?".into(),
            shift: true,
            ..Default::default()
        });
        let without_shift = Chord::from_event(&RawKeyEvent::new("?"));

        assert!(question.matches(&with_shift, Platform::Linux));
        assert!(question.matches(&without_shift, Platform::Linux));
    }

    #[test]
    fn non_shift_modifiers_still_count_for_layout_symbols() {
        let slash = Chord::parse("ctrl+/").unwrap();
        let plain = Chord::from_event(&RawKeyEvent::new("/"));
        assert!(!slash.matches(&plain, Platform::Linux));

        let ctrl_slash = Chord::from_event(&RawKeyEvent {
            key: "/".into(),
            ctrl: true,
            ..Default::default()
        });
        assert!(slash.matches(&ctrl_slash, Platform::Linux));
    }

    #[test]
    fn resolved_canonical_folds_mod() {
        let spec = KeySpec::parse("mod+k").unwrap();
        assert_eq!(spec.resolved_canonical(Platform::MacOs), "meta+k");
        assert_eq!(spec.resolved_canonical(Platform::Linux), "ctrl+k");

        let meta = KeySpec::parse("meta+k").unwrap();
        assert_eq!(
            spec.resolved_canonical(Platform::MacOs),
            meta.resolved_canonical(Platform::MacOs)
        );
    }

    #[test]
    fn sequence_prefix_and_full_match() {
        let spec = KeySpec::parse("g>d").unwrap();
        let g = Chord::from_event(&RawKeyEvent::new("g"));
        let d = Chord::from_event(&RawKeyEvent::new("d"));

        assert!(spec.has_hop_prefix(&[g.clone()], Platform::Linux));
        assert!(spec.matches_hops(&[g.clone(), d.clone()], Platform::Linux));
        assert!(!spec.matches_hops(&[g.clone()], Platform::Linux));
        assert!(!spec.has_hop_prefix(&[g, d], Platform::Linux));
    }

    #[test]
    fn function_keys_parse_up_to_f12() {
        assert!(KeySpec::parse("f1").is_ok());
        assert!(KeySpec::parse("f12").is_ok());
        assert!(matches!(
            KeySpec::parse("f13"),
            Err(KeyParseError::UnknownKey(_))
        ));
    }
}
