//! Display formatting for canonical key strings.
//!
//! Formatting is presentation only and runs on the canonical string form,
//! not on parsed bindings, so the cheat sheet can render whatever is stored
//! without a parse step. Unknown tokens fall back to their upper-cased
//! literal form instead of erroring.
//!
//! macOS rendering uses the native modifier glyphs with no separator
//! (`⌘⇧K`); everywhere else modifiers are spelled out and joined with `+`
//! (`Ctrl+Shift+K`). Sequence hops are joined with a space on macOS and with
//! `" then "` elsewhere (`G D` vs `G then D`).
//!
//! # Examples
//!
//! ```
//! use keyscope::format::format_keys;
//! use keyscope::keys::Platform;
//!
//! assert_eq!(format_keys("mod+shift+k", Platform::MacOs), "⌘⇧K");
//! assert_eq!(format_keys("mod+shift+k", Platform::Linux), "Ctrl+Shift+K");
//! assert_eq!(format_keys("g>d", Platform::Windows), "G then D");
//! ```

use crate::keys::Platform;

/// Render one canonical key string for `platform`.
pub fn format_keys(keys: &str, platform: Platform) -> String {
    let hops: Vec<String> = keys
        .split('>')
        .map(|hop| format_chord(hop, platform))
        .collect();
    match platform {
        Platform::MacOs => hops.join(" "),
        Platform::Windows | Platform::Linux => hops.join(" then "),
    }
}

fn format_chord(chord: &str, platform: Platform) -> String {
    let tokens: Vec<String> = chord
        .split('+')
        .filter(|token| !token.trim().is_empty())
        .map(|token| format_token(token.trim(), platform))
        .collect();
    match platform {
        Platform::MacOs => tokens.concat(),
        Platform::Windows | Platform::Linux => tokens.join("+"),
    }
}

fn format_token(token: &str, platform: Platform) -> String {
    if let Some(modifier) = modifier_display(token, platform) {
        return modifier.to_string();
    }
    if let Some(key) = key_display(token, platform) {
        return key.to_string();
    }
    token.to_uppercase()
}

fn modifier_display(token: &str, platform: Platform) -> Option<&'static str> {
    let mac = matches!(platform, Platform::MacOs);
    Some(match token {
        "mod" => {
            if mac {
                "⌘"
            } else {
                "Ctrl"
            }
        }
        "ctrl" => {
            if mac {
                "⌃"
            } else {
                "Ctrl"
            }
        }
        "meta" => {
            if mac {
                "⌘"
            } else if matches!(platform, Platform::Windows) {
                "Win"
            } else {
                "Super"
            }
        }
        "shift" => {
            if mac {
                "⇧"
            } else {
                "Shift"
            }
        }
        "alt" => {
            if mac {
                "⌥"
            } else {
                "Alt"
            }
        }
        _ => return None,
    })
}

fn key_display(token: &str, platform: Platform) -> Option<&'static str> {
    let mac = matches!(platform, Platform::MacOs);
    Some(match token {
        "enter" => {
            if mac {
                "↵"
            } else {
                "Enter"
            }
        }
        "escape" => {
            if mac {
                "⎋"
            } else {
                "Esc"
            }
        }
        "tab" => {
            if mac {
                "⇥"
            } else {
                "Tab"
            }
        }
        "space" => "Space",
        "backspace" => {
            if mac {
                "⌫"
            } else {
                "Backspace"
            }
        }
        "delete" => {
            if mac {
                "⌦"
            } else {
                "Del"
            }
        }
        "insert" => "Ins",
        "up" => "↑",
        "down" => "↓",
        "left" => "←",
        "right" => "→",
        "home" => {
            if mac {
                "↖"
            } else {
                "Home"
            }
        }
        "end" => {
            if mac {
                "↘"
            } else {
                "End"
            }
        }
        "pageup" => {
            if mac {
                "⇞"
            } else {
                "PgUp"
            }
        }
        "pagedown" => {
            if mac {
                "⇟"
            } else {
                "PgDn"
            }
        }
        // Punctuation stored by word name renders as its character.
        "slash" => "/",
        "question" => "?",
        "backslash" => "\\",
        "comma" => ",",
        "period" => ".",
        "semicolon" => ";",
        "quote" => "'",
        "backquote" => "`",
        "bracketleft" => "[",
        "bracketright" => "]",
        "minus" => "-",
        "equal" => "=",
        _ => return None,
    })
}
