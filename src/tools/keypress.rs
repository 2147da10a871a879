use anyhow::Result;
use serde_json::{json, Value};

use super::args::first_string;
use crate::host::Host;
use crate::types::ToolResult;

const KEY_CTRL: u16 = 29;
const KEY_SHIFT: u16 = 42;
const KEY_ALT: u16 = 56;
const KEY_SUPER: u16 = 125;

/// One edge of a key event, in Linux evdev codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub code: u16,
    pub pressed: bool,
}

impl KeyStroke {
    pub fn down(code: u16) -> Self {
        Self {
            code,
            pressed: true,
        }
    }

    pub fn up(code: u16) -> Self {
        Self {
            code,
            pressed: false,
        }
    }

    /// `code:1` / `code:0`, the form ydotool's `key` subcommand takes.
    pub fn to_ydotool_arg(self) -> String {
        format!("{}:{}", self.code, u8::from(self.pressed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// A single key or one modifier combo as an ordered edge sequence.
    Press(Vec<KeyStroke>),
    /// Literal text typed as-is.
    Type(String),
}

impl KeyAction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Press(strokes) if strokes.len() == 2 => "key",
            Self::Press(_) => "combo",
            Self::Type(_) => "text",
        }
    }
}

fn keycode_for_key(token: &str) -> Option<u16> {
    let lower = token.to_ascii_lowercase();
    let code = match lower.as_str() {
        "enter" | "return" => 96,
        "mainenter" => 28,
        "esc" | "escape" => 1,
        "tab" => 15,
        "space" => 57,
        "backspace" => 14,
        "delete" | "del" => 111,
        "insert" | "ins" => 110,
        "home" => 102,
        "end" => 107,
        "pageup" | "pgup" => 104,
        "pagedown" | "pgdn" => 109,
        "up" => 103,
        "down" => 108,
        "left" => 105,
        "right" => 106,
        "f1" => 59,
        "f2" => 60,
        "f3" => 61,
        "f4" => 62,
        "f5" => 63,
        "f6" => 64,
        "f7" => 65,
        "f8" => 66,
        "f9" => 67,
        "f10" => 68,
        "f11" => 87,
        "f12" => 88,
        "-" | "minus" => 12,
        "=" | "equal" => 13,
        "[" | "lbracket" => 26,
        "]" | "rbracket" => 27,
        "\\" | "backslash" => 43,
        ";" | "semicolon" => 39,
        "'" | "apostrophe" => 40,
        "`" | "grave" => 41,
        "," | "comma" => 51,
        "." | "dot" | "period" => 52,
        "/" | "slash" => 53,
        single if single.chars().count() == 1 => {
            return single.chars().next().and_then(keycode_for_char);
        }
        _ => return None,
    };
    Some(code)
}

fn keycode_for_char(ch: char) -> Option<u16> {
    let code = match ch {
        'a' => 30,
        'b' => 48,
        'c' => 46,
        'd' => 32,
        'e' => 18,
        'f' => 33,
        'g' => 34,
        'h' => 35,
        'i' => 23,
        'j' => 36,
        'k' => 37,
        'l' => 38,
        'm' => 50,
        'n' => 49,
        'o' => 24,
        'p' => 25,
        'q' => 16,
        'r' => 19,
        's' => 31,
        't' => 20,
        'u' => 22,
        'v' => 47,
        'w' => 17,
        'x' => 45,
        'y' => 21,
        'z' => 44,
        '1'..='9' => ch as u16 - '1' as u16 + 2,
        '0' => 11,
        _ => return None,
    };
    Some(code)
}

fn keycode_for_modifier(token: &str) -> Option<u16> {
    match token.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some(KEY_CTRL),
        "shift" => Some(KEY_SHIFT),
        "alt" => Some(KEY_ALT),
        "super" | "meta" | "win" => Some(KEY_SUPER),
        _ => None,
    }
}

/// Drops a leading `keypress` word and an optional colon.
pub fn strip_keypress_prefix(value: &str) -> &str {
    strip_leading_word(value, "keypress").trim()
}

/// Strips `word` (case-insensitive, whole word) plus an optional `:` from the
/// start of `value`; otherwise returns `value` unchanged.
pub(crate) fn strip_leading_word<'a>(value: &'a str, word: &str) -> &'a str {
    let trimmed = value.trim_start();
    let Some(head) = trimmed.get(..word.len()) else {
        return value;
    };
    if !head.eq_ignore_ascii_case(word) {
        return value;
    }
    let rest = &trimmed[word.len()..];
    if rest
        .chars()
        .next()
        .is_some_and(|ch| ch.is_alphanumeric() || ch == '_')
    {
        return value;
    }
    let rest = rest.trim_start();
    rest.strip_prefix(':').unwrap_or(rest).trim_start()
}

/// The text after a leading `text:` marker. Whitespace may sit on either
/// side of the colon.
fn forced_literal(keys: &str) -> Option<&str> {
    let head = keys.get(..4)?;
    if !head.eq_ignore_ascii_case("text") {
        return None;
    }
    keys[4..]
        .trim_start()
        .strip_prefix(':')
        .map(str::trim_start)
}

/// Encodes one key, one modifier combo, or literal text.
///
/// `text:` forces literal typing. A combo is every `+`-separated part but the
/// last being a known modifier; anything else, including several chords in
/// one string, is typed literally.
pub fn encode_keys(keys: &str) -> KeyAction {
    let normalized = keys.trim();

    if let Some(text) = forced_literal(normalized) {
        return KeyAction::Type(text.to_string());
    }

    if let Some(code) = keycode_for_key(normalized) {
        return KeyAction::Press(vec![KeyStroke::down(code), KeyStroke::up(code)]);
    }

    let parts: Vec<&str> = normalized.split('+').map(str::trim).collect();
    if let Some((key, modifiers)) = parts.split_last() {
        let well_formed = !modifiers.is_empty()
            && parts
                .iter()
                .all(|part| !part.is_empty() && !part.contains(char::is_whitespace));
        let modifier_codes: Option<Vec<u16>> =
            modifiers.iter().map(|m| keycode_for_modifier(m)).collect();

        if let (true, Some(modifier_codes), Some(key_code)) =
            (well_formed, modifier_codes, keycode_for_key(key))
        {
            let mut strokes: Vec<KeyStroke> =
                modifier_codes.iter().copied().map(KeyStroke::down).collect();
            strokes.push(KeyStroke::down(key_code));
            strokes.push(KeyStroke::up(key_code));
            strokes.extend(modifier_codes.iter().rev().copied().map(KeyStroke::up));
            return KeyAction::Press(strokes);
        }
    }

    KeyAction::Type(normalized.to_string())
}

pub(super) async fn execute_keypress(host: &dyn Host, args: &Value) -> Result<ToolResult> {
    let keys = strip_keypress_prefix(first_string(args, &["keys", "key"]).unwrap_or(""));
    if keys.is_empty() {
        return Ok(ToolResult::failure("keys is required."));
    }

    let action = encode_keys(keys);
    if matches!(&action, KeyAction::Type(text) if text.is_empty()) {
        return Ok(ToolResult::failure("keys is required."));
    }

    host.inject_keys(&action).await?;
    Ok(ToolResult::handled(json!({
        "keys": keys,
        "kind": action.kind(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(action: &KeyAction) -> Vec<String> {
        match action {
            KeyAction::Press(strokes) => strokes.iter().map(|s| s.to_ydotool_arg()).collect(),
            KeyAction::Type(text) => vec![format!("type:{text}")],
        }
    }

    #[test]
    fn test_modifier_combo_presses_in_order_and_releases_in_reverse() {
        let action = encode_keys("ctrl+shift+p");
        assert_eq!(
            codes(&action),
            vec!["29:1", "42:1", "25:1", "25:0", "42:0", "29:0"]
        );
        assert_eq!(action.kind(), "combo");
    }

    #[test]
    fn test_named_key_is_single_down_up_pair() {
        assert_eq!(codes(&encode_keys("Return")), vec!["96:1", "96:0"]);
        assert_eq!(codes(&encode_keys("F11")), vec!["87:1", "87:0"]);
        assert_eq!(codes(&encode_keys("7")), vec!["8:1", "8:0"]);
        assert_eq!(codes(&encode_keys("/")), vec!["53:1", "53:0"]);
        assert_eq!(encode_keys("escape").kind(), "key");
    }

    #[test]
    fn test_combo_tolerates_spaces_around_plus() {
        assert_eq!(
            codes(&encode_keys("Ctrl + D")),
            vec!["29:1", "32:1", "32:0", "29:0"]
        );
    }

    #[test]
    fn test_unrecognized_input_is_typed_literally() {
        assert_eq!(encode_keys("hello world"), KeyAction::Type("hello world".into()));
        assert_eq!(encode_keys("ctrl+c ctrl+v"), KeyAction::Type("ctrl+c ctrl+v".into()));
        assert_eq!(encode_keys("foo+d"), KeyAction::Type("foo+d".into()));
        assert_eq!(encode_keys("ctrl+"), KeyAction::Type("ctrl+".into()));
        assert_eq!(encode_keys("text: Return"), KeyAction::Type("Return".into()));
        assert_eq!(encode_keys("TEXT : ctrl+d"), KeyAction::Type("ctrl+d".into()));
        assert_eq!(encode_keys("text\t:hello"), KeyAction::Type("hello".into()));
    }

    #[test]
    fn test_keypress_prefix_is_stripped() {
        assert_eq!(strip_keypress_prefix("keypress: ctrl+d"), "ctrl+d");
        assert_eq!(strip_keypress_prefix("  KEYPRESS Return "), "Return");
        assert_eq!(strip_keypress_prefix("keypresses"), "keypresses");
    }
}
