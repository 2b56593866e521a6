//! Key names as used in sound pack manifests

/// Manifest entry used for keys without their own sounds
pub const DEFAULT_KEY: &str = "default";

/// Maps front-end key events to manifest key names
pub struct KeyMapper;

impl KeyMapper {
    /// Manifest name for a typed character
    pub fn from_char(c: char) -> &'static str {
        match c {
            ' ' => "space",
            '\n' | '\r' => "enter",
            '\t' => "tab",
            '\u{7f}' | '\u{8}' => "del",
            '\u{1b}' => "esc",
            _ => {
                let lower = c.to_ascii_lowercase();
                single_char_name(lower).unwrap_or(DEFAULT_KEY)
            }
        }
    }

    /// Manifest name for a named key (`"space"`, `"left"`, `"f5"`, ...)
    ///
    /// Single characters are resolved as by [`KeyMapper::from_char`].
    pub fn from_name(name: &str) -> &'static str {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Self::from_char(c);
        }

        match name.to_ascii_lowercase().as_str() {
            "space" => "space",
            "enter" | "return" => "enter",
            "tab" => "tab",
            "del" | "delete" | "backspace" => "del",
            "esc" | "escape" => "esc",
            "capslock" => "capsLock",
            "fn" => "fn",
            "ctrl" | "control" | "ctrlleft" => "ctrlLeft",
            "cmd" | "command" | "super" | "meta" => "command",
            "shift" | "shiftleft" => "shiftLeft",
            "shiftright" => "shiftRight",
            "alt" | "option" | "optionleft" => "optionLeft",
            "altgr" | "optionright" => "optionRight",
            "left" | "arrleft" => "arrLeft",
            "right" | "arrright" => "arrRight",
            "up" | "arrup" => "arrUp",
            "down" | "arrdown" => "arrDown",
            "home" => "home",
            "end" => "end",
            "pageup" | "pgup" => "pgUp",
            "pagedown" | "pgdn" => "pgDn",
            "clear" => "clear",
            "f1" => "f1",
            "f2" => "f2",
            "f3" => "f3",
            "f4" => "f4",
            "f5" => "f5",
            "f6" => "f6",
            "f7" => "f7",
            "f8" => "f8",
            "f9" => "f9",
            "f10" => "f10",
            "f11" => "f11",
            "f12" => "f12",
            _ => DEFAULT_KEY,
        }
    }
}

fn single_char_name(c: char) -> Option<&'static str> {
    const NAMES: &[&str] = &[
        "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
        "s", "t", "u", "v", "w", "x", "y", "z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
        "*", "/", "+", "-", "=", ".", "[", "]", ";", "'", ",", "\\", "`",
    ];
    NAMES
        .iter()
        .copied()
        .find(|name| name.chars().next() == Some(c))
}
