//! Linux input event code names
//!
//! Only the names that show up in bindings are listed. Values follow
//! `linux/input-event-codes.h`.

pub const KEY_ESC: u32 = 1;
pub const KEY_BACKSPACE: u32 = 14;
pub const KEY_TAB: u32 = 15;
pub const KEY_ENTER: u32 = 28;
pub const KEY_LEFTCTRL: u32 = 29;
pub const KEY_LEFTSHIFT: u32 = 42;
pub const KEY_RIGHTSHIFT: u32 = 54;
pub const KEY_LEFTALT: u32 = 56;
pub const KEY_SPACE: u32 = 57;
pub const KEY_RIGHTCTRL: u32 = 97;
pub const KEY_RIGHTALT: u32 = 100;
pub const KEY_LEFTMETA: u32 = 125;
pub const KEY_RIGHTMETA: u32 = 126;

pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;
pub const BTN_SIDE: u32 = 0x113;
pub const BTN_EXTRA: u32 = 0x114;

const LETTERS: [(char, u32); 26] = [
    ('A', 30),
    ('B', 48),
    ('C', 46),
    ('D', 32),
    ('E', 18),
    ('F', 33),
    ('G', 34),
    ('H', 35),
    ('I', 23),
    ('J', 36),
    ('K', 37),
    ('L', 38),
    ('M', 50),
    ('N', 49),
    ('O', 24),
    ('P', 25),
    ('Q', 16),
    ('R', 19),
    ('S', 31),
    ('T', 20),
    ('U', 22),
    ('V', 47),
    ('W', 17),
    ('X', 45),
    ('Y', 21),
    ('Z', 44),
];

/// Resolve a `KEY_*` name to its code
pub fn key_code(name: &str) -> Option<u32> {
    let suffix = name.strip_prefix("KEY_")?;

    let mut chars = suffix.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(&(_, code)) = LETTERS.iter().find(|(letter, _)| *letter == c) {
            return Some(code);
        }
        if let Some(digit) = c.to_digit(10) {
            // KEY_1..KEY_9 are 2..10, KEY_0 is 11
            return Some(if digit == 0 { 11 } else { digit + 1 });
        }
    }

    if let Some(n) = suffix.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
        return match n {
            1..=10 => Some(58 + n),
            11 => Some(87),
            12 => Some(88),
            _ => None,
        };
    }

    let code = match suffix {
        "ESC" => KEY_ESC,
        "MINUS" => 12,
        "EQUAL" => 13,
        "BACKSPACE" => KEY_BACKSPACE,
        "TAB" => KEY_TAB,
        "LEFTBRACE" => 26,
        "RIGHTBRACE" => 27,
        "ENTER" => KEY_ENTER,
        "LEFTCTRL" => KEY_LEFTCTRL,
        "SEMICOLON" => 39,
        "APOSTROPHE" => 40,
        "GRAVE" => 41,
        "LEFTSHIFT" => KEY_LEFTSHIFT,
        "BACKSLASH" => 43,
        "COMMA" => 51,
        "DOT" => 52,
        "SLASH" => 53,
        "RIGHTSHIFT" => KEY_RIGHTSHIFT,
        "LEFTALT" => KEY_LEFTALT,
        "SPACE" => KEY_SPACE,
        "CAPSLOCK" => 58,
        "RIGHTCTRL" => KEY_RIGHTCTRL,
        "SYSRQ" | "PRINT" => 99,
        "RIGHTALT" => KEY_RIGHTALT,
        "HOME" => 102,
        "UP" => 103,
        "PAGEUP" => 104,
        "LEFT" => 105,
        "RIGHT" => 106,
        "END" => 107,
        "DOWN" => 108,
        "PAGEDOWN" => 109,
        "INSERT" => 110,
        "DELETE" => 111,
        "MUTE" => 113,
        "VOLUMEDOWN" => 114,
        "VOLUMEUP" => 115,
        "LEFTMETA" => KEY_LEFTMETA,
        "RIGHTMETA" => KEY_RIGHTMETA,
        _ => return None,
    };
    Some(code)
}

/// Resolve a `BTN_*` name to its code
pub fn button_code(name: &str) -> Option<u32> {
    match name {
        "BTN_LEFT" => Some(BTN_LEFT),
        "BTN_RIGHT" => Some(BTN_RIGHT),
        "BTN_MIDDLE" => Some(BTN_MIDDLE),
        "BTN_SIDE" => Some(BTN_SIDE),
        "BTN_EXTRA" => Some(BTN_EXTRA),
        _ => None,
    }
}
