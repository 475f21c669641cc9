//! Android key codes
//!
//! The numeric values are Android `KeyEvent` constants and are fixed by the
//! protocol.

use std::fmt;
use std::str::FromStr;

/// Keys the remote can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    DpadCenter,
    Back,
    Home,
    Power,
    VolumeUp,
    VolumeDown,
    Mute,
    ChannelUp,
    ChannelDown,
}

impl KeyCode {
    /// The Android keycode value sent on the wire
    pub fn code(self) -> u64 {
        match self {
            KeyCode::DpadUp => 19,
            KeyCode::DpadDown => 20,
            KeyCode::DpadLeft => 21,
            KeyCode::DpadRight => 22,
            KeyCode::DpadCenter => 23,
            KeyCode::Back => 4,
            KeyCode::Home => 3,
            KeyCode::Power => 26,
            KeyCode::VolumeUp => 24,
            KeyCode::VolumeDown => 25,
            KeyCode::Mute => 164,
            KeyCode::ChannelUp => 166,
            KeyCode::ChannelDown => 167,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyCode::DpadUp => "up",
            KeyCode::DpadDown => "down",
            KeyCode::DpadLeft => "left",
            KeyCode::DpadRight => "right",
            KeyCode::DpadCenter => "ok",
            KeyCode::Back => "back",
            KeyCode::Home => "home",
            KeyCode::Power => "power",
            KeyCode::VolumeUp => "volume-up",
            KeyCode::VolumeDown => "volume-down",
            KeyCode::Mute => "mute",
            KeyCode::ChannelUp => "channel-up",
            KeyCode::ChannelDown => "channel-down",
        }
    }

    pub const ALL: [KeyCode; 13] = [
        KeyCode::DpadUp,
        KeyCode::DpadDown,
        KeyCode::DpadLeft,
        KeyCode::DpadRight,
        KeyCode::DpadCenter,
        KeyCode::Back,
        KeyCode::Home,
        KeyCode::Power,
        KeyCode::VolumeUp,
        KeyCode::VolumeDown,
        KeyCode::Mute,
        KeyCode::ChannelUp,
        KeyCode::ChannelDown,
    ];
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyCode::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown key '{}'", s))
    }
}
