// ── Key table ──
//
// Static mapping from human command names to protocol key codes, grouped
// the way the host exposes them as buttons (`keys.<Group>.<Name>`).

/// One remote-control key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub group: &'static str,
    pub name: &'static str,
    /// Protocol key code, e.g. `KEY_VOLUP`.
    pub code: &'static str,
}

impl Command {
    /// Host state key of this key's button.
    pub fn state_key(&self) -> String {
        format!("keys.{}.{}", self.group, self.name)
    }
}

const fn key(group: &'static str, name: &'static str, code: &'static str) -> Command {
    Command { group, name, code }
}

pub static KEYS: &[Command] = &[
    key("Power", "PowerOff", "KEY_POWEROFF"),
    key("Power", "Power", "KEY_POWER"),
    key("Volume", "VolumeUp", "KEY_VOLUP"),
    key("Volume", "VolumeDown", "KEY_VOLDOWN"),
    key("Volume", "Mute", "KEY_MUTE"),
    key("Channel", "ChannelUp", "KEY_CHUP"),
    key("Channel", "ChannelDown", "KEY_CHDOWN"),
    key("Channel", "PreviousChannel", "KEY_PRECH"),
    key("Channel", "ChannelList", "KEY_CH_LIST"),
    key("Navigation", "Up", "KEY_UP"),
    key("Navigation", "Down", "KEY_DOWN"),
    key("Navigation", "Left", "KEY_LEFT"),
    key("Navigation", "Right", "KEY_RIGHT"),
    key("Navigation", "Enter", "KEY_ENTER"),
    key("Navigation", "Return", "KEY_RETURN"),
    key("Navigation", "Exit", "KEY_EXIT"),
    key("Menu", "Menu", "KEY_MENU"),
    key("Menu", "Home", "KEY_HOME"),
    key("Menu", "Info", "KEY_INFO"),
    key("Menu", "Guide", "KEY_GUIDE"),
    key("Menu", "Tools", "KEY_TOOLS"),
    key("Menu", "SmartHub", "KEY_CONTENTS"),
    key("Source", "Source", "KEY_SOURCE"),
    key("Source", "Tv", "KEY_TV"),
    key("Source", "Hdmi", "KEY_HDMI"),
    key("Source", "Hdmi1", "KEY_HDMI1"),
    key("Source", "Hdmi2", "KEY_HDMI2"),
    key("Source", "Hdmi3", "KEY_HDMI3"),
    key("Source", "Hdmi4", "KEY_HDMI4"),
    key("Playback", "Play", "KEY_PLAY"),
    key("Playback", "Pause", "KEY_PAUSE"),
    key("Playback", "Stop", "KEY_STOP"),
    key("Playback", "Rewind", "KEY_REWIND"),
    key("Playback", "FastForward", "KEY_FF"),
    key("Playback", "Record", "KEY_REC"),
    key("Color", "Red", "KEY_RED"),
    key("Color", "Green", "KEY_GREEN"),
    key("Color", "Yellow", "KEY_YELLOW"),
    key("Color", "Blue", "KEY_CYAN"),
    key("Numbers", "Num0", "KEY_0"),
    key("Numbers", "Num1", "KEY_1"),
    key("Numbers", "Num2", "KEY_2"),
    key("Numbers", "Num3", "KEY_3"),
    key("Numbers", "Num4", "KEY_4"),
    key("Numbers", "Num5", "KEY_5"),
    key("Numbers", "Num6", "KEY_6"),
    key("Numbers", "Num7", "KEY_7"),
    key("Numbers", "Num8", "KEY_8"),
    key("Numbers", "Num9", "KEY_9"),
    key("Picture", "PictureMode", "KEY_PMODE"),
    key("Picture", "AspectRatio", "KEY_ASPECT"),
    key("Picture", "Subtitle", "KEY_SUB_TITLE"),
];

/// Resolve a command by key code (`KEY_VOLUP`) or human name (`VolumeUp`).
///
/// Key codes match case-insensitively; names match exactly or ignoring case.
pub fn lookup(name: &str) -> Option<&'static Command> {
    let name = name.trim();
    KEYS.iter()
        .find(|k| k.code.eq_ignore_ascii_case(name))
        .or_else(|| KEYS.iter().find(|k| k.name == name))
        .or_else(|| KEYS.iter().find(|k| k.name.eq_ignore_ascii_case(name)))
}

/// Resolve a `keys.<Group>.<Name>` host state key.
pub fn from_state_key(state_key: &str) -> Option<&'static Command> {
    let rest = state_key.strip_prefix("keys.")?;
    let (group, name) = rest.split_once('.')?;
    KEYS.iter().find(|k| k.group == group && k.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_code_and_name() {
        assert_eq!(lookup("KEY_VOLUP").map(|k| k.name), Some("VolumeUp"));
        assert_eq!(lookup("key_volup").map(|k| k.code), Some("KEY_VOLUP"));
        assert_eq!(lookup("Mute").map(|k| k.code), Some("KEY_MUTE"));
        assert_eq!(lookup("mute").map(|k| k.code), Some("KEY_MUTE"));
        assert!(lookup("KEY_TELEPORT").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn state_keys_round_trip() {
        let mute = lookup("KEY_MUTE").expect("mute");
        assert_eq!(mute.state_key(), "keys.Volume.Mute");
        assert_eq!(from_state_key("keys.Volume.Mute"), Some(mute));
        assert!(from_state_key("keys.Volume").is_none());
        assert!(from_state_key("power.on").is_none());
    }

    #[test]
    fn codes_are_unique() {
        for (i, a) in KEYS.iter().enumerate() {
            assert!(KEYS[i + 1..].iter().all(|b| b.code != a.code), "{}", a.code);
        }
    }
}
