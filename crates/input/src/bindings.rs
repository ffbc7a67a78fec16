use crate::action::Direction;
use crate::event::Key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key name: {0:?}")]
pub struct ParseKeyError(pub String);

impl FromStr for Key {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        // Host key codes, as written by `Display` for `Key::Other`.
        if let Some(code) = name.strip_prefix("other(").and_then(|rest| rest.strip_suffix(')')) {
            return code
                .trim()
                .parse()
                .map(Key::Other)
                .map_err(|_| ParseKeyError(s.to_string()));
        }
        let key = match name.as_str() {
            "up" | "arrowup" => Key::Up,
            "down" | "arrowdown" => Key::Down,
            "left" | "arrowleft" => Key::Left,
            "right" | "arrowright" => Key::Right,
            "w" => Key::W,
            "a" => Key::A,
            "s" => Key::S,
            "d" => Key::D,
            "esc" | "escape" => Key::Escape,
            _ => return Err(ParseKeyError(s.to_string())),
        };
        Ok(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Up => f.write_str("Up"),
            Key::Down => f.write_str("Down"),
            Key::Left => f.write_str("Left"),
            Key::Right => f.write_str("Right"),
            Key::W => f.write_str("W"),
            Key::A => f.write_str("A"),
            Key::S => f.write_str("S"),
            Key::D => f.write_str("D"),
            Key::Escape => f.write_str("Escape"),
            Key::Other(code) => write!(f, "Other({code})"),
        }
    }
}

/// Key to movement-direction table.
///
/// Defaults bind both the arrow keys and WASD. Serialized as a map from key
/// names to snake_case directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Direction>", into = "BTreeMap<String, Direction>")]
pub struct KeyBindings {
    map: BTreeMap<Key, Direction>,
}

impl KeyBindings {
    /// A table with no bindings at all.
    pub fn empty() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    pub fn bind(&mut self, key: Key, direction: Direction) {
        self.map.insert(key, direction);
    }

    pub fn unbind(&mut self, key: Key) -> Option<Direction> {
        self.map.remove(&key)
    }

    pub fn direction(&self, key: Key) -> Option<Direction> {
        self.map.get(&key).copied()
    }

    /// Overlay `other` on top of these bindings; `other` wins on conflicts.
    pub fn merge(&mut self, other: &KeyBindings) {
        for (key, direction) in &other.map {
            self.map.insert(*key, *direction);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        let mut b = Self::empty();
        b.bind(Key::Up, Direction::Forward);
        b.bind(Key::Down, Direction::Backward);
        b.bind(Key::Left, Direction::StrafeLeft);
        b.bind(Key::Right, Direction::StrafeRight);
        b.bind(Key::W, Direction::Forward);
        b.bind(Key::S, Direction::Backward);
        b.bind(Key::A, Direction::StrafeLeft);
        b.bind(Key::D, Direction::StrafeRight);
        b
    }
}

impl TryFrom<BTreeMap<String, Direction>> for KeyBindings {
    type Error = ParseKeyError;

    fn try_from(raw: BTreeMap<String, Direction>) -> Result<Self, Self::Error> {
        let mut b = Self::empty();
        for (name, direction) in raw {
            b.bind(name.parse()?, direction);
        }
        Ok(b)
    }
}

impl From<KeyBindings> for BTreeMap<String, Direction> {
    fn from(b: KeyBindings) -> Self {
        b.map.into_iter().map(|(k, d)| (k.to_string(), d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_arrows_and_wasd() {
        let b = KeyBindings::default();
        assert_eq!(b.direction(Key::Up), Some(Direction::Forward));
        assert_eq!(b.direction(Key::W), Some(Direction::Forward));
        assert_eq!(b.direction(Key::Left), Some(Direction::StrafeLeft));
        assert_eq!(b.direction(Key::D), Some(Direction::StrafeRight));
        assert_eq!(b.direction(Key::Escape), None);
        assert_eq!(b.len(), 8);
    }

    #[test]
    fn parse_key_names() {
        assert_eq!("up".parse::<Key>().unwrap(), Key::Up);
        assert_eq!(" ESC ".parse::<Key>().unwrap(), Key::Escape);
        assert!("F13".parse::<Key>().is_err());
        assert_eq!("Other(42)".parse::<Key>().unwrap(), Key::Other(42));
        assert!("other(-1)".parse::<Key>().is_err());
        assert!("Other(".parse::<Key>().is_err());
    }

    #[test]
    fn host_key_code_survives_yaml() {
        let mut b = KeyBindings::default();
        b.bind(Key::Other(42), Direction::Backward);
        let yaml = serde_yaml::to_string(&b).unwrap();
        assert!(yaml.contains("Other(42)"));
        let back: KeyBindings = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn merge_overrides() {
        let mut b = KeyBindings::default();
        let mut extra = KeyBindings::empty();
        extra.bind(Key::W, Direction::Backward);
        b.merge(&extra);
        assert_eq!(b.direction(Key::W), Some(Direction::Backward));
    }

    #[test]
    fn yaml_uses_key_names() {
        let b: KeyBindings = serde_yaml::from_str("W: backward\nLeft: strafe_right\n").unwrap();
        assert_eq!(b.direction(Key::W), Some(Direction::Backward));
        assert_eq!(b.direction(Key::Left), Some(Direction::StrafeRight));

        let err = serde_yaml::from_str::<KeyBindings>("Q: forward\n");
        assert!(err.is_err());
    }
}
