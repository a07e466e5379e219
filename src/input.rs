use std::collections::{HashMap, VecDeque};

use crate::camera::CameraImpulse;

/// A key the viewer can bind: a letter, a digit row key, or one of the
/// [`NamedKey`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKey),
    /// Uppercase ASCII letter.
    Character(char),
    Digit(u8),
}

/// Non-character keys used by the movement and close bindings, plus the few
/// extra keys worth rebinding to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Up,
    Down,
    Left,
    Right,
    Space,
    LeftShift,
    RightShift,
    Escape,
    Enter,
    Tab,
}

// Accepted `--bind` spellings, matched case-insensitively.
const NAMED_KEYS: &[(&str, NamedKey)] = &[
    ("up", NamedKey::Up),
    ("down", NamedKey::Down),
    ("left", NamedKey::Left),
    ("right", NamedKey::Right),
    ("space", NamedKey::Space),
    ("shift", NamedKey::LeftShift),
    ("leftshift", NamedKey::LeftShift),
    ("rightshift", NamedKey::RightShift),
    ("escape", NamedKey::Escape),
    ("esc", NamedKey::Escape),
    ("enter", NamedKey::Enter),
    ("return", NamedKey::Enter),
    ("tab", NamedKey::Tab),
];

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphabetic() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            (Some(ch), None) => ch.to_digit(10).map(|digit| Self::Digit(digit as u8)),
            _ => NAMED_KEYS
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                .map(|&(_, key)| Self::Named(key)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// A single key notification from the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub state: KeyState,
    /// Set for OS auto-repeat presses.
    pub repeat: bool,
}

impl KeyEvent {
    pub fn pressed(key: KeyCode) -> Self {
        Self {
            key,
            state: KeyState::Pressed,
            repeat: false,
        }
    }

    pub fn released(key: KeyCode) -> Self {
        Self {
            key,
            state: KeyState::Released,
            repeat: false,
        }
    }
}

/// What a bound key does when pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Camera(CameraImpulse),
    Close,
}

impl KeyAction {
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("close") || name.eq_ignore_ascii_case("quit") {
            return Some(Self::Close);
        }
        CameraImpulse::from_name(name).map(Self::Camera)
    }
}

/// Maps keys to actions.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    map: HashMap<KeyCode, KeyAction>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use CameraImpulse::*;
        use NamedKey as N;
        let pairs = [
            (KeyCode::Character('W'), KeyAction::Camera(Forward)),
            (KeyCode::Named(N::Up), KeyAction::Camera(Forward)),
            (KeyCode::Character('S'), KeyAction::Camera(Backward)),
            (KeyCode::Named(N::Down), KeyAction::Camera(Backward)),
            (KeyCode::Character('A'), KeyAction::Camera(StrafeLeft)),
            (KeyCode::Named(N::Left), KeyAction::Camera(StrafeLeft)),
            (KeyCode::Character('D'), KeyAction::Camera(StrafeRight)),
            (KeyCode::Named(N::Right), KeyAction::Camera(StrafeRight)),
            (KeyCode::Named(N::Space), KeyAction::Camera(Up)),
            (KeyCode::Character('E'), KeyAction::Camera(Up)),
            (KeyCode::Named(N::LeftShift), KeyAction::Camera(Down)),
            (KeyCode::Character('Q'), KeyAction::Camera(Down)),
            (KeyCode::Character('R'), KeyAction::Camera(Reset)),
            (KeyCode::Named(N::Escape), KeyAction::Close),
        ];
        Self {
            map: pairs.into_iter().collect(),
        }
    }
}

impl KeyBindings {
    pub fn bind(&mut self, key: KeyCode, action: KeyAction) {
        self.map.insert(key, action);
    }

    pub fn action(&self, key: KeyCode) -> Option<KeyAction> {
        self.map.get(&key).copied()
    }

    /// Parses a `Key=action` binding such as `Up=forward` or `F1=reset`.
    pub fn parse_binding(spec: &str) -> Option<(KeyCode, KeyAction)> {
        let (key, action) = spec.split_once('=')?;
        Some((
            KeyCode::from_name(key.trim())?,
            KeyAction::from_name(action.trim())?,
        ))
    }

    /// Resolves an event to an action. Only presses (including repeats) act;
    /// releases never do.
    pub fn resolve(&self, event: &KeyEvent) -> Option<KeyAction> {
        match event.state {
            KeyState::Pressed => self.action(event.key),
            KeyState::Released => None,
        }
    }
}

/// FIFO of key events collected between frames.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<KeyEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: KeyEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Removes and yields all queued events in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = KeyEvent> + '_ {
        self.events.drain(..)
    }
}
