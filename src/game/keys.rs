//! Multi-key command sequencing (`3l`, `gg`, `fx`, ...).

use crate::game::motion::{FindKind, Motion, MoveIntent, MAX_COUNT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    Left,
    Right,
    Up,
    Down,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyState {
    Idle,
    Counting(u32),
    AwaitingGSuffix { count: Option<u32> },
    AwaitingCharTarget { kind: FindKind, count: Option<u32> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Key consumed; more keys needed.
    Pending,
    Intent(MoveIntent),
    /// The pending sequence was abandoned.
    Cancelled,
    /// Not a movement key.
    Unmapped(Key),
}

/// Transient input state, kept apart from the game mirror.
#[derive(Clone, Debug)]
pub struct KeySequencer {
    state: KeyState,
    last_find: Option<(FindKind, char)>,
}

impl Default for KeySequencer {
    fn default() -> Self {
        Self::new()
    }
}

fn intent(motion: Motion, count: Option<u32>) -> KeyOutcome {
    KeyOutcome::Intent(match count {
        Some(n) => MoveIntent::with_count(motion, n),
        None => MoveIntent::new(motion),
    })
}

fn simple_motion(ch: char) -> Option<Motion> {
    let motion = match ch {
        'h' => Motion::Left,
        'l' => Motion::Right,
        'k' => Motion::Up,
        'j' => Motion::Down,
        'w' => Motion::WordForward { big: false },
        'W' => Motion::WordForward { big: true },
        'b' => Motion::WordBackward { big: false },
        'B' => Motion::WordBackward { big: true },
        'e' => Motion::WordEnd { big: false },
        'E' => Motion::WordEnd { big: true },
        '^' => Motion::FirstNonBlank,
        '$' => Motion::LineEnd,
        'G' => Motion::FileEnd,
        _ => return None,
    };
    Some(motion)
}

impl KeySequencer {
    pub fn new() -> Self {
        Self {
            state: KeyState::Idle,
            last_find: None,
        }
    }

    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Single transition function for every state.
    pub fn feed(&mut self, key: Key) -> KeyOutcome {
        let state = std::mem::replace(&mut self.state, KeyState::Idle);
        let ch = match key {
            Key::Escape => {
                return if state == KeyState::Idle {
                    KeyOutcome::Unmapped(key)
                } else {
                    KeyOutcome::Cancelled
                };
            }
            Key::Left => 'h',
            Key::Right => 'l',
            Key::Up => 'k',
            Key::Down => 'j',
            Key::Char(ch) => ch,
        };

        match state {
            // Only a typed character is a find target.
            KeyState::AwaitingCharTarget { .. } if !matches!(key, Key::Char(_)) => {
                KeyOutcome::Cancelled
            }
            KeyState::AwaitingCharTarget { kind, count } => {
                self.last_find = Some((kind, ch));
                intent(Motion::Find { kind, target: ch }, count)
            }
            KeyState::AwaitingGSuffix { count } => match ch {
                'g' => intent(Motion::FileStart, count),
                '_' => intent(Motion::LastNonBlank, count),
                'e' => intent(Motion::WordEndBackward { big: false }, count),
                'E' => intent(Motion::WordEndBackward { big: true }, count),
                _ => KeyOutcome::Cancelled,
            },
            KeyState::Idle => self.start(key, ch, None),
            KeyState::Counting(n) => match ch.to_digit(10) {
                Some(d) => {
                    self.state = KeyState::Counting((n * 10 + d).min(MAX_COUNT));
                    KeyOutcome::Pending
                }
                None => self.start(key, ch, Some(n)),
            },
        }
    }

    fn start(&mut self, key: Key, ch: char, count: Option<u32>) -> KeyOutcome {
        if let Some(motion) = simple_motion(ch) {
            return intent(motion, count);
        }
        if let Some(kind) = FindKind::from_key(ch) {
            self.state = KeyState::AwaitingCharTarget { kind, count };
            return KeyOutcome::Pending;
        }
        match ch {
            '0' => intent(Motion::LineStart, None),
            '1'..='9' => {
                self.state = KeyState::Counting(ch.to_digit(10).unwrap_or(1));
                KeyOutcome::Pending
            }
            'g' => {
                self.state = KeyState::AwaitingGSuffix { count };
                KeyOutcome::Pending
            }
            ';' | ',' => match self.last_find {
                Some((kind, target)) => {
                    let kind = if ch == ',' { kind.reversed() } else { kind };
                    intent(Motion::Find { kind, target }, count)
                }
                None => KeyOutcome::Cancelled,
            },
            _ if count.is_some() => KeyOutcome::Cancelled,
            _ => KeyOutcome::Unmapped(key),
        }
    }
}
