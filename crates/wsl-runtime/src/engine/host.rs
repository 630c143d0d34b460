use std::collections::BTreeMap;
use std::io::{self, Read};

use parking_lot::RwLock;
use wsl_core::{ScriptError, Value};

/// Live values maintained by the game client and exposed read-only as
/// special variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveValue {
    Health,
    Mana,
    Fatigue,
    Spirit,
    RoundTime,
    MonsterCount,
    LeftHand,
    RightHand,
    Spell,
    RoomDescription,
    RoomExits,
    RoomPlayers,
    RoomObjects,
    RoomTitle,
    LastCommand,
}

impl LiveValue {
    pub const ALL: [LiveValue; 15] = [
        LiveValue::Health,
        LiveValue::Mana,
        LiveValue::Fatigue,
        LiveValue::Spirit,
        LiveValue::RoundTime,
        LiveValue::MonsterCount,
        LiveValue::LeftHand,
        LiveValue::RightHand,
        LiveValue::Spell,
        LiveValue::RoomDescription,
        LiveValue::RoomExits,
        LiveValue::RoomPlayers,
        LiveValue::RoomObjects,
        LiveValue::RoomTitle,
        LiveValue::LastCommand,
    ];

    pub fn variable_name(self) -> &'static str {
        match self {
            LiveValue::Health => "health",
            LiveValue::Mana => "mana",
            LiveValue::Fatigue => "fatigue",
            LiveValue::Spirit => "spirit",
            LiveValue::RoundTime => "rt",
            LiveValue::MonsterCount => "monstercount",
            LiveValue::LeftHand => "lhand",
            LiveValue::RightHand => "rhand",
            LiveValue::Spell => "spell",
            LiveValue::RoomDescription => "roomdesc",
            LiveValue::RoomExits => "roomexits",
            LiveValue::RoomPlayers => "roomplayers",
            LiveValue::RoomObjects => "roomobjects",
            LiveValue::RoomTitle => "roomtitle",
            LiveValue::LastCommand => "lastcommand",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            LiveValue::Health
                | LiveValue::Mana
                | LiveValue::Fatigue
                | LiveValue::Spirit
                | LiveValue::RoundTime
                | LiveValue::MonsterCount
        )
    }
}

/// Everything a script needs from the client it runs against.
pub trait ScriptHost: Send + Sync {
    fn live_value(&self, key: LiveValue) -> Option<Value>;
    /// Seconds of round-time still outstanding.
    fn roundtime(&self) -> u32;
    /// Sends `text` to the game. Hosts report it back as
    /// [`LiveValue::LastCommand`] whichever script or user issued it.
    fn send_command(&self, text: &str) -> io::Result<()>;
    fn echo(&self, text: &str);
    fn play_sound(&self, sound: &mut dyn Read) -> io::Result<()>;
    fn run_script(&self, name: &str, args: &[String]) -> Result<(), ScriptError>;
}

/// Persisted key -> string store shared by every script on one client.
pub trait VariableStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str);
    fn remove(&self, name: &str) -> Option<String>;

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[derive(Debug, Default)]
pub struct MemoryVariableStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.read().clone()
    }
}

impl VariableStore for MemoryVariableStore {
    fn get(&self, name: &str) -> Option<String> {
        self.values.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) {
        self.values
            .write()
            .insert(name.to_string(), value.to_string());
    }

    fn remove(&self, name: &str) -> Option<String> {
        self.values.write().remove(name)
    }

    fn contains(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }
}
