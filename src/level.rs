// SPDX-License-Identifier: MIT OR Apache-2.0

//! Severity levels and the registry that names them.
//!
//! A [`Level`] is just a number: higher is more severe. The [`LevelRegistry`] maps
//! numbers to display names and back, so that custom levels can be added alongside the
//! built-in set:
//!
//! | Name       | Number |
//! |------------|--------|
//! | `DEBUG`    | 10     |
//! | `INFO`     | 20     |
//! | `WARNING`  | 30     |
//! | `ERROR`    | 40     |
//! | `CRITICAL` | 50     |
//!
//! Level `0` ([`Level::NOTSET`]) is reserved: on a logger it means "inherit from the
//! nearest ancestor", and it can never be registered.
//!
//! ```
//! use logtree::{Level, LevelRegistry};
//!
//! let registry = LevelRegistry::new();
//! registry.set_level(15, "CUSTOM").unwrap();
//! assert_eq!(registry.level_name(15), "CUSTOM");
//! assert_eq!(registry.level_number("CUSTOM"), Some(Level::new(15)));
//! assert_eq!(registry.level_name(17), "Level 17");
//! ```

use crate::error::{LogError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::{Arc, OnceLock};

/// A numeric severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Level(u32);

impl Level {
    /// "Unset": inherit the effective level from an ancestor.
    pub const NOTSET: Level = Level(0);
    /// Diagnostic detail.
    pub const DEBUG: Level = Level(10);
    /// Normal operation.
    pub const INFO: Level = Level(20);
    /// Suspicious condition.
    pub const WARNING: Level = Level(30);
    /// Runtime error.
    pub const ERROR: Level = Level(40);
    /// The program may not be able to continue.
    pub const CRITICAL: Level = Level(50);

    pub const fn new(number: u32) -> Self {
        Level(number)
    }

    pub const fn number(self) -> u32 {
        self.0
    }

    pub const fn is_notset(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Level {
    fn from(number: u32) -> Self {
        Level(number)
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Either side of a registry entry, for operations that accept a number or a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKey<'a> {
    Number(u32),
    Name(&'a str),
}

impl From<u32> for LevelKey<'_> {
    fn from(number: u32) -> Self {
        LevelKey::Number(number)
    }
}

impl From<Level> for LevelKey<'_> {
    fn from(level: Level) -> Self {
        LevelKey::Number(level.0)
    }
}

impl<'a> From<&'a str> for LevelKey<'a> {
    fn from(name: &'a str) -> Self {
        LevelKey::Name(name)
    }
}

impl<'a> From<&'a String> for LevelKey<'a> {
    fn from(name: &'a String) -> Self {
        LevelKey::Name(name.as_str())
    }
}

impl Display for LevelKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelKey::Number(n) => write!(f, "{n}"),
            LevelKey::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug)]
struct Levels {
    by_number: BTreeMap<u32, String>,
    by_name: HashMap<String, u32>,
    default: u32,
}

impl Levels {
    fn resolve(&self, key: LevelKey<'_>) -> Option<u32> {
        match key {
            LevelKey::Number(n) => self.by_number.contains_key(&n).then_some(n),
            LevelKey::Name(name) => self.by_name.get(name).copied(),
        }
    }
}

/**
Bidirectional mapping between level numbers and names.

The registry is shared by every logger of a [`Manager`](crate::Manager) and may be
mutated while other threads are logging; all access goes through an internal lock.
*/
#[derive(Debug)]
pub struct LevelRegistry {
    levels: RwLock<Levels>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<LevelRegistry>> = OnceLock::new();

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelRegistry {
    /// A registry holding the built-in levels, with `INFO` as the default.
    pub fn new() -> Self {
        let builtin = [
            (Level::DEBUG, "DEBUG"),
            (Level::INFO, "INFO"),
            (Level::WARNING, "WARNING"),
            (Level::ERROR, "ERROR"),
            (Level::CRITICAL, "CRITICAL"),
        ];
        let mut by_number = BTreeMap::new();
        let mut by_name = HashMap::new();
        for (level, name) in builtin {
            by_number.insert(level.0, name.to_string());
            by_name.insert(name.to_string(), level.0);
        }
        LevelRegistry {
            levels: RwLock::new(Levels {
                by_number,
                by_name,
                default: Level::INFO.0,
            }),
        }
    }

    /// The process-wide registry used by the global manager.
    pub fn global() -> Arc<LevelRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(LevelRegistry::new()))
            .clone()
    }

    /// Registers `name` for `number`, replacing whatever either side was bound to before.
    ///
    /// Renaming the default level is allowed; moving its name to another number is not,
    /// since that would leave the default without a name.
    pub fn set_level(&self, number: impl Into<Level>, name: &str) -> Result<()> {
        let number = number.into().0;
        if number == 0 {
            return Err(LogError::invalid(
                "level",
                "0 is reserved for 'unset' and cannot be registered",
            ));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(LogError::invalid("level name", "must not be empty"));
        }
        let mut levels = self.levels.write();
        if let Some(&old_number) = levels.by_name.get(name) {
            if old_number != number && old_number == levels.default {
                return Err(LogError::invalid(
                    "level",
                    format!("{name} names the default level {old_number} and cannot be moved"),
                ));
            }
        }
        if let Some(old_name) = levels.by_number.remove(&number) {
            levels.by_name.remove(&old_name);
        }
        if let Some(old_number) = levels.by_name.remove(name) {
            levels.by_number.remove(&old_number);
        }
        levels.by_number.insert(number, name.to_string());
        levels.by_name.insert(name.to_string(), number);
        Ok(())
    }

    /// Removes a level by number or name.
    ///
    /// The current default level cannot be removed.
    pub fn remove_level<'a>(&self, key: impl Into<LevelKey<'a>>) -> Result<()> {
        let key = key.into();
        let mut levels = self.levels.write();
        let number = levels
            .resolve(key)
            .ok_or_else(|| LogError::unknown("level", key))?;
        if number == levels.default {
            return Err(LogError::invalid(
                "level",
                format!("{key} is the default level and cannot be removed"),
            ));
        }
        if let Some(name) = levels.by_number.remove(&number) {
            levels.by_name.remove(&name);
        }
        Ok(())
    }

    /// The display name for `level`, or `"Level <n>"` when it is not registered.
    pub fn level_name(&self, level: impl Into<Level>) -> String {
        let number = level.into().0;
        self.levels
            .read()
            .by_number
            .get(&number)
            .cloned()
            .unwrap_or_else(|| format!("Level {number}"))
    }

    /// The level registered under `name`, if any.
    pub fn level_number(&self, name: &str) -> Option<Level> {
        self.levels.read().by_name.get(name).copied().map(Level)
    }

    pub fn is_valid_level<'a>(&self, key: impl Into<LevelKey<'a>>) -> bool {
        self.levels.read().resolve(key.into()).is_some()
    }

    /// Resolves `key` to a registered level, failing with
    /// [`LogError::UnknownIdentifier`] when it is not registered.
    pub fn check_level<'a>(&self, key: impl Into<LevelKey<'a>>) -> Result<Level> {
        let key = key.into();
        self.levels
            .read()
            .resolve(key)
            .map(Level)
            .ok_or_else(|| LogError::unknown("level", key))
    }

    /// The smallest registered level strictly above `level`.
    pub fn next_level(&self, level: impl Into<Level>) -> Option<Level> {
        let number = level.into().0;
        self.levels
            .read()
            .by_number
            .range((Excluded(number), Unbounded))
            .next()
            .map(|(n, _)| Level(*n))
    }

    /// The largest registered level strictly below `level`.
    pub fn previous_level(&self, level: impl Into<Level>) -> Option<Level> {
        let number = level.into().0;
        self.levels
            .read()
            .by_number
            .range(..number)
            .next_back()
            .map(|(n, _)| Level(*n))
    }

    pub fn set_default_level<'a>(&self, key: impl Into<LevelKey<'a>>) -> Result<()> {
        let key = key.into();
        let mut levels = self.levels.write();
        let number = levels
            .resolve(key)
            .ok_or_else(|| LogError::unknown("level", key))?;
        levels.default = number;
        Ok(())
    }

    pub fn default_level(&self) -> Level {
        Level(self.levels.read().default)
    }

    /// All registered levels in ascending numeric order.
    pub fn levels(&self) -> Vec<(Level, String)> {
        self.levels
            .read()
            .by_number
            .iter()
            .map(|(n, name)| (Level(*n), name.clone()))
            .collect()
    }
}
