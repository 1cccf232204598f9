// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword colorization.
//!
//! A [`ColorMatcher`] holds an ordered list of keyword mappings. Each mapping is a set of
//! regular expressions plus a [`KeywordStyle`]. [`ColorMatcher::colorize`] wraps the whole
//! message in the style of the **first registered** mapping with a pattern found anywhere
//! in the message. Later mappings are never consulted once one matches.
//!
//! Whether color is emitted at all is decided by [`ColorSupport`], checked on every call.

use crate::error::{LogError, Result};
use crate::style::{BackgroundColor, RESET, TextColor, TextEffect};
use parking_lot::RwLock;
use regex::Regex;
use serde::Deserialize;
use std::io::IsTerminal;

/**
Whether [`ColorMatcher::colorize`] may emit escape sequences.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSupport {
    /// Color only when the output device is a terminal, `NO_COLOR` is unset and `TERM` is not `dumb`.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorSupport {
    /// Whether color is allowed on standard output.
    pub fn is_enabled(self) -> bool {
        self.allows(std::io::stdout().is_terminal())
    }

    /// Whether color is allowed on a device that is (or is not) a terminal.
    ///
    /// Only [`ColorSupport::Auto`] looks at `terminal`.
    pub fn allows(self, terminal: bool) -> bool {
        match self {
            ColorSupport::Always => true,
            ColorSupport::Never => false,
            ColorSupport::Auto => {
                if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
                    return false;
                }
                if std::env::var("TERM").is_ok_and(|term| term == "dumb") {
                    return false;
                }
                terminal
            }
        }
    }
}

/// The styling applied to a matching message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeywordStyle {
    pub color: TextColor,
    pub background: Option<BackgroundColor>,
    pub effect: Option<TextEffect>,
}

impl KeywordStyle {
    pub const fn new(color: TextColor) -> Self {
        KeywordStyle {
            color,
            background: None,
            effect: None,
        }
    }

    pub const fn background(mut self, background: BackgroundColor) -> Self {
        self.background = Some(background);
        self
    }

    pub const fn effect(mut self, effect: TextEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Builds a style from palette names, as found in configuration files.
    pub fn parse(color: &str, background: Option<&str>, effect: Option<&str>) -> Result<Self> {
        Ok(KeywordStyle {
            color: color.parse::<TextColor>()?,
            background: background.map(str::parse::<BackgroundColor>).transpose()?,
            effect: effect.map(str::parse::<TextEffect>).transpose()?,
        })
    }

    fn wrap(&self, message: &str) -> String {
        let mut out = String::with_capacity(message.len() + 16);
        out.push_str(self.color.code());
        if let Some(background) = self.background {
            out.push_str(background.code());
        }
        if let Some(effect) = self.effect {
            out.push_str(effect.code());
        }
        out.push_str(message);
        out.push_str(RESET);
        out
    }
}

/// One registered keyword rule.
#[derive(Debug, Clone)]
pub struct KeywordMapping {
    name: String,
    patterns: Vec<String>,
    regexes: Vec<Regex>,
    style: KeywordStyle,
}

impl KeywordMapping {
    /// The keyword the mapping was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The source regexes, in registration order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn style(&self) -> KeywordStyle {
        self.style
    }

    /// True when any pattern is found anywhere in `message`.
    pub fn is_match(&self, message: &str) -> bool {
        self.regexes.iter().any(|r| r.is_match(message))
    }
}

/**
Insertion-ordered keyword-to-style table.

Safe to share between threads; registration may happen while other threads colorize.
*/
#[derive(Debug, Default)]
pub struct ColorMatcher {
    mappings: RwLock<Vec<KeywordMapping>>,
    support: RwLock<ColorSupport>,
}

impl ColorMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_support(support: ColorSupport) -> Self {
        ColorMatcher {
            mappings: RwLock::new(Vec::new()),
            support: RwLock::new(support),
        }
    }

    /// Current color policy. Starts as the value given to [`with_support`](Self::with_support).
    pub fn support(&self) -> ColorSupport {
        *self.support.read()
    }

    pub fn set_support(&self, support: ColorSupport) {
        *self.support.write() = support;
    }

    /**
    Registers the keyword `name`.

    Every pattern is compiled as a regular expression and searched for (not anchored).
    Registering an existing name replaces its patterns and style but keeps its position.
    */
    pub fn add_mapping<I, S>(&self, name: &str, patterns: I, style: KeywordStyle) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if name.is_empty() {
            return Err(LogError::invalid("keyword name", "must not be empty"));
        }
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();
        if patterns.is_empty() {
            return Err(LogError::invalid(
                "keyword patterns",
                format!("keyword '{name}' has no patterns"),
            ));
        }
        let regexes = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| LogError::invalid("keyword pattern", e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let mapping = KeywordMapping {
            name: name.to_string(),
            patterns,
            regexes,
            style,
        };

        let mut mappings = self.mappings.write();
        match mappings.iter_mut().find(|m| m.name == name) {
            Some(existing) => *existing = mapping,
            None => mappings.push(mapping),
        }
        Ok(())
    }

    /// Removes and returns the mapping for `name`; unknown names are an error.
    pub fn remove_mapping(&self, name: &str) -> Result<KeywordMapping> {
        let mut mappings = self.mappings.write();
        let index = mappings
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| LogError::unknown("keyword mapping", name))?;
        Ok(mappings.remove(index))
    }

    pub fn mapping(&self, name: &str) -> Result<KeywordMapping> {
        self.mappings
            .read()
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| LogError::unknown("keyword mapping", name))
    }

    /// All mappings in registration order.
    pub fn mappings(&self) -> Vec<KeywordMapping> {
        self.mappings.read().clone()
    }

    pub fn is_valid_mapping(&self, name: &str) -> bool {
        self.mappings.read().iter().any(|m| m.name == name)
    }

    pub fn clear(&self) {
        self.mappings.write().clear();
    }

    /// Wraps `message` in the style of the first matching mapping.
    ///
    /// Returns `message` unchanged when color is unsupported on standard output or nothing matches.
    pub fn colorize(&self, message: &str) -> String {
        self.colorize_for(message, std::io::stdout().is_terminal())
    }

    /// Like [`colorize`](Self::colorize), for a device whose terminal status the caller knows.
    pub fn colorize_for(&self, message: &str, terminal: bool) -> String {
        if !self.support().allows(terminal) {
            return message.to_string();
        }
        self.mappings
            .read()
            .iter()
            .find(|m| m.is_match(message))
            .map_or_else(|| message.to_string(), |m| m.style.wrap(message))
    }
}
