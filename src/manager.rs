// SPDX-License-Identifier: MIT OR Apache-2.0

//! The owner of a logger tree.
//!
//! A [`Manager`] maps dot-separated names to loggers. Asking for `"a.b.c"` creates that
//! logger and records `"a.b"` and `"a"` as placeholders until they are asked for
//! themselves; when a placeholder becomes a real logger, the loggers below it are
//! re-parented onto it.
//!
//! The manager also holds the global disable threshold and the generation counter that
//! tags every logger's cached effective level.

use crate::error::{LogError, Result};
use crate::handler::Handler;
use crate::level::{Level, LevelRegistry};
use crate::logger::Logger;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Name of the root logger.
pub const ROOT_NAME: &str = "root";

#[derive(Debug)]
enum Node {
    Logger(Arc<Logger>),
    /// Loggers waiting for an ancestor with this name to be created.
    Placeholder(Vec<Arc<Logger>>),
}

/**
Initial state for loggers the manager creates.

Installed with [`Manager::set_logger_template`]; loggers that already exist are not changed.
*/
#[derive(Debug, Clone, Default)]
pub struct LoggerTemplate {
    level: Level,
    disabled: bool,
    handlers: Vec<Arc<Handler>>,
}

impl LoggerTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial own level; [`Level::NOTSET`] (the default) inherits.
    pub fn level(mut self, level: impl Into<Level>) -> Self {
        self.level = level.into();
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn handler(mut self, handler: Arc<Handler>) -> Self {
        self.handlers.push(handler);
        self
    }
}

/**
Registry of named loggers rooted at a single root logger.
*/
#[derive(Debug)]
pub struct Manager {
    root: Arc<Logger>,
    nodes: Mutex<HashMap<String, Node>>,
    disable: AtomicU32,
    generation: AtomicU64,
    levels: Arc<LevelRegistry>,
    template: RwLock<Option<LoggerTemplate>>,
}

impl Manager {
    /// A manager using the process-wide [`LevelRegistry`].
    pub fn new() -> Arc<Self> {
        Self::with_levels(LevelRegistry::global())
    }

    /// A manager whose root starts at `levels`' default level.
    pub fn with_levels(levels: Arc<LevelRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Manager>| Manager {
            root: Arc::new(Logger::new_root(
                levels.default_level(),
                this.clone(),
                levels.clone(),
            )),
            nodes: Mutex::new(HashMap::new()),
            disable: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            levels,
            template: RwLock::new(None),
        })
    }

    pub fn root(&self) -> Arc<Logger> {
        self.root.clone()
    }

    /// The level registry shared by every logger of this manager.
    pub fn levels(&self) -> &Arc<LevelRegistry> {
        &self.levels
    }

    /**
    Returns the logger called `name`, creating it (and placeholders for its ancestors)
    if needed. `"root"` names the root logger.
    */
    pub fn get_logger(self: &Arc<Self>, name: &str) -> Result<Arc<Logger>> {
        if name == ROOT_NAME {
            return Ok(self.root());
        }
        validate_name(name)?;

        let mut nodes = self.nodes.lock();
        if let Some(Node::Logger(logger)) = nodes.get(name) {
            return Ok(logger.clone());
        }
        let waiting = match nodes.remove(name) {
            Some(Node::Placeholder(children)) => children,
            _ => Vec::new(),
        };

        let logger = Arc::new(self.create_logger(name));
        nodes.insert(name.to_string(), Node::Logger(logger.clone()));
        self.fixup_children(&logger, waiting);
        self.fixup_parents(&mut nodes, &logger);
        drop(nodes);

        // Re-parenting changes inherited levels below the new logger.
        self.clear_cache();
        Ok(logger)
    }

    fn create_logger(self: &Arc<Self>, name: &str) -> Logger {
        let template = self.template.read().clone().unwrap_or_default();
        let logger = Logger::new(
            name,
            template.level,
            Arc::downgrade(self),
            self.levels.clone(),
        );
        logger.set_disabled(template.disabled);
        for handler in template.handlers {
            logger.add_handler(handler);
        }
        logger
    }

    /// Points `logger` at its nearest existing ancestor, leaving placeholders on the way.
    fn fixup_parents(&self, nodes: &mut HashMap<String, Node>, logger: &Arc<Logger>) {
        let name = logger.name();
        let mut parent = None;
        let mut end = name.len();
        while let Some(dot) = name[..end].rfind('.') {
            let prefix = &name[..dot];
            match nodes.get_mut(prefix) {
                Some(Node::Logger(existing)) => {
                    parent = Some(existing.clone());
                    break;
                }
                Some(Node::Placeholder(children)) => children.push(logger.clone()),
                None => {
                    nodes.insert(prefix.to_string(), Node::Placeholder(vec![logger.clone()]));
                }
            }
            end = dot;
        }
        logger.set_parent(Some(parent.unwrap_or_else(|| self.root())));
    }

    /// Moves loggers that were waiting on `logger`'s name underneath it.
    fn fixup_children(&self, logger: &Arc<Logger>, waiting: Vec<Arc<Logger>>) {
        let prefix = format!("{}.", logger.name());
        for child in waiting {
            let above = child
                .parent()
                .is_none_or(|parent| !parent.name().starts_with(&prefix));
            if above {
                child.set_parent(Some(logger.clone()));
            }
        }
    }

    /// Names of every real (non-placeholder) logger, excluding the root.
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .lock()
            .iter()
            .filter(|(_, node)| matches!(node, Node::Logger(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// The root followed by every other logger, sorted by name.
    pub fn loggers(&self) -> Vec<Arc<Logger>> {
        let mut loggers: Vec<Arc<Logger>> = self
            .nodes
            .lock()
            .values()
            .filter_map(|node| match node {
                Node::Logger(logger) => Some(logger.clone()),
                Node::Placeholder(_) => None,
            })
            .collect();
        loggers.sort_by(|a, b| a.name().cmp(b.name()));
        loggers.insert(0, self.root());
        loggers
    }

    /// True when `name` is a real logger; placeholders do not count.
    pub fn has_logger(&self, name: &str) -> bool {
        name == ROOT_NAME || matches!(self.nodes.lock().get(name), Some(Node::Logger(_)))
    }

    /// Records below this level are suppressed everywhere.
    pub fn disable(&self) -> Level {
        Level::new(self.disable.load(Ordering::Acquire))
    }

    /// Suppresses records below `level` tree-wide. [`Level::NOTSET`] turns this off.
    pub fn set_disable(&self, level: impl Into<Level>) {
        self.disable.store(level.into().number(), Ordering::Release);
        self.clear_cache();
    }

    /// Bumped whenever a cached effective level may be stale.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Invalidates every logger's cached effective level.
    pub fn clear_cache(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn logger_template(&self) -> Option<LoggerTemplate> {
        self.template.read().clone()
    }

    /// Installs (or with `None`, removes) the template for loggers created from now on.
    pub fn set_logger_template(&self, template: Option<LoggerTemplate>) -> Result<()> {
        if let Some(template) = &template {
            if !template.level.is_notset() {
                self.levels.check_level(template.level)?;
            }
        }
        *self.template.write() = template;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LogError::invalid("logger name", "must not be empty"));
    }
    if name.split('.').any(str::is_empty) {
        return Err(LogError::invalid(
            "logger name",
            format!("'{name}' has an empty segment"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<Manager> {
        Manager::with_levels(Arc::new(LevelRegistry::new()))
    }

    fn parent_name(logger: &Logger) -> String {
        logger
            .parent()
            .map(|p| p.name().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn defaults() {
        let m = manager();
        assert_eq!(m.root().name(), "root");
        assert_eq!(m.root().level(), Level::INFO);
        assert!(m.root().parent().is_none());
        assert_eq!(m.disable(), Level::NOTSET);
        assert!(m.logger_template().is_none());
    }

    #[test]
    fn same_name_same_logger() {
        let m = manager();
        let a = m.get_logger("a.b").unwrap();
        let b = m.get_logger("a.b").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&m.get_logger("root").unwrap(), &m.root()));
    }

    #[test]
    fn ancestors_start_as_placeholders() {
        let m = manager();
        let leaf = m.get_logger("a.b.c").unwrap();
        assert_eq!(parent_name(&leaf), "root");
        assert_eq!(m.logger_names(), ["a.b.c"]);
        assert!(!m.has_logger("a.b"));

        let mid = m.get_logger("a.b").unwrap();
        assert_eq!(parent_name(&leaf), "a.b");
        assert_eq!(parent_name(&mid), "root");

        let top = m.get_logger("a").unwrap();
        assert_eq!(parent_name(&mid), "a");
        assert_eq!(parent_name(&leaf), "a.b");
        assert_eq!(parent_name(&top), "root");
        assert_eq!(m.logger_names(), ["a", "a.b", "a.b.c"]);
    }

    #[test]
    fn new_intermediate_logger_inherits_children() {
        let m = manager();
        let x = m.get_logger("a.x").unwrap();
        let y = m.get_logger("a.b.y").unwrap();
        let a = m.get_logger("a").unwrap();
        a.set_level(Level::ERROR).unwrap();
        assert_eq!(x.effective_level(), Level::ERROR);
        assert_eq!(y.effective_level(), Level::ERROR);

        let b = m.get_logger("a.b").unwrap();
        b.set_level(Level::DEBUG).unwrap();
        assert_eq!(parent_name(&y), "a.b");
        assert_eq!(y.effective_level(), Level::DEBUG);
        assert_eq!(x.effective_level(), Level::ERROR);
    }

    #[test]
    fn placeholder_upgrade_invalidates_cached_levels() {
        let m = manager();
        let leaf = m.get_logger("p.q").unwrap();
        assert_eq!(leaf.effective_level(), Level::INFO);
        m.set_logger_template(Some(LoggerTemplate::new().level(Level::CRITICAL)))
            .unwrap();
        m.get_logger("p").unwrap();
        assert_eq!(leaf.effective_level(), Level::CRITICAL);
    }

    #[test]
    fn names_are_validated() {
        let m = manager();
        for bad in ["", ".a", "a.", "a..b"] {
            assert!(m.get_logger(bad).unwrap_err().is_invalid_argument(), "{bad:?}");
        }
    }

    #[test]
    fn get_child_joins_names() {
        let m = manager();
        let svc = m.get_logger("svc").unwrap();
        let db = svc.get_child("db").unwrap();
        assert_eq!(db.name(), "svc.db");
        assert_eq!(parent_name(&db), "svc");
        assert_eq!(m.root().get_child("top").unwrap().name(), "top");
    }

    #[test]
    fn disable_and_clear_cache_bump_generation() {
        let m = manager();
        let g0 = m.generation();
        m.clear_cache();
        let g1 = m.generation();
        m.set_disable(Level::WARNING);
        assert!(g0 < g1 && g1 < m.generation());
        assert_eq!(m.disable(), Level::WARNING);
    }

    #[test]
    fn template_applies_to_new_loggers_only() {
        let m = manager();
        let before = m.get_logger("before").unwrap();
        m.set_logger_template(Some(LoggerTemplate::new().level(Level::ERROR).disabled(true)))
            .unwrap();
        let after = m.get_logger("after").unwrap();
        assert_eq!(after.level(), Level::ERROR);
        assert!(after.is_disabled());
        assert_eq!(before.level(), Level::NOTSET);
        assert!(!before.is_disabled());

        let err = m
            .set_logger_template(Some(LoggerTemplate::new().level(77)))
            .unwrap_err();
        assert!(err.is_unknown_identifier());
    }

    #[test]
    fn loggers_lists_root_first() {
        let m = manager();
        m.get_logger("b").unwrap();
        m.get_logger("a.c").unwrap();
        let names: Vec<String> = m.loggers().iter().map(|l| l.name().to_string()).collect();
        assert_eq!(names, ["root", "a.c", "b"]);
    }

    #[test]
    fn concurrent_creation_yields_one_logger() {
        let m = manager();
        let loggers: Vec<Arc<Logger>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| m.get_logger("shared.name").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(loggers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
