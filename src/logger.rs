// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named loggers.
//!
//! A [`Logger`] is a node in the dot-separated name tree owned by a
//! [`Manager`](crate::Manager). Its own level may be [`Level::NOTSET`], in which case the
//! *effective* level is inherited from the nearest ancestor that has one.
//!
//! Effective levels are cached per logger and tagged with the manager's generation
//! counter. Any level change anywhere bumps the counter, which makes every cached value
//! stale at once; each logger recomputes lazily on its next lookup.
//!
//! Records are dispatched to the logger's own handlers and then to each ancestor's,
//! child to root, in attachment order.

use crate::callsite::{CallerFrame, capture_stack};
use crate::error::{LogError, Result};
use crate::handler::Handler;
use crate::level::{Level, LevelKey, LevelRegistry};
use crate::manager::Manager;
use crate::record::{ExceptionInfo, Record};
use parking_lot::{Mutex, RwLock};
use std::error::Error;
use std::fmt::Display;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/**
Per-call options for [`Logger::log_with`].
*/
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    suppress_console_echo: bool,
    exception: Option<ExceptionInfo>,
    stack_info: bool,
    caller: Option<CallerFrame>,
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps console handlers quiet and stops file handlers echoing to standard output.
    pub fn suppress_console_echo(mut self, suppress: bool) -> Self {
        self.suppress_console_echo = suppress;
        self
    }

    pub fn exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Attaches `err` (and its source chain) as the record's exception.
    pub fn error(self, err: &(dyn Error + 'static)) -> Self {
        self.exception(ExceptionInfo::from_dyn(err))
    }

    /// Captures the call stack into the record.
    pub fn stack_info(mut self, capture: bool) -> Self {
        self.stack_info = capture;
        self
    }

    /// Overrides the call site, e.g. with [`caller_frame!`](crate::caller_frame).
    pub fn caller(mut self, caller: CallerFrame) -> Self {
        self.caller = Some(caller);
        self
    }
}

/**
A named node in the logger tree.

Obtain loggers from a [`Manager`] (or [`crate::global::get_logger`]); they live as long as
the manager does.
*/
#[derive(Debug)]
pub struct Logger {
    name: String,
    is_root: bool,
    level: AtomicU32,
    disabled: AtomicBool,
    parent: RwLock<Option<Arc<Logger>>>,
    manager: Weak<Manager>,
    levels: Arc<LevelRegistry>,
    cache: Mutex<Option<(Level, u64)>>,
    handlers: RwLock<Vec<Arc<Handler>>>,
}

impl Logger {
    pub(crate) fn new(
        name: &str,
        level: Level,
        manager: Weak<Manager>,
        levels: Arc<LevelRegistry>,
    ) -> Self {
        Logger {
            name: name.to_string(),
            is_root: false,
            level: AtomicU32::new(level.number()),
            disabled: AtomicBool::new(false),
            parent: RwLock::new(None),
            manager,
            levels,
            cache: Mutex::new(None),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn new_root(
        level: Level,
        manager: Weak<Manager>,
        levels: Arc<LevelRegistry>,
    ) -> Self {
        Logger {
            is_root: true,
            ..Self::new(crate::manager::ROOT_NAME, level, manager, levels)
        }
    }

    /// The dotted name; `"root"` for the root logger.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// The logger's own level; [`Level::NOTSET`] means inherited.
    pub fn level(&self) -> Level {
        Level::new(self.level.load(Ordering::Acquire))
    }

    /**
    Sets the logger's own level.

    Any registered level is accepted, plus `0` to inherit (except on the root logger).
    Every cached effective level in the manager is invalidated.
    */
    pub fn set_level<'a>(&self, level: impl Into<LevelKey<'a>>) -> Result<()> {
        let level = match level.into() {
            LevelKey::Number(0) if self.is_root => {
                return Err(LogError::invalid(
                    "root level",
                    "the root logger must have a concrete level",
                ));
            }
            LevelKey::Number(0) => Level::NOTSET,
            key => self.levels.check_level(key)?,
        };
        self.level.store(level.number(), Ordering::Release);
        if let Some(manager) = self.manager.upgrade() {
            manager.clear_cache();
        }
        Ok(())
    }

    /// A disabled logger emits nothing of its own but still passes records up.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    /// The nearest existing ancestor. Only the root logger has none.
    ///
    /// This changes when an intermediate logger is created later.
    ///
    /// ```
    /// use logtree::{LevelRegistry, Manager};
    /// use std::sync::Arc;
    ///
    /// let manager = Manager::with_levels(Arc::new(LevelRegistry::new()));
    /// let leaf = manager.get_logger("app.db.pool").unwrap();
    /// assert_eq!(leaf.parent().unwrap().name(), "root");
    /// manager.get_logger("app.db").unwrap();
    /// assert_eq!(leaf.parent().unwrap().name(), "app.db");
    /// assert!(manager.root().parent().is_none());
    /// ```
    pub fn parent(&self) -> Option<Arc<Logger>> {
        self.parent.read().clone()
    }

    pub(crate) fn set_parent(&self, parent: Option<Arc<Logger>>) {
        *self.parent.write() = parent;
    }

    /// `None` once the owning manager has been dropped.
    pub fn manager(&self) -> Option<Arc<Manager>> {
        self.manager.upgrade()
    }

    /**
    The level this logger enforces: its own, or the nearest ancestor's, or the registry
    default when the whole chain is unset.
    */
    pub fn effective_level(&self) -> Level {
        let generation = self.manager.upgrade().map(|m| m.generation());
        if let (Some(current), Some((level, cached))) = (generation, *self.cache.lock()) {
            if cached == current {
                return level;
            }
        }

        let mut level = self.level();
        let mut next = self.parent();
        while level.is_notset() {
            let Some(logger) = next else { break };
            level = logger.level();
            next = logger.parent();
        }
        if level.is_notset() {
            level = self.levels.default_level();
        }

        if let Some(current) = generation {
            *self.cache.lock() = Some((level, current));
        }
        level
    }

    /// False when disabled, below the manager's disable threshold, or below the effective level.
    pub fn is_enabled_for(&self, level: impl Into<Level>) -> bool {
        let level = level.into();
        if self.is_disabled() {
            return false;
        }
        if let Some(manager) = self.manager.upgrade() {
            if level < manager.disable() {
                return false;
            }
        }
        level >= self.effective_level()
    }

    /// Returns (creating if needed) the logger named `<self>.<suffix>`.
    pub fn get_child(&self, suffix: &str) -> Result<Arc<Logger>> {
        let manager = self
            .manager
            .upgrade()
            .ok_or(LogError::Unimplemented("get_child on a logger without a manager"))?;
        if self.is_root {
            manager.get_logger(suffix)
        } else {
            manager.get_logger(&format!("{}.{}", self.name, suffix))
        }
    }

    /// Attaches `handler`. Attaching the same handler twice is a no-op.
    pub fn add_handler(&self, handler: Arc<Handler>) {
        let mut handlers = self.handlers.write();
        if !handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            handlers.push(handler);
        }
    }

    /// Detaches `handler`. Detaching a handler that is not attached is a no-op.
    pub fn remove_handler(&self, handler: &Arc<Handler>) {
        self.handlers.write().retain(|h| !Arc::ptr_eq(h, handler));
    }

    pub fn clear_handlers(&self) {
        self.handlers.write().clear();
    }

    /// Handlers attached to this logger, in attachment order.
    pub fn handlers(&self) -> Vec<Arc<Handler>> {
        self.handlers.read().clone()
    }

    /// True when this logger or any ancestor has a handler.
    pub fn has_handlers(&self) -> bool {
        if !self.handlers.read().is_empty() {
            return true;
        }
        let mut next = self.parent();
        while let Some(logger) = next {
            if !logger.handlers.read().is_empty() {
                return true;
            }
            next = logger.parent();
        }
        false
    }

    /// Builds a record for this logger without dispatching it.
    pub fn make_record(
        &self,
        level: Level,
        message: impl Into<String>,
        caller: CallerFrame,
        exception: Option<ExceptionInfo>,
        stack_info: Option<String>,
    ) -> Result<Record> {
        let mut record = Record::new(&self.levels, &self.name, level, message, caller)?;
        if let Some(exception) = exception {
            record = record.with_exception(exception)?;
        }
        if let Some(stack) = stack_info {
            record = record.with_stack_info(stack);
        }
        Ok(record)
    }

    /// Dispatches `record` to this logger's handlers and then every ancestor's.
    pub fn handle(&self, record: &Record, suppress_console_echo: bool) -> Result<()> {
        self.call_handlers(record, suppress_console_echo)
    }

    /**
    Offers `record` to each handler from this logger up to the root.

    Disabled loggers on the way are skipped, but propagation continues past them. Every
    handler is attempted; the first failure is returned.
    */
    pub fn call_handlers(&self, record: &Record, suppress_console_echo: bool) -> Result<()> {
        let mut first = None;
        let mut dispatch = |logger: &Logger| {
            if logger.is_disabled() {
                return;
            }
            for handler in logger.handlers() {
                if let Err(e) = handler.handle(record, suppress_console_echo) {
                    first.get_or_insert(e);
                }
            }
        };
        dispatch(self);
        let mut next = self.parent();
        while let Some(logger) = next {
            dispatch(&logger);
            next = logger.parent();
        }
        first.map_or(Ok(()), Err)
    }

    /**
    Logs `message` at `level`, which must be a registered level.

    The call site is the caller of this method unless `options` names one.
    */
    #[track_caller]
    pub fn log_with(
        &self,
        level: impl Into<Level>,
        message: impl Into<String>,
        options: LogOptions,
    ) -> Result<()> {
        let level: Level = level.into();
        let level = self.levels.check_level(level)?;
        let caller = options
            .caller
            .unwrap_or_else(|| CallerFrame::from_location(Location::caller()));
        let record = self.make_record(level, message, caller, options.exception, None)?;
        if !self.is_enabled_for(level) {
            return Ok(());
        }
        let record = if options.stack_info {
            record.with_stack_info(capture_stack())
        } else {
            record
        };
        self.handle(&record, options.suppress_console_echo)
    }

    #[track_caller]
    pub fn log(&self, level: impl Into<Level>, message: impl Into<String>) -> Result<()> {
        self.log_with(level, message, LogOptions::new())
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) -> Result<()> {
        self.log_with(Level::DEBUG, message, LogOptions::new())
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) -> Result<()> {
        self.log_with(Level::INFO, message, LogOptions::new())
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) -> Result<()> {
        self.log_with(Level::WARNING, message, LogOptions::new())
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) -> Result<()> {
        self.log_with(Level::ERROR, message, LogOptions::new())
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) -> Result<()> {
        self.log_with(Level::CRITICAL, message, LogOptions::new())
    }

    /// Logs at ERROR with `err` attached as the exception.
    #[track_caller]
    pub fn exception(
        &self,
        message: impl Into<String>,
        err: &(dyn Error + 'static),
    ) -> Result<()> {
        self.log_with(Level::ERROR, message, LogOptions::new().error(err))
    }
}

impl Display for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Logger {} ({})>",
            self.name,
            self.levels.level_name(self.effective_level())
        )
    }
}
