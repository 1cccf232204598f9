// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes records from the [`log`] facade into a logger tree.
//!
//! A `log` target such as `my_app::net` is sent to the logger `my_app.net`. Levels map
//! onto the built-in set; `Trace` has no counterpart and is treated as `DEBUG`.

use crate::callsite::CallerFrame;
use crate::level::Level;
use crate::logger::{LogOptions, Logger};
use crate::manager::Manager;
use log::{LevelFilter, Log, Metadata, Record};
use std::sync::Arc;

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::ERROR,
            log::Level::Warn => Level::WARNING,
            log::Level::Info => Level::INFO,
            log::Level::Debug | log::Level::Trace => Level::DEBUG,
        }
    }
}

/// The most permissive `log` filter that can still produce records at `level`.
pub fn level_filter(level: Level) -> LevelFilter {
    if level > Level::WARNING {
        LevelFilter::Error
    } else if level > Level::INFO {
        LevelFilter::Warn
    } else if level > Level::DEBUG {
        LevelFilter::Info
    } else {
        LevelFilter::Trace
    }
}

/**
A [`log::Log`] implementation backed by a [`Manager`].
*/
#[derive(Debug, Clone)]
pub struct LogBridge {
    manager: Arc<Manager>,
}

impl LogBridge {
    pub fn new(manager: Arc<Manager>) -> Self {
        LogBridge { manager }
    }

    /// Installs a bridge to `manager` as the `log` facade's logger.
    ///
    /// The facade's max level follows the root logger's effective level at install time.
    pub fn install(manager: Arc<Manager>) -> Result<(), log::SetLoggerError> {
        let filter = level_filter(manager.root().effective_level());
        log::set_boxed_logger(Box::new(LogBridge::new(manager)))?;
        log::set_max_level(filter);
        Ok(())
    }

    /// The logger a `log` target is routed to. Targets that are not valid logger names
    /// go to the root.
    pub fn logger_for(&self, target: &str) -> Arc<Logger> {
        if target.is_empty() {
            return self.manager.root();
        }
        self.manager
            .get_logger(&target.replace("::", "."))
            .unwrap_or_else(|_| self.manager.root())
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.logger_for(metadata.target())
            .is_enabled_for(Level::from(metadata.level()))
    }

    fn log(&self, record: &Record) {
        let logger = self.logger_for(record.target());
        let caller = CallerFrame::from_parts(
            record.file().unwrap_or("Unknown Path"),
            record.line().unwrap_or(0),
            record.module_path().unwrap_or_default(),
            "",
        );
        // The facade has no error channel.
        let _ = logger.log_with(
            Level::from(record.level()),
            record.args().to_string(),
            LogOptions::new().caller(caller),
        );
    }

    fn flush(&self) {
        for logger in self.manager.loggers() {
            for handler in logger.handlers() {
                let _ = handler.flush();
            }
        }
    }
}
