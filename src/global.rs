// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide logger tree.
//!
//! These functions are thin wrappers over one lazily created [`Manager`] that uses the
//! process-wide [`LevelRegistry`] and [`HandlerRegistry`].
//!
//! ```
//! use logtree::{Handler, Level, MemoryBuffer, SinkTarget};
//!
//! let buffer = MemoryBuffer::new();
//! let handler = Handler::builder(SinkTarget::Memory(buffer.clone()))
//!     .level(Level::DEBUG)
//!     .build()
//!     .unwrap();
//! logtree::global::root().add_handler(handler);
//!
//! logtree::global::warning("disk almost full").unwrap();
//! assert!(buffer.contents().contains("WARNING :: disk almost full"));
//!
//! logtree::global::shutdown().unwrap();
//! assert!(logtree::global::root().handlers().is_empty());
//! ```

use crate::config::LoggingConfig;
use crate::error::Result;
use crate::handler::{Handler, HandlerRegistry};
use crate::level::{Level, LevelKey, LevelRegistry};
use crate::logger::{LogOptions, Logger};
use crate::manager::Manager;
use std::sync::{Arc, OnceLock};

static GLOBAL_MANAGER: OnceLock<Arc<Manager>> = OnceLock::new();

/// The process-wide manager.
pub fn manager() -> Arc<Manager> {
    GLOBAL_MANAGER.get_or_init(Manager::new).clone()
}

/// The process-wide level registry.
pub fn levels() -> Arc<LevelRegistry> {
    manager().levels().clone()
}

/// The process-wide root logger.
pub fn root() -> Arc<Logger> {
    manager().root()
}

/// The logger called `name`; `"root"` is the root logger.
pub fn get_logger(name: &str) -> Result<Arc<Logger>> {
    manager().get_logger(name)
}

/// Sets the root logger's level.
pub fn set_level<'a>(level: impl Into<LevelKey<'a>>) -> Result<()> {
    root().set_level(level)
}

/// Suppresses every record below `level`, on every logger.
pub fn disable(level: impl Into<Level>) {
    manager().set_disable(level);
}

/**
Applies `config` to the process-wide tree.

Handlers previously attached to the root logger are closed and detached first.
*/
pub fn load_config(config: &LoggingConfig) -> Result<Vec<Arc<Handler>>> {
    let root = root();
    for handler in root.handlers() {
        root.remove_handler(&handler);
        handler.close()?;
    }
    config.apply(&manager())
}

/// Flushes and closes every registered handler, then detaches handlers from every logger.
pub fn shutdown() -> Result<()> {
    let result = HandlerRegistry::global().shutdown();
    for logger in manager().loggers() {
        logger.clear_handlers();
    }
    result
}

#[track_caller]
pub fn log_with(
    level: impl Into<Level>,
    message: impl Into<String>,
    options: LogOptions,
) -> Result<()> {
    root().log_with(level, message, options)
}

#[track_caller]
pub fn log(level: impl Into<Level>, message: impl Into<String>) -> Result<()> {
    root().log(level, message)
}

#[track_caller]
pub fn debug(message: impl Into<String>) -> Result<()> {
    root().debug(message)
}

#[track_caller]
pub fn info(message: impl Into<String>) -> Result<()> {
    root().info(message)
}

#[track_caller]
pub fn warning(message: impl Into<String>) -> Result<()> {
    root().warning(message)
}

#[track_caller]
pub fn error(message: impl Into<String>) -> Result<()> {
    root().error(message)
}

#[track_caller]
pub fn critical(message: impl Into<String>) -> Result<()> {
    root().critical(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemoryBuffer, SinkTarget};
    use std::sync::Mutex;

    static TEST_GLOBAL_GUARD: Mutex<()> = Mutex::new(());

    fn capture() -> (Arc<Handler>, MemoryBuffer) {
        let buffer = MemoryBuffer::new();
        let handler = Handler::builder(SinkTarget::Memory(buffer.clone()))
            .level(Level::DEBUG)
            .build()
            .unwrap();
        (handler, buffer)
    }

    #[test]
    fn root_is_shared() {
        let _guard = TEST_GLOBAL_GUARD.lock().unwrap();
        assert!(Arc::ptr_eq(&root(), &get_logger("root").unwrap()));
        assert!(Arc::ptr_eq(&manager(), &manager()));
        assert_eq!(root().name(), "root");
    }

    #[test]
    fn module_functions_log_through_root() {
        let _guard = TEST_GLOBAL_GUARD.lock().unwrap();
        let (handler, buffer) = capture();
        root().add_handler(handler);

        info("Test info message").unwrap();
        debug("hidden").unwrap();
        assert_eq!(buffer.len(), 1);
        assert!(buffer.contents().contains(" :: INFO :: Test info message"));

        shutdown().unwrap();
        assert!(root().handlers().is_empty());
    }

    #[test]
    fn disable_applies_everywhere() {
        let _guard = TEST_GLOBAL_GUARD.lock().unwrap();
        let (handler, buffer) = capture();
        let logger = get_logger("global.tests.disable").unwrap();
        logger.add_handler(handler);

        disable(Level::CRITICAL);
        logger.error("suppressed").unwrap();
        disable(Level::NOTSET);
        logger.error("kept").unwrap();

        assert_eq!(buffer.len(), 1);
        shutdown().unwrap();
    }

    #[test]
    fn shutdown_closes_registered_handlers() {
        let _guard = TEST_GLOBAL_GUARD.lock().unwrap();
        let (handler, _) = capture();
        get_logger("global.tests.shutdown")
            .unwrap()
            .add_handler(handler.clone());
        shutdown().unwrap();
        assert!(handler.is_closed());
        assert!(
            get_logger("global.tests.shutdown")
                .unwrap()
                .handlers()
                .is_empty()
        );
    }
}
