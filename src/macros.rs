// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging macros.
//!
//! The macros format their arguments with [`format!`] and record the full call site,
//! including the enclosing function and `impl` type, which the plain methods on
//! [`Logger`](crate::Logger) cannot see.
//!
//! ```
//! use logtree::{Handler, Level, Manager, MemoryBuffer, SinkTarget, TemplateFormatter};
//!
//! let manager = Manager::new();
//! let buffer = MemoryBuffer::new();
//! let handler = Handler::builder(SinkTarget::Memory(buffer.clone()))
//!     .formatter(TemplateFormatter::new("%(function_name)s: %(message)s", "%H").unwrap())
//!     .build()
//!     .unwrap();
//! let logger = manager.get_logger("app").unwrap();
//! logger.add_handler(handler);
//!
//! fn serve(logger: &logtree::Logger) {
//!     logtree::warning!(logger, "{} requests queued", 12).unwrap();
//! }
//! serve(&logger);
//! assert_eq!(buffer.drain(), ["serve: 12 requests queued"]);
//! ```

/// The [`CallerFrame`](crate::CallerFrame) of the place this macro is expanded in.
#[macro_export]
macro_rules! caller_frame {
    () => {{
        fn __logtree_here() {}
        let name = $crate::callsite::type_name_of(__logtree_here);
        let function = name.strip_suffix("::__logtree_here").unwrap_or(name);
        $crate::CallerFrame::from_parts(::std::file!(), ::std::line!(), ::std::module_path!(), function)
    }};
}

/// Logs a formatted message at `level` on `logger`.
///
/// ```
/// # let logger = logtree::Manager::new().root();
/// logtree::log!(logger, 30, "{} of {} workers busy", 7, 8).unwrap();
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log_with(
            $level,
            ::std::format!($($arg)+),
            $crate::LogOptions::new().caller($crate::caller_frame!()),
        )
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::DEBUG, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::INFO, $($arg)+)
    };
}

#[macro_export]
macro_rules! warning {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::WARNING, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::ERROR, $($arg)+)
    };
}

#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::CRITICAL, $($arg)+)
    };
}
