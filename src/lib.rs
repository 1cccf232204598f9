//SPDX-License-Identifier: MIT OR Apache-2.0
/*!
# logtree

logtree is a hierarchical logging library for Rust.

# The model

Loggers are named with dot-separated paths (`app`, `app.db`, `app.db.pool`) and form a
tree under a single root logger. A record logged on `app.db.pool` is offered to the
handlers of `app.db.pool`, then `app.db`, then `app`, then the root.

Each logger may set a level. A logger without one inherits the level of its nearest
ancestor that has one; the root always has one. The inherited ("effective") level is
cached per logger and the whole cache is invalidated whenever any level in the tree
changes, so the common case of a disabled debug message costs a lock and a compare.

Levels are plain numbers with registered names. The built-ins are

| Name     | Number |
|----------|--------|
| DEBUG    | 10     |
| INFO     | 20     |
| WARNING  | 30     |
| ERROR    | 40     |
| CRITICAL | 50     |

and more can be registered in a [`LevelRegistry`].

# Handlers

A [`Handler`] pairs a sink (standard output, standard error, a file, or an in-memory
buffer) with a level threshold, a [`Formatter`] and an optional [`ColorMatcher`] that
colors whole messages by keyword.

# The API

```
use logtree::{Handler, Level, MemoryBuffer, SinkTarget};

let buffer = MemoryBuffer::new();
let handler = Handler::builder(SinkTarget::Memory(buffer.clone()))
    .level(Level::DEBUG)
    .build()
    .unwrap();
logtree::global::root().add_handler(handler);

let logger = logtree::global::get_logger("app.db").unwrap();
logtree::info!(logger, "connected to {}", "primary").unwrap();
logger.debug("not shown: the root level is INFO").unwrap();

assert_eq!(buffer.len(), 1);
assert!(buffer.contents().ends_with("INFO :: connected to primary"));
# logtree::global::shutdown().unwrap();
```

Every logging call returns a [`Result`]. Failures of a sink are reported to the caller
and never logged by the library itself.

Setup can also be described in TOML, see [`LoggingConfig`]. Records from the
[log](https://crates.io/crates/log) facade can be routed into a tree with [`LogBridge`].

# Multithreading

Every type is `Send + Sync`. Loggers may be created, configured and used from any thread;
each record is written to a sink in one piece.
*/

mod bridge;
pub mod callsite;
mod color;
mod config;
mod error;
mod formatter;
pub mod global;
mod handler;
mod level;
mod logger;
mod macros;
mod manager;
mod record;
mod sink;
mod style;

pub use bridge::{LogBridge, level_filter};
pub use callsite::CallerFrame;
pub use color::{ColorMatcher, ColorSupport, KeywordMapping, KeywordStyle};
pub use config::{
    ColorConfig, HandlerConfig, HandlerKind, HandlerStyle, LevelConfig, LevelSpec, LoggingConfig,
};
pub use error::{LogError, Result};
pub use formatter::{
    CSV_FORMAT, DATE_FORMAT, DEFAULT_FORMAT, Formatter, JsonFormatter, TemplateFormatter,
    json_format,
};
pub use handler::{Handler, HandlerBuilder, HandlerRegistry};
pub use level::{Level, LevelKey, LevelRegistry};
pub use logger::{LogOptions, Logger};
pub use manager::{LoggerTemplate, Manager, ROOT_NAME};
pub use record::{ExceptionInfo, Record};
pub use sink::{
    ConsoleSink, ConsoleStream, DEFAULT_LOG_FILE, FileMode, FileSink, MemoryBuffer, MemorySink,
    Rendered, Sink, SinkTarget, TextEncoding,
};
pub use style::{BackgroundColor, RESET, TextColor, TextEffect};
