// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handlers: a sink plus its own level, formatter and optional colorizer.
//!
//! Every handler built through [`HandlerBuilder`] is recorded in a [`HandlerRegistry`]
//! (the process-wide one unless another is given), so that shutdown can flush and close
//! all of them. A handler leaves the registry when it is closed.
//!
//! ```
//! use logtree::{Handler, Level, MemoryBuffer, SinkTarget};
//!
//! let buffer = MemoryBuffer::new();
//! let handler = Handler::builder(SinkTarget::Memory(buffer.clone()))
//!     .name("capture")
//!     .level(Level::WARNING)
//!     .build()
//!     .unwrap();
//! assert_eq!(handler.level(), Level::WARNING);
//! handler.close().unwrap();
//! ```

use crate::color::ColorMatcher;
use crate::error::{LogError, Result};
use crate::formatter::{Formatter, TemplateFormatter};
use crate::level::{Level, LevelKey, LevelRegistry};
use crate::record::Record;
use crate::sink::{Rendered, Sink, SinkTarget};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

static GLOBAL_HANDLERS: OnceLock<Arc<HandlerRegistry>> = OnceLock::new();

/**
The set of live handlers.

Entries are weak: dropping the last strong reference to a handler removes it implicitly.
*/
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Mutex<Vec<(u64, Weak<Handler>)>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<HandlerRegistry> {
        GLOBAL_HANDLERS
            .get_or_init(|| Arc::new(HandlerRegistry::new()))
            .clone()
    }

    fn register(&self, handler: &Arc<Handler>) {
        let mut handlers = self.handlers.lock();
        handlers.retain(|(_, weak)| weak.strong_count() > 0);
        handlers.push((handler.id, Arc::downgrade(handler)));
    }

    fn deregister(&self, id: u64) {
        self.handlers.lock().retain(|(other, _)| *other != id);
    }

    /// Live handlers in registration order.
    pub fn handlers(&self) -> Vec<Arc<Handler>> {
        self.handlers
            .lock()
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect()
    }

    /// Number of live handlers.
    pub fn len(&self) -> usize {
        self.handlers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flushes every live handler. All handlers are attempted; the first error is returned.
    pub fn flush_all(&self) -> Result<()> {
        let mut first = None;
        for handler in self.handlers() {
            if let Err(e) = handler.flush() {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Flushes and closes every live handler, leaving the registry empty.
    ///
    /// A handler whose flush fails is still closed. The first error is returned; for a
    /// single handler its flush error comes before its close error.
    pub fn shutdown(&self) -> Result<()> {
        let mut first = None;
        for handler in self.handlers() {
            let flushed = handler.flush();
            let closed = handler.close();
            if let Err(e) = flushed.and(closed) {
                first.get_or_insert(e);
            }
        }
        self.handlers.lock().clear();
        first.map_or(Ok(()), Err)
    }
}

#[derive(Debug)]
enum SinkSource {
    Target(SinkTarget),
    Custom(Box<dyn Sink>),
}

#[derive(Debug, Clone)]
enum LevelSetting {
    Number(u32),
    Name(String),
}

/**
Builds a [`Handler`].

Defaults: no name, the registry's default level, [`TemplateFormatter::default`], no
colorizer, the process-wide [`HandlerRegistry`] and [`LevelRegistry`].
*/
#[derive(Debug)]
pub struct HandlerBuilder {
    source: SinkSource,
    name: Option<String>,
    level: Option<LevelSetting>,
    formatter: Option<Arc<dyn Formatter>>,
    matcher: Option<Arc<ColorMatcher>>,
    registry: Option<Arc<HandlerRegistry>>,
    levels: Option<Arc<LevelRegistry>>,
}

impl HandlerBuilder {
    fn new(source: SinkSource) -> Self {
        HandlerBuilder {
            source,
            name: None,
            level: None,
            formatter: None,
            matcher: None,
            registry: None,
            levels: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The handler's threshold, by number or registered name.
    pub fn level<'a>(mut self, level: impl Into<LevelKey<'a>>) -> Self {
        self.level = Some(match level.into() {
            LevelKey::Number(n) => LevelSetting::Number(n),
            LevelKey::Name(name) => LevelSetting::Name(name.to_string()),
        });
        self
    }

    pub fn formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    pub fn shared_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn matcher(mut self, matcher: Arc<ColorMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// The registry used to validate levels.
    pub fn levels(mut self, levels: Arc<LevelRegistry>) -> Self {
        self.levels = Some(levels);
        self
    }

    /// Validates the configuration, opens the sink and registers the handler.
    pub fn build(self) -> Result<Arc<Handler>> {
        if self.name.as_deref() == Some("") {
            return Err(LogError::invalid("handler name", "must not be empty"));
        }
        let levels = self.levels.unwrap_or_else(LevelRegistry::global);
        let level = match &self.level {
            None => levels.default_level(),
            Some(LevelSetting::Number(n)) => levels.check_level(*n)?,
            Some(LevelSetting::Name(name)) => levels.check_level(name.as_str())?,
        };
        let (kind, sink) = match self.source {
            SinkSource::Target(target) => (target.kind(), target.open()?),
            SinkSource::Custom(sink) => ("custom", sink),
        };
        let registry = self.registry.unwrap_or_else(HandlerRegistry::global);
        let handler = Arc::new(Handler {
            id: NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            kind,
            level: AtomicU32::new(level.number()),
            levels,
            formatter: RwLock::new(
                self.formatter
                    .unwrap_or_else(|| Arc::new(TemplateFormatter::default())),
            ),
            matcher: RwLock::new(self.matcher),
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
            registry: registry.clone(),
        });
        registry.register(&handler);
        Ok(handler)
    }
}

/**
A configured output: sink, level threshold, formatter and optional [`ColorMatcher`].

Handlers are shared (`Arc`) between loggers. All methods take `&self`; writes to the sink
are serialized so one record's text is never split by another.
*/
#[derive(Debug)]
pub struct Handler {
    id: u64,
    name: Option<String>,
    kind: &'static str,
    level: AtomicU32,
    levels: Arc<LevelRegistry>,
    formatter: RwLock<Arc<dyn Formatter>>,
    matcher: RwLock<Option<Arc<ColorMatcher>>>,
    sink: Mutex<Box<dyn Sink>>,
    closed: AtomicBool,
    registry: Arc<HandlerRegistry>,
}

impl Handler {
    pub fn builder(target: SinkTarget) -> HandlerBuilder {
        HandlerBuilder::new(SinkSource::Target(target))
    }

    /// A builder around a caller-provided sink.
    pub fn custom(sink: Box<dyn Sink>) -> HandlerBuilder {
        HandlerBuilder::new(SinkSource::Custom(sink))
    }

    /// Process-unique, assigned at build. Unnamed handlers display by it.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The name given to the builder, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `"stdout"`, `"stderr"`, `"file"`, `"memory"` or `"custom"`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Records below this level are dropped by [`handle`](Self::handle).
    pub fn level(&self) -> Level {
        Level::new(self.level.load(Ordering::Relaxed))
    }

    /// Accepts any level registered in this handler's [`LevelRegistry`].
    pub fn set_level<'a>(&self, level: impl Into<LevelKey<'a>>) -> Result<()> {
        let level = self.levels.check_level(level)?;
        self.level.store(level.number(), Ordering::Relaxed);
        Ok(())
    }

    pub fn formatter(&self) -> Arc<dyn Formatter> {
        self.formatter.read().clone()
    }

    pub fn set_formatter(&self, formatter: impl Formatter + 'static) {
        *self.formatter.write() = Arc::new(formatter);
    }

    /// The colorizer, possibly shared with other handlers.
    pub fn matcher(&self) -> Option<Arc<ColorMatcher>> {
        self.matcher.read().clone()
    }

    /// `None` turns colorization off for this handler.
    pub fn set_matcher(&self, matcher: Option<Arc<ColorMatcher>>) {
        *self.matcher.write() = matcher;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Emits `record` if it meets this handler's level; otherwise drops it silently.
    ///
    /// Returns whether the record was emitted.
    pub fn handle(&self, record: &Record, suppress_console_echo: bool) -> Result<bool> {
        if record.level() < self.level() {
            return Ok(false);
        }
        self.emit(record, suppress_console_echo)?;
        Ok(true)
    }

    /// Formats, colorizes and writes `record` regardless of level.
    pub fn emit(&self, record: &Record, suppress_console_echo: bool) -> Result<()> {
        if self.is_closed() {
            return Err(std::io::Error::other(format!("{self} is closed")).into());
        }
        let plain = self.formatter().format(record)?;
        let mut sink = self.sink.lock();
        let colored = match self.matcher() {
            Some(matcher) => matcher.colorize_for(&plain, sink.is_terminal()),
            None => plain.clone(),
        };
        sink.emit(&Rendered {
            plain: &plain,
            colored: &colored,
            suppress_console_echo,
        })
    }

    /// Flushes the sink. A closed handler has nothing to flush.
    pub fn flush(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.sink.lock().flush()
    }

    /// Releases the sink and leaves the registry. Closing again does nothing.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.registry.deregister(self.id);
        self.sink.lock().close()
    }
}

impl std::fmt::Display for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} handler '{}'", self.kind, name),
            None => write!(f, "{} handler #{}", self.kind, self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsite::CallerFrame;
    use crate::color::{ColorSupport, KeywordStyle};
    use crate::formatter::JsonFormatter;
    use crate::sink::{MemoryBuffer, MemorySink};
    use crate::style::TextColor;

    fn record(level: Level, message: &str) -> Record {
        Record::new(&LevelRegistry::new(), "test", level, message, CallerFrame::unknown()).unwrap()
    }

    fn memory_handler(registry: &Arc<HandlerRegistry>) -> (Arc<Handler>, MemoryBuffer) {
        let buffer = MemoryBuffer::new();
        let handler = Handler::builder(SinkTarget::Memory(buffer.clone()))
            .registry(registry.clone())
            .levels(Arc::new(LevelRegistry::new()))
            .formatter(TemplateFormatter::new("%(level_name)s %(message)s", "%H").unwrap())
            .build()
            .unwrap();
        (handler, buffer)
    }

    #[derive(Debug)]
    struct FlushOnly;
    impl Sink for FlushOnly {
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// A memory sink that claims a terminal status.
    #[derive(Debug)]
    struct Tty {
        inner: MemorySink,
        terminal: bool,
    }
    impl Sink for Tty {
        fn emit(&mut self, line: &Rendered<'_>) -> Result<()> {
            self.inner.emit(line)
        }
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn is_terminal(&self) -> bool {
            self.terminal
        }
    }

    #[derive(Debug)]
    struct Broken {
        fail_close: bool,
    }
    impl Sink for Broken {
        fn flush(&mut self) -> Result<()> {
            Err(std::io::Error::other("flush failed").into())
        }
        fn close(&mut self) -> Result<()> {
            if self.fail_close {
                return Err(std::io::Error::other("close failed").into());
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct CloseFails;
    impl Sink for CloseFails {
        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) -> Result<()> {
            Err(std::io::Error::other("close failed").into())
        }
    }

    fn error_text(err: LogError) -> String {
        match err {
            LogError::Resource(e) => e.to_string(),
            other => panic!("expected a resource error, got {other:?}"),
        }
    }

    #[test]
    fn defaults() {
        let registry = Arc::new(HandlerRegistry::new());
        let (handler, _) = memory_handler(&registry);
        assert_eq!(handler.name(), None);
        assert_eq!(handler.level(), Level::INFO);
        assert!(handler.matcher().is_none());
        assert_eq!(handler.kind(), "memory");
        assert_eq!(handler.formatter().date_format(), "%H");
    }

    #[test]
    fn level_gate_drops_silently() {
        let registry = Arc::new(HandlerRegistry::new());
        let (handler, buffer) = memory_handler(&registry);
        assert!(!handler.handle(&record(Level::DEBUG, "quiet"), false).unwrap());
        assert!(handler.handle(&record(Level::INFO, "loud"), false).unwrap());
        assert_eq!(buffer.drain(), ["INFO loud"]);
    }

    #[test]
    fn levels_are_validated() {
        let registry = Arc::new(HandlerRegistry::new());
        let err = Handler::builder(SinkTarget::Memory(MemoryBuffer::new()))
            .registry(registry.clone())
            .levels(Arc::new(LevelRegistry::new()))
            .level(100)
            .build()
            .unwrap_err();
        assert!(err.is_unknown_identifier());

        let (handler, _) = memory_handler(&registry);
        handler.set_level("ERROR").unwrap();
        assert_eq!(handler.level(), Level::ERROR);
        assert!(handler.set_level("LOUD").unwrap_err().is_unknown_identifier());
        assert!(
            Handler::builder(SinkTarget::Stdout)
                .registry(registry)
                .name("")
                .build()
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn matcher_colorizes_and_absent_matcher_does_not() {
        let registry = Arc::new(HandlerRegistry::new());
        let (handler, buffer) = memory_handler(&registry);
        handler.emit(&record(Level::ERROR, "an error"), false).unwrap();

        let matcher = Arc::new(ColorMatcher::with_support(ColorSupport::Always));
        matcher
            .add_mapping("error", ["error"], KeywordStyle::new(TextColor::Red))
            .unwrap();
        handler.set_matcher(Some(matcher));
        handler.emit(&record(Level::ERROR, "an error"), false).unwrap();

        assert_eq!(
            buffer.drain(),
            ["ERROR an error", "\x1b[31mERROR an error\x1b[0m"]
        );
    }

    #[test]
    fn auto_color_follows_the_sink_terminal_status() {
        let registry = Arc::new(HandlerRegistry::new());
        let matcher = Arc::new(ColorMatcher::with_support(ColorSupport::Auto));
        matcher
            .add_mapping("error", ["error"], KeywordStyle::new(TextColor::Red))
            .unwrap();
        let buffer = MemoryBuffer::new();
        let handler = Handler::custom(Box::new(Tty {
            inner: MemorySink::new(buffer.clone()),
            terminal: false,
        }))
        .registry(registry.clone())
        .levels(Arc::new(LevelRegistry::new()))
        .formatter(TemplateFormatter::new("%(message)s", "%H").unwrap())
        .matcher(matcher.clone())
        .build()
        .unwrap();
        handler.emit(&record(Level::ERROR, "an error"), false).unwrap();
        matcher.set_support(ColorSupport::Always);
        handler.emit(&record(Level::ERROR, "an error"), false).unwrap();
        assert_eq!(buffer.drain(), ["an error", "\x1b[31man error\x1b[0m"]);

        let buffer = MemoryBuffer::new();
        let handler = Handler::custom(Box::new(Tty {
            inner: MemorySink::new(buffer.clone()),
            terminal: true,
        }))
        .registry(registry)
        .levels(Arc::new(LevelRegistry::new()))
        .formatter(TemplateFormatter::new("%(message)s", "%H").unwrap())
        .matcher(matcher.clone())
        .build()
        .unwrap();
        matcher.set_support(ColorSupport::Never);
        handler.emit(&record(Level::ERROR, "an error"), false).unwrap();
        assert_eq!(buffer.drain(), ["an error"]);
    }

    #[test]
    fn auto_color_on_stderr_checks_stderr() {
        let registry = Arc::new(HandlerRegistry::new());
        let matcher = Arc::new(ColorMatcher::with_support(ColorSupport::Auto));
        let handler = Handler::builder(SinkTarget::Stderr)
            .registry(registry)
            .levels(Arc::new(LevelRegistry::new()))
            .matcher(matcher)
            .build()
            .unwrap();
        assert_eq!(
            handler.sink.lock().is_terminal(),
            std::io::IsTerminal::is_terminal(&std::io::stderr())
        );
        handler.emit(&record(Level::ERROR, "to stderr"), true).unwrap();
    }

    #[test]
    fn formatter_can_be_replaced() {
        let registry = Arc::new(HandlerRegistry::new());
        let (handler, buffer) = memory_handler(&registry);
        handler.set_formatter(JsonFormatter::default().lines());
        handler.emit(&record(Level::INFO, "hi"), true).unwrap();
        let line = buffer.drain().remove(0);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["message"], "hi");
        assert_eq!(value["levelName"], "INFO");
    }

    #[test]
    fn close_is_idempotent_and_deregisters() {
        let registry = Arc::new(HandlerRegistry::new());
        let (handler, _) = memory_handler(&registry);
        let (_other, _) = memory_handler(&registry);
        assert_eq!(registry.len(), 2);

        handler.close().unwrap();
        handler.close().unwrap();
        assert!(handler.is_closed());
        assert_eq!(registry.len(), 1);

        let err = handler.emit(&record(Level::INFO, "late"), false).unwrap_err();
        assert!(matches!(err, LogError::Resource(_)));
        handler.flush().unwrap();
    }

    #[test]
    fn dropped_handlers_leave_the_registry() {
        let registry = Arc::new(HandlerRegistry::new());
        let (handler, _) = memory_handler(&registry);
        assert_eq!(registry.len(), 1);
        drop(handler);
        assert!(registry.is_empty());
    }

    #[test]
    fn shutdown_closes_everything() {
        let registry = Arc::new(HandlerRegistry::new());
        let (a, _) = memory_handler(&registry);
        let (b, _) = memory_handler(&registry);
        registry.flush_all().unwrap();
        registry.shutdown().unwrap();
        assert!(a.is_closed() && b.is_closed());
        assert!(registry.is_empty());
    }

    #[test]
    fn shutdown_closes_handlers_whose_flush_fails() {
        let registry = Arc::new(HandlerRegistry::new());
        let build = |sink: Box<dyn Sink>| {
            Handler::custom(sink)
                .registry(registry.clone())
                .levels(Arc::new(LevelRegistry::new()))
                .build()
                .unwrap()
        };
        let flush_fails = build(Box::new(Broken { fail_close: true }));
        let (healthy, _) = memory_handler(&registry);

        let err = registry.shutdown().unwrap_err();
        assert_eq!(error_text(err), "flush failed");
        assert!(flush_fails.is_closed() && healthy.is_closed());
        assert!(registry.is_empty());

        let close_fails = build(Box::new(CloseFails));
        let err = registry.shutdown().unwrap_err();
        assert_eq!(error_text(err), "close failed");
        assert!(close_fails.is_closed());
        registry.shutdown().unwrap();
    }

    #[test]
    fn custom_sink_without_emit_is_unimplemented() {
        let registry = Arc::new(HandlerRegistry::new());
        let handler = Handler::custom(Box::new(FlushOnly))
            .registry(registry)
            .levels(Arc::new(LevelRegistry::new()))
            .build()
            .unwrap();
        assert_eq!(handler.kind(), "custom");
        let err = handler.emit(&record(Level::INFO, "x"), false).unwrap_err();
        assert!(matches!(err, LogError::Unimplemented("emit")));
        handler.flush().unwrap();
    }

    #[test]
    fn file_handler_writes_one_plain_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handler.log");
        let registry = Arc::new(HandlerRegistry::new());
        let matcher = Arc::new(ColorMatcher::with_support(ColorSupport::Always));
        matcher
            .add_mapping("info", ["hello"], KeywordStyle::new(TextColor::Green))
            .unwrap();
        let handler = Handler::builder(SinkTarget::file(&path))
            .registry(registry)
            .levels(Arc::new(LevelRegistry::new()))
            .matcher(matcher)
            .build()
            .unwrap();
        handler.handle(&record(Level::INFO, "hello"), true).unwrap();
        handler.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("INFO"));
        assert!(contents.contains("hello"));
        assert!(!contents.contains('\x1b'));
    }
}
