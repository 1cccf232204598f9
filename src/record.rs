// SPDX-License-Identifier: MIT OR Apache-2.0

//! The log event snapshot handed to handlers.
//!
//! A [`Record`] is built once per log call on the calling thread and then only read.
//! Everything a formatter might want is captured up front: the level *name* is resolved
//! against the [`LevelRegistry`] at construction, so renaming or removing a level later
//! does not change records that already exist.

use crate::callsite::CallerFrame;
use crate::error::{LogError, Result};
use crate::level::{Level, LevelRegistry};
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

fn current_thread() -> (u64, String) {
    let id = THREAD_ID.with(|id| *id);
    let name = std::thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string();
    (id, name)
}

/**
Error details attached to a record: the error's type, its message, and an optional
traceback-like description (for Rust errors, the chain of `source()` errors).
*/
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExceptionInfo {
    type_name: String,
    message: String,
    traceback: Option<String>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExceptionInfo {
            type_name: type_name.into(),
            message: message.into(),
            traceback: None,
        }
    }

    /// Captures `err`, naming it after its concrete type.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let without_generics = full.split('<').next().unwrap_or(full);
        let short = without_generics.rsplit("::").next().unwrap_or(without_generics);
        Self::from_dyn_named(short, err)
    }

    /// Captures a type-erased error. The type is reported as `Error`.
    pub fn from_dyn(err: &(dyn Error + 'static)) -> Self {
        Self::from_dyn_named("Error", err)
    }

    fn from_dyn_named(type_name: &str, err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("Caused by: {cause}"));
            source = cause.source();
        }
        ExceptionInfo {
            type_name: type_name.to_string(),
            message: err.to_string(),
            traceback: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.type_name.trim().is_empty() {
            return Err(LogError::invalid(
                "exception info",
                "type name must not be empty",
            ));
        }
        Ok(())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn traceback(&self) -> Option<&str> {
        self.traceback.as_deref()
    }
}

impl Display for ExceptionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/**
An immutable snapshot of one log event.
*/
#[derive(Debug, Clone)]
pub struct Record {
    time: DateTime<Local>,
    message: String,
    logger_name: String,
    level: Level,
    level_name: String,
    caller: CallerFrame,
    exception: Option<ExceptionInfo>,
    stack_info: Option<String>,
    thread: u64,
    thread_name: String,
    process_id: u32,
}

impl Record {
    /// Captures a record on the current thread.
    ///
    /// The level name is resolved against `registry` now and never re-derived.
    pub fn new(
        registry: &LevelRegistry,
        logger_name: &str,
        level: Level,
        message: impl Into<String>,
        caller: CallerFrame,
    ) -> Result<Self> {
        if logger_name.is_empty() {
            return Err(LogError::invalid("logger name", "must not be empty"));
        }
        caller.validate()?;
        let (thread, thread_name) = current_thread();
        Ok(Record {
            time: Local::now(),
            message: message.into(),
            logger_name: logger_name.to_string(),
            level,
            level_name: registry.level_name(level),
            caller,
            exception: None,
            stack_info: None,
            thread,
            thread_name,
            process_id: std::process::id(),
        })
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Result<Self> {
        exception.validate()?;
        self.exception = Some(exception);
        Ok(self)
    }

    pub fn with_stack_info(mut self, stack_info: impl Into<String>) -> Self {
        self.stack_info = Some(stack_info.into());
        self
    }

    pub fn time(&self) -> DateTime<Local> {
        self.time
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn level_number(&self) -> u32 {
        self.level.number()
    }

    /// The name the level had when the record was made.
    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    pub fn caller(&self) -> &CallerFrame {
        &self.caller
    }

    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.exception.as_ref()
    }

    pub fn stack_info(&self) -> Option<&str> {
        self.stack_info.as_deref()
    }

    /// Numeric id of the creating thread.
    pub fn thread(&self) -> u64 {
        self.thread
    }

    /// Name of the creating thread, or `"<unnamed>"`.
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Field map in a fixed key order, used by structured formatters.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("time".into(), Value::String(self.time.to_rfc3339()));
        map.insert("message".into(), Value::String(self.message.clone()));
        map.insert("logger_name".into(), Value::String(self.logger_name.clone()));
        map.insert("level_name".into(), Value::String(self.level_name.clone()));
        map.insert("level_number".into(), Value::from(self.level.number()));
        map.insert("file_name".into(), Value::String(self.caller.file_name().into()));
        map.insert("class_name".into(), Value::String(self.caller.class_name().into()));
        map.insert(
            "function_name".into(),
            Value::String(self.caller.function_name().into()),
        );
        map.insert(
            "module_name".into(),
            Value::String(self.caller.module_name().into()),
        );
        map.insert("path_name".into(), Value::String(self.caller.path_name().into()));
        map.insert("line_number".into(), Value::from(self.caller.line()));
        map.insert(
            "exec_info".into(),
            self.exception
                .as_ref()
                .map_or(Value::Null, |e| Value::String(e.to_string())),
        );
        map.insert(
            "stack_info".into(),
            self.stack_info
                .as_ref()
                .map_or(Value::Null, |s| Value::String(s.clone())),
        );
        map.insert("thread".into(), Value::from(self.thread));
        map.insert("thread_name".into(), Value::String(self.thread_name.clone()));
        map.insert("process_id".into(), Value::from(self.process_id));
        map
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&Value::Object(self.to_map()))?)
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} :: {}", self.level_name, self.message)
    }
}
