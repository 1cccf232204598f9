// SPDX-License-Identifier: MIT OR Apache-2.0

//! Call-site capture.
//!
//! This is the only module that looks at the execution call stack. Everything else in the
//! crate receives an explicit [`CallerFrame`] value.
//!
//! There are two ways a frame is produced:
//!
//! * The logging methods on [`Logger`](crate::Logger) are `#[track_caller]`, so the
//!   compiler hands us the [`Location`] of the external call. That gives the file path
//!   and line; the module is derived from the file stem and the function is unknown.
//! * The [`caller_frame!`](crate::caller_frame) macro (used by the `info!`-style macros)
//!   expands at the call site and can also record `module_path!()` and the enclosing
//!   function, including the `impl` type the function belongs to.
//!
//! [`capture_stack`] renders a backtrace for records that request stack information,
//! with this crate's own frames removed so the trace ends at the caller.

use crate::error::{LogError, Result};
use serde::Serialize;
use std::backtrace::Backtrace;
use std::panic::Location;
use std::path::Path;

const UNKNOWN_CLASS: &str = "Unknown Class";
const UNKNOWN_FILE: &str = "Unknown File";
const UNKNOWN_FUNCTION: &str = "Unknown Function";
const UNKNOWN_MODULE: &str = "Unknown Module";
const UNKNOWN_PATH: &str = "Unknown Path";

/// Header line of rendered stack information.
pub const STACK_HEADER: &str = "Stack (most recent call last):";

/// Where a log call came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallerFrame {
    class_name: String,
    file_name: String,
    function_name: String,
    module_name: String,
    path_name: String,
    line: u32,
}

impl Default for CallerFrame {
    fn default() -> Self {
        Self::unknown()
    }
}

impl CallerFrame {
    /// A frame with every field set to its "Unknown ..." placeholder.
    pub fn unknown() -> Self {
        CallerFrame {
            class_name: UNKNOWN_CLASS.to_string(),
            file_name: UNKNOWN_FILE.to_string(),
            function_name: UNKNOWN_FUNCTION.to_string(),
            module_name: UNKNOWN_MODULE.to_string(),
            path_name: UNKNOWN_PATH.to_string(),
            line: 0,
        }
    }

    /// The location of whoever called the (`#[track_caller]`) function this is used in.
    #[track_caller]
    pub fn here() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn from_location(location: &Location<'_>) -> Self {
        let path = location.file();
        let stem = file_stem(path);
        CallerFrame {
            class_name: UNKNOWN_CLASS.to_string(),
            file_name: stem.clone(),
            function_name: UNKNOWN_FUNCTION.to_string(),
            module_name: stem,
            path_name: path.to_string(),
            line: location.line(),
        }
    }

    /**
    Builds a frame from the pieces the [`caller_frame!`](crate::caller_frame) macro collects.

    `function_path` is the fully qualified path of the enclosing function as reported by
    [`std::any::type_name`], e.g. `my_crate::net::Conn::send`. The last segment becomes the
    function name; a preceding segment naming a type becomes the class name.
    */
    pub fn from_parts(path: &str, line: u32, module_path: &str, function_path: &str) -> Self {
        let (function, class) = split_function_path(function_path);
        CallerFrame {
            class_name: class.unwrap_or_else(|| UNKNOWN_CLASS.to_string()),
            file_name: file_stem(path),
            function_name: function.unwrap_or_else(|| UNKNOWN_FUNCTION.to_string()),
            module_name: if module_path.is_empty() {
                UNKNOWN_MODULE.to_string()
            } else {
                module_path.to_string()
            },
            path_name: path.to_string(),
            line,
        }
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_function_name(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = function_name.into();
        self
    }

    /// Rejects frames with empty fields.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("class name", &self.class_name),
            ("file name", &self.file_name),
            ("function name", &self.function_name),
            ("module name", &self.module_name),
            ("path name", &self.path_name),
        ];
        for (label, value) in fields {
            if value.is_empty() {
                return Err(LogError::invalid(
                    "caller frame",
                    format!("{label} must not be empty"),
                ));
            }
        }
        Ok(())
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn path_name(&self) -> &str {
        &self.path_name
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_FILE)
        .to_string()
}

#[doc(hidden)]
pub fn type_name_of<T>(_: T) -> &'static str {
    std::any::type_name::<T>()
}

/// Splits a path on `::`, ignoring separators nested inside `<...>`.
fn split_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let bytes = path.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(&path[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&path[start..]);
    segments
}

/// Name of the type in an `impl` segment: `Conn`, `<my::Conn as Trait>` or `Conn<T>`.
fn type_segment_name(segment: &str) -> Option<String> {
    let inner = match segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        Some(qualified) => qualified.split(" as ").next().unwrap_or(qualified),
        None => segment,
    };
    let without_generics = inner.split('<').next().unwrap_or(inner);
    let last = split_segments(without_generics).pop()?.trim();
    last.chars()
        .next()
        .filter(|c| c.is_uppercase())
        .map(|_| last.to_string())
}

fn split_function_path(function_path: &str) -> (Option<String>, Option<String>) {
    let mut segments: Vec<&str> = split_segments(function_path)
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    while segments.last() == Some(&"{{closure}}") {
        segments.pop();
    }
    let function = segments.pop().map(str::to_string);
    let class = segments.last().and_then(|s| type_segment_name(s));
    (function, class)
}

/// Frames that belong to this crate or to the backtrace machinery itself.
///
/// Test modules of this crate count as external callers.
pub fn is_internal_frame(symbol: &str) -> bool {
    let symbol = symbol.trim().trim_start_matches('<');
    if symbol.starts_with("std::backtrace") || symbol.starts_with("std::backtrace_rs") {
        return true;
    }
    symbol.starts_with("logtree::") && !symbol.contains("::tests::")
}

/// Renders the current call stack, most recent call last, without internal frames.
pub fn capture_stack() -> String {
    let rendered = Backtrace::force_capture().to_string();

    // `Backtrace` renders most recent first as "  N: symbol" followed by "at file:line" lines.
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in rendered.lines() {
        let trimmed = line.trim_start();
        let starts_frame = trimmed
            .split_once(": ")
            .is_some_and(|(index, _)| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()));
        match frames.last_mut() {
            Some(frame) if !starts_frame => frame.push(trimmed),
            _ => frames.push(vec![trimmed]),
        }
    }

    let mut out = String::from(STACK_HEADER);
    for frame in frames.iter().rev() {
        let symbol = frame[0]
            .split_once(": ")
            .map(|(_, symbol)| symbol)
            .unwrap_or(frame[0]);
        if is_internal_frame(symbol) {
            continue;
        }
        out.push_str("\n  ");
        out.push_str(symbol);
        for detail in &frame[1..] {
            out.push_str("\n    ");
            out.push_str(detail);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    impl Widget {
        fn frame(&self) -> CallerFrame {
            crate::caller_frame!()
        }
    }

    #[test]
    fn unknown_frame_placeholders() {
        let frame = CallerFrame::unknown();
        assert_eq!(frame.class_name(), "Unknown Class");
        assert_eq!(frame.file_name(), "Unknown File");
        assert_eq!(frame.function_name(), "Unknown Function");
        assert_eq!(frame.module_name(), "Unknown Module");
        assert_eq!(frame.path_name(), "Unknown Path");
        frame.validate().unwrap();
    }

    #[test]
    fn here_points_at_this_file() {
        let frame = CallerFrame::here();
        assert_eq!(frame.file_name(), "callsite");
        assert!(frame.path_name().ends_with("callsite.rs"));
        assert!(frame.line() > 0);
    }

    #[test]
    fn macro_captures_function_and_type() {
        let frame = Widget.frame();
        assert_eq!(frame.function_name(), "frame");
        assert_eq!(frame.class_name(), "Widget");
        assert_eq!(frame.module_name(), "logtree::callsite::tests");
        assert_eq!(frame.file_name(), "callsite");
    }

    #[test]
    fn macro_in_free_function_has_no_class() {
        let frame = crate::caller_frame!();
        assert_eq!(frame.function_name(), "macro_in_free_function_has_no_class");
        assert_eq!(frame.class_name(), "Unknown Class");
    }

    #[test]
    fn closures_resolve_to_enclosing_function() {
        let make = || crate::caller_frame!();
        assert_eq!(make().function_name(), "closures_resolve_to_enclosing_function");
    }

    #[test]
    fn function_path_splitting() {
        assert_eq!(
            split_function_path("app::net::Conn::send"),
            (Some("send".into()), Some("Conn".into()))
        );
        assert_eq!(
            split_function_path("<app::net::Conn as app::Sender>::send"),
            (Some("send".into()), Some("Conn".into()))
        );
        assert_eq!(
            split_function_path("app::net::connect::{{closure}}"),
            (Some("connect".into()), None)
        );
    }

    #[test]
    fn invalid_frames_are_rejected() {
        let frame = CallerFrame::unknown().with_function_name("");
        assert!(frame.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn internal_frame_detection() {
        assert!(is_internal_frame("logtree::logger::Logger::log_with"));
        assert!(is_internal_frame("<logtree::handler::Handler as core::fmt::Debug>::fmt"));
        assert!(is_internal_frame("std::backtrace::Backtrace::force_capture"));
        assert!(!is_internal_frame("logtree::callsite::tests::stack_has_header"));
        assert!(!is_internal_frame("my_app::main"));
    }

    #[test]
    fn stack_has_header() {
        let stack = capture_stack();
        assert!(stack.starts_with(STACK_HEADER));
        assert!(!stack.contains("logtree::callsite::capture_stack"));
    }
}
