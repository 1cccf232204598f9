// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output targets for handlers.
//!
//! [`Sink`] is the capability interface `{emit, flush, close}`. The provided
//! implementations cover the closed set of targets a handler can be built with
//! ([`SinkTarget`]): standard output, standard error, a file, and an in-memory buffer.
//! Custom sinks implement [`Sink`] directly; any capability they leave out reports
//! [`LogError::Unimplemented`].

use crate::error::{LogError, Result};
use parking_lot::Mutex;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// File name used when a file handler is built without a path.
pub const DEFAULT_LOG_FILE: &str = "default.log";

/**
One rendered record, ready to be written.

`plain` is the formatter output. `colored` is the same text after keyword colorization
(identical when no matcher is attached). Terminals get `colored`; files always get `plain`.
*/
#[derive(Debug, Clone, Copy)]
pub struct Rendered<'a> {
    pub plain: &'a str,
    pub colored: &'a str,
    pub suppress_console_echo: bool,
}

/**
The capability set of an output target.
*/
pub trait Sink: std::fmt::Debug + Send {
    /// Writes one rendered record.
    fn emit(&mut self, _line: &Rendered<'_>) -> Result<()> {
        Err(LogError::Unimplemented("emit"))
    }

    fn flush(&mut self) -> Result<()> {
        Err(LogError::Unimplemented("flush"))
    }

    /// Releases the target. Closing twice is not an error.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether the colored text lands on a terminal. [`ColorSupport::Auto`](crate::ColorSupport::Auto) colors only then.
    fn is_terminal(&self) -> bool {
        false
    }
}

/// Which standard stream a [`ConsoleSink`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// Writes colorized lines to a standard stream, or nothing when console echo is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleSink {
    stream: ConsoleStream,
}

impl ConsoleSink {
    pub const fn new(stream: ConsoleStream) -> Self {
        ConsoleSink { stream }
    }

    pub fn stream(&self) -> ConsoleStream {
        self.stream
    }
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<()> {
    // One write per record so concurrent emits do not interleave inside a line.
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    out.write_all(buf.as_bytes())
}

impl Sink for ConsoleSink {
    fn emit(&mut self, line: &Rendered<'_>) -> Result<()> {
        if line.suppress_console_echo {
            return Ok(());
        }
        match self.stream {
            ConsoleStream::Stdout => write_line(&mut io::stdout().lock(), line.colored)?,
            ConsoleStream::Stderr => write_line(&mut io::stderr().lock(), line.colored)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.stream {
            ConsoleStream::Stdout => io::stdout().flush()?,
            ConsoleStream::Stderr => io::stderr().flush()?,
        }
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        match self.stream {
            ConsoleStream::Stdout => io::stdout().is_terminal(),
            ConsoleStream::Stderr => io::stderr().is_terminal(),
        }
    }
}

/**
How a file sink opens its file.

Parsed from the usual mode symbol (`"a"`, `"w+"`, ...) or from its name (`"APPEND"`).
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileMode {
    Read,
    Write,
    #[default]
    Append,
    ExclusiveCreate,
    ReadPlus,
    WritePlus,
    AppendPlus,
    ExclusiveCreatePlus,
}

impl FileMode {
    pub const ALL: [FileMode; 8] = [
        FileMode::Read,
        FileMode::Write,
        FileMode::Append,
        FileMode::ExclusiveCreate,
        FileMode::ReadPlus,
        FileMode::WritePlus,
        FileMode::AppendPlus,
        FileMode::ExclusiveCreatePlus,
    ];

    pub const fn symbol(self) -> &'static str {
        match self {
            FileMode::Read => "r",
            FileMode::Write => "w",
            FileMode::Append => "a",
            FileMode::ExclusiveCreate => "x",
            FileMode::ReadPlus => "r+",
            FileMode::WritePlus => "w+",
            FileMode::AppendPlus => "a+",
            FileMode::ExclusiveCreatePlus => "x+",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FileMode::Read => "READ",
            FileMode::Write => "WRITE",
            FileMode::Append => "APPEND",
            FileMode::ExclusiveCreate => "EXCLUSIVE_CREATE",
            FileMode::ReadPlus => "READ_PLUS",
            FileMode::WritePlus => "WRITE_PLUS",
            FileMode::AppendPlus => "APPEND_PLUS",
            FileMode::ExclusiveCreatePlus => "EXCLUSIVE_CREATE_PLUS",
        }
    }

    pub const fn is_writable(self) -> bool {
        !matches!(self, FileMode::Read)
    }

    fn open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            FileMode::Read => options.read(true),
            FileMode::Write => options.write(true).create(true).truncate(true),
            FileMode::Append => options.append(true).create(true),
            FileMode::ExclusiveCreate => options.write(true).create_new(true),
            FileMode::ReadPlus => options.read(true).write(true),
            FileMode::WritePlus => options.read(true).write(true).create(true).truncate(true),
            FileMode::AppendPlus => options.read(true).append(true).create(true),
            FileMode::ExclusiveCreatePlus => options.read(true).write(true).create_new(true),
        };
        options
    }
}

impl FromStr for FileMode {
    type Err = LogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FileMode::ALL
            .into_iter()
            .find(|mode| mode.symbol() == s || mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LogError::unknown("file mode", s))
    }
}

impl Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Character encoding of file output. Characters the encoding cannot represent become `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl TextEncoding {
    pub const fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Ascii => "ASCII",
            TextEncoding::Latin1 => "LATIN-1",
        }
    }

    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = LogError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('_', "-");
        match normalized.as_str() {
            "UTF-8" | "UTF8" => Ok(TextEncoding::Utf8),
            "ASCII" | "US-ASCII" => Ok(TextEncoding::Ascii),
            "LATIN-1" | "LATIN1" | "ISO-8859-1" => Ok(TextEncoding::Latin1),
            _ => Err(LogError::unknown("text encoding", s)),
        }
    }
}

impl Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/**
Writes plain lines to a file and, unless suppressed, echoes the colorized line to
standard output.

The file is opened when the sink is built, so a bad path or permission fails early.
*/
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    mode: FileMode,
    encoding: TextEncoding,
    file: Option<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>, mode: FileMode, encoding: TextEncoding) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = mode.open_options().open(&path)?;
        Ok(FileSink {
            path,
            mode,
            encoding,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other(format!("{} is closed", self.path.display())).into())
    }
}

impl Sink for FileSink {
    fn emit(&mut self, line: &Rendered<'_>) -> Result<()> {
        let mut bytes = self.encoding.encode(line.plain);
        bytes.push(b'\n');
        self.file()?.write_all(&bytes)?;
        if !line.suppress_console_echo {
            write_line(&mut io::stdout().lock(), line.colored)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            if self.mode.is_writable() {
                file.flush()?;
            }
        }
        Ok(())
    }

    // Only the stdout echo is colored.
    fn is_terminal(&self) -> bool {
        io::stdout().is_terminal()
    }
}

/**
Shared buffer behind a [`MemorySink`].

Clone it before building the handler and read captured lines from the clone.
*/
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every captured line.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// Captured lines joined by newlines. The buffer is left intact.
    pub fn contents(&self) -> String {
        self.lines.lock().join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

/// Captures colorized lines in memory. Never echoes and ignores echo suppression.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: MemoryBuffer,
}

impl MemorySink {
    pub fn new(buffer: MemoryBuffer) -> Self {
        MemorySink { buffer }
    }

    pub fn buffer(&self) -> &MemoryBuffer {
        &self.buffer
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, line: &Rendered<'_>) -> Result<()> {
        self.buffer.lines.lock().push(line.colored.to_string());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/**
The closed set of targets a handler can be built with.
*/
#[derive(Debug, Clone)]
pub enum SinkTarget {
    Stdout,
    Stderr,
    File {
        path: PathBuf,
        mode: FileMode,
        encoding: TextEncoding,
    },
    Memory(MemoryBuffer),
}

impl SinkTarget {
    /// An appending UTF-8 file target.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SinkTarget::File {
            path: path.into(),
            mode: FileMode::default(),
            encoding: TextEncoding::default(),
        }
    }

    pub fn open(self) -> Result<Box<dyn Sink>> {
        Ok(match self {
            SinkTarget::Stdout => Box::new(ConsoleSink::new(ConsoleStream::Stdout)),
            SinkTarget::Stderr => Box::new(ConsoleSink::new(ConsoleStream::Stderr)),
            SinkTarget::File {
                path,
                mode,
                encoding,
            } => Box::new(FileSink::open(path, mode, encoding)?),
            SinkTarget::Memory(buffer) => Box::new(MemorySink::new(buffer)),
        })
    }

    /// Short name used in handler display text.
    pub fn kind(&self) -> &'static str {
        match self {
            SinkTarget::Stdout => "stdout",
            SinkTarget::Stderr => "stderr",
            SinkTarget::File { .. } => "file",
            SinkTarget::Memory(_) => "memory",
        }
    }
}
