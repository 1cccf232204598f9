// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering a [`Record`] to text.
//!
//! Templates use `%(name)s` / `%(name)d` placeholders. The recognized names are:
//!
//! `time`, `message`, `logger_name`, `level_name`, `level_number`, `file_name`,
//! `class_name`, `function_name`, `module_name`, `path_name`, `line_number`, `exec_info`,
//! `stack_info`, `thread`, `thread_name`, `process_id`.
//!
//! `%%` is a literal percent sign. Templates and date formats are validated when the
//! formatter is built, so formatting a record can only fail on serialization.

use crate::error::{LogError, Result};
use crate::record::Record;
use chrono::format::{Item, StrftimeItems};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// `%(time)s :: %(level_name)s :: %(message)s`
pub const DEFAULT_FORMAT: &str = "%(time)s :: %(level_name)s :: %(message)s";
/// `%(time)s,%(level_name)s,%(message)s`
pub const CSV_FORMAT: &str = "%(time)s,%(level_name)s,%(message)s";
/// `%Y-%m-%d %H:%M:%S`
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The default JSON template: `time`, `levelName` and `message`.
pub fn json_format() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("time".into(), Value::String("%(time)s".into()));
    map.insert("levelName".into(), Value::String("%(level_name)s".into()));
    map.insert("message".into(), Value::String("%(message)s".into()));
    map
}

/**
Turns records into the text a handler writes.
*/
pub trait Formatter: Debug + Send + Sync {
    fn format(&self, record: &Record) -> Result<String>;

    /// The strftime pattern used for `%(time)s`.
    fn date_format(&self) -> &str;
}

fn check_date_format(date_format: &str) -> Result<()> {
    if StrftimeItems::new(date_format).any(|item| matches!(item, Item::Error)) {
        return Err(LogError::invalid(
            "date format",
            format!("'{date_format}' is not a valid strftime pattern"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Time,
    Message,
    LoggerName,
    LevelName,
    LevelNumber,
    FileName,
    ClassName,
    FunctionName,
    ModuleName,
    PathName,
    LineNumber,
    ExecInfo,
    StackInfo,
    Thread,
    ThreadName,
    ProcessId,
}

impl Field {
    fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "time" => Field::Time,
            "message" => Field::Message,
            "logger_name" => Field::LoggerName,
            "level_name" => Field::LevelName,
            "level_number" => Field::LevelNumber,
            "file_name" => Field::FileName,
            "class_name" => Field::ClassName,
            "function_name" => Field::FunctionName,
            "module_name" => Field::ModuleName,
            "path_name" => Field::PathName,
            "line_number" => Field::LineNumber,
            "exec_info" => Field::ExecInfo,
            "stack_info" => Field::StackInfo,
            "thread" => Field::Thread,
            "thread_name" => Field::ThreadName,
            "process_id" => Field::ProcessId,
            other => return Err(LogError::unknown("format placeholder", other)),
        })
    }

    fn render(self, record: &Record, date_format: &str) -> String {
        let caller = record.caller();
        match self {
            Field::Time => record.time().format(date_format).to_string(),
            Field::Message => record.message().to_string(),
            Field::LoggerName => record.logger_name().to_string(),
            Field::LevelName => record.level_name().to_string(),
            Field::LevelNumber => record.level_number().to_string(),
            Field::FileName => caller.file_name().to_string(),
            Field::ClassName => caller.class_name().to_string(),
            Field::FunctionName => caller.function_name().to_string(),
            Field::ModuleName => caller.module_name().to_string(),
            Field::PathName => caller.path_name().to_string(),
            Field::LineNumber => caller.line().to_string(),
            Field::ExecInfo => record
                .exception()
                .map(|e| e.to_string())
                .unwrap_or_default(),
            Field::StackInfo => record.stack_info().unwrap_or_default().to_string(),
            Field::Thread => record.thread().to_string(),
            Field::ThreadName => record.thread_name().to_string(),
            Field::ProcessId => record.process_id().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;
    while let Some(pos) = rest.find('%') {
        literal.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('%') {
            literal.push('%');
            rest = tail;
            continue;
        }
        let Some(body) = after.strip_prefix('(') else {
            return Err(LogError::invalid(
                "format template",
                format!("stray '%' in '{template}'"),
            ));
        };
        let Some(close) = body.find(')') else {
            return Err(LogError::invalid(
                "format template",
                format!("unterminated placeholder in '{template}'"),
            ));
        };
        let field = Field::from_name(&body[..close])?;
        let mut conversion = body[close + 1..].chars();
        match conversion.next() {
            Some('s' | 'd') => {}
            _ => {
                return Err(LogError::invalid(
                    "format template",
                    format!("placeholder '{}' needs an 's' or 'd' conversion", &body[..close]),
                ));
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Field(field));
        rest = conversion.as_str();
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn csv_quote(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/**
Placeholder substitution into a flat string.

[`TemplateFormatter::csv`] builds the comma-separated variant, which requires the template
to be placeholders joined by single commas and quotes any field that needs it.
*/
#[derive(Debug, Clone)]
pub struct TemplateFormatter {
    template: String,
    date_format: String,
    segments: Vec<Segment>,
    csv: bool,
}

impl Default for TemplateFormatter {
    fn default() -> Self {
        TemplateFormatter {
            template: DEFAULT_FORMAT.to_string(),
            date_format: DATE_FORMAT.to_string(),
            segments: vec![
                Segment::Field(Field::Time),
                Segment::Literal(" :: ".into()),
                Segment::Field(Field::LevelName),
                Segment::Literal(" :: ".into()),
                Segment::Field(Field::Message),
            ],
            csv: false,
        }
    }
}

impl TemplateFormatter {
    pub fn new(template: &str, date_format: &str) -> Result<Self> {
        check_date_format(date_format)?;
        Ok(TemplateFormatter {
            template: template.to_string(),
            date_format: date_format.to_string(),
            segments: parse_template(template)?,
            csv: false,
        })
    }

    pub fn csv(template: &str, date_format: &str) -> Result<Self> {
        let mut formatter = Self::new(template, date_format)?;
        let well_formed = formatter.segments.iter().enumerate().all(|(i, segment)| {
            match segment {
                Segment::Field(_) => i % 2 == 0,
                Segment::Literal(sep) => i % 2 == 1 && sep == ",",
            }
        }) && matches!(formatter.segments.last(), Some(Segment::Field(_)));
        if !well_formed {
            return Err(LogError::invalid(
                "csv template",
                format!("'{template}' is not comma-separated placeholders"),
            ));
        }
        formatter.csv = true;
        Ok(formatter)
    }

    /// The comma-separated default, `CSV_FORMAT` with `DATE_FORMAT`.
    pub fn default_csv() -> Self {
        TemplateFormatter {
            template: CSV_FORMAT.to_string(),
            date_format: DATE_FORMAT.to_string(),
            segments: vec![
                Segment::Field(Field::Time),
                Segment::Literal(",".into()),
                Segment::Field(Field::LevelName),
                Segment::Literal(",".into()),
                Segment::Field(Field::Message),
            ],
            csv: true,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn is_csv(&self) -> bool {
        self.csv
    }
}

impl Formatter for TemplateFormatter {
    fn format(&self, record: &Record) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => {
                    let value = field.render(record, &self.date_format);
                    if self.csv {
                        out.push_str(&csv_quote(&value));
                    } else {
                        out.push_str(&value);
                    }
                }
            }
        }
        Ok(out)
    }

    fn date_format(&self) -> &str {
        &self.date_format
    }
}

/**
Renders a JSON object whose values are templates.

The default renders pretty-printed with four-space indentation; [`JsonFormatter::lines`]
renders one compact object per line.
*/
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    template: Map<String, Value>,
    fields: Vec<(String, Vec<Segment>)>,
    date_format: String,
    pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        let template = json_format();
        let fields = vec![
            ("time".to_string(), vec![Segment::Field(Field::Time)]),
            ("levelName".to_string(), vec![Segment::Field(Field::LevelName)]),
            ("message".to_string(), vec![Segment::Field(Field::Message)]),
        ];
        JsonFormatter {
            template,
            fields,
            date_format: DATE_FORMAT.to_string(),
            pretty: true,
        }
    }
}

impl JsonFormatter {
    /// `template` must be an object of string templates.
    pub fn new(template: &Value, date_format: &str) -> Result<Self> {
        check_date_format(date_format)?;
        let Value::Object(map) = template else {
            return Err(LogError::invalid("json template", "must be an object"));
        };
        let fields = map
            .iter()
            .map(|(key, value)| match value {
                Value::String(t) => Ok((key.clone(), parse_template(t)?)),
                _ => Err(LogError::invalid(
                    "json template",
                    format!("value of '{key}' must be a string"),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(JsonFormatter {
            template: map.clone(),
            fields,
            date_format: date_format.to_string(),
            pretty: true,
        })
    }

    /// Switches to compact single-line output.
    pub fn lines(mut self) -> Self {
        self.pretty = false;
        self
    }

    pub fn template(&self) -> &Map<String, Value> {
        &self.template
    }

    /// The rendered object before serialization.
    pub fn format_map(&self, record: &Record) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, segments)| {
                let mut value = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(text) => value.push_str(text),
                        Segment::Field(field) => {
                            value.push_str(&field.render(record, &self.date_format))
                        }
                    }
                }
                (key.clone(), Value::String(value))
            })
            .collect()
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record) -> Result<String> {
        let value = Value::Object(self.format_map(record));
        if !self.pretty {
            return Ok(serde_json::to_string(&value)?);
        }
        let mut out = Vec::new();
        let pretty = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, pretty);
        serde::Serialize::serialize(&value, &mut serializer)?;
        String::from_utf8(out).map_err(|e| LogError::invalid("json output", e.to_string()))
    }

    fn date_format(&self) -> &str {
        &self.date_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsite::CallerFrame;
    use crate::level::{Level, LevelRegistry};
    use crate::record::ExceptionInfo;

    fn record() -> Record {
        Record::new(
            &LevelRegistry::new(),
            "TestLogger",
            Level::WARNING,
            "Test message",
            CallerFrame::here(),
        )
        .unwrap()
    }

    fn time_of(record: &Record) -> String {
        record.time().format(DATE_FORMAT).to_string()
    }

    #[test]
    fn default_template() {
        let record = record();
        let out = TemplateFormatter::default().format(&record).unwrap();
        assert_eq!(out, format!("{} :: WARNING :: Test message", time_of(&record)));
    }

    #[test]
    fn every_placeholder_resolves() {
        let record = record()
            .with_exception(ExceptionInfo::new("ValueError", "Test error"))
            .unwrap();
        let f = TemplateFormatter::new(
            "%(logger_name)s|%(level_number)d|%(file_name)s|%(exec_info)s|%(process_id)d|100%%",
            DATE_FORMAT,
        )
        .unwrap();
        assert_eq!(
            f.format(&record).unwrap(),
            format!(
                "TestLogger|30|formatter|ValueError: Test error|{}|100%",
                std::process::id()
            )
        );
    }

    #[test]
    fn bad_templates_are_rejected() {
        assert!(
            TemplateFormatter::new("%(nope)s", DATE_FORMAT)
                .unwrap_err()
                .is_unknown_identifier()
        );
        assert!(
            TemplateFormatter::new("%(message)", DATE_FORMAT)
                .unwrap_err()
                .is_invalid_argument()
        );
        assert!(
            TemplateFormatter::new("50% off", DATE_FORMAT)
                .unwrap_err()
                .is_invalid_argument()
        );
        assert!(
            TemplateFormatter::new(DEFAULT_FORMAT, "%Q")
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn csv_output() {
        let record = record();
        let out = TemplateFormatter::default_csv().format(&record).unwrap();
        assert_eq!(out, format!("{},WARNING,Test message", time_of(&record)));

        let f = TemplateFormatter::csv("%(level_name)s,%(message)s,%(exec_info)s", DATE_FORMAT)
            .unwrap();
        assert_eq!(f.format(&record).unwrap(), "WARNING,Test message,");

        let quoted = Record::new(
            &LevelRegistry::new(),
            "x",
            Level::INFO,
            "a, \"b\"",
            CallerFrame::unknown(),
        )
        .unwrap();
        let f = TemplateFormatter::csv("%(level_name)s,%(message)s", DATE_FORMAT).unwrap();
        assert_eq!(f.format(&quoted).unwrap(), "INFO,\"a, \"\"b\"\"\"");
    }

    #[test]
    fn csv_requires_comma_separated_placeholders() {
        assert!(
            TemplateFormatter::csv(DEFAULT_FORMAT, DATE_FORMAT)
                .unwrap_err()
                .is_invalid_argument()
        );
        assert!(
            TemplateFormatter::csv("%(message)s,", DATE_FORMAT)
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn json_pretty_output() {
        let record = record();
        let out = JsonFormatter::default().format(&record).unwrap();
        let expected = format!(
            "{{\n    \"time\": \"{}\",\n    \"levelName\": \"WARNING\",\n    \"message\": \"Test message\"\n}}",
            time_of(&record)
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn json_custom_template_and_lines() {
        let record = record();
        let template = serde_json::json!({
            "levelName": "%(level_name)s",
            "execInfo": "%(exec_info)s",
        });
        let f = JsonFormatter::new(&template, DATE_FORMAT).unwrap().lines();
        assert_eq!(
            f.format(&record).unwrap(),
            r#"{"levelName":"WARNING","execInfo":""}"#
        );
    }

    #[test]
    fn json_template_must_be_object_of_strings() {
        let err = JsonFormatter::new(&Value::String(DEFAULT_FORMAT.into()), DATE_FORMAT)
            .unwrap_err();
        assert!(err.is_invalid_argument());
        let err = JsonFormatter::new(&serde_json::json!({"n": 1}), DATE_FORMAT).unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
