// SPDX-License-Identifier: MIT OR Apache-2.0

/*!
Declarative setup of a logger tree.

A [`LoggingConfig`] is read from TOML, optionally overlaid with environment variables, and
then applied to a [`Manager`]:

```
use logtree::{LoggingConfig, Manager};

let config = LoggingConfig::from_toml_str(
    r#"
    level = "DEBUG"

    [[levels]]
    number = 15
    name = "CUSTOM"

    [[handlers]]
    kind = "stderr"
    level = "CUSTOM"
    "#,
)
.unwrap();

let manager = Manager::new();
let handlers = config.apply(&manager).unwrap();
assert_eq!(handlers.len(), 1);
assert_eq!(manager.root().level().number(), 10);
# logtree::global::shutdown().unwrap();
```

# Environment variables

| Variable | Values | Effect |
|----------|--------|--------|
| `LOGTREE_LEVEL` | level name or number | Root level |
| `LOGTREE_DISABLE` | level name or number | Global disable threshold |
| `NO_COLOR` | (set) | Never colorize |
| `LOGTREE_FORCE_COLOR` | (set) | Always colorize |
*/

use crate::color::{ColorMatcher, ColorSupport, KeywordStyle};
use crate::error::{LogError, Result};
use crate::formatter::{
    CSV_FORMAT, DATE_FORMAT, DEFAULT_FORMAT, Formatter, JsonFormatter, TemplateFormatter,
    json_format,
};
use crate::handler::{Handler, HandlerRegistry};
use crate::level::{Level, LevelKey, LevelRegistry};
use crate::manager::Manager;
use crate::sink::{DEFAULT_LOG_FILE, FileMode, SinkTarget, TextEncoding};
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A level given either by number or by registered name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LevelSpec {
    Number(u32),
    Name(String),
}

impl LevelSpec {
    /// Reads a number when the text is numeric, a name otherwise.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.parse::<u32>() {
            Ok(number) => LevelSpec::Number(number),
            Err(_) => LevelSpec::Name(text.to_string()),
        }
    }

    pub fn key(&self) -> LevelKey<'_> {
        match self {
            LevelSpec::Number(n) => LevelKey::Number(*n),
            LevelSpec::Name(name) => LevelKey::Name(name),
        }
    }

    fn resolve(&self, levels: &LevelRegistry) -> Result<Level> {
        match self {
            LevelSpec::Number(0) => Ok(Level::NOTSET),
            _ => levels.check_level(self.key()),
        }
    }
}

/// A custom level to register.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelConfig {
    pub number: u32,
    pub name: String,
}

/// A keyword mapping for the shared [`ColorMatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorConfig {
    pub name: String,
    pub patterns: Vec<String>,
    pub color: String,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub effect: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Stdout,
    Stderr,
    File,
}

/// How a handler renders records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerStyle {
    #[default]
    Text,
    Csv,
    /// Pretty-printed JSON. `format`, when given, is a JSON object of templates.
    Json,
    /// One compact JSON object per line.
    JsonLines,
}

fn default_true() -> bool {
    true
}

/// One `[[handlers]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerConfig {
    pub kind: HandlerKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: Option<LevelSpec>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub style: HandlerStyle,
    #[serde(default = "default_true")]
    pub colorize: bool,
}

impl HandlerConfig {
    /// The handler used when a configuration names none: a file handler on `default.log`.
    pub fn default_file() -> Self {
        HandlerConfig {
            kind: HandlerKind::File,
            name: None,
            level: None,
            path: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            mode: None,
            encoding: None,
            format: None,
            date_format: None,
            style: HandlerStyle::Text,
            colorize: true,
        }
    }

    fn target(&self) -> Result<SinkTarget> {
        Ok(match self.kind {
            HandlerKind::Stdout => SinkTarget::Stdout,
            HandlerKind::Stderr => SinkTarget::Stderr,
            HandlerKind::File => SinkTarget::File {
                path: self
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
                mode: match &self.mode {
                    Some(mode) => mode.parse::<FileMode>()?,
                    None => FileMode::default(),
                },
                encoding: match &self.encoding {
                    Some(encoding) => encoding.parse::<TextEncoding>()?,
                    None => TextEncoding::default(),
                },
            },
        })
    }

    fn formatter(&self) -> Result<Arc<dyn Formatter>> {
        let date_format = self.date_format.as_deref().unwrap_or(DATE_FORMAT);
        let format = self.format.as_deref();
        let formatter: Arc<dyn Formatter> = match self.style {
            HandlerStyle::Text => Arc::new(TemplateFormatter::new(
                format.unwrap_or(DEFAULT_FORMAT),
                date_format,
            )?),
            HandlerStyle::Csv => Arc::new(TemplateFormatter::csv(
                format.unwrap_or(CSV_FORMAT),
                date_format,
            )?),
            HandlerStyle::Json | HandlerStyle::JsonLines => {
                let template = match format {
                    Some(text) => serde_json::from_str::<Value>(text)?,
                    None => Value::Object(json_format()),
                };
                let json = JsonFormatter::new(&template, date_format)?;
                if self.style == HandlerStyle::JsonLines {
                    Arc::new(json.lines())
                } else {
                    Arc::new(json)
                }
            }
        };
        Ok(formatter)
    }

    fn build(
        &self,
        levels: &Arc<LevelRegistry>,
        matcher: &Arc<ColorMatcher>,
        registry: &Arc<HandlerRegistry>,
    ) -> Result<Arc<Handler>> {
        let mut builder = Handler::builder(self.target()?)
            .shared_formatter(self.formatter()?)
            .levels(levels.clone())
            .registry(registry.clone());
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Some(level) = &self.level {
            builder = builder.level(level.key());
        }
        if self.colorize {
            builder = builder.matcher(matcher.clone());
        }
        builder.build()
    }
}

/**
Logging setup read from TOML and the environment.

Every field is optional. See the [module documentation](self) for the format.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Root logger level.
    pub level: Option<LevelSpec>,
    /// Global disable threshold.
    pub disable: Option<LevelSpec>,
    /// Registry default level.
    pub default_level: Option<LevelSpec>,
    pub color: ColorSupport,
    pub levels: Vec<LevelConfig>,
    pub colors: Vec<ColorConfig>,
    pub handlers: Vec<HandlerConfig>,
}

impl LoggingConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The default configuration with the environment applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overlays the environment variables listed in the [module documentation](self).
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_vars(|name| env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(level) = var("LOGTREE_LEVEL") {
            self.level = Some(LevelSpec::parse(&level));
        }
        if let Some(level) = var("LOGTREE_DISABLE") {
            self.disable = Some(LevelSpec::parse(&level));
        }
        if var("NO_COLOR").is_some() {
            self.color = ColorSupport::Never;
        }
        if var("LOGTREE_FORCE_COLOR").is_some() {
            self.color = ColorSupport::Always;
        }
        self
    }

    /// The handlers [`apply`](Self::apply) builds: the configured ones, or the default file handler.
    pub fn effective_handlers(&self) -> Vec<HandlerConfig> {
        if self.handlers.is_empty() {
            vec![HandlerConfig::default_file()]
        } else {
            self.handlers.clone()
        }
    }

    /// The shared colorizer described by `[[colors]]`.
    pub fn color_matcher(&self) -> Result<ColorMatcher> {
        let matcher = ColorMatcher::with_support(self.color);
        for color in &self.colors {
            let style = KeywordStyle::parse(
                &color.color,
                color.background.as_deref(),
                color.effect.as_deref(),
            )?;
            matcher.add_mapping(&color.name, &color.patterns, style)?;
        }
        Ok(matcher)
    }

    /**
    Applies the configuration to `manager`, registering handlers in the process-wide
    [`HandlerRegistry`].

    Levels are registered first so that every other setting may refer to them by name.
    The built handlers are attached to the root logger and returned.
    */
    pub fn apply(&self, manager: &Arc<Manager>) -> Result<Vec<Arc<Handler>>> {
        self.apply_with_registry(manager, &HandlerRegistry::global())
    }

    /// [`apply`](Self::apply) with handlers registered in `registry`.
    pub fn apply_with_registry(
        &self,
        manager: &Arc<Manager>,
        registry: &Arc<HandlerRegistry>,
    ) -> Result<Vec<Arc<Handler>>> {
        let levels = manager.levels();
        for level in &self.levels {
            levels.set_level(level.number, &level.name)?;
        }
        if let Some(default) = &self.default_level {
            levels.set_default_level(default.key())?;
        }
        let root_level = self
            .level
            .as_ref()
            .map(|spec| spec.resolve(levels))
            .transpose()?;
        if root_level.is_some_and(Level::is_notset) {
            return Err(LogError::invalid(
                "root level",
                "the root logger must have an explicit level",
            ));
        }
        let disable = self
            .disable
            .as_ref()
            .map(|spec| spec.resolve(levels))
            .transpose()?;
        let matcher = Arc::new(self.color_matcher()?);

        let mut handlers = Vec::new();
        for config in self.effective_handlers() {
            match config.build(levels, &matcher, registry) {
                Ok(handler) => handlers.push(handler),
                Err(err) => {
                    for handler in &handlers {
                        // The build error is the one worth reporting.
                        let _ = handler.close();
                    }
                    return Err(err);
                }
            }
        }

        let root = manager.root();
        if let Some(level) = root_level {
            root.set_level(level)?;
        }
        if let Some(level) = disable {
            manager.set_disable(level);
        }
        for handler in &handlers {
            root.add_handler(handler.clone());
        }
        Ok(handlers)
    }
}
