//! Configuration sources.
//!
//! Each source produces flat `(key, value)` pairs with `:`-separated key
//! paths. Sources never interpret values; typing happens at bind time.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use figment::providers::Env;
use serde::Deserialize;
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};

use crate::error::ConfigError;
use crate::snapshot::join_key;

/// A single configuration layer.
pub trait ConfigSource: Send + Sync {
    /// Human-readable description for diagnostics.
    fn describe(&self) -> String;

    /// Produces the layer's key/value pairs.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the layer cannot be read or parsed.
    fn load(&self) -> Result<Vec<(String, String)>, ConfigError>;
}

/// Fixed in-memory pairs.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pairs: Vec<(String, String)>,
}

impl MemorySource {
    #[must_use]
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl ConfigSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} keys)", self.pairs.len())
    }

    fn load(&self) -> Result<Vec<(String, String)>, ConfigError> {
        Ok(self.pairs.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// A YAML or JSON settings file, flattened into key paths.
///
/// Nested maps join with `:`, sequences turn into `:0`, `:1`, ... suffixes
/// and explicit nulls are skipped. Scalars keep their source text, so
/// `1.10` stays `1.10` and `30.0` is never read back as `30`.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    /// A file that must exist.
    #[must_use]
    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }

    /// A file that is skipped when absent.
    #[must_use]
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    fn parse_error(&self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> ConfigError {
        ConfigError::Parse {
            path: self.path.clone(),
            source: source.into(),
        }
    }

    fn load_yaml(&self, text: &str) -> Result<Vec<(String, String)>, ConfigError> {
        // First pass learns the document layout, second pass reads every
        // scalar as a string so nothing is retyped on the way through.
        let document: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| self.parse_error(e))?;
        let shape = Shape::of(&document);
        match &shape {
            Shape::Null => return Ok(Vec::new()),
            Shape::Map(_) => {}
            Shape::Scalar | Shape::Seq(_) => {
                return Err(self.parse_error("top-level value must be a mapping"));
            }
        }

        let mut pairs = Vec::new();
        RawNode {
            path: String::new(),
            shape: &shape,
            out: &mut pairs,
        }
        .deserialize(serde_yaml::Deserializer::from_str(text))
        .map_err(|e| self.parse_error(e))?;
        Ok(pairs)
    }

    fn load_json(&self, text: &str) -> Result<Vec<(String, String)>, ConfigError> {
        let document: serde_json::Value =
            serde_json::from_str(text).map_err(|e| self.parse_error(e))?;
        if !document.is_object() {
            return Err(self.parse_error("top-level value must be an object"));
        }

        let mut pairs = Vec::new();
        flatten_json("", &document, &mut pairs);
        Ok(pairs)
    }
}

impl ConfigSource for FileSource {
    fn describe(&self) -> String {
        let kind = if self.required { "required" } else { "optional" };
        format!("file {} ({kind})", self.path.display())
    }

    fn load(&self) -> Result<Vec<(String, String)>, ConfigError> {
        if !self.path.is_file() {
            if self.required {
                return Err(ConfigError::MissingFile {
                    path: self.path.clone(),
                });
            }
            tracing::debug!(path = %self.path.display(), "Optional configuration file not found, skipping");
            return Ok(Vec::new());
        }

        let format = FileFormat::from_path(&self.path)?;
        let text = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match format {
            FileFormat::Yaml => self.load_yaml(&text),
            FileFormat::Json => self.load_json(&text),
        }
    }
}

/// JSON numbers are stored with their original digits.
fn flatten_json(path: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                flatten_json(&join_key(path, key), child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_json(&join_key(path, &index.to_string()), child, out);
            }
        }
        serde_json::Value::String(text) => out.push((path.to_owned(), text.clone())),
        serde_json::Value::Number(num) => out.push((path.to_owned(), num.to_string())),
        serde_json::Value::Bool(b) => out.push((path.to_owned(), b.to_string())),
        serde_json::Value::Null => {}
    }
}

/// Layout of a YAML node. Mapping children are kept in document order.
#[derive(Debug)]
enum Shape {
    Null,
    Scalar,
    Seq(Vec<Shape>),
    Map(Vec<Shape>),
}

impl Shape {
    fn of(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Sequence(items) => Self::Seq(items.iter().map(Self::of).collect()),
            serde_yaml::Value::Mapping(map) => Self::Map(map.values().map(Self::of).collect()),
            serde_yaml::Value::Tagged(tagged) => Self::of(&tagged.value),
            serde_yaml::Value::Bool(_)
            | serde_yaml::Value::Number(_)
            | serde_yaml::Value::String(_) => Self::Scalar,
        }
    }
}

/// Walks one YAML node, pushing scalars under `path` as raw text.
struct RawNode<'a> {
    path: String,
    shape: &'a Shape,
    out: &'a mut Vec<(String, String)>,
}

impl<'de> DeserializeSeed<'de> for RawNode<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        let shape = self.shape;
        match shape {
            Shape::Null => {
                IgnoredAny::deserialize(deserializer)?;
            }
            Shape::Scalar => {
                let text = String::deserialize(deserializer)?;
                self.out.push((self.path, text));
            }
            Shape::Seq(_) => deserializer.deserialize_seq(self)?,
            Shape::Map(_) => deserializer.deserialize_map(self)?,
        }
        Ok(())
    }
}

impl<'de> Visitor<'de> for RawNode<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration sequence or mapping")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let Self { path, shape, out } = self;
        let Shape::Seq(items) = shape else {
            return Err(de::Error::custom("document changed between passes"));
        };
        for (index, child) in items.iter().enumerate() {
            let node = RawNode {
                path: join_key(&path, &index.to_string()),
                shape: child,
                out: &mut *out,
            };
            if seq.next_element_seed(node)?.is_none() {
                break;
            }
        }
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(())
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let Self { path, shape, out } = self;
        let Shape::Map(entries) = shape else {
            return Err(de::Error::custom("document changed between passes"));
        };
        let mut children = entries.iter();
        while let Some(key) = map.next_key::<String>()? {
            match children.next() {
                Some(child) => map.next_value_seed(RawNode {
                    path: join_key(&path, &key),
                    shape: child,
                    out: &mut *out,
                })?,
                None => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(())
    }
}

/// Process environment variables.
///
/// `__` in a variable name stands for the `:` separator, so
/// `SyncOptions__SeasonIds__0=7` sets `SyncOptions:SeasonIds:0`. With a
/// prefix, only variables starting with it are read and the prefix is
/// stripped. Values are used verbatim.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    prefix: Option<String>,
}

impl EnvSource {
    /// Reads every environment variable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads only variables starting with `prefix`.
    #[must_use]
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl ConfigSource for EnvSource {
    fn describe(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("environment (prefix {prefix})"),
            None => "environment".to_owned(),
        }
    }

    fn load(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let env = match &self.prefix {
            Some(prefix) => Env::prefixed(prefix),
            None => Env::raw(),
        };
        Ok(env
            .iter()
            .map(|(key, value)| (key.as_str().replace("__", ":"), value))
            .collect())
    }
}

/// Command-line arguments.
///
/// Accepted forms: `--Key=Value`, `--Key Value`, `/Key=Value`, `/Key Value`
/// and `Key=Value`. Keys use `:` (or `__`) as the path separator.
#[derive(Debug, Clone, Default)]
pub struct CommandLineSource {
    args: Vec<String>,
}

impl CommandLineSource {
    #[must_use]
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses the stored arguments into key/value pairs.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidArgument`] for a switch without a value,
    /// an empty key or a bare token that is not `Key=Value`.
    pub fn parse(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let mut pairs = Vec::new();
        let mut args = self.args.iter();

        while let Some(arg) = args.next() {
            let (body, is_switch) = if let Some(rest) = arg.strip_prefix("--") {
                (rest, true)
            } else if let Some(rest) = arg.strip_prefix('/') {
                (rest, true)
            } else {
                (arg.as_str(), false)
            };

            let (key, value) = if let Some((key, value)) = body.split_once('=') {
                (key, value.to_owned())
            } else if is_switch {
                let value = args.next().ok_or_else(|| ConfigError::InvalidArgument {
                    argument: arg.clone(),
                    reason: "switch has no value",
                })?;
                (body, value.clone())
            } else {
                return Err(ConfigError::InvalidArgument {
                    argument: arg.clone(),
                    reason: "expected Key=Value",
                });
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::InvalidArgument {
                    argument: arg.clone(),
                    reason: "key is empty",
                });
            }
            pairs.push((key.replace("__", ":"), value));
        }

        Ok(pairs)
    }
}

impl ConfigSource for CommandLineSource {
    fn describe(&self) -> String {
        format!("command line ({} args)", self.args.len())
    }

    fn load(&self) -> Result<Vec<(String, String)>, ConfigError> {
        self.parse()
    }
}
