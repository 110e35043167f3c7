use std::path::{Path, PathBuf};

use serde_json::{Map, Number, Value};
use serde_yaml_ng::Value as YamlValue;

use crate::error::{Result, StoryworldError};

/// Top-level keys of a character record, in file order.
pub type Fields = Map<String, Value>;

/// A schemaless character description, read fresh from disk on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    /// Stable identifier: the `code` key if present, otherwise the file stem.
    pub code: String,
    pub path: PathBuf,
    pub fields: Fields,
}

impl CharacterRecord {
    /// Build a record from raw YAML text.
    ///
    /// An empty document yields no fields; a document that is not a mapping is
    /// kept under a single `text` key.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let doc: YamlValue = serde_yaml_ng::from_str(text).map_err(|source| StoryworldError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let fields = match coerce(doc) {
            Value::Object(map) => map,
            Value::Null => Fields::new(),
            Value::String(s) => single("text", Value::String(s)),
            other => single("text", Value::String(other.to_string())),
        };

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let code = match fields.get("code") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => stem,
        };

        Ok(Self {
            code,
            path: path.to_path_buf(),
            fields,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The `profile_image` reference, when it is a string.
    pub fn profile_image(&self) -> Option<&str> {
        self.fields.get("profile_image").and_then(Value::as_str)
    }
}

fn single(key: &str, value: Value) -> Fields {
    let mut map = Fields::new();
    map.insert(key.to_string(), value);
    map
}

/// Locate the description file for `code`: `<code>.yaml` first, then the first
/// `<code>*.yaml` in name order.
pub fn find_description(root: &Path, code: &str) -> Option<PathBuf> {
    if !is_plain_code(code) {
        return None;
    }

    let exact = root.join(format!("{code}.yaml"));
    if exact.is_file() {
        return Some(exact);
    }

    let pattern = format!(
        "{}/{}*.yaml",
        glob::Pattern::escape(&root.to_string_lossy()),
        glob::Pattern::escape(code)
    );
    glob::glob(&pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .find(|p| p.is_file())
}

/// Load the record for `code`, failing with `CharacterNotFound` when no file matches.
pub fn load_record(root: &Path, code: &str) -> Result<CharacterRecord> {
    let path = find_description(root, code)
        .ok_or_else(|| StoryworldError::CharacterNotFound(code.to_string()))?;
    let text = std::fs::read_to_string(&path).map_err(|e| StoryworldError::io(&path, e))?;
    CharacterRecord::parse(&path, &text)
}

/// List `*.yaml` description files directly under `root`, sorted by name.
pub fn description_files(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    files.sort();
    files
}

/// Codes are file stems and directory names, never paths.
fn is_plain_code(code: &str) -> bool {
    !code.is_empty()
        && code != "."
        && code != ".."
        && !code.contains(['/', '\\'])
}

/// Convert a YAML value into JSON: primitives, sequences and mappings pass
/// through, anything else (tags, non-finite floats) is stringified.
pub fn coerce(value: YamlValue) -> Value {
    match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(n.to_string()))
            }
        }
        YamlValue::String(s) => Value::String(s),
        YamlValue::Sequence(seq) => Value::Array(seq.into_iter().map(coerce).collect()),
        YamlValue::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (key_string(k), coerce(v)))
                .collect(),
        ),
        tagged @ YamlValue::Tagged(_) => Value::String(render(&tagged)),
    }
}

fn key_string(key: YamlValue) -> String {
    match key {
        YamlValue::String(s) => s,
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        other => render(&other),
    }
}

fn render(value: &YamlValue) -> String {
    serde_yaml_ng::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_default()
}
