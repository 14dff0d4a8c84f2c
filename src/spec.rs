//! API description loading.
//!
//! Reads an OpenAPI-style document, resolves every local `$ref` under
//! `paths`, and exposes the operations in document order.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::SpecParseError;

/// Key under which a resolved `$ref` target records its component name.
pub const REF_KEY: &str = "x-ref";

/// HTTP methods recognized inside a path item.
pub const METHODS: [&str; 7] = ["get", "put", "post", "delete", "patch", "head", "options"];

const BUNDLED_SPEC: &str = include_str!("../schemas/cloud-api.json");

/// Load the API description compiled into the binary.
pub fn load() -> Result<SpecDocument, SpecParseError> {
    SpecDocument::parse_json(BUNDLED_SPEC)
}

/// Load an API description from disk. `.yaml`/`.yml` files are read as YAML,
/// anything else as JSON.
pub fn load_from_path(path: &Path) -> Result<SpecDocument, SpecParseError> {
    let raw = fs::read_to_string(path).map_err(|source| SpecParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        SpecDocument::parse_yaml(&raw)
    } else {
        SpecDocument::parse_json(&raw)
    }
}

/// A loaded API description with all `$ref`s under `paths` resolved.
#[derive(Debug, Clone)]
pub struct SpecDocument {
    title: String,
    version: String,
    servers: Vec<String>,
    paths: Map<String, Value>,
}

/// One method entry of a path item, as found in the document.
#[derive(Debug, Clone, Copy)]
pub struct OperationEntry<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub operation: &'a Value,
    /// Parameters declared on the path item, shared by all its methods.
    pub shared_params: Option<&'a Value>,
}

impl SpecDocument {
    pub fn parse_json(raw: &str) -> Result<Self, SpecParseError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn parse_yaml(raw: &str) -> Result<Self, SpecParseError> {
        let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
        Self::from_value(yaml_to_json(value)?)
    }

    pub fn from_value(root: Value) -> Result<Self, SpecParseError> {
        let object = root.as_object().ok_or(SpecParseError::NotAnObject)?;
        let raw_paths = object
            .get("paths")
            .and_then(Value::as_object)
            .ok_or(SpecParseError::MissingPaths)?;

        let mut paths = Map::with_capacity(raw_paths.len());
        for (path, item) in raw_paths {
            if !item.is_object() {
                return Err(SpecParseError::InvalidPathItem { path: path.clone() });
            }
            let resolved = resolve_node(item, &root, &mut Vec::new())?;
            paths.insert(path.clone(), resolved);
        }

        let info = object.get("info");
        let text = |key: &str| {
            info.and_then(|i| i.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let servers = object
            .get("servers")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|s| s.get("url").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            title: text("title"),
            version: text("version"),
            servers,
            paths,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// First server URL declared by the document, used as the default base URL.
    pub fn default_server(&self) -> Option<&str> {
        self.servers.first().map(String::as_str)
    }

    /// Every method entry in document order: paths as written, and methods in
    /// the order they appear inside each path item.
    pub fn operations(&self) -> impl Iterator<Item = OperationEntry<'_>> {
        self.paths.iter().flat_map(|(path, item)| {
            let shared_params = item.get("parameters");
            item.as_object()
                .into_iter()
                .flat_map(|map| map.iter())
                .filter(|(key, _)| METHODS.contains(&key.as_str()))
                .map(move |(method, operation)| OperationEntry {
                    path,
                    method,
                    operation,
                    shared_params,
                })
        })
    }
}

fn resolve_node(node: &Value, root: &Value, stack: &mut Vec<String>) -> Result<Value, SpecParseError> {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref") {
                let reference = reference.as_str().ok_or_else(|| SpecParseError::InvalidRef {
                    found: reference.to_string(),
                })?;
                return resolve_ref(reference, root, stack);
            }
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), resolve_node(value, root, stack)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_node(item, root, stack))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn resolve_ref(reference: &str, root: &Value, stack: &mut Vec<String>) -> Result<Value, SpecParseError> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| SpecParseError::ExternalRef {
            reference: reference.to_string(),
        })?;
    if stack.iter().any(|seen| seen == reference) {
        return Err(SpecParseError::RefCycle {
            reference: reference.to_string(),
        });
    }
    let target = root
        .pointer(pointer)
        .ok_or_else(|| SpecParseError::DanglingRef {
            reference: reference.to_string(),
        })?;

    stack.push(reference.to_string());
    let mut resolved = resolve_node(target, root, stack)?;
    stack.pop();

    if let (Value::Object(map), Some(name)) = (&mut resolved, pointer.rsplit('/').next()) {
        if !name.is_empty() && !map.contains_key(REF_KEY) {
            let name = name.replace("~1", "/").replace("~0", "~");
            map.insert(REF_KEY.to_string(), Value::String(name));
        }
    }
    Ok(resolved)
}

fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, SpecParseError> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                // Response codes are commonly written as bare integers.
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => {
                        return Err(SpecParseError::YamlKey {
                            key: format!("{other:?}"),
                        });
                    }
                };
                map.insert(key, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}
