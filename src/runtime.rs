//! Synthesized command + user input → one API request.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::client::{ApiClient, Body, Request, Response};
use crate::error::{ApiRequestError, RuntimeError, ValidationError};
use crate::operation::ValueType;
use crate::synthesize::{ArgSource, ArgSpec, SynthesizedCommand};

/// Raw values supplied for a command, keyed by argument name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInput {
    values: BTreeMap<String, Vec<String>>,
}

impl UserInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`UserInput::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Validate `input` and run `command` through `client`. Exactly one request
/// is sent when validation passes; none otherwise.
pub fn execute(
    command: &SynthesizedCommand,
    input: &UserInput,
    client: &dyn ApiClient,
) -> Result<Response, RuntimeError> {
    let request = build_request(command, input)?;
    tracing::debug!(
        command = command.name(),
        method = %request.method,
        path = %request.path,
        "sending request"
    );

    let response = client.send(&request)?;
    tracing::info!(status = response.status, "response received");

    if !response.is_success() {
        return Err(ApiRequestError {
            status: response.status,
            body: response.body,
        }
        .into());
    }
    Ok(response)
}

/// Turn validated input into a [`Request`]. Path parameters are substituted
/// and query parameters appended in declared order; body fields follow the
/// key order of the body example.
pub fn build_request(
    command: &SynthesizedCommand,
    input: &UserInput,
) -> Result<Request, ValidationError> {
    if let Some(unknown) = input.names().find(|name| command.arg(name).is_none()) {
        return Err(ValidationError::UnknownArgument {
            name: unknown.to_string(),
        });
    }

    let operation = &command.operation;
    let mut path = operation.path.clone();
    let mut query = Vec::new();
    let mut body_values: HashMap<&str, Value> = HashMap::new();

    for arg in &command.args {
        let values = match input.get(&arg.name) {
            Some(values) if !values.is_empty() => values,
            _ if arg.required => {
                return Err(ValidationError::MissingArgument {
                    name: arg.name.clone(),
                });
            }
            _ => continue,
        };
        check_allowed(arg, values)?;

        match arg.source {
            ArgSource::Path => {
                let raw = single(arg, values)?;
                coerce(arg, raw)?;
                // Empty and dot segments would point the request at another resource.
                if matches!(raw.as_str(), "" | "." | "..") {
                    return Err(ValidationError::InvalidPathSegment {
                        name: arg.name.clone(),
                        value: raw.clone(),
                    });
                }
                path = path.replace(
                    &format!("{{{}}}", arg.wire_name),
                    &urlencoding::encode(raw),
                );
            }
            ArgSource::Query => {
                if arg.takes_many() {
                    for raw in values {
                        query.push((arg.wire_name.clone(), raw.clone()));
                    }
                } else {
                    let raw = single(arg, values)?;
                    let text = match coerce(arg, raw)? {
                        Value::Bool(b) => b.to_string(),
                        _ => raw.clone(),
                    };
                    query.push((arg.wire_name.clone(), text));
                }
            }
            ArgSource::Body => {
                let value = if arg.takes_many() {
                    collect_array(values)
                } else {
                    coerce(arg, single(arg, values)?)?
                };
                body_values.insert(arg.wire_name.as_str(), value);
            }
        }
    }

    let body = operation.body.as_ref().map(|body| Body {
        encoding: body.encoding,
        fields: body
            .fields
            .iter()
            .filter_map(|field| {
                body_values
                    .remove(field.key.as_str())
                    .map(|value| (field.key.clone(), value))
            })
            .collect(),
    });

    Ok(Request {
        method: operation.method,
        path,
        query,
        body,
    })
}

fn single<'a>(arg: &ArgSpec, values: &'a [String]) -> Result<&'a String, ValidationError> {
    match values {
        [one] => Ok(one),
        _ => Err(ValidationError::TooManyValues {
            name: arg.name.clone(),
        }),
    }
}

fn check_allowed(arg: &ArgSpec, values: &[String]) -> Result<(), ValidationError> {
    if arg.possible_values.is_empty() {
        return Ok(());
    }
    let matches = |value: &str, allowed: &str| {
        if arg.value_type == ValueType::Boolean {
            allowed.eq_ignore_ascii_case(value)
        } else {
            allowed == value
        }
    };
    match values
        .iter()
        .find(|v| !arg.possible_values.iter().any(|allowed| matches(v.as_str(), allowed.as_str())))
    {
        Some(value) => Err(ValidationError::NotAllowed {
            name: arg.name.clone(),
            value: value.clone(),
            allowed: arg.possible_values.join(", "),
        }),
        None => Ok(()),
    }
}

/// Parse a raw value into the JSON type the argument declares.
fn coerce(arg: &ArgSpec, raw: &str) -> Result<Value, ValidationError> {
    let invalid = || ValidationError::InvalidValue {
        name: arg.name.clone(),
        value: raw.to_string(),
        expected: arg.value_type,
    };

    match arg.value_type {
        ValueType::String => Ok(Value::String(raw.to_string())),
        ValueType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        ValueType::Number => {
            let raw = raw.trim();
            if let Ok(i) = raw.parse::<i64>() {
                return Ok(Value::from(i));
            }
            raw.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid)
        }
        ValueType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        ValueType::Object => match serde_json::from_str::<Value>(raw) {
            Ok(value @ Value::Object(_)) => Ok(value),
            _ => Err(invalid()),
        },
        ValueType::Array => Ok(collect_array(std::slice::from_ref(&raw.to_string()))),
    }
}

/// A single value holding a JSON array is used as-is; otherwise every value
/// becomes one element, parsed as JSON when it is valid JSON.
fn collect_array(values: &[String]) -> Value {
    if let [one] = values {
        if let Ok(array @ Value::Array(_)) = serde_json::from_str::<Value>(one) {
            return array;
        }
    }
    Value::Array(
        values
            .iter()
            .map(|v| serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.clone())))
            .collect(),
    )
}
