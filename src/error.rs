//! Error types for loading the API description, building commands and
//! running them.

use std::path::PathBuf;

use thiserror::Error;

use crate::operation::ValueType;

/// The API description could not be read, parsed or resolved. Fatal at startup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecParseError {
    #[error("failed to read API description: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in API description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML in API description: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported YAML mapping key in API description: {key}")]
    YamlKey { key: String },

    #[error("API description must be an object")]
    NotAnObject,

    #[error("API description has no `paths` object")]
    MissingPaths,

    #[error("path item for {path} must be an object")]
    InvalidPathItem { path: String },

    #[error("`$ref` must be a string, found {found}")]
    InvalidRef { found: String },

    #[error("external reference is not supported: {reference}")]
    ExternalRef { reference: String },

    #[error("unresolved reference: {reference}")]
    DanglingRef { reference: String },

    #[error("reference cycle through {reference}")]
    RefCycle { reference: String },
}

/// Why a single operation could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SynthesisFailure {
    #[error("operation must be an object")]
    NotAnObject,

    #[error("unsupported HTTP method `{0}`")]
    UnsupportedMethod(String),

    #[error("no x-cli-name or operationId to derive a command name from")]
    MissingName,

    #[error("parameter #{index} is malformed: {detail}")]
    MalformedParameter { index: usize, detail: String },

    #[error("path placeholder {{{0}}} has no matching path parameter")]
    MissingPathParameter(String),

    #[error("path parameter `{0}` does not appear in the path template")]
    UnusedPathParameter(String),

    #[error("request body example must be a JSON object")]
    InvalidBodyExample,

    #[error("argument `{0}` is derived more than once")]
    DuplicateArgument(String),

    #[error("command `{0}` is already defined")]
    DuplicateCommand(String),
}

/// One operation was skipped while building the command set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("skipping {method} {path}: {reason}")]
pub struct CommandSynthesisError {
    pub method: String,
    pub path: String,
    pub reason: SynthesisFailure,
}

/// User input does not satisfy a command's argument definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("missing required argument `{name}`")]
    MissingArgument { name: String },

    #[error("unknown argument `{name}`")]
    UnknownArgument { name: String },

    #[error("invalid value `{value}` for `{name}`: not a usable path segment")]
    InvalidPathSegment { name: String, value: String },

    #[error("argument `{name}` accepts a single value")]
    TooManyValues { name: String },

    #[error("invalid value `{value}` for `{name}`: expected {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: ValueType,
    },

    #[error("invalid value `{value}` for `{name}`: expected one of {allowed}")]
    NotAllowed {
        name: String,
        value: String,
        allowed: String,
    },
}

/// The API answered with a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {}", .body.trim())]
pub struct ApiRequestError {
    pub status: u16,
    pub body: String,
}

/// The request never produced an HTTP response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("network failure: {0}")]
    Send(#[source] reqwest::Error),

    #[error("network failure while reading response: {0}")]
    Read(#[source] reqwest::Error),

    #[error("network failure: {0}")]
    Other(String),
}

/// Anything that can stop a synthesized command once it has been invoked.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiRequestError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
#[error("failed to render response")]
pub struct RenderError(#[from] serde_json::Error);
