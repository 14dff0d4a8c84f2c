//! API description → command definitions.
//!
//! Each operation is first parsed into a typed [`Operation`], then turned into
//! a [`SynthesizedCommand`] whose arguments mirror its path/query parameters
//! and the keys of its request-body example.

use std::collections::HashSet;

use convert_case::{Case, Casing};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CommandSynthesisError, SynthesisFailure};
use crate::operation::{
    BodyEncoding, HttpMethod, Operation, ParamLocation, Parameter, RequestBody,
    RequestBodyField, ValueType, path_placeholders,
};
use crate::spec::{OperationEntry, REF_KEY, SpecDocument};

/// Namespace token prefixed to every generated command name.
pub const NAMESPACE: &str = "api";

/// Names owned by the CLI itself. Derived arguments with one of these names
/// are renamed with [`RESERVED_PREFIX`].
pub const RESERVED_NAMES: &[&str] = &[
    "help", "version", "base-url", "api-token", "spec", "format", "timeout", "verbose", "quiet",
];

pub const RESERVED_PREFIX: &str = "param-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgSource {
    Path,
    Query,
    Body,
}

impl std::fmt::Display for ArgSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Body => "body",
        })
    }
}

/// One argument or option of a synthesized command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgSpec {
    /// Name on the command line: a positional id or `--long` option.
    pub name: String,
    /// Name sent to the API.
    pub wire_name: String,
    pub source: ArgSource,
    pub required: bool,
    pub positional: bool,
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<String>,
    pub help: String,
}

impl ArgSpec {
    pub fn takes_many(&self) -> bool {
        self.value_type == ValueType::Array
    }
}

/// A command derived from one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesizedCommand {
    pub operation: Operation,
    pub args: Vec<ArgSpec>,
}

impl SynthesizedCommand {
    pub fn name(&self) -> &str {
        &self.operation.command_name
    }

    pub fn description(&self) -> &str {
        &self.operation.summary
    }

    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|a| a.name == name)
    }
}

/// Result of synthesizing a whole document.
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    /// Commands in document order.
    pub commands: Vec<SynthesizedCommand>,
    pub skipped: Vec<CommandSynthesisError>,
}

impl Synthesis {
    pub fn find(&self, name: &str) -> Option<&SynthesizedCommand> {
        self.commands.iter().find(|c| c.name() == name)
    }
}

/// Build one command per operation of `doc`. Operations that cannot be
/// synthesized are logged and collected in [`Synthesis::skipped`].
pub fn synthesize(doc: &SpecDocument) -> Synthesis {
    let mut synthesis = Synthesis::default();
    let mut seen = HashSet::new();

    for entry in doc.operations() {
        let result = parse_operation(&entry).and_then(build_command).and_then(|command| {
            if seen.insert(command.name().to_string()) {
                Ok(command)
            } else {
                Err(failure(
                    &entry,
                    SynthesisFailure::DuplicateCommand(command.name().to_string()),
                ))
            }
        });

        match result {
            Ok(command) => synthesis.commands.push(command),
            Err(err) => {
                tracing::warn!("{err}");
                synthesis.skipped.push(err);
            }
        }
    }

    tracing::debug!(
        commands = synthesis.commands.len(),
        skipped = synthesis.skipped.len(),
        "synthesized commands"
    );
    synthesis
}

fn failure(entry: &OperationEntry<'_>, reason: SynthesisFailure) -> CommandSynthesisError {
    CommandSynthesisError {
        method: entry.method.to_ascii_uppercase(),
        path: entry.path.to_string(),
        reason,
    }
}

/// Parse one method entry into an [`Operation`].
pub fn parse_operation(entry: &OperationEntry<'_>) -> Result<Operation, CommandSynthesisError> {
    let fail = |reason| failure(entry, reason);

    let op = entry
        .operation
        .as_object()
        .ok_or_else(|| fail(SynthesisFailure::NotAnObject))?;
    let method = HttpMethod::parse(entry.method)
        .ok_or_else(|| fail(SynthesisFailure::UnsupportedMethod(entry.method.to_string())))?;
    let command_name = command_name(op).ok_or_else(|| fail(SynthesisFailure::MissingName))?;

    let summary = op
        .get("summary")
        .or_else(|| op.get("description"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let description = op
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    let parameters = collect_params(entry.path, entry.shared_params, op.get("parameters"))
        .map_err(fail)?;
    let body = match op.get("requestBody") {
        Some(request_body) => Some(parse_body(request_body).map_err(fail)?),
        None => None,
    };

    Ok(Operation {
        command_name,
        method,
        path: entry.path.to_string(),
        summary,
        description,
        parameters,
        body,
    })
}

/// `api:` + `x-cli-name`, falling back to `<first tag>:<operationId>`.
fn command_name(op: &Map<String, Value>) -> Option<String> {
    let slug = op
        .get("x-cli-name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            let op_id = op
                .get("operationId")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())?;
            let group = op
                .get("tags")
                .and_then(Value::as_array)
                .and_then(|tags| tags.first())
                .and_then(Value::as_str)
                .unwrap_or("other");
            Some(format!("{}:{}", group.to_case(Case::Kebab), op_id.to_case(Case::Kebab)))
        })?;
    Some(format!("{NAMESPACE}:{slug}"))
}

/// Merge path-level and operation-level parameters. Operation-level entries
/// replace path-level ones with the same name and location. Path parameters
/// come first, sorted by their position in the template.
fn collect_params(
    path: &str,
    shared: Option<&Value>,
    own: Option<&Value>,
) -> Result<Vec<Parameter>, SynthesisFailure> {
    let mut params: Vec<Parameter> = Vec::new();
    let mut index = 0;

    for source in [shared, own].into_iter().flatten() {
        let Some(list) = source.as_array() else {
            return Err(SynthesisFailure::MalformedParameter {
                index,
                detail: "parameters must be a list".to_string(),
            });
        };
        for raw in list {
            index += 1;
            let Some(param) = parse_param(raw).map_err(|detail| SynthesisFailure::MalformedParameter {
                index,
                detail,
            })?
            else {
                continue;
            };
            match params
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(existing) => *existing = param,
                None => params.push(param),
            }
        }
    }

    let placeholders = path_placeholders(path);
    for placeholder in &placeholders {
        if !params
            .iter()
            .any(|p| p.location == ParamLocation::Path && p.name == *placeholder)
        {
            return Err(SynthesisFailure::MissingPathParameter(placeholder.to_string()));
        }
    }

    let (mut path_params, query_params): (Vec<_>, Vec<_>) = params
        .into_iter()
        .partition(|p| p.location == ParamLocation::Path);
    if let Some(unused) = path_params
        .iter()
        .find(|p| !placeholders.contains(&p.name.as_str()))
    {
        return Err(SynthesisFailure::UnusedPathParameter(unused.name.clone()));
    }
    path_params.sort_by_key(|p| placeholders.iter().position(|name| *name == p.name));

    path_params.extend(query_params);
    Ok(path_params)
}

/// `Ok(None)` for locations the CLI does not expose (header, cookie).
fn parse_param(raw: &Value) -> Result<Option<Parameter>, String> {
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "missing `name`".to_string())?;
    let location = match raw.get("in").and_then(Value::as_str) {
        Some("path") => ParamLocation::Path,
        Some("query") => ParamLocation::Query,
        Some("header") | Some("cookie") => {
            tracing::debug!(name, "ignoring header/cookie parameter");
            return Ok(None);
        }
        Some(other) => return Err(format!("unknown location `{other}` for `{name}`")),
        None => return Err(format!("missing `in` for `{name}`")),
    };

    let schema = raw.get("schema").cloned().unwrap_or(Value::Null);
    let enum_values = schema
        .get("enum")
        .and_then(Value::as_array)
        .map(|values| values.iter().map(scalar_text).collect())
        .unwrap_or_default();

    Ok(Some(Parameter {
        name: name.to_string(),
        location,
        required: location == ParamLocation::Path
            || raw.get("required").and_then(Value::as_bool).unwrap_or(false),
        value_type: ValueType::from_schema(&schema),
        description: raw
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        enum_values,
        reference: raw.get(REF_KEY).and_then(Value::as_str).map(str::to_string),
    }))
}

/// Take the first example of the first content type and derive one field per
/// example key, in the example's key order.
fn parse_body(request_body: &Value) -> Result<RequestBody, SynthesisFailure> {
    let Some((content_type, media)) = request_body
        .get("content")
        .and_then(Value::as_object)
        .and_then(|content| content.iter().next())
    else {
        return Ok(RequestBody {
            encoding: BodyEncoding::Json,
            fields: Vec::new(),
        });
    };

    let schema = media.get("schema").unwrap_or(&Value::Null);
    let example = media
        .get("example")
        .or_else(|| {
            media
                .get("examples")
                .and_then(Value::as_object)
                .and_then(|examples| examples.values().next())
                .and_then(|example| example.get("value"))
        })
        .or_else(|| schema.get("example"));

    let fields = match example {
        None => Vec::new(),
        Some(Value::Object(example)) => {
            let required: Vec<&str> = schema
                .get("required")
                .and_then(Value::as_array)
                .map(|keys| keys.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            example
                .iter()
                .map(|(key, value)| {
                    let property = schema.get("properties").and_then(|p| p.get(key));
                    RequestBodyField {
                        key: key.clone(),
                        example: value.clone(),
                        value_type: match property {
                            Some(p) if p.get("type").is_some() => ValueType::from_schema(p),
                            _ => ValueType::infer(value),
                        },
                        description: property
                            .and_then(|p| p.get("description"))
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .trim()
                            .to_string(),
                        required: required.contains(&key.as_str()),
                    }
                })
                .collect()
        }
        Some(_) => return Err(SynthesisFailure::InvalidBodyExample),
    };

    Ok(RequestBody {
        encoding: BodyEncoding::from_content_type(content_type),
        fields,
    })
}

/// Derive the argument list of `operation`: positionals first (path
/// parameters, then required body fields), then options (query parameters,
/// then optional body fields).
pub fn build_command(operation: Operation) -> Result<SynthesizedCommand, CommandSynthesisError> {
    let fail = |reason| CommandSynthesisError {
        method: operation.method.to_string(),
        path: operation.path.clone(),
        reason,
    };

    let body_fields = operation
        .body
        .as_ref()
        .map(|body| body.fields.as_slice())
        .unwrap_or_default();

    let path_args = operation.path_params().map(|p| param_arg(p, ArgSource::Path, true));
    let body_args = body_fields
        .iter()
        .filter(|f| f.required)
        .map(|f| body_arg(f, true));
    let query_args = operation
        .query_params()
        .map(|p| param_arg(p, ArgSource::Query, false));
    let option_args = body_fields
        .iter()
        .filter(|f| !f.required)
        .map(|f| body_arg(f, false));

    let mut names = HashSet::new();
    let mut args = Vec::new();
    for arg in path_args.chain(body_args).chain(query_args).chain(option_args) {
        if !names.insert(arg.name.clone()) {
            return Err(fail(SynthesisFailure::DuplicateArgument(arg.name)));
        }
        args.push(arg);
    }

    Ok(SynthesizedCommand { operation, args })
}

fn param_arg(param: &Parameter, source: ArgSource, positional: bool) -> ArgSpec {
    ArgSpec {
        name: cli_name(&param.name),
        wire_name: param.name.clone(),
        source,
        required: param.required,
        positional,
        value_type: param.value_type,
        possible_values: if param.value_type == ValueType::Boolean && param.enum_values.is_empty() {
            vec!["true".to_string(), "false".to_string()]
        } else {
            param.enum_values.clone()
        },
        help: param.description.clone(),
    }
}

fn body_arg(field: &RequestBodyField, positional: bool) -> ArgSpec {
    let example = scalar_text(&field.example);
    let help = match (field.description.is_empty(), example.is_empty()) {
        (false, true) => field.description.clone(),
        (false, false) => format!("{} (example: {example})", field.description),
        (true, false) => format!("Request body field `{}` (example: {example})", field.key),
        (true, true) => format!("Request body field `{}`", field.key),
    };
    ArgSpec {
        name: cli_name(&field.key),
        wire_name: field.key.clone(),
        source: ArgSource::Body,
        required: field.required,
        positional,
        value_type: field.value_type,
        possible_values: if field.value_type == ValueType::Boolean {
            vec!["true".to_string(), "false".to_string()]
        } else {
            Vec::new()
        },
        help,
    }
}

/// Kebab-case `wire_name`, renaming anything the CLI reserves for itself.
pub fn cli_name(wire_name: &str) -> String {
    let name = wire_name.to_case(Case::Kebab);
    if RESERVED_NAMES.contains(&name.as_str()) {
        tracing::debug!(name = %name, "derived name collides with a built-in option; renaming");
        format!("{RESERVED_PREFIX}{name}")
    } else {
        name
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec;
    use serde_json::json;

    fn doc(paths: Value) -> SpecDocument {
        SpecDocument::from_value(json!({ "paths": paths })).unwrap()
    }

    fn only_command(paths: Value) -> SynthesizedCommand {
        let synthesis = synthesize(&doc(paths));
        assert!(synthesis.skipped.is_empty(), "{:?}", synthesis.skipped);
        assert_eq!(synthesis.commands.len(), 1);
        synthesis.commands.into_iter().next().unwrap()
    }

    fn arg_names(command: &SynthesizedCommand) -> Vec<&str> {
        command.args.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn bundled_document_synthesizes_without_skips() {
        let doc = spec::load().unwrap();
        let synthesis = synthesize(&doc);
        assert!(synthesis.skipped.is_empty(), "{:?}", synthesis.skipped);
        assert_eq!(synthesis.commands.len(), doc.operations().count());
        assert_eq!(synthesis.commands[0].name(), "api:accounts:find");
    }

    #[test]
    fn synthesis_is_deterministic() {
        let doc = spec::load().unwrap();
        let first = synthesize(&doc);
        let second = synthesize(&doc);
        assert_eq!(first.commands, second.commands);
    }

    #[test]
    fn commands_keep_document_order_not_alphabetical() {
        let synthesis = synthesize(&doc(json!({
            "/zeta": { "get": { "x-cli-name": "z:list" } },
            "/alpha": { "get": { "x-cli-name": "a:list" } }
        })));
        let names: Vec<&str> = synthesis.commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["api:z:list", "api:a:list"]);
    }

    #[test]
    fn get_command_exposes_shared_parameters_as_options() {
        let doc = spec::load().unwrap();
        let synthesis = synthesize(&doc);
        let command = synthesis.find("api:accounts:ssh-keys-list").unwrap();

        assert_eq!(
            command.description(),
            "Returns a list of SSH keys associated with the current user."
        );
        assert_eq!(arg_names(command), vec!["sort", "filter", "limit", "offset"]);
        assert!(command.args.iter().all(|a| !a.positional && !a.required));

        let limit = &command.operation.parameters[2];
        assert_eq!(limit.reference.as_deref(), Some("Limit"));
        assert_eq!(limit.value_type, ValueType::Integer);
    }

    #[test]
    fn post_command_derives_one_argument_per_example_key() {
        let doc = spec::load().unwrap();
        let synthesis = synthesize(&doc);
        let command = synthesis.find("api:accounts:ssh-key-create").unwrap();

        assert_eq!(arg_names(command), vec!["label", "public-key"]);
        let public_key = command.arg("public-key").unwrap();
        assert_eq!(public_key.wire_name, "public_key");
        assert_eq!(public_key.source, ArgSource::Body);
        assert!(public_key.positional && public_key.required);

        let body = command.operation.body.as_ref().unwrap();
        assert_eq!(body.encoding, BodyEncoding::Json);
        let keys: Vec<&str> = body.fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["label", "public_key"]);
    }

    #[test]
    fn optional_body_keys_become_options_after_query_params() {
        let command = only_command(json!({
            "/envs/{envId}/crons": {
                "post": {
                    "x-cli-name": "envs:cron-create",
                    "parameters": [
                        { "name": "envId", "in": "path", "required": true },
                        { "name": "dryRun", "in": "query", "schema": { "type": "boolean" } }
                    ],
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": { "required": ["command"] },
                                "example": { "enabled": true, "command": "drush cr" }
                            }
                        }
                    }
                }
            }
        }));

        assert_eq!(arg_names(&command), vec!["env-id", "command", "dry-run", "enabled"]);
        let enabled = command.arg("enabled").unwrap();
        assert!(!enabled.positional && !enabled.required);
        assert_eq!(enabled.value_type, ValueType::Boolean);
        assert_eq!(enabled.possible_values, vec!["true", "false"]);
    }

    #[test]
    fn path_parameters_follow_template_order() {
        let command = only_command(json!({
            "/apps/{appId}/envs/{envId}": {
                "parameters": [{ "name": "envId", "in": "path" }],
                "get": {
                    "x-cli-name": "apps:env-find",
                    "parameters": [
                        { "name": "limit", "in": "query" },
                        { "name": "appId", "in": "path" }
                    ]
                }
            }
        }));
        assert_eq!(arg_names(&command), vec!["app-id", "env-id", "limit"]);
        assert!(command.args[0].required && command.args[1].required);
    }

    #[test]
    fn operation_level_parameter_overrides_path_level() {
        let command = only_command(json!({
            "/items": {
                "parameters": [{ "name": "shared", "in": "query", "description": "path level" }],
                "get": {
                    "x-cli-name": "items:list",
                    "parameters": [
                        { "name": "shared", "in": "query", "required": true, "description": "op level" }
                    ]
                }
            }
        }));
        assert_eq!(command.args.len(), 1);
        assert_eq!(command.args[0].help, "op level");
        assert!(command.args[0].required);
    }

    #[test]
    fn header_parameters_are_ignored() {
        let command = only_command(json!({
            "/items": {
                "get": {
                    "x-cli-name": "items:list",
                    "parameters": [{ "name": "X-Request-Id", "in": "header" }]
                }
            }
        }));
        assert!(command.args.is_empty());
    }

    #[test]
    fn reserved_names_are_prefixed() {
        let command = only_command(json!({
            "/items": {
                "get": {
                    "x-cli-name": "items:list",
                    "parameters": [
                        { "name": "format", "in": "query" },
                        { "name": "help", "in": "query" }
                    ]
                }
            }
        }));
        assert_eq!(arg_names(&command), vec!["param-format", "param-help"]);
        assert_eq!(command.args[0].wire_name, "format");
    }

    #[test]
    fn duplicate_argument_names_skip_the_operation() {
        let synthesis = synthesize(&doc(json!({
            "/items": {
                "post": {
                    "x-cli-name": "items:create",
                    "parameters": [{ "name": "label", "in": "query" }],
                    "requestBody": {
                        "content": { "application/json": { "example": { "label": "x" } } }
                    }
                }
            }
        })));
        assert!(synthesis.commands.is_empty());
        assert_eq!(
            synthesis.skipped[0].reason,
            SynthesisFailure::DuplicateArgument("label".to_string())
        );
    }

    #[test]
    fn bad_operations_are_skipped_and_the_rest_survive() {
        let synthesis = synthesize(&doc(json!({
            "/items/{itemId}": { "get": { "x-cli-name": "items:find" } },
            "/nameless": { "get": { "summary": "no name" } },
            "/items": { "get": { "x-cli-name": "items:list" } },
            "/dupe": { "get": { "x-cli-name": "items:list" } },
            "/bad-body": {
                "post": {
                    "x-cli-name": "items:bad",
                    "requestBody": { "content": { "application/json": { "example": [1] } } }
                }
            }
        })));

        let names: Vec<&str> = synthesis.commands.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["api:items:list"]);

        let reasons: Vec<&SynthesisFailure> = synthesis.skipped.iter().map(|e| &e.reason).collect();
        assert_eq!(
            reasons,
            vec![
                &SynthesisFailure::MissingPathParameter("itemId".to_string()),
                &SynthesisFailure::MissingName,
                &SynthesisFailure::DuplicateCommand("api:items:list".to_string()),
                &SynthesisFailure::InvalidBodyExample,
            ]
        );
        assert_eq!(synthesis.skipped[0].path, "/items/{itemId}");
        assert_eq!(synthesis.skipped[0].method, "GET");
    }

    #[test]
    fn undeclared_path_parameter_is_rejected() {
        let synthesis = synthesize(&doc(json!({
            "/items": {
                "get": {
                    "x-cli-name": "items:list",
                    "parameters": [{ "name": "itemId", "in": "path" }]
                }
            }
        })));
        assert_eq!(
            synthesis.skipped[0].reason,
            SynthesisFailure::UnusedPathParameter("itemId".to_string())
        );
    }

    #[test]
    fn malformed_parameter_is_rejected() {
        let synthesis = synthesize(&doc(json!({
            "/items": {
                "get": {
                    "x-cli-name": "items:list",
                    "parameters": [{ "in": "query" }]
                }
            }
        })));
        assert!(matches!(
            synthesis.skipped[0].reason,
            SynthesisFailure::MalformedParameter { index: 1, .. }
        ));
    }

    #[test]
    fn name_falls_back_to_tag_and_operation_id() {
        let command = only_command(json!({
            "/pods": { "get": { "operationId": "listPods", "tags": ["Pods"], "description": "All pods" } }
        }));
        assert_eq!(command.name(), "api:pods:list-pods");
        assert_eq!(command.description(), "All pods");
    }

    #[test]
    fn body_example_comes_from_named_examples_and_form_content() {
        let command = only_command(json!({
            "/domains": {
                "post": {
                    "x-cli-name": "domains:create",
                    "requestBody": {
                        "content": {
                            "application/x-www-form-urlencoded": {
                                "examples": { "one": { "value": { "hostname": "example.com", "ports": [80] } } }
                            }
                        }
                    }
                }
            }
        }));
        let body = command.operation.body.as_ref().unwrap();
        assert_eq!(body.encoding, BodyEncoding::Form);
        assert_eq!(body.fields[1].value_type, ValueType::Array);
        assert!(command.arg("ports").unwrap().takes_many());
        assert_eq!(
            command.arg("hostname").unwrap().help,
            "Request body field `hostname` (example: example.com)"
        );
    }

    #[test]
    fn body_without_example_has_no_fields() {
        let command = only_command(json!({
            "/things": {
                "post": {
                    "x-cli-name": "things:create",
                    "requestBody": { "content": { "application/json": { "schema": { "type": "object" } } } }
                }
            }
        }));
        assert!(command.args.is_empty());
        assert!(command.operation.body.as_ref().unwrap().fields.is_empty());
    }
}
