use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::operation::ValueType;
use crate::render::OutputFormat;
use crate::runtime::UserInput;
use crate::spec::SpecDocument;
use crate::synthesize::{ArgSpec, Synthesis, SynthesizedCommand};

pub const BIN_NAME: &str = "cloud";

pub fn build_cli(doc: &SpecDocument, synthesis: &Synthesis) -> Command {
    let about = if doc.title().is_empty() {
        "API client (auto-generated)".to_string()
    } else {
        format!("{} client (auto-generated)", doc.title())
    };

    let mut cmd = Command::new(BIN_NAME)
        .version(env!("CARGO_PKG_VERSION"))
        .about(about)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(global_args());

    cmd = cmd.subcommand(
        Command::new("list")
            .about("List available API commands")
            .arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Emit machine-readable JSON"),
            ),
    );

    cmd = cmd.subcommand(
        Command::new("describe")
            .about("Describe a specific API command")
            .arg(Arg::new("command").required(true).value_name("COMMAND"))
            .arg(
                Arg::new("json")
                    .long("json")
                    .action(ArgAction::SetTrue)
                    .help("Emit machine-readable JSON"),
            ),
    );

    for command in &synthesis.commands {
        cmd = cmd.subcommand(build_command(command));
    }

    cmd
}

/// Parser for the options the command tree depends on. Parsing stops at the
/// first command name; errors are ignored since the full parse reports them.
pub fn bootstrap_command() -> Command {
    Command::new(BIN_NAME)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .disable_help_subcommand(true)
        .allow_external_subcommands(true)
        .ignore_errors(true)
        .args(global_args())
}

fn global_args() -> Vec<Arg> {
    vec![
        Arg::new("base_url")
            .long("base-url")
            .global(true)
            .value_name("URL")
            .help("Override the API base URL (CLOUD_API_URL)"),
        Arg::new("api_token")
            .long("api-token")
            .global(true)
            .value_name("TOKEN")
            .help("Bearer token sent with every request (CLOUD_API_TOKEN)"),
        // Decides which commands exist, so it is only accepted before the command name.
        Arg::new("spec")
            .long("spec")
            .value_name("FILE")
            .help("Load the API description from a JSON or YAML file (CLOUD_API_SPEC)"),
        Arg::new("format")
            .long("format")
            .global(true)
            .value_name("FORMAT")
            .value_parser(PossibleValuesParser::new(OutputFormat::NAMES))
            .help("Output format (CLOUD_API_FORMAT) [default: json]"),
        Arg::new("timeout")
            .long("timeout")
            .global(true)
            .value_name("SECS")
            .help("Request timeout in seconds (CLOUD_API_TIMEOUT) [default: 30]"),
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .global(true)
            .action(ArgAction::Count)
            .help("Increase log verbosity (repeatable)"),
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .global(true)
            .action(ArgAction::SetTrue)
            .help("Only log errors"),
    ]
}

fn build_command(command: &SynthesizedCommand) -> Command {
    let operation = &command.operation;
    let mut cmd = Command::new(command.name().to_string())
        .about(command.description().to_string())
        .after_help(format!("{} {}", operation.method, operation.path));
    if !operation.description.is_empty() && operation.description != operation.summary {
        cmd = cmd.long_about(operation.description.clone());
    }
    for spec in &command.args {
        cmd = cmd.arg(build_arg(spec));
    }
    cmd
}

fn build_arg(spec: &ArgSpec) -> Arg {
    let mut arg = Arg::new(spec.name.clone())
        .required(spec.required)
        .help(spec.help.clone());

    arg = if spec.positional {
        arg.value_name(spec.name.replace('-', "_").to_ascii_uppercase())
    } else {
        arg.long(spec.name.clone()).value_name("VALUE")
    };

    // Positional arrays take a single JSON array value.
    arg = if spec.takes_many() && !spec.positional {
        arg.action(ArgAction::Append)
    } else {
        arg.action(ArgAction::Set)
    };

    if !spec.possible_values.is_empty() {
        arg = arg
            .value_parser(PossibleValuesParser::new(spec.possible_values.clone()))
            .ignore_case(spec.value_type == ValueType::Boolean);
    }
    arg
}

/// Collect the values clap matched for `command` into a [`UserInput`].
pub fn input_from_matches(command: &SynthesizedCommand, matches: &ArgMatches) -> UserInput {
    let mut input = UserInput::new();
    for spec in &command.args {
        if let Some(values) = matches.get_many::<String>(&spec.name) {
            for value in values {
                input.push(spec.name.clone(), value.clone());
            }
        }
    }
    input
}

pub fn list_output(synthesis: &Synthesis, json: bool) -> Result<String> {
    if json {
        let out: Vec<_> = synthesis
            .commands
            .iter()
            .map(|command| {
                serde_json::json!({
                    "name": command.name(),
                    "method": command.operation.method,
                    "path": command.operation.path,
                    "description": command.description(),
                })
            })
            .collect();
        return Ok(serde_json::to_string_pretty(&out)?);
    }

    let width = synthesis
        .commands
        .iter()
        .map(|c| c.name().len())
        .max()
        .unwrap_or_default();
    let lines: Vec<String> = synthesis
        .commands
        .iter()
        .map(|c| format!("{:<width$}  {}", c.name(), c.description()).trim_end().to_string())
        .collect();
    Ok(lines.join("\n"))
}

pub fn describe_output(command: &SynthesizedCommand, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(command)?);
    }

    let operation = &command.operation;
    let mut lines = vec![
        command.name().to_string(),
        format!("  method: {}", operation.method),
        format!("  path: {}", operation.path),
    ];
    if !command.description().is_empty() {
        lines.push(format!("  description: {}", command.description()));
    }
    if let Some(body) = &operation.body {
        lines.push(format!("  body: {}", body.encoding));
    }
    if !command.args.is_empty() {
        lines.push("  args:".to_string());
        for spec in &command.args {
            let flag = if spec.positional {
                format!("<{}>", spec.name)
            } else {
                format!("--{}", spec.name)
            };
            let req = if spec.required { "required" } else { "optional" };
            lines.push(format!("    {flag}  {} {} ({req})", spec.source, spec.value_type));
        }
    }
    Ok(lines.join("\n"))
}
