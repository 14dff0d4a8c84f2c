use anyhow::{Result, anyhow};
use clap::ArgMatches;
use cloudapi::config::{self, Bootstrap, Settings};
use cloudapi::http::HttpClient;
use cloudapi::synthesize::Synthesis;
use cloudapi::{cli, render, runtime, spec, synthesize};
use std::{env, io::Write};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let bootstrap = Bootstrap::scan(&args, |key| env::var(key).ok());
    let log_filter = init_tracing(bootstrap.log_level())?;

    let doc = match &bootstrap.spec_path {
        Some(path) => spec::load_from_path(path)?,
        None => spec::load()?,
    };
    let synthesis = synthesize::synthesize(&doc);
    tracing::debug!(
        commands = synthesis.commands.len(),
        skipped = synthesis.skipped.len(),
        "command tree ready"
    );

    let matches = cli::build_cli(&doc, &synthesis).get_matches_from(&args);
    if let Some(handle) = log_filter {
        let level = config::log_level_from(&matches);
        if level != bootstrap.log_level() {
            handle
                .reload(EnvFilter::new(level))
                .map_err(|e| anyhow!("failed to update log level: {e}"))?;
        }
    }

    if let Some(sub) = matches.subcommand_matches("list") {
        return write_stdout_line(&cli::list_output(&synthesis, sub.get_flag("json"))?);
    }
    if let Some(sub) = matches.subcommand_matches("describe") {
        return handle_describe(&synthesis, sub);
    }

    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("command required"))?;
    let command = synthesis
        .find(name)
        .ok_or_else(|| anyhow!("unknown command {name}"))?;

    let settings = Settings::resolve(&matches, doc.default_server())?;
    let input = cli::input_from_matches(command, sub);
    let client = HttpClient::new(&settings)?;
    let response = runtime::execute(command, &input, &client)?;

    let output = render::render(&response, command.operation.method, settings.format)?;
    write_stdout_line(&output)
}

fn handle_describe(synthesis: &Synthesis, matches: &ArgMatches) -> Result<()> {
    let name = matches
        .get_one::<String>("command")
        .ok_or_else(|| anyhow!("command required"))?;
    let command = synthesis
        .find(name)
        .ok_or_else(|| anyhow!("unknown command {name}"))?;
    write_stdout_line(&cli::describe_output(command, matches.get_flag("json"))?)
}

/// Logs go to stderr so stdout stays parseable. `RUST_LOG` overrides the
/// level picked from `-v`/`-q`; otherwise the returned handle lets the level
/// follow flags given after the command name.
fn init_tracing(default_level: &str) -> Result<Option<reload::Handle<EnvFilter, Registry>>> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let overridden = from_env.is_some();
    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new(default_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))?;
    Ok((!overridden).then_some(handle))
}

fn write_stdout_line(value: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if let Err(err) = out.write_all(value.as_bytes()) {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        return Err(err.into());
    }
    if let Err(err) = out.write_all(b"\n") {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        return Err(err.into());
    }
    Ok(())
}
