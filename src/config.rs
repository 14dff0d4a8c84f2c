//! Runtime settings: command-line flag, then environment variable, then default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;

use crate::cli;
use crate::render::OutputFormat;

pub const ENV_BASE_URL: &str = "CLOUD_API_URL";
pub const ENV_API_TOKEN: &str = "CLOUD_API_TOKEN";
pub const ENV_SPEC: &str = "CLOUD_API_SPEC";
pub const ENV_FORMAT: &str = "CLOUD_API_FORMAT";
pub const ENV_TIMEOUT: &str = "CLOUD_API_TIMEOUT";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings needed before the command tree exists: which API description to
/// load and how loudly to log while doing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bootstrap {
    pub spec_path: Option<PathBuf>,
    pub verbosity: u8,
    pub quiet: bool,
}

impl Bootstrap {
    /// Read the options given before the command name, using the same
    /// definitions as the full command line.
    pub fn scan(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let matches = cli::bootstrap_command().try_get_matches_from(args).ok();
        let mut bootstrap = matches.as_ref().map(Self::from_matches).unwrap_or_default();
        if bootstrap.spec_path.is_none() {
            bootstrap.spec_path = env(ENV_SPEC).filter(|v| !v.is_empty()).map(PathBuf::from);
        }
        bootstrap
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            spec_path: matches.get_one::<String>("spec").map(PathBuf::from),
            verbosity: matches.get_count("verbose"),
            quiet: matches.get_flag("quiet"),
        }
    }

    pub fn log_level(&self) -> &'static str {
        log_level(self.verbosity, self.quiet)
    }
}

/// Default `tracing` filter directive for the chosen verbosity.
pub fn log_level(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Log level once the whole command line has been parsed, so `-v` after the
/// command name counts too.
pub fn log_level_from(matches: &ArgMatches) -> &'static str {
    log_level(matches.get_count("verbose"), matches.get_flag("quiet"))
}

/// Settings for talking to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub api_token: Option<String>,
    pub format: OutputFormat,
    pub timeout: Duration,
}

impl Settings {
    pub fn resolve(matches: &ArgMatches, default_base_url: Option<&str>) -> Result<Self> {
        Self::resolve_with(matches, default_base_url, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(
        matches: &ArgMatches,
        default_base_url: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let lookup = |arg: &str, var: &str| {
            matches
                .get_one::<String>(arg)
                .cloned()
                .or_else(|| env(var).filter(|v| !v.is_empty()))
        };

        let base_url = lookup("base_url", ENV_BASE_URL)
            .or_else(|| default_base_url.map(str::to_string))
            .ok_or_else(|| anyhow!("no API base URL: pass --base-url or set {ENV_BASE_URL}"))?;

        let format = match lookup("format", ENV_FORMAT) {
            Some(raw) => raw.parse::<OutputFormat>().map_err(|e| anyhow!(e))?,
            None => OutputFormat::default(),
        };

        let timeout = match lookup("timeout", ENV_TIMEOUT) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid timeout `{raw}` (expected seconds)"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url,
            api_token: lookup("api_token", ENV_API_TOKEN),
            format,
            timeout: Duration::from_secs(timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, Command};
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn matches(argv: &[&str]) -> ArgMatches {
        Command::new("cloud")
            .arg(Arg::new("base_url").long("base-url"))
            .arg(Arg::new("api_token").long("api-token"))
            .arg(Arg::new("format").long("format"))
            .arg(Arg::new("timeout").long("timeout"))
            .try_get_matches_from(argv)
            .unwrap()
    }

    #[test]
    fn bootstrap_reads_options_before_the_command() {
        let scanned = Bootstrap::scan(
            &args(&["cloud", "-vv", "--base-url", "https://x", "--spec", "api.yaml", "list"]),
            no_env,
        );
        assert_eq!(scanned.spec_path, Some(PathBuf::from("api.yaml")));
        assert_eq!(scanned.verbosity, 2);
        assert_eq!(scanned.log_level(), "debug");

        let scanned = Bootstrap::scan(&args(&["cloud", "--spec=x.json", "-vq"]), no_env);
        assert_eq!(scanned.spec_path, Some(PathBuf::from("x.json")));
        assert_eq!(scanned.log_level(), "error");
    }

    #[test]
    fn bootstrap_stops_at_the_command_name() {
        let scanned = Bootstrap::scan(
            &args(&["cloud", "api:accounts:find", "--limit", "3", "-v"]),
            no_env,
        );
        assert_eq!(scanned, Bootstrap::default());
        assert_eq!(scanned.log_level(), "warn");
    }

    #[test]
    fn bootstrap_falls_back_to_env_spec() {
        let scanned = Bootstrap::scan(&args(&["cloud", "list"]), |key| {
            (key == ENV_SPEC).then(|| "/etc/api.json".to_string())
        });
        assert_eq!(scanned.spec_path, Some(PathBuf::from("/etc/api.json")));
    }

    #[test]
    fn full_command_line_verbosity_counts_every_flag() {
        let matches = cli::bootstrap_command()
            .try_get_matches_from(["cloud", "-v", "--verbose", "-v"])
            .unwrap();
        assert_eq!(log_level_from(&matches), "trace");
        assert_eq!(log_level(1, false), "info");
        assert_eq!(log_level(3, true), "error");
    }

    #[test]
    fn flags_win_over_env_and_env_over_defaults() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BASE_URL, "https://env.example.com"),
            (ENV_API_TOKEN, "env-token"),
            (ENV_FORMAT, "table"),
        ]);
        let settings = Settings::resolve_with(
            &matches(&["cloud", "--base-url", "https://flag.example.com"]),
            Some("https://spec.example.com"),
            |key| env.get(key).map(|v| v.to_string()),
        )
        .unwrap();

        assert_eq!(settings.base_url, "https://flag.example.com");
        assert_eq!(settings.api_token.as_deref(), Some("env-token"));
        assert_eq!(settings.format, OutputFormat::Table);
        assert_eq!(settings.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn spec_server_is_the_last_resort() {
        let settings =
            Settings::resolve_with(&matches(&["cloud"]), Some("https://spec.example.com"), no_env)
                .unwrap();
        assert_eq!(settings.base_url, "https://spec.example.com");
        assert_eq!(settings.api_token, None);
        assert_eq!(settings.format, OutputFormat::Json);

        assert!(Settings::resolve_with(&matches(&["cloud"]), None, no_env).is_err());
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Settings::resolve_with(
            &matches(&["cloud", "--format", "yaml"]),
            Some("https://x"),
            no_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown output format"));

        let err = Settings::resolve_with(
            &matches(&["cloud", "--timeout", "soon"]),
            Some("https://x"),
            no_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid timeout"));
    }
}
