use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::error::JobwatchError;
use crate::core::listener::DEFAULT_LISTEN_ADDR;
use crate::core::registry::DEFAULT_REGISTRY_FILE;
use crate::core::render_loop::DEFAULT_INTERVAL;
use crate::core::source::gcloud::DEFAULT_DESCRIBE_COMMAND;
use crate::core::source::http::DEFAULT_ENDPOINT;
use crate::core::source::SourceConfig;

#[derive(Debug, Parser)]
#[command(name = "jobwatch", version, about = "Watch remote batch jobs and get notified when they change")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub watch: WatchArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the dashboard (the default)
    Watch(WatchArgs),
    /// Ask a running dashboard to start watching a job
    Add(AddArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Synthetic,
    Gcloud,
    Http,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// File holding the ids of watched jobs
    #[arg(long, env = "JOBWATCH_REGISTRY", default_value = DEFAULT_REGISTRY_FILE)]
    pub registry: PathBuf,
    /// Address accepting job registrations
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: String,
    #[arg(long = "interval-ms", default_value_t = DEFAULT_INTERVAL.as_millis() as u64)]
    pub interval_ms: u64,
    #[arg(long, value_enum, default_value_t = SourceKind::Gcloud)]
    pub source: SourceKind,
    #[arg(long, env = "PROJECT_ID")]
    pub project: Option<String>,
    /// Command prefix the job id is appended to
    #[arg(long = "describe-command", default_value = DEFAULT_DESCRIBE_COMMAND)]
    pub describe_command: String,
    #[arg(long = "api-endpoint", default_value = DEFAULT_ENDPOINT)]
    pub api_endpoint: String,
    /// Bearer token passed through to the HTTP source
    #[arg(long = "access-token", env = "JOBWATCH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
    /// Upper bound on a single status fetch
    #[arg(long = "fetch-timeout-secs", default_value_t = 30)]
    pub fetch_timeout_secs: u64,
    /// Log notifications instead of showing desktop popups
    #[arg(long = "no-notify")]
    pub no_notify: bool,
    #[arg(long = "log-file", default_value = "jobwatch.log")]
    pub log_file: PathBuf,
}

#[derive(Debug, Parser)]
pub struct AddArgs {
    pub id: String,
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: String,
}

impl WatchArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn source_config(&self) -> Result<SourceConfig, JobwatchError> {
        match self.source {
            SourceKind::Synthetic => Ok(SourceConfig::Synthetic),
            SourceKind::Gcloud => {
                let command = shell_words::split(&self.describe_command).map_err(|err| {
                    JobwatchError::Config {
                        message: format!("--describe-command: {err}"),
                    }
                })?;
                if command.is_empty() {
                    return Err(JobwatchError::Config {
                        message: "--describe-command is empty".to_string(),
                    });
                }
                Ok(SourceConfig::Gcloud {
                    command,
                    project: self.project.clone(),
                    timeout: self.fetch_timeout(),
                })
            }
            SourceKind::Http => {
                let project = self.project.clone().ok_or_else(|| JobwatchError::Config {
                    message: "--project (or PROJECT_ID) is required for the http source"
                        .to_string(),
                })?;
                SourceConfig::http(
                    self.api_endpoint.clone(),
                    project,
                    self.access_token.clone(),
                    self.fetch_timeout(),
                )
                .map_err(|err| JobwatchError::Config {
                    message: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jobwatch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn bare_invocation_watches_with_defaults() {
        let cli = parse(&["--source", "synthetic"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.watch.listen, DEFAULT_LISTEN_ADDR);
        assert_eq!(cli.watch.interval(), Duration::from_secs(1));
        assert!(matches!(
            cli.watch.source_config().unwrap(),
            SourceConfig::Synthetic
        ));
    }

    #[test]
    fn describe_command_is_shell_split() {
        let cli = parse(&["--describe-command", "gcloud beta 'ai platform' jobs describe"]);
        match cli.watch.source_config().unwrap() {
            SourceConfig::Gcloud { command, .. } => {
                assert_eq!(command, vec!["gcloud", "beta", "ai platform", "jobs", "describe"]);
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn http_source_needs_a_project() {
        let mut cli = parse(&["--source", "http", "--project", "proj"]);
        assert!(matches!(
            cli.watch.source_config(),
            Ok(SourceConfig::Http { .. })
        ));

        cli.watch.project = None;
        assert!(matches!(
            cli.watch.source_config(),
            Err(JobwatchError::Config { .. })
        ));
    }

    #[test]
    fn add_takes_an_id() {
        let cli = parse(&["add", "job-7", "--listen", "127.0.0.1:4000"]);
        match cli.command {
            Some(Commands::Add(args)) => {
                assert_eq!(args.id, "job-7");
                assert_eq!(args.listen, "127.0.0.1:4000");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
