use std::io;

use clap::{CommandFactory, Parser, Subcommand};
use ipeople_compose::ComposeBackend;
use ipeople_core::Settings;

mod commands;

use commands::Session;

#[derive(Debug, Parser)]
#[command(
    name = "ipeople-pm",
    about = "iPeople password manager: deployment management",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Create the deployment directory and configuration, then start.
    ///
    /// Existing configuration is kept untouched; Docker itself must
    /// already be installed.
    Install,
    /// Start the database and the application
    Start,
    /// Stop all services (data volumes are kept)
    Stop,
    /// Stop, wait briefly, then start again
    Restart,
    /// Show whether each service is running
    Status,
    /// Follow logs of all services, or only the named ones
    Logs {
        /// Service names (db, app)
        services: Vec<String>,
    },
    /// Pull the latest images and restart
    Update,
    /// DESTRUCTIVE: wipe all data, pull the latest images and start fresh
    CleanUpdate,
    /// Dump the database into a timestamped .sql.gz file
    Backup,
    /// Show where the configuration lives and how to change it
    Config,
    /// DESTRUCTIVE: remove containers, data, installation and this tool
    Uninstall,
}

/// Result of reading the command line.
#[derive(Debug)]
enum Invocation {
    Run(Commands),
    /// Nothing to run: print this usage text and exit successfully.
    Usage(String),
}

fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// Parse `args`; anything unrecognized or empty becomes [`Invocation::Usage`].
fn parse_invocation<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(Cli { command: Some(cmd) }) => Ok(Invocation::Run(cmd)),
        Ok(Cli { command: None }) => Ok(Invocation::Usage(usage())),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => Err(err),
            kind => {
                tracing::debug!(?kind, "unrecognized invocation");
                Ok(Invocation::Usage(usage()))
            }
        },
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ipeople=info".parse()?)
        )
        .init();

    let command = match parse_invocation(std::env::args_os()) {
        Ok(Invocation::Run(command)) => command,
        Ok(Invocation::Usage(text)) => {
            print!("{text}");
            return Ok(());
        }
        Err(err) => err.exit(),
    };

    let settings = Settings::from_env()?;
    let backend = ComposeBackend::from_settings(&settings);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    let mut session = Session {
        settings: &settings,
        backend: &backend,
        input: &mut input,
        out: &mut out,
    };

    commands::dispatch(&command, &mut session)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Invocation {
        let mut argv = vec!["ipeople-pm"];
        argv.extend_from_slice(args);
        parse_invocation(argv).unwrap()
    }

    #[test]
    fn test_parse_subcommands() {
        assert!(matches!(parse(&["start"]), Invocation::Run(Commands::Start)));
        assert!(matches!(parse(&["clean-update"]), Invocation::Run(Commands::CleanUpdate)));
        assert!(matches!(parse(&["uninstall"]), Invocation::Run(Commands::Uninstall)));
    }

    #[test]
    fn test_parse_logs_services() {
        match parse(&["logs"]) {
            Invocation::Run(Commands::Logs { services }) => assert!(services.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
        match parse(&["logs", "app"]) {
            Invocation::Run(Commands::Logs { services }) => assert_eq!(services, ["app"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_and_empty_print_usage() {
        for args in [&["frobnicate"][..], &[][..], &["start", "--force"][..]] {
            match parse(args) {
                Invocation::Usage(text) => {
                    for name in [
                        "start", "stop", "restart", "status", "logs", "update",
                        "clean-update", "backup", "config", "uninstall",
                    ] {
                        assert!(text.contains(name), "usage is missing {name}");
                    }
                }
                other => panic!("expected usage for {args:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_help_is_not_usage_fallback() {
        assert!(parse_invocation(["ipeople-pm", "--help"]).is_err());
    }
}
