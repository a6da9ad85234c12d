mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Croupier -- plays browser game sessions by correlating inputs with the
/// game's own network results.
#[derive(Parser, Debug)]
#[command(name = "croupier", version, about)]
struct Cli {
    /// Workspace config file (default: ./croupier.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Attach to a Chrome page and play one session of a game
    Run {
        /// Game profile to play (see `croupier profiles`)
        #[arg(long)]
        game: String,

        /// DevTools WebSocket URL of the page target
        #[arg(long, conflicts_with = "port")]
        ws_url: Option<String>,

        /// DevTools HTTP port to discover the page target on
        #[arg(long)]
        port: Option<u16>,

        /// DevTools host (with --port)
        #[arg(long)]
        host: Option<String>,

        /// Override the profile's round budget
        #[arg(long)]
        max_rounds: Option<u32>,

        /// Report format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List available game profiles
    Profiles,

    /// Show the effective configuration
    Config {
        /// Show where each value came from instead of the merged TOML
        #[arg(long)]
        sources: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    // RUST_LOG overrides; otherwise info-level session progress.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            game,
            ws_url,
            port,
            host,
            max_rounds,
            format,
        } => commands::run::run(commands::run::RunOptions {
            config_path: cli.config,
            game,
            ws_url,
            port,
            host,
            max_rounds,
            format,
        }),
        Commands::Profiles => commands::profiles::run(cli.config.as_deref()).map(|()| ExitCode::SUCCESS),
        Commands::Config { sources } => {
            commands::config::run(cli.config.as_deref(), sources).map(|()| ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_run_defaults() {
        let cli = Cli::try_parse_from(["croupier", "run", "--game", "keno"]);
        assert!(cli.is_ok(), "should parse run with defaults: {cli:?}");
        match cli.unwrap().command {
            Commands::Run {
                game,
                ws_url,
                port,
                max_rounds,
                format,
                ..
            } => {
                assert_eq!(game, "keno");
                assert!(ws_url.is_none());
                assert!(port.is_none());
                assert!(max_rounds.is_none());
                assert_eq!(format, OutputFormat::Text);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parse_run_full() {
        let cli = Cli::try_parse_from([
            "croupier",
            "--config",
            "/tmp/c.toml",
            "run",
            "--game",
            "dragon-tower",
            "--port",
            "9333",
            "--host",
            "10.0.0.2",
            "--max-rounds",
            "5",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        match cli.command {
            Commands::Run {
                game,
                port,
                host,
                max_rounds,
                format,
                ..
            } => {
                assert_eq!(game, "dragon-tower");
                assert_eq!(port, Some(9333));
                assert_eq!(host.as_deref(), Some("10.0.0.2"));
                assert_eq!(max_rounds, Some(5));
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parse_run_requires_game() {
        assert!(Cli::try_parse_from(["croupier", "run"]).is_err());
    }

    #[test]
    fn cli_parse_ws_url_conflicts_with_port() {
        let cli = Cli::try_parse_from([
            "croupier",
            "run",
            "--game",
            "keno",
            "--ws-url",
            "ws://127.0.0.1:9222/devtools/page/X",
            "--port",
            "9222",
        ]);
        assert!(cli.is_err());
    }

    #[test]
    fn cli_parse_config_sources() {
        let cli = Cli::try_parse_from(["croupier", "config", "--sources"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { sources: true }));
    }

    #[test]
    fn cli_parse_profiles() {
        let cli = Cli::try_parse_from(["croupier", "profiles"]).unwrap();
        assert!(matches!(cli.command, Commands::Profiles));
    }

    #[test]
    fn cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["croupier", "run", "--game", "keno", "--format", "xml"]).is_err());
    }
}
