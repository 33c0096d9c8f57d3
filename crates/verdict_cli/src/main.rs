//! Verdict CLI
//!
//! Runs the policy query service or evaluates a single query locally.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod eval;
mod loader;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use std::net::IpAddr;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use verdict_server::config::{DEFAULT_CONNECTION_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE};
use verdict_server::{Server, ServerConfig, parse_duration};

const DEFAULT_LOG_FILTER: &str = "verdict_cli=info,verdict_runtime=info,verdict_server=info,tower_http=info";

#[derive(Parser)]
#[command(name = "verdict")]
#[command(about = "Verdict - policy query service with prepared-plan caching", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gRPC, REST and probe listeners
    Server(ServerArgs),
    /// Evaluate a query once and print the result
    Eval(eval::EvalArgs),
    /// Print the version
    Version,
}

#[derive(Debug, clap::Args)]
struct ServerArgs {
    /// gRPC port
    #[arg(short, long, env = "GRPC_PORT", default_value_t = 8000)]
    grpc_port: u16,

    /// REST port
    #[arg(short, long, env = "REST_PORT", default_value_t = 8080)]
    rest_port: u16,

    /// Health-probe port
    #[arg(short, long, env = "PROBE_PORT", default_value_t = 10080)]
    probes_port: u16,

    /// Bind address for every listener
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Maximum gRPC message and REST body size in bytes
    #[arg(long, env = "MAX_MESSAGE_SIZE", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Request deadline, e.g. `1200s`, `20m`, `500ms`
    #[arg(long, env = "CONNECTION_TIMEOUT", value_parser = parse_duration)]
    connection_timeout: Option<Duration>,

    /// Prepared-plan cache capacity (0 = unbounded)
    #[arg(long, env = "PLAN_CACHE_CAPACITY", default_value_t = 0)]
    cache_capacity: usize,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        ServerConfig {
            host: args.host,
            grpc_port: args.grpc_port,
            rest_port: args.rest_port,
            probes_port: args.probes_port,
            max_message_size: args.max_message_size,
            connection_timeout: args.connection_timeout.unwrap_or(DEFAULT_CONNECTION_TIMEOUT),
            cache_capacity: args.cache_capacity,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_server(args: ServerArgs) -> Result<()> {
    let server = Server::new(args.into());

    tokio::select! {
        result = server.run() => result.wrap_err("server stopped"),
        signal = tokio::signal::ctrl_c() => {
            signal.wrap_err("unable to listen for shutdown signal")?;
            tracing::info!("shutdown signal received");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Server(args) => {
            run_server(args).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Eval(args) => {
            let output = tokio::task::spawn_blocking(move || {
                eval::run(&args, &mut std::io::stdin().lock())
            })
            .await?;
            match output {
                Ok(output) => {
                    println!("{output}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("{err}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Version => {
            println!("verdict {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_server_args_defaults() {
        let cli = Cli::try_parse_from(["verdict", "server"]).unwrap();
        let Commands::Server(args) = cli.command else {
            panic!("expected server command");
        };
        // Environment may override defaults on CI hosts
        if std::env::var_os("GRPC_PORT").is_none() && std::env::var_os("CONNECTION_TIMEOUT").is_none() {
            let config = ServerConfig::from(args);
            assert_eq!(config.grpc_port, 8000);
            assert_eq!(config.connection_timeout, DEFAULT_CONNECTION_TIMEOUT);
        }
    }

    #[test]
    fn test_server_args_flags() {
        let cli = Cli::try_parse_from([
            "verdict",
            "server",
            "-g",
            "9000",
            "-r",
            "9080",
            "-p",
            "9090",
            "--host",
            "127.0.0.1",
            "--connection-timeout",
            "20m",
            "--cache-capacity",
            "64",
        ])
        .unwrap();
        let Commands::Server(args) = cli.command else {
            panic!("expected server command");
        };
        let config = ServerConfig::from(args);
        assert_eq!(config.grpc_port, 9000);
        assert_eq!(config.rest_port, 9080);
        assert_eq!(config.probes_port, 9090);
        assert_eq!(config.host.to_string(), "127.0.0.1");
        assert_eq!(config.connection_timeout, Duration::from_secs(1200));
        assert_eq!(config.cache_capacity, 64);
    }

    #[test]
    fn test_eval_args() {
        let cli = Cli::try_parse_from([
            "verdict",
            "--log-format",
            "json",
            "eval",
            "data.authz.allow",
            "-d",
            "policy.rego",
            "--data",
            "data.json",
            "-i",
            "input.json",
            "-r",
            "{[0].x}",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Eval(args) = cli.command else {
            panic!("expected eval command");
        };
        assert_eq!(args.query.as_deref(), Some("data.authz.allow"));
        assert_eq!(args.data.len(), 2);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_eval_conflicting_stdin_flags() {
        let result = Cli::try_parse_from(["verdict", "eval", "--stdin", "-I"]);
        assert!(result.is_err());
    }
}
