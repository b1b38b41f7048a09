use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use relaycall::config::load_config;
use relaycall::dispatch::Args;
use relaycall::{ConnectorRegistry, Envelope, Invocation, RelayError, RelayResult};

#[derive(Parser, Debug)]
#[command(name = "relaycall", version, about = "Dispatch and dry-run SaaS API operations")]
struct Cli {
    /// Path to relaycall.toml (defaults: next to the binary, cwd, user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered connectors.
    List,
    /// List the operations a connector supports.
    Operations { connector: String },
    /// Run one operation and print the result envelope as JSON.
    Call {
        connector: String,
        /// Arguments as a JSON object; read from stdin when omitted.
        #[arg(long)]
        args: Option<String>,
        /// Gateway context passed through untouched.
        #[arg(long)]
        context: Option<String>,
        /// Preview the request without sending it.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    relaycall::init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "relaycall failed");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> RelayResult<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let registry = ConnectorRegistry::from_config(config)?;

    match cli.command {
        Command::List => {
            for name in registry.list_names() {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Operations { connector } => {
            let connector = registry.get(&connector)?;
            for op in connector.operations().names() {
                println!("{op}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Call {
            connector,
            args,
            context,
            dry_run,
        } => {
            let raw = match args {
                Some(raw) => raw,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let mut args = if raw.trim().is_empty() {
                Args::new()
            } else {
                Args::from_value(serde_json::from_str(&raw)?)?
            };
            if dry_run {
                args.insert("dry_run", true);
            }
            let context = match context {
                Some(raw) => serde_json::from_str(&raw)?,
                None => serde_json::Value::Null,
            };

            let envelope = registry
                .invoke(&connector, &Invocation { args, context })
                .await;
            print_envelope(&envelope)?;
            Ok(if envelope.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

fn print_envelope(envelope: &Envelope) -> RelayResult<()> {
    let text = serde_json::to_string_pretty(envelope).map_err(RelayError::from)?;
    println!("{text}");
    Ok(())
}
