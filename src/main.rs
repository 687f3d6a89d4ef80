mod logging;

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use mailbatch::actions::{run_action, SyncAction};
use mailbatch::data::CsvOptions;
use mailbatch::run::{run, RunInputs, RunPaths};
use mailbatch::transport;
use mailbatch::MailbatchError;

#[derive(Parser)]
#[command(
    name = "mailbatch",
    version,
    about = "Compose and send one templated email per table row"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Args)]
struct Inputs {
    /// Path to the configuration file (YAML, JSON or TOML)
    #[arg(short, long)]
    config: PathBuf,
    /// Input table (CSV or JSON)
    #[arg(short, long)]
    table: Option<PathBuf>,
    /// Directory holding template files and attachments
    #[arg(short, long)]
    files: Option<PathBuf>,
    /// CSV field separator (auto-detected by default)
    #[arg(long)]
    separator: Option<char>,
    /// CSV text encoding (UTF-8 with Windows-1252 fallback by default)
    #[arg(long)]
    encoding: Option<String>,
}

impl Inputs {
    fn paths(&self) -> mailbatch::Result<RunPaths> {
        let separator = match self.separator {
            Some(c) if c.is_ascii() => Some(c as u8),
            Some(c) => {
                return Err(MailbatchError::Config {
                    reason: format!("separator '{c}' must be a single ASCII character"),
                })
            }
            None => None,
        };
        Ok(RunPaths {
            config: self.config.clone(),
            table: self.table.clone(),
            files: self.files.clone(),
            csv: CsvOptions {
                separator,
                encoding: self.encoding.clone(),
            },
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send one email per input row and write the results table
    Run {
        #[command(flatten)]
        inputs: Inputs,
        /// Where to write the results table
        #[arg(short, long, default_value = "results.csv")]
        output: PathBuf,
        /// Compose and record every email without sending
        #[arg(long)]
        dry_run: bool,
    },
    /// Run a single check and print its JSON report
    Action {
        /// test_connection, validate_subject, validate_plaintext_template,
        /// validate_html_template, validate_attachments or validate_config
        name: String,
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Manage SMTP passwords stored in the OS keychain
    Credential {
        #[command(subcommand)]
        command: CredentialCommand,
    },
}

#[derive(Subcommand)]
enum CredentialCommand {
    /// Store a password for a sender address (read from stdin when not given)
    Set {
        account: String,
        #[arg(long, env = "MAILBATCH_SMTP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Remove the stored password for a sender address
    Delete { account: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match execute(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            let user_error = e
                .downcast_ref::<MailbatchError>()
                .is_some_and(MailbatchError::is_user_error);
            ExitCode::from(if user_error { 1 } else { 2 })
        }
    }
}

async fn execute(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            inputs,
            output,
            dry_run,
        } => {
            let ledger = run(&inputs.paths()?, &output, dry_run).await?;
            println!(
                "{} sent, {} failed, results in {}",
                ledger.success_count(),
                ledger.failure_count(),
                output.display()
            );
            Ok(())
        }
        Commands::Action { name, inputs } => {
            let action: SyncAction = name.parse()?;
            let loaded = RunInputs::load(&inputs.paths()?)?;
            let transport = transport::from_config(&loaded.config.connection)?;
            let report = run_action(
                action,
                &loaded.config,
                &loaded.table,
                &loaded.files,
                transport.as_ref(),
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Credential { command } => match command {
            CredentialCommand::Set { account, password } => {
                let password = match password {
                    Some(p) => p,
                    None => read_password_line()?,
                };
                transport::store_credential(&account, &password)?;
                println!("stored password for {account}");
                Ok(())
            }
            CredentialCommand::Delete { account } => {
                transport::delete_credential(&account)?;
                println!("removed password for {account}");
                Ok(())
            }
        },
    }
}

fn read_password_line() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    anyhow::ensure!(!password.is_empty(), "empty password");
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_ascii_separator_is_user_error() {
        let cli = Cli::try_parse_from([
            "mailbatch", "run", "-c", "config.yaml", "--separator", "§",
        ])
        .unwrap();
        let Commands::Run { inputs, .. } = cli.command else {
            panic!("expected the run command");
        };
        let err = inputs.paths().unwrap_err();
        assert!(matches!(err, MailbatchError::Config { .. }));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_ascii_separator_accepted() {
        let cli = Cli::try_parse_from([
            "mailbatch", "run", "-c", "config.yaml", "--separator", ";",
        ])
        .unwrap();
        let Commands::Run { inputs, .. } = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(inputs.paths().unwrap().csv.separator, Some(b';'));
    }
}
