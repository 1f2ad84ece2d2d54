//! Interactive demo CLI for the group-coordination core.
//!
//! Runs a single in-process group atop [`ensemble::InMemoryRuntime`] and
//! exposes it through a line-oriented REPL — useful for interactive
//! exploration, not a production client.
//!
//! ```text
//! ensemble> join worker-1 --persistent
//! joined worker-1 at index 1, leader is worker-1
//! ensemble> submit worker-1 hello
//! submitted index 2
//! ensemble> leave worker-1
//! left worker-1
//! ```

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use ensemble::{GroupClient, InMemoryRuntime, MemberId};
use ensemble_config::EnsembleConfig;

/// Interactive explorer for the group-coordination core.
#[derive(Parser)]
#[command(name = "ensemble")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<TopLevel>,
}

#[derive(Subcommand)]
enum TopLevel {
    /// Print version information and exit.
    Version,
    /// Start the interactive REPL (the default with no subcommand).
    Repl,
}

#[derive(Subcommand)]
enum ReplCommand {
    /// Join the group.
    Join {
        member_id: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        persistent: bool,
    },
    /// Leave the group.
    Leave { member_id: String },
    /// Submit a task to a member.
    Submit { member_id: String, payload: String },
    /// Set a property (global if `--member` is omitted).
    SetProperty {
        name: String,
        value: String,
        #[arg(long)]
        member: Option<String>,
    },
    /// Read a property.
    GetProperty {
        name: String,
        #[arg(long)]
        member: Option<String>,
    },
    /// Print the current membership mirror and elected leader.
    Members,
    /// Exit the REPL.
    Exit,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(TopLevel::Version) => {
            println!("ensemble {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(TopLevel::Repl) | None => run_repl().await,
    }
}

async fn run_repl() -> Result<()> {
    let config = EnsembleConfig::load().unwrap_or_default();
    let runtime = Arc::new(InMemoryRuntime::new(config.group.expiration_ms));
    let (session, events) = runtime.open_session();
    let mut client = GroupClient::connect(runtime, session, events).await;

    println!("connected (expiration={}ms); type 'help' for commands", config.group.expiration_ms);
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            print_prompt();
            continue;
        }
        if line == "help" {
            print_help();
            print_prompt();
            continue;
        }
        match parse_and_run(&mut client, line).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => eprintln!("error: {e:#}"),
        }
        print_prompt();
    }
    Ok(())
}

fn print_prompt() {
    print!("ensemble> ");
    let _ = io::stdout().flush();
}

fn print_help() {
    println!("commands: join <id> [--address A] [--persistent] | leave <id> | submit <id> <payload>");
    println!("          set-property <name> <value> [--member <id>] | get-property <name> [--member <id>]");
    println!("          members | exit");
}

/// Parses one REPL line as if it were CLI args and runs it. Returns `Ok(true)`
/// when the REPL should exit.
async fn parse_and_run(client: &mut GroupClient<InMemoryRuntime>, line: &str) -> Result<bool> {
    let mut args = vec!["ensemble-repl".to_string()];
    args.extend(shell_words(line));
    let parsed =
        ReplCommandParser::try_parse_from(args).map_err(|e| anyhow::anyhow!("{e}"))?;

    match parsed.command {
        ReplCommand::Join {
            member_id,
            address,
            persistent,
        } => {
            let info = client
                .join(MemberId::new(member_id), address, persistent)
                .await?;
            println!(
                "joined {} at index {}, leader is {:?}",
                info.member_id,
                info.index,
                client.leader()
            );
            Ok(false)
        }
        ReplCommand::Leave { member_id } => {
            client.leave(MemberId::new(member_id.clone())).await?;
            println!("leave requested for {member_id}");
            Ok(false)
        }
        ReplCommand::Submit { member_id, payload } => {
            let outcome = client
                .submit(MemberId::new(member_id), Bytes::from(payload.into_bytes()))
                .await?;
            println!("task completed: {outcome:?}");
            Ok(false)
        }
        ReplCommand::SetProperty { name, value, member } => {
            client
                .set_property(
                    member.map(MemberId::new),
                    name,
                    Bytes::from(value.into_bytes()),
                )
                .await?;
            println!("ok");
            Ok(false)
        }
        ReplCommand::GetProperty { name, member } => {
            let value = client.get_property(member.map(MemberId::new), name).await?;
            match value {
                Some(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
                None => println!("(none)"),
            }
            Ok(false)
        }
        ReplCommand::Members => {
            for info in client.mirror().ordered() {
                println!("  {} (index {})", info.member_id, info.index);
            }
            println!("leader: {:?}", client.leader());
            Ok(false)
        }
        ReplCommand::Exit => Ok(true),
    }
}

/// Minimal whitespace-and-quote tokenizer, sufficient for this REPL's
/// single-word arguments.
fn shell_words(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

#[derive(Parser)]
struct ReplCommandParser {
    #[command(subcommand)]
    command: ReplCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_whitespace_separated_args() {
        assert_eq!(
            shell_words("join w1 --persistent"),
            vec!["join", "w1", "--persistent"]
        );
    }
}
