//! Interactive REPL.

use crate::commands;
use colored::Colorize;
use cqlmux_client::{Connection, ConnectionConfig};
use cqlmux_protocol::Consistency;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

const HELP_TEXT: &str = r#"
Available commands:
  help                          Show this help
  consistency [level]           Show or set the consistency level
                                (ANY, ONE, TWO, THREE, QUORUM, ALL,
                                 LOCAL_QUORUM, EACH_QUORUM, SERIAL,
                                 LOCAL_SERIAL, LOCAL_ONE)
  quit, exit                    Exit the REPL

Anything else is sent to the server as a CQL statement.
"#;

/// What the REPL should do with one input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Help,
    Quit,
    ShowConsistency,
    SetConsistency(&'a str),
    Statement(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or_default().to_lowercase();
    let rest = parts.next().map(str::trim).unwrap_or_default();

    match cmd.as_str() {
        "help" | "?" if rest.is_empty() => Input::Help,
        "quit" | "exit" | "q" if rest.is_empty() => Input::Quit,
        "consistency" if rest.is_empty() => Input::ShowConsistency,
        "consistency" if !rest.contains(char::is_whitespace) => Input::SetConsistency(rest),
        _ => Input::Statement(line),
    }
}

pub async fn run(
    config: ConnectionConfig,
    mut consistency: Consistency,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "cqlmux CLI".bold().cyan());
    println!("Connecting to {}...", config.addr());

    let conn = Connection::connect(config).await?;
    println!("{}", "Connected!".green());

    let editor_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(editor_config)?;

    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".cqlmux_history"))
        .unwrap_or_else(|_| ".cqlmux_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        let prompt = format!("{} ", "cqlmux>".cyan());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match parse_input(line) {
                    Input::Help => println!("{}", HELP_TEXT),
                    Input::Quit => break,
                    Input::ShowConsistency => {
                        println!("Consistency level is {}\n", consistency.to_string().yellow())
                    }
                    Input::SetConsistency(level) => match level.parse::<Consistency>() {
                        Ok(level) => {
                            tracing::debug!("consistency changed to {}", level);
                            consistency = level;
                            println!("Consistency level set to {}\n", level.to_string().yellow());
                        }
                        Err(e) => println!("{}: {}\n", "Error".red(), e),
                    },
                    Input::Statement(cql) => {
                        tracing::debug!("executing at {}: {}", consistency, cql);
                        match commands::execute(&conn, cql, consistency, json).await {
                            Ok(output) => println!("{}\n", output),
                            Err(e) => println!("{}: {}\n", "Error".red(), e),
                        }
                        if !conn.is_ready() {
                            tracing::warn!("connection is {}, leaving REPL", conn.state());
                            println!("{}", "Connection lost.".red());
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);

    let _ = conn.close().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}
