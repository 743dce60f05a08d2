//! `sage chat`: Interactive console chat or single-message mode.
//!
//! Every turn goes through the same pipeline as the HTTP API, under the
//! session id `cli`, so the console keeps the same bounded history.

use super::load_config;
use colored::Colorize;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

const SESSION_ID: &str = "cli";

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if message.is_none() {
        println!("{}", format!("Welcome to the {}!", config.assistant.name).green());
        println!("{}\n", "Loading knowledge base...".green());
    }

    let pipeline = match sage_gateway::build_pipeline(&config).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", "Error: Could not initialize the model:".red());
            eprintln!("{}", e.to_string().red());
            eprintln!(
                "{}",
                "Make sure you have enough disk space and RAM available.".red()
            );
            return Err(e);
        }
    };

    if let Some(msg) = message {
        let turn = pipeline.respond(SESSION_ID, &msg).await?;
        println!("{}", turn.reply);
        return Ok(());
    }

    println!("Type 'quit' or 'exit' to leave.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "You:".blue());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if is_exit(input) {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match pipeline.respond(SESSION_ID, input).await {
            Ok(turn) => println!("{}\n", format!("AI: {}", turn.reply).green()),
            Err(e) => {
                println!(
                    "{}",
                    "Error: An error occurred while getting the response:".red()
                );
                println!("{}\n", e.to_string().red());
            }
        }
    }

    println!("\n{}", "Goodbye!".green());
    Ok(())
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_are_case_insensitive() {
        assert!(is_exit("quit"));
        assert!(is_exit("EXIT"));
        assert!(is_exit("Quit"));
        assert!(!is_exit("quitting"));
        assert!(!is_exit("what is exit criteria"));
    }
}
