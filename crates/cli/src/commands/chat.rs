//! `secondbrain chat`: interactive session against a running gateway.

use super::TerminalSink;
use secondbrain_client::{ChatClient, ChatSession, ClientError};
use std::io::Write;
use std::path::Path;
use tokio::io::{self, AsyncBufReadExt, BufReader};

pub async fn run(config_path: Option<&Path>, url: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let base = super::gateway_url(&config, url);

    let mut session = ChatSession::new(ChatClient::new(format!("{base}/v1/chat"))?);

    println!();
    println!("  SecondBrain chat ({base})");
    println!("  Type your message and press Enter. Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt()?;
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        print!("  Assistant > ");
        std::io::stdout().flush()?;
        let mut sink = TerminalSink::default();

        match session.send(line, &mut sink).await {
            Ok(_) => println!("\n"),
            // Rate and quota limits leave the conversation untouched
            Err(e @ (ClientError::RateLimited(_) | ClientError::PaymentRequired(_))) => {
                println!();
                eprintln!("  [Limit] {e}\n");
            }
            Err(e) => {
                println!();
                eprintln!("  [Error] {e}\n");
            }
        }

        prompt()?;
    }

    println!("\n  Goodbye!\n");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
