//! `secondbrain ask`: one question, streamed answer.

use super::TerminalSink;
use secondbrain_client::{ChatClient, ChatSession};
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    message: &str,
    url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let endpoint = format!("{}/v1/chat", super::gateway_url(&config, url));

    let mut session = ChatSession::new(ChatClient::new(endpoint)?);
    let mut sink = TerminalSink::default();

    session.send(message, &mut sink).await?;
    println!();

    Ok(())
}
