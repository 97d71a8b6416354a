//! `secondbrain serve`: start the HTTP gateway.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!("SecondBrain gateway");
    println!("  Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("  Model:     {}", config.default_model);
    println!("  Store:     {}", config.store.backend);
    if !config.has_api_key() {
        println!("  Warning:   no API key configured, chat requests will fail");
    }

    secondbrain_gateway::start(config).await
}
