//! `secondbrain add` / `secondbrain list`: manage the knowledge base over HTTP.

use secondbrain_core::knowledge::{KnowledgeItem, Modality};
use secondbrain_knowledge::IngestRequest;
use std::path::Path;
use std::str::FromStr;

/// What `add` uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Text(String),
    Url(String),
    File(String),
}

impl Source {
    pub fn from_args(
        text: Option<String>,
        url: Option<String>,
        file: Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        match (text, url, file) {
            (Some(text), None, None) => Ok(Self::Text(text)),
            (None, Some(url), None) => Ok(Self::Url(url)),
            (None, None, Some(file)) => Ok(Self::File(file)),
            _ => Err("Pass exactly one of --text, --url or --file".into()),
        }
    }

    /// The modality implied by the source when none is given.
    fn inferred_modality(&self) -> Modality {
        match self {
            Self::Text(_) => Modality::Text,
            Self::Url(_) => Modality::Web,
            Self::File(name) => {
                let ext = Path::new(name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_default();
                match ext.as_str() {
                    "mp3" | "wav" | "m4a" | "ogg" | "flac" => Modality::Audio,
                    "png" | "jpg" | "jpeg" | "gif" | "webp" => Modality::Image,
                    _ => Modality::Document,
                }
            }
        }
    }

    fn into_request(self, title: Option<String>, modality: Modality) -> IngestRequest {
        let mut request = IngestRequest {
            file_name: None,
            url: None,
            text: None,
            title,
            modality,
        };
        match self {
            Self::Text(text) => request.text = Some(text),
            Self::Url(url) => request.url = Some(url),
            Self::File(file) => request.file_name = Some(file),
        }
        request
    }
}

pub async fn add(
    config_path: Option<&Path>,
    source: Source,
    title: Option<String>,
    modality: Option<String>,
    url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let base = super::gateway_url(&config, url);

    let modality = match modality {
        Some(m) => Modality::from_str(&m)?,
        None => source.inferred_modality(),
    };
    let request = source.into_request(title, modality);

    let response = reqwest::Client::new()
        .post(format!("{base}/v1/knowledge"))
        .json(&request)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(error_message(response).await.into());
    }

    let item: KnowledgeItem = response.json().await?;
    println!("Added [{}] {} ({}, {})", item.id, item.title, item.modality, item.status);
    Ok(())
}

pub async fn list(config_path: Option<&Path>, url: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let base = super::gateway_url(&config, url);

    let response = reqwest::get(format!("{base}/v1/knowledge")).await?;
    if !response.status().is_success() {
        return Err(error_message(response).await.into());
    }

    let body: serde_json::Value = response.json().await?;
    let items: Vec<KnowledgeItem> = serde_json::from_value(body["items"].clone())?;

    if items.is_empty() {
        println!("The knowledge base is empty. Add something with `secondbrain add`.");
        return Ok(());
    }

    println!("{:<36}  {:<8}  {:<10}  {:<10}  TITLE", "ID", "MODALITY", "STATUS", "CREATED");
    for item in &items {
        println!(
            "{:<36}  {:<8}  {:<10}  {:<10}  {}",
            item.id,
            item.modality,
            item.status,
            item.created_at.format("%Y-%m-%d"),
            item.title
        );
    }
    println!("\n{} item(s)", items.len());
    Ok(())
}

/// The gateway's `{error}` message, or the raw status.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    match body["error"].as_str() {
        Some(message) => format!("Gateway returned {status}: {message}"),
        None => format!("Gateway returned {status}"),
    }
}
