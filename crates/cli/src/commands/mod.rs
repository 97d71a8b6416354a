pub mod ask;
pub mod chat;
pub mod knowledge;
pub mod onboard;
pub mod serve;

use secondbrain_client::DeltaSink;
use secondbrain_config::AppConfig;
use std::io::Write;
use std::path::Path;

/// Load config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

/// The gateway base URL: an explicit override, else the configured address.
pub fn gateway_url(config: &AppConfig, url: Option<String>) -> String {
    url.unwrap_or_else(|| format!("http://{}:{}", config.gateway.host, config.gateway.port))
        .trim_end_matches('/')
        .to_string()
}

/// Prints streamed reply text incrementally.
///
/// The sink receives the whole buffer on every update, so only the unseen
/// suffix is written. A buffer that no longer extends what was printed (the
/// fallback replacing a broken reply) is printed on a fresh line.
#[derive(Default)]
pub struct TerminalSink {
    printed: String,
}

impl DeltaSink for TerminalSink {
    fn on_delta(&mut self, _buffer_id: &str, text: &str) {
        let mut stdout = std::io::stdout();
        match text.strip_prefix(self.printed.as_str()) {
            Some(suffix) => {
                let _ = write!(stdout, "{suffix}");
            }
            None => {
                let _ = write!(stdout, "\n{text}");
            }
        }
        let _ = stdout.flush();
        self.printed = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_url_defaults_to_config() {
        let config = AppConfig::default();
        assert_eq!(gateway_url(&config, None), "http://127.0.0.1:42618");
        assert_eq!(
            gateway_url(&config, Some("http://brain.local:9000/".into())),
            "http://brain.local:9000"
        );
    }

    #[test]
    fn terminal_sink_tracks_printed_text() {
        let mut sink = TerminalSink::default();
        sink.on_delta("a", "Hel");
        sink.on_delta("a", "Hello");
        assert_eq!(sink.printed, "Hello");
        sink.on_delta("a", "Sorry");
        assert_eq!(sink.printed, "Sorry");
    }
}
