use log::Level;
use std::collections::HashMap;
use std::time::Duration;

/// `key=value` logging at fetch, build and error boundaries.
pub struct StructuredLogger {
    enabled: bool,
}

impl StructuredLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn log_fetch(&self, url: &str, bytes: usize, elapsed: Duration) {
        if !self.enabled {
            return;
        }

        log::info!(
            "Fetch: {}, bytes={}, elapsed_ms={}",
            url,
            bytes,
            elapsed.as_millis()
        );
    }

    pub fn log_build(&self, level: Level, summary: &str, metadata: &HashMap<String, String>) {
        if !self.enabled {
            return;
        }

        log::log!(level, "{}", format_message("Build", summary, metadata));
    }

    pub fn log_connection(&self, level: Level, base_url: &str, action: &str) {
        if !self.enabled {
            return;
        }

        log::log!(level, "Connection {}: {}", action, base_url);
    }

    pub fn log_error(&self, error: &str, metadata: &HashMap<String, String>) {
        if !self.enabled {
            return;
        }

        log::error!("{}", format_message("Error", error, metadata));
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Keys are sorted so the same event always renders the same line.
fn format_message(prefix: &str, subject: &str, metadata: &HashMap<String, String>) -> String {
    let mut message = format!("{}: {}", prefix, subject);
    let mut keys: Vec<_> = metadata.keys().collect();
    keys.sort();
    for key in keys {
        message.push_str(&format!(", {}={}", key, metadata[key]));
    }
    message
}
