//! Session configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::Level;

/// Environment variable naming the log file. Logging is off when unset.
pub const LOG_FILE_VAR: &str = "ICONSOLE_LOG";
pub const LOG_LEVEL_VAR: &str = "ICONSOLE_LOG_LEVEL";

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Shown as `@{prompt}> `.
    pub prompt: String,
    /// Two Tab presses closer than this trigger completion.
    pub double_press_window: Duration,
    /// Listing cap before `(N more...)`.
    pub max_suggestions: usize,
    pub startup_script: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub log_level: Level,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prompt: "console".to_string(),
            double_press_window: Duration::from_millis(500),
            max_suggestions: 16,
            startup_script: dirs::home_dir().map(|home| home.join(".iconsolerc")),
            log_file: None,
            log_level: Level::INFO,
        }
    }
}

impl ConsoleConfig {
    /// Defaults overridden by `ICONSOLE_LOG` / `ICONSOLE_LOG_LEVEL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| env::var(name).ok());
        config
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(LOG_FILE_VAR).filter(|p| !p.trim().is_empty()) {
            self.log_file = Some(PathBuf::from(path));
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            match level.trim().parse::<Level>() {
                Ok(level) => self.log_level = level,
                Err(_) => eprintln!("iconsole: ignoring invalid {}: {}", LOG_LEVEL_VAR, level),
            }
        }
    }
}
