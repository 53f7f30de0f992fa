//! Dispatch configuration with documented defaults
//!
//! Every knob the engine reads lives here. The config is loaded once at
//! startup (usually from TOML) and shared as `Arc<DispatchConfig>`; there is
//! no global instance.

use crate::core::error::ConfigError;
use crate::core::types::{Flags, GroupId};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the dispatch engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    // === INBOUND ===
    /// Words that mark a line as addressed to the bot, in every supported
    /// language. Matched case-insensitively against the first token, which may
    /// carry a leading `/`.
    pub invocation_keywords: Vec<String>,

    /// Flag spellings mapped to flag names (`cyclic`, `quiet`, `force`).
    ///
    /// Several spellings may map to the same flag so each language gets its
    /// own word. Flags win over command names when a token is both.
    pub flags: AHashMap<String, String>,

    /// Words that leave the current interaction entirely
    pub exit_words: Vec<String>,

    /// Words that step back one interactive level
    pub back_words: Vec<String>,

    /// Group a sender needs before addressing commands to another user.
    /// `None` lets everybody address everybody.
    pub addressing_group: Option<GroupId>,

    // === TIMING ===
    /// How long menus and prompts wait for a reply (seconds)
    ///
    /// 0 disables the timeout. At the default (300) an abandoned menu is
    /// closed after five minutes so the conversation does not stay blocked.
    pub input_timeout_secs: u64,

    /// Pause between two runs of a cyclic command (milliseconds)
    ///
    /// The pause doubles as the window in which the user can stop the loop.
    pub cycle_interval_ms: u64,

    // === OUTPUT ===
    pub output: OutputConfig,

    // === TEXTS ===
    pub messages: Messages,
}

/// Output batching parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// How long the drainer waits after the first queued line before sending
    ///
    /// Lines queued inside this window share one outbound message.
    pub flush_interval_ms: u64,

    /// Maximum characters per outbound message
    ///
    /// Most chat transports reject messages above ~4096 characters.
    pub max_message_len: usize,

    /// Minimum gap between two outbound sends (milliseconds)
    pub min_send_interval_ms: u64,
}

/// User-visible texts emitted by the engine itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub menu_title: String,
    pub exit_label: String,
    pub access_denied: String,
    pub unknown_command: String,
    pub invalid_selection: String,
    pub loop_notice: String,
    pub timeout_notice: String,
    pub cancelled_notice: String,
    pub addressed_denied: String,
    pub goodbye: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let mut flags = AHashMap::new();
        for (spelling, name) in [
            ("cycle", "cyclic"),
            ("цикл", "cyclic"),
            ("quiet", "quiet"),
            ("тихо", "quiet"),
            ("force", "force"),
            ("принудительно", "force"),
        ] {
            flags.insert(spelling.to_string(), name.to_string());
        }

        Self {
            invocation_keywords: vec!["bot".into(), "бот".into()],
            flags,
            exit_words: vec!["exit".into(), "выход".into()],
            back_words: vec!["back".into(), "назад".into()],
            addressing_group: None,
            input_timeout_secs: 300,
            cycle_interval_ms: 2000,
            output: OutputConfig::default(),
            messages: Messages::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 200,
            max_message_len: 4000,
            min_send_interval_ms: 1000,
        }
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            menu_title: "Choose an option:".into(),
            exit_label: "Exit".into(),
            access_denied: "Access denied.".into(),
            unknown_command: "Unknown command.".into(),
            invalid_selection: "Invalid selection, try again.".into(),
            loop_notice: "Still running in loop, send 'exit' to stop.".into(),
            timeout_notice: "No reply received, closing.".into(),
            cancelled_notice: "Cancelled.".into(),
            addressed_denied: "You may not send commands to other users.".into(),
            goodbye: "Bye.".into(),
        }
    }
}

impl DispatchConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DispatchConfig =
            toml::from_str(content).map_err(|e| ConfigError::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.invocation_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "at least one invocation keyword is required".into(),
            ));
        }

        if self.output.max_message_len == 0 {
            return Err(ConfigError::Invalid(
                "output.max_message_len must be positive".into(),
            ));
        }

        // Resolves every spelling, surfacing unknown names
        self.flag_map()?;

        for word in self.exit_words.iter().chain(&self.back_words) {
            let word = word.to_lowercase();
            if self.flags.keys().any(|k| k.to_lowercase() == word) {
                return Err(ConfigError::Invalid(format!(
                    "'{}' is both a control word and a flag",
                    word
                )));
            }
        }

        Ok(())
    }

    /// Flag spellings (lowercased) resolved to their bits
    pub fn flag_map(&self) -> Result<AHashMap<String, Flags>, ConfigError> {
        let mut map = AHashMap::with_capacity(self.flags.len());
        for (spelling, name) in &self.flags {
            let flag = Flags::from_name(name).ok_or_else(|| ConfigError::UnknownFlag {
                spelling: spelling.clone(),
                name: name.clone(),
            })?;
            map.insert(spelling.to_lowercase(), flag);
        }
        Ok(map)
    }

    /// Prompt timeout, `None` when waiting forever
    pub fn input_timeout(&self) -> Option<Duration> {
        (self.input_timeout_secs > 0).then(|| Duration::from_secs(self.input_timeout_secs))
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn is_exit_word(&self, text: &str) -> bool {
        let text = text.trim();
        self.exit_words.iter().any(|w| w.to_lowercase() == text.to_lowercase())
    }

    pub fn is_back_word(&self, text: &str) -> bool {
        let text = text.trim();
        self.back_words.iter().any(|w| w.to_lowercase() == text.to_lowercase())
    }
}

impl OutputConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(self.min_send_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.input_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_flag_map_lowercases_spellings() {
        let mut config = DispatchConfig::default();
        config.flags.insert("LOOP".into(), "cyclic".into());

        let map = config.flag_map().unwrap();
        assert_eq!(map.get("loop"), Some(&Flags::CYCLIC));
        assert_eq!(map.get("цикл"), Some(&Flags::CYCLIC));
    }

    #[test]
    fn test_unknown_flag_name_rejected() {
        let mut config = DispatchConfig::default();
        config.flags.insert("fast".into(), "turbo".into());

        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownFlag { .. })
        ));
    }

    #[test]
    fn test_control_word_cannot_be_flag() {
        let mut config = DispatchConfig::default();
        config.flags.insert("back".into(), "force".into());

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_control_word_clash_ignores_cyrillic_case() {
        let mut config = DispatchConfig::default();
        config.flags.insert("Назад".into(), "quiet".into());

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_toml_partial_document() {
        let toml = r#"
            invocation_keywords = ["ops"]
            input_timeout_secs = 0

            [output]
            max_message_len = 100
        "#;

        let config = DispatchConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.invocation_keywords, vec!["ops".to_string()]);
        assert_eq!(config.input_timeout(), None);
        assert_eq!(config.output.max_message_len, 100);
        // Untouched sections keep their defaults
        assert_eq!(config.output.flush_interval_ms, 200);
        assert!(config.is_exit_word("EXIT"));
    }

    #[test]
    fn test_invalid_toml_reported() {
        let result = DispatchConfig::from_toml_str("input_timeout_secs = \"soon\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
