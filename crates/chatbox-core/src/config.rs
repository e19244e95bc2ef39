use serde::{Deserialize, Serialize};
use std::fmt;

/// Model used until the user picks another one
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Storage key holding the serialized [`GlobalConfig`]
pub const CONFIG_KEY: &str = "global-configs";

/// Storage key holding the serialized message log (only while persist is on)
pub const CONVERSATION_KEY: &str = "local-conversation";

/// Settings edited from the settings panel and restored at startup.
///
/// Missing fields take their default individually. A blob that fails to
/// parse at all is discarded in favour of [`GlobalConfig::default`].
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalConfig {
    #[serde(alias = "openAIApiKey")]
    pub api_key: String,
    pub model: String,
    #[serde(alias = "save")]
    pub persist: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            persist: false,
        }
    }
}

impl GlobalConfig {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// API key suitable for display, with all but the last four characters hidden
    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.is_empty() {
            return String::new();
        }
        let visible = chars.len().min(4);
        let hidden = chars.len() - visible;
        let tail: String = chars[hidden..].iter().collect();
        format!("{}{}", "*".repeat(hidden), tail)
    }
}

impl fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("api_key", &self.masked_api_key())
            .field("model", &self.model)
            .field("persist", &self.persist)
            .finish()
    }
}
