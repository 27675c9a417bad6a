use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use threadview_core::{is_valid_date_format, DEFAULT_DATE_FORMAT};

use crate::adapter::CommentView;

/// Settings for the comment view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Name new comments are posted under until changed in the UI
    pub user_name: String,
    /// Columns of indentation per reply level
    pub indent_width: u16,
    /// strftime pattern for comments older than a day
    pub date_format: String,
    /// How long status messages stay visible
    pub message_timeout_ms: u64,
    /// Start with the sample thread when no forest is given
    pub seed_demo: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            user_name: CommentView::DEFAULT_USER_NAME.to_string(),
            indent_width: 4,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            message_timeout_ms: 3000,
            seed_demo: true,
        }
    }
}

impl UiConfig {
    /// Load from `~/.threadview/config.toml`, falling back to defaults
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from a specific file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: UiConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(".threadview").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_date_format(&self.date_format) {
            bail!("invalid date_format: {:?}", self.date_format);
        }
        if self.indent_width > 16 {
            bail!("indent_width must be at most 16, got {}", self.indent_width);
        }
        Ok(())
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
