use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::gateway::DEFAULT_API_BASE_URL;

pub const SETTINGS_FILE: &str = "chatcat.toml";
pub const TOKEN_ENV: &str = "SLACK_TOKEN";
pub const DEFAULT_PROFILE: &str = "default";

fn default_profile_name() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_profile_name", rename = "current-profile")]
    pub current_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub token: String,
    /// Channel used when a command is given none.
    #[serde(default)]
    pub channel: String,
    #[serde(default = "default_api_base_url", rename = "api-base-url")]
    pub api_base_url: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel: String::new(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), Profile::default());
        Self {
            current_profile: default_profile_name(),
            profiles,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| AppError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| AppError::TomlParse(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::TomlSerialize(e.to_string()))?;
        fs::write(path, content).map_err(|e| AppError::WriteFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// The named profile, or the current one when `name` is `None`.
    ///
    /// The default profile always exists, even when the file does not define it.
    pub fn profile(&self, name: Option<&str>) -> Result<Profile> {
        let name = name.unwrap_or(&self.current_profile);
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == DEFAULT_PROFILE => Ok(Profile::default()),
            None => Err(AppError::ProfileNotFound(name.to_string())),
        }
    }
}

impl Profile {
    /// The token to use: `SLACK_TOKEN` if set, else the profile's own.
    pub fn resolve_token(&self) -> Result<String> {
        self.resolve_token_with(std::env::var(TOKEN_ENV).ok())
    }

    pub fn resolve_token_with(&self, env_token: Option<String>) -> Result<String> {
        env_token
            .filter(|t| !t.is_empty())
            .or_else(|| (!self.token.is_empty()).then(|| self.token.clone()))
            .ok_or(AppError::MissingToken)
    }
}
