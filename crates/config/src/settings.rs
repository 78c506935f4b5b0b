use color_eyre::eyre::Result;
use filestats_models::Locale;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const APP_NAME: &str = "filestats";
const DEFAULT_DATABASE_FILE: &str = "file_statistics.db";

pub const ENV_DATABASE_FILE: &str = "DATABASE_FILE";
pub const ENV_LANGUAGE: &str = "BOT_LANGUAGE";
pub const ENV_DEBUG: &str = "DEBUG_MODE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// `None` means the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

// Default value functions for serde
fn default_language() -> String {
    Locale::DEFAULT_LANGUAGE.to_string()
}
#[allow(clippy::cast_possible_truncation)]
fn default_max_connections() -> u32 {
    num_cpus::get().clamp(1, 16) as u32
}
fn default_busy_timeout_secs() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            language: default_language(),
            debug: false,
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database_path: Option<PathBuf>,
    pub language: Option<String>,
    pub debug: bool,
}

impl Settings {
    /// Loads `config.toml` from the platform config directory, or defaults if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined or the file is not valid TOML.
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?).await
    }

    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path).await? {
            let content = tokio::fs::read_to_string(path).await?;
            let settings: Self = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        info!("Settings saved to {:?}", path);
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| color_eyre::eyre::eyre!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join("config.toml"))
    }

    /// Layers environment variables and then command-line overrides on top of `self`.
    ///
    /// `env` is a lookup so callers can pass `std::env::var` or a fixed map. Nothing is logged
    /// here because logging is configured from the result; see [`Settings::overridden_env_vars`].
    #[must_use]
    pub fn resolve<F>(mut self, env: F, overrides: &Overrides) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env_value(&env, ENV_DATABASE_FILE) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(language) = env_value(&env, ENV_LANGUAGE) {
            self.language = language;
        }
        if let Some(debug) = env(ENV_DEBUG) {
            self.debug = parse_flag(&debug);
        }

        if let Some(path) = &overrides.database_path {
            self.database_path = Some(path.clone());
        }
        if let Some(language) = &overrides.language {
            self.language.clone_from(language);
        }
        if overrides.debug {
            self.debug = true;
        }

        self
    }

    /// Environment variables whose value a command-line argument replaces.
    #[must_use]
    pub fn overridden_env_vars<F>(env: F, overrides: &Overrides) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut overridden = Vec::new();

        let env_database = env_value(&env, ENV_DATABASE_FILE).map(PathBuf::from);
        if overrides.database_path.is_some() && env_database.is_some() && overrides.database_path != env_database {
            overridden.push(ENV_DATABASE_FILE);
        }
        let env_language = env_value(&env, ENV_LANGUAGE);
        if overrides.language.is_some() && env_language.is_some() && overrides.language != env_language {
            overridden.push(ENV_LANGUAGE);
        }
        if overrides.debug && env(ENV_DEBUG).is_some_and(|v| !parse_flag(&v)) {
            overridden.push(ENV_DEBUG);
        }

        overridden
    }

    #[must_use]
    pub fn locale(&self) -> Locale {
        Locale::parse(&self.language)
    }

    /// Database location, creating the default data directory when no path was configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the default data directory cannot be determined or created.
    pub async fn database_location(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => filestats_utils::create_data_path(APP_NAME, DEFAULT_DATABASE_FILE).await,
        }
    }
}

fn env_value<F>(env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key).filter(|v| !v.is_empty())
}

/// Truthy spellings accepted for boolean environment variables.
#[must_use]
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
