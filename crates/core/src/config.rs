//! Configuration management for askdocs.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults (one Netlify docs database, local backend)
//! - Config file (`.askdocs/config.yaml` in the workspace)
//! - Environment variables
//! - Command-line flags
//!
//! The list of document databases is fixed once loading completes; the CLI
//! never mutates it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default backend serving `/api/ask` and `/api/docs-get`.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .askdocs/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Base URL of the ask backend
    pub endpoint: String,

    /// Database used when none is given on the command line
    pub default_database: Option<String>,

    /// Configured document databases, in display order
    pub databases: Vec<DatabaseConfig>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// One selectable document database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Selector sent to the backend as `database`
    pub id: String,

    /// Display name
    pub name: String,

    /// Base URL of the hosted database (used for record counts)
    pub database_url: String,

    /// Branch of the hosted database
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Table holding the documents
    pub lookup_table: String,

    /// Environment variable holding the database API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub search_options: SearchOptions,
}

/// Search and answer options the backend applies for a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// System rules handed to the answering model
    #[serde(default)]
    pub rules: Vec<String>,

    /// "keyword" or "vector"
    #[serde(default = "default_search_type")]
    pub search_type: String,

    #[serde(default)]
    pub search: KeywordSearch,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordSearch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_search_type() -> String {
    "keyword".to_string()
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            search_type: default_search_type(),
            search: KeywordSearch::default(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    endpoint: Option<String>,
    default_database: Option<String>,
    databases: Option<Vec<DatabaseConfig>>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

/// The database shipped with the demo.
pub fn default_databases() -> Vec<DatabaseConfig> {
    vec![DatabaseConfig {
        id: "netlifyDocs".to_string(),
        name: "Netlify docs".to_string(),
        database_url: "https://netlify-docs-4qbksj.us-east-1.xata.sh/db/docs".to_string(),
        branch: default_branch(),
        lookup_table: "docs".to_string(),
        api_key_env: Some("XATA_API_KEY".to_string()),
        search_options: SearchOptions {
            rules: vec![
                "You are a friendly chat bot that answers questions about the Netlify platform."
                    .to_string(),
                "Only answer questions that are relating to the defined context or are general \
                 technical questions. If asked about a question outside of the context, you can \
                 respond with \"It doesn't look like I have enough information to answer that. \
                 Check the documentation or contact support.\""
                    .to_string(),
            ],
            search_type: "keyword".to_string(),
            search: KeywordSearch {
                fuzziness: Some(1),
                prefix: Some("phrase".to_string()),
            },
        },
    }]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            default_database: None,
            databases: default_databases(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `ASKDOCS_WORKSPACE`: Override workspace path
    /// - `ASKDOCS_CONFIG`: Path to config file
    /// - `ASKDOCS_ENDPOINT`: Backend base URL
    /// - `ASKDOCS_DATABASE`: Default database id
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use askdocs_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Endpoint: {}", config.endpoint);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration with an explicit workspace and/or config file.
    ///
    /// Explicit paths win over `ASKDOCS_WORKSPACE` and `ASKDOCS_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var_os("ASKDOCS_WORKSPACE").map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var_os("ASKDOCS_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(endpoint) = std::env::var("ASKDOCS_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(database) = std::env::var("ASKDOCS_DATABASE") {
            config.default_database = Some(database);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Path of the YAML file `load` reads.
    pub fn config_path(&self) -> PathBuf {
        match self.config_file {
            Some(ref cf) => cf.clone(),
            None => self.workspace.join(".askdocs/config.yaml"),
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(endpoint) = config_file.endpoint {
            result.endpoint = endpoint;
        }

        if let Some(database) = config_file.default_database {
            result.default_database = Some(database);
        }

        // A configured list replaces the built-in one entirely
        if let Some(databases) = config_file.databases {
            result.databases = databases;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    /// Workspace and config file overrides go through [`AppConfig::load_from`].
    pub fn with_overrides(
        mut self,
        endpoint: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Look up a configured database by id.
    pub fn database(&self, id: &str) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|db| db.id == id)
    }

    /// Resolve the database a question targets.
    ///
    /// An explicit id wins, then `default_database`, then the first
    /// configured database.
    pub fn select_database(&self, id: Option<&str>) -> AppResult<&DatabaseConfig> {
        match id.or(self.default_database.as_deref()) {
            Some(id) => self.database(id).ok_or_else(|| {
                AppError::Config(format!(
                    "Unknown database: {}. Configured: {}",
                    id,
                    self.database_ids().join(", ")
                ))
            }),
            None => self
                .databases
                .first()
                .ok_or_else(|| AppError::Config("No databases configured".to_string())),
        }
    }

    fn database_ids(&self) -> Vec<&str> {
        self.databases.iter().map(|db| db.id.as_str()).collect()
    }

    /// Validate the loaded configuration.
    pub fn validate(&self) -> AppResult<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "Endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }

        if self.databases.is_empty() {
            return Err(AppError::Config("No databases configured".to_string()));
        }

        let mut seen = HashSet::new();
        for db in &self.databases {
            if db.id.is_empty() {
                return Err(AppError::Config(format!(
                    "Database '{}' has an empty id",
                    db.name
                )));
            }
            if !seen.insert(db.id.as_str()) {
                return Err(AppError::Config(format!("Duplicate database id: {}", db.id)));
            }
        }

        if let Some(ref id) = self.default_database {
            if self.database(id).is_none() {
                return Err(AppError::Config(format!(
                    "Default database '{}' is not configured",
                    id
                )));
            }
        }

        Ok(())
    }
}
