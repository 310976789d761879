//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/catree/catree.toml`
//! 3. Local config: `<project_dir>/.catree.toml`
//! 4. Environment variables: `CATREE_*` prefix

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Soft-delete filtering of flat records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConfig {
    /// Payload field holding the row status
    pub status_field: String,
    /// Status value of live rows
    pub active_value: i64,
    /// Keep rows whose status differs from `active_value`
    pub include_deleted: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            status_field: "status".into(),
            active_value: 1,
            include_deleted: false,
        }
    }
}

/// Raw filter config for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawFilterConfig {
    pub status_field: Option<String>,
    pub active_value: Option<i64>,
    pub include_deleted: Option<bool>,
}

impl FilterConfig {
    fn merge(&self, overlay: &RawFilterConfig) -> Self {
        Self {
            status_field: overlay
                .status_field
                .clone()
                .unwrap_or_else(|| self.status_field.clone()),
            active_value: overlay.active_value.unwrap_or(self.active_value),
            include_deleted: overlay.include_deleted.unwrap_or(self.include_deleted),
        }
    }
}

/// Raw settings for intermediate parsing.
///
/// `None` means "not specified, inherit", which keeps an explicit empty
/// `hide = []` distinguishable from an absent one.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub pretty: Option<bool>,
    pub max_depth: Option<usize>,
    pub hide: Option<Vec<String>>,
    pub filter: RawFilterConfig,
}

/// Unified configuration for catree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Pretty-print JSON output
    pub pretty: bool,
    /// Deepest nested input accepted (unbounded when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Payload fields removed from every output record
    pub hide: Vec<String>,
    /// Soft-delete filter settings
    pub filter: FilterConfig,
}

/// Row bookkeeping columns that are kept out of output unless configured.
pub const DEFAULT_HIDDEN_FIELDS: [&str; 4] =
    ["create_time", "delete_time", "status", "update_time"];

impl Default for Settings {
    fn default() -> Self {
        Self {
            pretty: true,
            max_depth: None,
            hide: DEFAULT_HIDDEN_FIELDS.iter().map(|f| f.to_string()).collect(),
            filter: FilterConfig::default(),
        }
    }
}

/// Get the XDG config directory for catree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "catree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("catree.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".catree.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Merge arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["a", "b"], &["c"])       // → ["a", "b", "c"]
    /// merge_array(&["a", "b"], &["!a", "c"]) // → ["b", "c"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: HashSet<String> = base.iter().cloned().collect();

        for item in overlay {
            if let Some(negated) = item.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(item.clone());
            }
        }

        // Sorted for deterministic output
        let mut vec: Vec<String> = result.into_iter().collect();
        vec.sort();
        vec
    }

    /// Merge local config onto self (base).
    ///
    /// - Scalar options: overlay wins if Some, otherwise keep base
    /// - `hide`: union merge with negation support
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            pretty: overlay.pretty.unwrap_or(self.pretty),
            max_depth: overlay.max_depth.or(self.max_depth),
            hide: overlay
                .hide
                .as_ref()
                .map(|o| Self::merge_array(&self.hide, o))
                .unwrap_or_else(|| self.hide.clone()),
            filter: self.filter.merge(&overlay.filter),
        }
    }

    /// Apply global config onto defaults with REPLACE semantics for arrays.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            pretty: global.pretty.unwrap_or(self.pretty),
            max_depth: global.max_depth.or(self.max_depth),
            hide: global.hide.clone().unwrap_or_else(|| self.hide.clone()),
            filter: self.filter.merge(&global.filter),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional project directory for local config
    ///
    /// # Array Merge Semantics
    /// - Defaults → Global: REPLACE
    /// - Global → Local: UNION with `!item` negation
    /// - Any → Env vars: REPLACE
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        Self::apply_env_overrides(current)
    }

    /// Apply CATREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("CATREE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("hide")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_bool("pretty") {
            settings.pretty = val;
        }
        if let Ok(val) = config.get_int("max_depth") {
            settings.max_depth = usize::try_from(val).ok();
        }
        if let Ok(val) = config.get::<Vec<String>>("hide") {
            settings.hide = val;
        }
        if let Ok(val) = config.get_string("filter.status_field") {
            settings.filter.status_field = val;
        }
        if let Ok(val) = config.get_int("filter.active_value") {
            settings.filter.active_value = val;
        }
        if let Ok(val) = config.get_bool("filter.include_deleted") {
            settings.filter.include_deleted = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# catree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/catree/catree.toml   (defines your baseline)
#   Local:  <project_dir>/.catree.toml     (project-specific additions)
#   Env:    CATREE_* environment variables  (explicit overrides)
#
# Array Merge Semantics:
#   Global config REPLACES compiled defaults.
#   Local config UNIONS with global. Use "!field" to REMOVE an inherited item:
#     hide = ["sort", "!status"]

# Pretty-print JSON output
# pretty = true

# Reject nested input deeper than this many levels
# max_depth = 16

# Payload fields removed from every output record
# hide = ["create_time", "delete_time", "status", "update_time"]

[filter]
# Payload field holding the row status
# status_field = "status"

# Status of live rows; rows with any other status are dropped
# active_value = 1

# Keep soft-deleted rows
# include_deleted = false
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
