//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/buildlayout/buildlayout.toml`
//! 3. Project config: `<project_dir>/buildlayout.toml`
//! 4. Environment variables: `BUILDLAYOUT_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// File name of the project-local config.
pub const PROJECT_CONFIG_FILE: &str = "buildlayout.toml";

/// A module declaration: name plus directory relative to the project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleDecl {
    pub name: String,
    /// Module directory relative to the project (default: `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ModuleDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.name))
    }
}

/// Explicit evaluation-order rule: `dependent` waits for `required`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderingRule {
    pub dependent: String,
    pub required: String,
}

/// Build-tool plugin configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildScriptConfig {
    /// Repositories used to resolve build-tool plugins
    pub repositories: Vec<String>,
    /// Plugin coordinates (`group:artifact:version`)
    pub plugins: Vec<String>,
}

impl Default for BuildScriptConfig {
    fn default() -> Self {
        Self {
            repositories: vec!["google".into(), "mavenCentral".into()],
            plugins: vec![
                "com.android.tools.build:gradle:8.4.1".into(),
                "org.jetbrains.kotlin:kotlin-gradle-plugin:1.9.22".into(),
                "com.google.gms:google-services:4.4.1".into(),
            ],
        }
    }
}

/// Raw buildscript config for intermediate parsing (arrays are Option to detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawBuildScriptConfig {
    pub repositories: Option<Vec<String>>,
    pub plugins: Option<Vec<String>>,
}

impl BuildScriptConfig {
    fn merge(&self, overlay: &RawBuildScriptConfig) -> Self {
        Self {
            repositories: merge_opt(&self.repositories, &overlay.repositories),
            plugins: merge_opt(&self.plugins, &overlay.plugins),
        }
    }

    fn apply_global(&self, global: &RawBuildScriptConfig) -> Self {
        Self {
            repositories: global
                .repositories
                .clone()
                .unwrap_or_else(|| self.repositories.clone()),
            plugins: global
                .plugins
                .clone()
                .unwrap_or_else(|| self.plugins.clone()),
        }
    }
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub output_offset: Option<PathBuf>,
    pub root_name: Option<String>,
    pub primary_module: Option<String>,
    pub enforce_primary_first: Option<bool>,
    pub clean_task: Option<String>,
    pub module_markers: Option<Vec<String>>,
    pub repositories: Option<Vec<String>>,
    pub modules: Option<Vec<ModuleDecl>>,
    pub ordering: Option<Vec<OrderingRule>>,
    pub buildscript: RawBuildScriptConfig,
}

/// Merge arrays with union semantics and negation support.
///
/// - Items from overlay are appended to base, keeping base order
/// - Items prefixed with `!` remove the corresponding item from the result
/// - Duplicates are dropped
///
/// Order is kept because repositories are consulted in declaration order.
pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(base.len() + overlay.len());
    for item in base {
        if !result.contains(item) {
            result.push(item.clone());
        }
    }
    for pattern in overlay {
        if let Some(negated) = pattern.strip_prefix('!') {
            result.retain(|item| item != negated);
        } else if !result.contains(pattern) {
            result.push(pattern.clone());
        }
    }
    result
}

fn merge_opt(base: &[String], overlay: &Option<Vec<String>>) -> Vec<String> {
    overlay
        .as_ref()
        .map(|o| merge_array(base, o))
        .unwrap_or_else(|| base.to_vec())
}

/// Unified configuration for buildlayout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Offset from the root's default output dir to the relocated output root
    pub output_offset: PathBuf,
    /// Root module name (default: project directory name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_name: Option<String>,
    /// Module every other module waits for
    pub primary_module: String,
    /// Whether to enforce `primary_module` first at all
    pub enforce_primary_first: bool,
    /// Name of the clean task
    pub clean_task: String,
    /// Files marking a subdirectory as a module during discovery
    pub module_markers: Vec<String>,
    /// Repositories shared by all modules
    pub repositories: Vec<String>,
    /// Explicit module declarations (discovery is used when empty)
    pub modules: Vec<ModuleDecl>,
    /// Extra evaluation-order rules
    pub ordering: Vec<OrderingRule>,
    /// Build-tool plugins
    pub buildscript: BuildScriptConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_offset: PathBuf::from("../../build"),
            root_name: None,
            primary_module: "app".into(),
            enforce_primary_first: true,
            clean_task: "clean".into(),
            module_markers: vec!["build.gradle".into(), "build.gradle.kts".into()],
            repositories: vec!["google".into(), "mavenCentral".into()],
            modules: vec![],
            ordering: vec![],
            buildscript: BuildScriptConfig::default(),
        }
    }
}

/// Get the XDG config directory for buildlayout.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "buildlayout").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("buildlayout.toml"))
}

/// Get the path to the project config file.
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_CONFIG_FILE)
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
    /// Expand `$VAR` in the output offset.
    ///
    /// The offset is relative to the root output directory, so a home-relative
    /// `~` offset is rejected instead of being expanded into an absolute path.
    fn expand_paths(&mut self) -> Result<(), ApplicationError> {
        let raw = self.output_offset.to_string_lossy().into_owned();
        if raw.starts_with('~') {
            return Err(DomainError::invalid_path(
                &self.output_offset,
                "offset must be relative to the root output directory, `~` is not supported",
            )
            .into());
        }
        let expanded = shellexpand::env(&raw).map_err(|e| ApplicationError::Config {
            message: format!("output_offset {raw}: {e}"),
        })?;
        self.output_offset = PathBuf::from(expanded.into_owned());
        Ok(())
    }

    /// Merge overlay config onto self (base).
    ///
    /// - Scalars: overlay wins if Some
    /// - Repository, plugin and marker arrays: union with negation support
    /// - Module and ordering declarations: overlay replaces
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            output_offset: overlay
                .output_offset
                .clone()
                .unwrap_or_else(|| self.output_offset.clone()),
            root_name: overlay.root_name.clone().or_else(|| self.root_name.clone()),
            primary_module: overlay
                .primary_module
                .clone()
                .unwrap_or_else(|| self.primary_module.clone()),
            enforce_primary_first: overlay
                .enforce_primary_first
                .unwrap_or(self.enforce_primary_first),
            clean_task: overlay
                .clean_task
                .clone()
                .unwrap_or_else(|| self.clean_task.clone()),
            module_markers: merge_opt(&self.module_markers, &overlay.module_markers),
            repositories: merge_opt(&self.repositories, &overlay.repositories),
            modules: overlay.modules.clone().unwrap_or_else(|| self.modules.clone()),
            ordering: overlay.ordering.clone().unwrap_or_else(|| self.ordering.clone()),
            buildscript: self.buildscript.merge(&overlay.buildscript),
        }
    }

    /// Apply global config onto defaults with REPLACE semantics for arrays.
    ///
    /// Defaults are a Flutter/Android baseline; a global config defines the real one.
    fn apply_global(&self, global: &RawSettings) -> Self {
        let mut merged = self.merge_with(global);
        if let Some(markers) = &global.module_markers {
            merged.module_markers = markers.clone();
        }
        if let Some(repos) = &global.repositories {
            merged.repositories = repos.clone();
        }
        merged.buildscript = self.buildscript.apply_global(&global.buildscript);
        merged
    }

    /// Load settings with layered precedence.
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config (arrays REPLACE defaults)
    /// 3. Project config: `<project_dir>/buildlayout.toml` (arrays UNION with global)
    /// 4. Environment variables: `BUILDLAYOUT_*` (REPLACE)
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(dir) = project_dir {
            let local_path = project_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths()?;

        Ok(current)
    }

    /// Load only the given file on top of defaults (no global config, no env vars).
    pub fn load_file(path: &Path) -> Result<Self, ApplicationError> {
        let raw = load_raw_settings(path)?;
        let mut settings = Self::default().merge_with(&raw);
        settings.expand_paths()?;
        Ok(settings)
    }

    /// Apply BUILDLAYOUT_* environment variables as explicit overrides.
    ///
    /// `BUILDLAYOUT_REPOSITORIES` is a comma-separated list. A variable that is
    /// set but cannot be parsed is a config error.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("BUILDLAYOUT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("repositories"),
        );

        let config = builder.build().map_err(config_err)?;

        if let Some(val) = env_value::<String>(&config, "output_offset")? {
            settings.output_offset = PathBuf::from(val);
        }
        if let Some(val) = env_value::<String>(&config, "root_name")? {
            settings.root_name = Some(val);
        }
        if let Some(val) = env_value::<String>(&config, "primary_module")? {
            settings.primary_module = val;
        }
        if let Some(val) = env_value::<bool>(&config, "enforce_primary_first")? {
            settings.enforce_primary_first = val;
        }
        if let Some(val) = env_value::<String>(&config, "clean_task")? {
            settings.clean_task = val;
        }
        if let Some(val) = env_value::<Vec<String>>(&config, "repositories")? {
            settings.repositories = val.into_iter().map(|r| r.trim().to_string()).collect();
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
        r#"# buildlayout configuration
#
# Locations (by precedence, lowest to highest):
#   Global:  ~/.config/buildlayout/buildlayout.toml
#   Project: <project_dir>/buildlayout.toml
#   Env:     BUILDLAYOUT_* environment variables
#
# Array Merge Semantics:
#   Global config REPLACES compiled defaults.
#   Project config UNIONS with global for repositories, plugins and markers.
#   Use "!item" in project config to REMOVE an inherited item:
#     repositories = ["https://jitpack.io", "!mavenCentral"]

# Offset from <project>/build to the relocated output root
# output_offset = "../../build"

# Module configured before all others
# primary_module = "app"
# enforce_primary_first = true

# clean_task = "clean"

# Modules are discovered from subdirectories containing one of these files
# module_markers = ["build.gradle", "build.gradle.kts"]

# repositories = ["google", "mavenCentral"]

# Explicit module declarations disable discovery
# [[modules]]
# name = "app"
#
# [[modules]]
# name = "camera"
# path = "../plugins/camera/android"

# [[ordering]]
# dependent = "camera"
# required = "app"

[buildscript]
# repositories = ["google", "mavenCentral"]
# plugins = [
#   "com.android.tools.build:gradle:8.4.1",
#   "org.jetbrains.kotlin:kotlin-gradle-plugin:1.9.22",
#   "com.google.gms:google-services:4.4.1",
# ]
"#
        .to_string()
    }
}

/// Look up `key` in the env source; absent is `None`, unparseable is an error.
fn env_value<T: DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>, ApplicationError> {
    match config.get::<T>(key) {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(ApplicationError::Config {
            message: format!("BUILDLAYOUT_{}: {e}", key.to_uppercase()),
        }),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
