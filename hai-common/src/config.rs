//! Bootstrap configuration loading and folder resolution
//!
//! Services read a small TOML bootstrap file (paths, bind address, logging).
//! Anything the file does not provide falls back to compiled defaults, and a
//! missing or unreadable file never prevents startup.
//!
//! # Resolution priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "HAI_ROOT_FOLDER";

/// Environment variable overriding the model bundle directory
pub const MODELS_DIR_ENV: &str = "HAI_MODELS_DIR";

/// Name of the model bundle directory below the root folder
pub const MODELS_SUBDIR: &str = "models";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional so that partial files stay valid.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Root folder for service data
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Directory holding one model bundle per model id
    #[serde(default)]
    pub models_dir: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[serde(default)]
    pub bind_address: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled-in defaults used when no other source provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            bind_address: "127.0.0.1".to_string(),
            port: 5731,
            log_level: default_log_level(),
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/healthai (or /var/lib/healthai for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("healthai"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/healthai"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/healthai
        dirs::data_dir()
            .map(|d| d.join("healthai"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/healthai"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\healthai
        dirs::data_local_dir()
            .map(|d| d.join("healthai"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\healthai"))
    } else {
        PathBuf::from("./healthai_data")
    }
}

/// Default TOML path for a module: `<config dir>/healthai/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("healthai").join(format!("{}.toml", module_name)))
}

/// Load and parse a TOML bootstrap file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load the bootstrap file at `path` if there is one
///
/// `None` when no path is configured or the file does not exist, which is
/// expected on first run. Returns the load result otherwise so the caller
/// can pick a log level from it before tracing is initialized, and report
/// a broken file afterwards.
pub fn load_toml_config_if_present(path: Option<&Path>) -> Option<Result<TomlConfig>> {
    let path = path?;
    if !path.exists() {
        return None;
    }
    Some(load_toml_config(path))
}

/// Resolves the root folder from CLI, environment, TOML and defaults
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_value: None,
        }
    }

    /// Command-line value (highest priority)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Value from the TOML bootstrap file
    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Some(path) = non_empty_env(ROOT_FOLDER_ENV) {
            return path;
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        let default = CompiledDefaults::for_current_platform().root_folder;
        info!(
            "{}: no root folder configured, using default {}",
            self.module_name,
            default.display()
        );
        default
    }
}

/// Resolve the model bundle directory
///
/// Same priority order as the root folder; the fallback is
/// `<root_folder>/models`.
pub fn resolve_models_dir(cli_arg: Option<&Path>, config: &TomlConfig, root_folder: &Path) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Some(path) = non_empty_env(MODELS_DIR_ENV) {
        return path;
    }
    if let Some(path) = &config.models_dir {
        return path.clone();
    }
    root_folder.join(MODELS_SUBDIR)
}

fn non_empty_env(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}
