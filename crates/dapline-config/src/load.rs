use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

/// Directory searched for a project config, relative to each ancestor.
pub const PROJECT_DIR_NAME: &str = ".dapline";

/// Content written into a newly-created default config file.
const DEFAULT_CONFIG_CONTENT: &str = r#"# dapline configuration
# Uncomment and edit settings below to override defaults.

# [connection]
# transport = "tcp"          # or "spawn"
# host = "127.0.0.1"
# port = 4711
# program = "/path/to/adapter"
# args = []
# request_timeout_ms = 10000 # 0 waits forever
# max_frame_bytes = 16777216

# [log]
# level = "info"
# file = "/tmp/dapline.log"

# [scenario]
# event_timeout_ms = 5000
# stop_on_error = false
#
# [[scenario.steps]]
# command = "initialize"
# arguments = { adapterID = "goja", linesStartAt1 = true, columnsStartAt1 = true }
#
# [[scenario.steps]]
# command = "launch"
# arguments = { program = "main.js" }
# wait_for_event = "initialized"
"#;

/// Load and merge configuration.
///
/// 1. Reads the global config from `config_dir/config.toml`.
///    If the file does not exist it is created with commented-out
///    defaults.
/// 2. Optionally reads a project config from
///    `project_dir/.dapline/config.toml` (walks upward).
/// 3. Optionally reads an explicit config file, which must exist.
/// 4. Merges: `Config::default() <- global <- project <- explicit`.
/// 5. Validates the merged result.
///
/// # Errors
///
/// Returns [`ConfigError`] on I/O failure, parse failure, or
/// [`ConfigError::Invalid`] carrying every validation failure.
pub fn load_config(
    config_dir: &Path,
    project_dir: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<Config, ConfigError> {
    let global_path = config_dir.join("config.toml");

    // Ensure config dir exists
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)?;
    }

    // Create default config if missing
    if !global_path.exists() {
        std::fs::write(&global_path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!("Created default config at {}", global_path.display());
    }

    let mut config = Config::default();
    config = merge_file(config, &global_path)?;

    if let Some(project_path) = project_dir.and_then(find_project_config) {
        tracing::debug!("Merging project config {}", project_path.display());
        config = merge_file(config, &project_path)?;
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        config = merge_file(config, path)?;
    }

    validate(&config).map_err(ConfigError::Invalid)?;
    Ok(config)
}

fn merge_file(base: Config, path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    if !has_non_comment_content(&content) {
        return Ok(base);
    }
    merge_configs(&base, &content).map_err(|e| match e {
        ConfigError::Parse(msg) => ConfigError::Parse(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Walk from `start` upward looking for `.dapline/config.toml`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_DIR_NAME).join("config.toml"))
        .find(|candidate| candidate.is_file())
}

/// Returns `true` when the content has at least one
/// non-empty, non-comment line.
fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|l| {
        let trimmed = l.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}

/// Parse a TOML string directly into a validated [`Config`].
///
/// Useful for tests or one-off parsing without file I/O.
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&config).map_err(ConfigError::Invalid)?;
    Ok(config)
}
